//! Shared helpers for building warriors directly from redcode types, for
//! scenarios where constructing the exact instruction sequence by hand is
//! more reliable than depending on the compiler's or parser's grammar.

#![allow(dead_code, reason = "not every test file uses every helper")]

use mars::SimulatorConfig;
use redcode::{
    AddrMode, CompleteInstruction, FieldValue, Instruction, Modifier, Opcode,
    Warrior, WarriorData,
};

/// Builds a single instruction from its raw parts.
#[must_use]
pub fn instr(
    opcode: Opcode,
    modifier: Modifier,
    a_addr_mode: AddrMode,
    b_addr_mode: AddrMode,
    a_field: FieldValue,
    b_field: FieldValue,
) -> CompleteInstruction {
    CompleteInstruction {
        instr: Instruction {
            opcode,
            modifier,
            a_addr_mode,
            b_addr_mode,
        },
        a_field,
        b_field,
    }
}

/// Wraps a code sequence into a minimally-named [`WarriorData`] starting at
/// `start`.
#[must_use]
pub fn warrior(code: Vec<CompleteInstruction>, start: FieldValue) -> WarriorData {
    WarriorData {
        name: "test warrior".to_owned(),
        author: "test".to_owned(),
        strategy: String::new(),
        warrior: Warrior { code, start },
    }
}

/// A [`SimulatorConfig`] with every fold/length/distance limit set to
/// `core_size`, suitable for scenarios that don't exercise folding or
/// placement validation directly.
#[must_use]
pub fn config(core_size: FieldValue, cycles: FieldValue) -> SimulatorConfig {
    SimulatorConfig {
        core_size,
        processes: core_size,
        cycles,
        read_limit: core_size,
        write_limit: core_size,
        length: core_size,
        distance: core_size / 2,
        fixed: 0,
    }
}

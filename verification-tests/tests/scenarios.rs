//! The concrete end-to-end battle scenarios: Imp, Dwarf, SPL self,
//! division by zero, and a two-warrior tie.

mod common;

use coverage_helper::test;
use mars::Simulator;
use redcode::{AddrMode, Modifier, Opcode};

use common::{config, instr, warrior};

#[test]
fn imp_fills_the_core_with_copies_of_itself() {
    let code = vec![instr(
        Opcode::Mov,
        Modifier::I,
        AddrMode::Direct,
        AddrMode::Direct,
        0,
        1,
    )];
    let mut sim = Simulator::new(config(16, 16), 1).unwrap();
    let idx = sim.add_warrior(warrior(code, 0)).unwrap();
    sim.spawn_warrior(idx, 0).unwrap();

    for _ in 0..16 {
        sim.run_cycle().unwrap();
    }

    for addr in 0..16 {
        let cell = sim.get_mem(addr).unwrap();
        assert_eq!(cell.instr.opcode, Opcode::Mov);
        assert_eq!(cell.instr.modifier, Modifier::I);
        assert_eq!(cell.a_field, 0);
        assert_eq!(cell.b_field, 1);
    }
    assert!(sim.get_warrior(idx).unwrap().alive());
}

#[test]
fn dwarf_bombs_every_fourth_cell_with_a_growing_counter() {
    let code = vec![
        instr(
            Opcode::Add,
            Modifier::AB,
            AddrMode::Immediate,
            AddrMode::Direct,
            4,
            3,
        ),
        instr(
            Opcode::Mov,
            Modifier::I,
            AddrMode::Direct,
            AddrMode::IndirectB,
            2,
            2,
        ),
        instr(
            Opcode::Jmp,
            Modifier::A,
            AddrMode::Direct,
            AddrMode::Direct,
            (16_u32).wrapping_sub(2) % 16,
            0,
        ),
        instr(
            Opcode::Dat,
            Modifier::F,
            AddrMode::Immediate,
            AddrMode::Immediate,
            0,
            0,
        ),
    ];
    let mut sim = Simulator::new(config(16, 9), 1).unwrap();
    let idx = sim.add_warrior(warrior(code, 0)).unwrap();
    sim.spawn_warrior(idx, 0).unwrap();

    for _ in 0..9 {
        sim.run_cycle().unwrap();
    }

    let expected = [(3, 12), (7, 4), (11, 8), (15, 12)];
    for (addr, b_field) in expected {
        let cell = sim.get_mem(addr).unwrap();
        assert_eq!(cell.instr.opcode, Opcode::Dat);
        assert_eq!(cell.instr.modifier, Modifier::F);
        assert_eq!(cell.a_field, 0);
        assert_eq!(cell.b_field, b_field);
    }

    let handle = sim.get_warrior(idx).unwrap();
    assert!(handle.alive());
    assert_eq!(handle.next_pc(), Some(0));
}

#[test]
fn spl_self_populates_every_queue_slot_then_drops_further_splits() {
    // Every cell in the 4-cell core is `SPL $0, $0`, so wherever a task
    // lands it always splits into a copy of itself (direct mode 0 targets
    // the running instruction's own address).
    let spl = || {
        instr(
            Opcode::Spl,
            Modifier::F,
            AddrMode::Direct,
            AddrMode::Direct,
            0,
            0,
        )
    };
    let code = vec![spl(), spl(), spl(), spl()];
    let mut config = config(4, 100);
    config.processes = 4;
    let mut sim = Simulator::new(config, 1).unwrap();
    let idx = sim.add_warrior(warrior(code, 0)).unwrap();
    sim.spawn_warrior(idx, 0).unwrap();

    sim.run_cycle().unwrap();
    assert_eq!(sim.get_warrior(idx).unwrap().queue().to_vec(), vec![1, 0]);

    sim.run_cycle().unwrap();
    sim.run_cycle().unwrap();
    assert_eq!(sim.get_warrior(idx).unwrap().queue().len(), 4);

    let before = sim.get_warrior(idx).unwrap().queue().to_vec();
    sim.run_cycle().unwrap();
    assert_eq!(sim.get_warrior(idx).unwrap().queue().len(), before.len());
}

#[test]
fn division_by_zero_terminates_the_task_and_kills_the_warrior() {
    let code = vec![
        instr(
            Opcode::Div,
            Modifier::A,
            AddrMode::Direct,
            AddrMode::Direct,
            1,
            2,
        ),
        instr(
            Opcode::Dat,
            Modifier::F,
            AddrMode::Immediate,
            AddrMode::Immediate,
            0,
            3,
        ),
        instr(
            Opcode::Dat,
            Modifier::F,
            AddrMode::Immediate,
            AddrMode::Immediate,
            6,
            12,
        ),
    ];
    let mut sim = Simulator::new(config(16, 1), 1).unwrap();
    let idx = sim.add_warrior(warrior(code, 0)).unwrap();
    sim.spawn_warrior(idx, 0).unwrap();

    let before = sim.get_mem(1).unwrap();
    sim.run_cycle().unwrap();
    let after = sim.get_mem(1).unwrap();

    assert_eq!(before, after);
    assert!(!sim.get_warrior(idx).unwrap().alive());
    assert_eq!(sim.get_warrior(idx).unwrap().queue().len(), 0);
}

#[test]
fn two_imps_placed_apart_tie_out_the_cycle_budget() {
    let imp = || {
        vec![instr(
            Opcode::Mov,
            Modifier::I,
            AddrMode::Direct,
            AddrMode::Direct,
            0,
            1,
        )]
    };
    let mut sim = Simulator::new(config(8000, 80_000), 2).unwrap();
    let w1 = sim.add_warrior(warrior(imp(), 0)).unwrap();
    let w2 = sim.add_warrior(warrior(imp(), 0)).unwrap();
    sim.spawn_warrior(w1, 0).unwrap();
    sim.spawn_warrior(w2, 200).unwrap();

    let alive = sim.run().unwrap();

    assert_eq!(alive, vec![true, true]);
    assert_eq!(sim.cycle_count(), 80_000);
}

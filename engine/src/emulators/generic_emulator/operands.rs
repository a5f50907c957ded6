use redcode::{AddrMode, CompleteInstruction, Instruction};

use super::offset;
use crate::{
    emulator_core::{EmulatorError, EmulatorResult},
    CoreAddr,
};

/// Loaded at the start of a cycle, not touched by later core modifications
#[derive(Copy, Clone, Debug)]
pub struct RegisterValues {
    /// The PC and the content of the instruction it points to
    pub current: RegisterValue,

    /// The A target and A values
    pub a: RegisterValue,

    /// The B target and B values
    pub b: RegisterValue,
}

/// A core index (e.g. PC or field target) and contents
#[derive(Copy, Clone, Debug)]
pub struct RegisterValue {
    /// Core index for the instruction that occupies this register
    pub idx: CoreAddr,
    /// Decoded instruction
    pub instr: Instruction,
    /// A field for the instruction in this register
    pub a_field: CoreAddr,
    /// B field for the instruction in this register
    pub b_field: CoreAddr,
}

/// Collapses a pointer into a window of `limit` cells centered on the
/// instruction, bounding read/write scope when `limit < core_size`.
///
/// `fold(x, M, M)` is the identity modulo `M`, so a `limit` equal to
/// `core_size` reproduces unfolded addressing.
fn fold(pointer: CoreAddr, limit: CoreAddr, core_size: CoreAddr) -> CoreAddr {
    let r = pointer % limit;
    if r > limit / 2 {
        r + (core_size - limit)
    } else {
        r
    }
}

// TODO(jespy) Break up this function into simpler components, and enable this
// lint for each
#[allow(
    clippy::indexing_slicing,
    reason = "Removing indexing adds redundant logic for error handling and \
              to satisfy the borrow checker"
)]
/// Evaluate the A and B operands according to the operand modifier, folding
/// indirect pointers into the configured read/write windows.
///
/// Because `PostIncrement` may modify the core core, the values in
/// [`RegisterValue`] are not guaranteed to match the in-core values.
///
/// # Errors
///
/// Returns [`EmulatorError::InternalError`] in exceptional circumstances.
/// Typically this is the result of invalid parameters, or core corruption where
/// field values exceed `core_size - 1`.
pub fn evaluate(
    pc: CoreAddr,
    core: &mut [CompleteInstruction],
    read_limit: CoreAddr,
    write_limit: CoreAddr,
) -> EmulatorResult<RegisterValues> {
    let size = core.len();
    let core_size = CoreAddr::try_from(size).or(Err(EmulatorError::InternalError(
        "core size too large to be converted into CoreAddr u32",
    )))?;

    // Cache a copy of the current instruction before any writes to the core
    let pc_idx = usize::try_from(pc).or(Err(EmulatorError::InternalError(
        "unable to convert pc into usize",
    )))?;
    let cur = *core
        .get(pc_idx)
        .ok_or(EmulatorError::InternalError("pc larger than core size"))?;

    let (a_target, a_instr) = resolve_operand(
        pc,
        cur.instr.a_addr_mode,
        cur.a_field,
        core,
        core_size,
        read_limit,
        write_limit,
    )?;

    let (b_target, b_instr) = resolve_operand(
        pc,
        cur.instr.b_addr_mode,
        cur.b_field,
        core,
        core_size,
        read_limit,
        write_limit,
    )?;

    Ok(RegisterValues {
        current: RegisterValue {
            idx: validate(pc, size)?,
            instr: cur.instr,
            a_field: validate(cur.a_field, size)?,
            b_field: validate(cur.b_field, size)?,
        },
        a: RegisterValue {
            idx: validate(a_target, size)?,
            instr: a_instr.instr,
            a_field: validate(a_instr.a_field, size)?,
            b_field: validate(a_instr.b_field, size)?,
        },
        b: RegisterValue {
            idx: validate(b_target, size)?,
            instr: b_instr.instr,
            a_field: validate(b_instr.a_field, size)?,
            b_field: validate(b_instr.b_field, size)?,
        },
    })
}

/// Resolves a single operand (A or B) to its target index and the
/// instruction stored there, applying the fold functions and any
/// pre-decrement / post-increment side effects prescribed by `mode`.
fn resolve_operand(
    pc: CoreAddr,
    mode: AddrMode,
    field: CoreAddr,
    core: &mut [CompleteInstruction],
    core_size: CoreAddr,
    read_limit: CoreAddr,
    write_limit: CoreAddr,
) -> EmulatorResult<(CoreAddr, CompleteInstruction)> {
    if mode == AddrMode::Immediate {
        let idx = usize::try_from(pc).or(Err(EmulatorError::InternalError(
            "unable to convert pc into usize",
        )))?;
        return Ok((pc, core[idx]));
    }

    let mut rp = fold(field, read_limit, core_size);
    let wp = fold(field, write_limit, core_size);
    let predec_postinc_idx =
        usize::try_from(offset(pc, wp.into(), core_size)?).or(Err(
            EmulatorError::InternalError(
                "unable to convert core field into usize",
            ),
        ))?;

    let mut pip = None;
    match mode {
        AddrMode::PredecA => {
            decrement(&mut core[predec_postinc_idx].a_field, core_size)?;
        }
        AddrMode::PredecB => {
            decrement(&mut core[predec_postinc_idx].b_field, core_size)?;
        }
        AddrMode::PostincA | AddrMode::PostincB => {
            pip = Some(predec_postinc_idx);
        }
        _ => {}
    }

    match mode {
        AddrMode::IndirectA | AddrMode::PredecA | AddrMode::PostincA => {
            let read_idx = usize::try_from(offset(pc, rp.into(), core_size)?)
                .or(Err(EmulatorError::InternalError(
                    "unable to convert core field into usize",
                )))?;
            rp = fold(
                offset(rp, core[read_idx].a_field.into(), core_size)?,
                read_limit,
                core_size,
            );
        }
        AddrMode::IndirectB | AddrMode::PredecB | AddrMode::PostincB => {
            let read_idx = usize::try_from(offset(pc, rp.into(), core_size)?)
                .or(Err(EmulatorError::InternalError(
                    "unable to convert core field into usize",
                )))?;
            rp = fold(
                offset(rp, core[read_idx].b_field.into(), core_size)?,
                read_limit,
                core_size,
            );
        }
        _ => {}
    }

    let target = offset(pc, rp.into(), core_size)?;
    let target_idx = usize::try_from(target).or(Err(EmulatorError::InternalError(
        "unable to convert core field into usize",
    )))?;
    let resolved = core[target_idx];

    if let Some(pip) = pip {
        match mode {
            AddrMode::PostincA => increment(&mut core[pip].a_field, core_size)?,
            AddrMode::PostincB => increment(&mut core[pip].b_field, core_size)?,
            _ => {}
        }
    }

    Ok((target, resolved))
}

/// Validate an address, lookup the value at that address, and add one modulo
/// core size
fn increment(val: &mut CoreAddr, size: CoreAddr) -> EmulatorResult<()> {
    let new_val = super::offset(*val, 1, size)?;
    *val = new_val;
    Ok(())
}

/// Validate an address, lookup the value at that address, and subtract one
/// modulo core size
fn decrement(val: &mut CoreAddr, size: CoreAddr) -> EmulatorResult<()> {
    let new_val = super::offset(*val, -1, size)?;
    *val = new_val;
    Ok(())
}

/// Verify that a core value is valid relative to the core size
fn validate(val: CoreAddr, size: usize) -> EmulatorResult<CoreAddr> {
    let Ok(size) = CoreAddr::try_from(size) else {
        return Err(EmulatorError::InternalError(
            "core size too large to be converted into CoreAddr u32",
        ))
    };
    if val < (size as CoreAddr) {
        Ok(val)
    } else {
        Err(EmulatorError::InternalError(
            "Invalid core value greater than core size",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::fold;

    #[test]
    fn fold_below_half_limit_is_unchanged() {
        assert_eq!(fold(400, 1000, 8000), 400);
    }

    #[test]
    fn fold_above_half_limit_shifts_into_upper_window() {
        assert_eq!(fold(1400, 1000, 8000), 400);
        assert_eq!(fold(6600, 1000, 8000), 7600);
    }

    #[test]
    fn fold_with_limit_equal_to_core_size_is_identity() {
        for x in [0_u32, 1, 3999, 4000, 4001, 7999] {
            assert_eq!(fold(x, 8000, 8000), x);
        }
    }
}

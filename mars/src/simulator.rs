//! The scheduler: warrior lifecycle, per-cycle round-robin execution, and
//! winner determination, built on top of [`engine::EmulatorCore`].
//!
//! Grounded on the original `gmars` `Simulator` (`pkg/mars/sim.go`):
//! `AddWarrior`/`SpawnWarrior` as two separate steps, `RunCycle` iterating
//! warriors in insertion order and snapshotting the active set once per
//! cycle so two warriors can kill each other within the same cycle (tying
//! both), and `Run` looping until the cycle budget or a termination
//! condition is reached.

use core::fmt;

use engine::{emulators::generic_emulator, EmulatorCore, EmulatorError};
use redcode::{AddrMode, CompleteInstruction, FieldValue, Opcode, WarriorData};
use tracing::{debug, instrument, trace};

use crate::{
    config::{ConfigError, SimulatorConfig},
    reporter::{Report, ReportType, Reporter},
    warrior::{Warrior, WarriorState},
};

/// A raw `(bytecode, a_field, b_field)` core cell, as returned by
/// [`EmulatorCore::read_core`]. Used to snapshot the core for best-effort
/// reporter-event derivation.
type RawCell = (u32, FieldValue, FieldValue);

/// Errors a [`Simulator`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    /// The [`SimulatorConfig`] a simulator was constructed from failed
    /// validation.
    Config(ConfigError),
    /// The underlying `engine` emulator rejected an operation.
    Engine(EmulatorError),
    /// `add_warrior` was called more times than the simulator was
    /// constructed to hold.
    TooManyWarriors,
    /// A warrior index passed to a `Simulator` method isn't registered.
    UnknownWarrior(usize),
    /// A warrior's compiled code is longer than `SimulatorConfig::length`
    /// permits.
    WarriorTooLong,
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Engine(e) => write!(f, "{e}"),
            Self::TooManyWarriors => {
                write!(f, "simulator is already at its configured warrior capacity")
            }
            Self::UnknownWarrior(idx) => {
                write!(f, "no warrior is registered with index {idx}")
            }
            Self::WarriorTooLong => {
                write!(f, "warrior code exceeds the configured maximum length")
            }
        }
    }
}

impl From<ConfigError> for SimulatorError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<EmulatorError> for SimulatorError {
    fn from(e: EmulatorError) -> Self {
        Self::Engine(e)
    }
}

/// A non-owning, read-only view onto a registered warrior, combining its
/// metadata with its live process queue.
pub struct WarriorHandle<'sim> {
    /// The warrior this handle observes.
    warrior: &'sim Warrior,
    /// A snapshot of the warrior's process queue, next task first.
    queue: Vec<FieldValue>,
}

impl WarriorHandle<'_> {
    /// Whether this warrior currently has a non-empty process queue.
    #[must_use]
    pub const fn alive(&self) -> bool {
        self.warrior.alive()
    }

    /// This warrior's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.warrior.name()
    }

    /// This warrior's author.
    #[must_use]
    pub fn author(&self) -> &str {
        self.warrior.author()
    }

    /// The number of instructions in this warrior's compiled code.
    #[must_use]
    pub fn length(&self) -> usize {
        self.warrior.length()
    }

    /// This warrior's pending task addresses, next task first.
    #[must_use]
    pub fn queue(&self) -> &[FieldValue] {
        &self.queue
    }

    /// The address of the next task this warrior will execute, if any.
    #[must_use]
    pub fn next_pc(&self) -> Option<FieldValue> {
        self.queue.first().copied()
    }
}

/// The scheduler and simulator facade: wraps an `engine` emulator with
/// warrior lifecycle tracking, a reporter bus, and winner determination.
///
/// Not thread-safe; see the crate documentation's concurrency model. A
/// `Simulator` exclusively owns its core and process queues, through the
/// `engine` emulator it wraps.
pub struct Simulator {
    /// The underlying execution engine.
    emulator: generic_emulator::Emulator,
    /// The validated configuration this simulator was constructed from.
    config: SimulatorConfig,
    /// Registered warriors, indexed identically to `engine` warrior ids.
    warriors: Vec<Warrior>,
    /// Observers dispatched to in registration order.
    reporters: Vec<Box<dyn Reporter>>,
    /// Cycles executed since construction or the last reset.
    cycle_count: FieldValue,
}

impl Simulator {
    /// Constructs a simulator for up to `max_warriors` warriors.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Config`] if `config` fails
    /// [`SimulatorConfig::validate`], or [`SimulatorError::Engine`] if the
    /// underlying emulator rejects the derived settings.
    pub fn new(
        config: SimulatorConfig,
        max_warriors: usize,
    ) -> Result<Self, SimulatorError> {
        config.validate()?;
        let emulator = generic_emulator::Emulator::new(
            u64::from(config.core_size),
            u64::from(config.read_limit),
            u64::from(config.write_limit),
            max_warriors as u64,
            u64::from(config.processes),
        )?;
        Ok(Self {
            emulator,
            config,
            warriors: Vec::with_capacity(max_warriors),
            reporters: Vec::new(),
            cycle_count: 0,
        })
    }

    /// This simulator's configuration.
    #[must_use]
    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of addressable cells in the core.
    #[must_use]
    pub const fn core_size(&self) -> FieldValue {
        self.config.core_size
    }

    /// Cycles executed since construction or the last reset.
    #[must_use]
    pub const fn cycle_count(&self) -> FieldValue {
        self.cycle_count
    }

    /// The configured cycle budget.
    #[must_use]
    pub const fn max_cycles(&self) -> FieldValue {
        self.config.cycles
    }

    /// Number of warriors registered with this simulator.
    #[must_use]
    pub fn warrior_count(&self) -> usize {
        self.warriors.len()
    }

    /// Number of currently-`Alive` warriors.
    #[must_use]
    pub fn warrior_living_count(&self) -> usize {
        self.warriors.iter().filter(|w| w.alive()).count()
    }

    /// Registers a compiled warrior, in the `Added` state.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::TooManyWarriors`] if this simulator is
    /// already at the warrior capacity it was constructed with, or
    /// [`SimulatorError::WarriorTooLong`] if `data`'s code is longer than
    /// `SimulatorConfig::length` permits.
    pub fn add_warrior(
        &mut self,
        data: WarriorData,
    ) -> Result<usize, SimulatorError> {
        if self.warriors.len() >= self.warriors.capacity() {
            return Err(SimulatorError::TooManyWarriors);
        }
        if data.warrior.code.len() as FieldValue > self.config.length {
            return Err(SimulatorError::WarriorTooLong);
        }
        let index = self.warriors.len();
        self.warriors.push(Warrior::new(data, index));
        Ok(index)
    }

    /// A read-only handle onto a registered warrior.
    #[must_use]
    pub fn get_warrior(&self, index: usize) -> Option<WarriorHandle<'_>> {
        let warrior = self.warriors.get(index)?;
        let queue = self
            .emulator
            .read_process_queue(index as u64)
            .unwrap_or_default();
        Some(WarriorHandle { warrior, queue })
    }

    /// The instruction currently stored at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Engine`] if `addr` is out of range.
    pub fn get_mem(
        &self,
        addr: FieldValue,
    ) -> Result<CompleteInstruction, SimulatorError> {
        let (bytecode, a_field, b_field) = self.emulator.read_core(addr)?;
        let instr = self.emulator.bytecode_to_rc(bytecode)?;
        Ok(CompleteInstruction {
            instr,
            a_field,
            b_field,
        })
    }

    /// Registers an observer, dispatched to in registration order alongside
    /// every previously registered observer.
    pub fn add_reporter(&mut self, reporter: impl Reporter + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    /// Dispatches `report` to every registered observer, in registration
    /// order.
    fn emit(&mut self, report: Report) {
        for reporter in &mut self.reporters {
            reporter.report(report);
        }
    }

    /// Writes a warrior's compiled code into the core at `start_offset`,
    /// pushes its entry-point task, and marks it `Alive`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::UnknownWarrior`] if `index` isn't
    /// registered, or [`SimulatorError::Engine`] if the underlying emulator
    /// rejects a write.
    #[instrument(skip(self))]
    pub fn spawn_warrior(
        &mut self,
        index: usize,
        start_offset: FieldValue,
    ) -> Result<(), SimulatorError> {
        let warrior = self
            .warriors
            .get(index)
            .ok_or(SimulatorError::UnknownWarrior(index))?;
        let code = warrior.data().warrior.code.clone();
        let entry = warrior.data().warrior.start;
        let core_size = self.config.core_size;

        for (offset, instr) in code.iter().enumerate() {
            let addr =
                (start_offset.wrapping_add(offset as FieldValue)) % core_size;
            let bytecode = self.emulator.rc_to_bytecode(instr.instr);
            self.emulator.write_core(
                addr,
                bytecode,
                instr.a_field,
                instr.b_field,
            )?;
        }

        let entry_addr = (start_offset.wrapping_add(entry)) % core_size;
        self.emulator
            .replace_process_queue(index as u64, &[entry_addr])?;

        let warrior = self
            .warriors
            .get_mut(index)
            .ok_or(SimulatorError::UnknownWarrior(index))?;
        warrior.mark_spawned(start_offset);
        debug!(index, start_offset, entry_addr, "warrior spawned");

        for offset in 0..code.len() as FieldValue {
            let addr = (start_offset.wrapping_add(offset)) % core_size;
            self.emit(Report {
                report_type: ReportType::WarriorSpawn,
                cycle: self.cycle_count,
                warrior_index: Some(index),
                address: Some(addr),
            });
        }

        Ok(())
    }

    /// Reverts every warrior to `Added` and zero-fills the core.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Engine`] if the underlying emulator fails
    /// to reset.
    pub fn reset(&mut self) -> Result<(), SimulatorError> {
        let default_bytecode =
            self.emulator.rc_to_bytecode(redcode::Instruction::default());
        self.emulator.reset_core(default_bytecode, 0, 0)?;
        for warrior in &mut self.warriors {
            warrior.reset();
        }
        self.cycle_count = 0;
        self.emit(Report {
            report_type: ReportType::SimReset,
            cycle: 0,
            warrior_index: None,
            address: None,
        });
        Ok(())
    }

    /// Runs a single simulator cycle: one task from each `Alive` warrior,
    /// in index order. Returns the number of warriors `Alive` after the
    /// cycle.
    ///
    /// A no-op (returns 0 without emitting `CycleStart`/`CycleEnd`) if the
    /// cycle budget is already spent or no warrior is alive.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Engine`] if the underlying emulator fails
    /// unexpectedly.
    #[instrument(skip(self))]
    pub fn run_cycle(&mut self) -> Result<usize, SimulatorError> {
        if self.cycle_count >= self.config.cycles
            || self.warrior_living_count() == 0
        {
            return Ok(0);
        }

        self.emit(Report {
            report_type: ReportType::CycleStart,
            cycle: self.cycle_count,
            warrior_index: None,
            address: None,
        });

        for index in 0..self.warriors.len() {
            if !self.warriors[index].alive() {
                continue;
            }
            self.run_warrior_task(index)?;
        }

        self.emit(Report {
            report_type: ReportType::CycleEnd,
            cycle: self.cycle_count,
            warrior_index: None,
            address: None,
        });
        self.cycle_count = self.cycle_count.saturating_add(1);

        Ok(self.warrior_living_count())
    }

    /// Executes the single pending task for `index`, emitting every report
    /// the instruction's side effects produce.
    fn run_warrior_task(
        &mut self,
        index: usize,
    ) -> Result<(), SimulatorError> {
        let id = index as u64;
        let cycle = self.cycle_count;

        let queue_before = self.emulator.read_process_queue(id)?;
        let Some(&pc) = queue_before.first() else {
            // Guarded per the spec: a warrior tracked as `Alive` should
            // never have an empty queue, but the pop is fallible in the
            // underlying engine.
            self.emit(Report {
                report_type: ReportType::WarriorTerminate,
                cycle,
                warrior_index: Some(index),
                address: None,
            });
            self.warriors[index].mark_dead();
            return Ok(());
        };

        self.emit(Report {
            report_type: ReportType::WarriorTaskPop,
            cycle,
            warrior_index: Some(index),
            address: Some(pc),
        });

        let has_reporters = !self.reporters.is_empty();
        let before = has_reporters.then(|| self.snapshot_core());
        let read_targets =
            has_reporters.then(|| self.resolve_compare_reads(pc)).flatten();

        self.emulator.step(id)?;

        let queue_after = self.emulator.read_process_queue(id)?;
        let len_before = queue_before.len();
        let len_after = queue_after.len();
        let pushed = len_after.saturating_sub(len_before.saturating_sub(1));

        if let Some(before) = before {
            let after = self.snapshot_core();
            let diff = classify_diff(&before, &after, self.config.core_size);
            for addr in diff.decrements {
                self.emit(Report {
                    report_type: ReportType::WarriorDecrement,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(addr),
                });
            }
            if let Some((ra, rb)) = read_targets {
                self.emit(Report {
                    report_type: ReportType::WarriorRead,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(ra),
                });
                self.emit(Report {
                    report_type: ReportType::WarriorRead,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(rb),
                });
            }
            for addr in diff.writes {
                self.emit(Report {
                    report_type: ReportType::WarriorWrite,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(addr),
                });
            }
            for addr in diff.increments {
                self.emit(Report {
                    report_type: ReportType::WarriorIncrement,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(addr),
                });
            }
        }

        if pushed == 0 {
            self.emit(Report {
                report_type: ReportType::WarriorTaskTerminate,
                cycle,
                warrior_index: Some(index),
                address: Some(pc),
            });
        } else {
            for &addr in &queue_after[len_before.saturating_sub(1)..] {
                self.emit(Report {
                    report_type: ReportType::WarriorTaskPush,
                    cycle,
                    warrior_index: Some(index),
                    address: Some(addr),
                });
            }
        }

        if queue_after.is_empty() {
            self.emit(Report {
                report_type: ReportType::WarriorTerminate,
                cycle,
                warrior_index: Some(index),
                address: Some(pc),
            });
            self.warriors[index].mark_dead();
            trace!(index, "warrior terminated");
        }

        Ok(())
    }

    /// Snapshots the entire core, for best-effort reporter-event
    /// derivation; see the crate's design notes on reporter granularity.
    fn snapshot_core(&self) -> Vec<RawCell> {
        (0..self.config.core_size)
            .map(|addr| self.emulator.read_core(addr).unwrap_or((0, 0, 0)))
            .collect()
    }

    /// For a compare/skip opcode at `pc`, resolves the two read addresses a
    /// faithful re-derivation of `engine`'s operand resolution would visit,
    /// using only the core state from immediately before `step` ran (so
    /// this never re-triggers predecrement/postincrement side effects).
    fn resolve_compare_reads(
        &self,
        pc: FieldValue,
    ) -> Option<(FieldValue, FieldValue)> {
        let (bytecode, a_field, b_field) =
            self.emulator.read_core(pc).ok()?;
        let instr = self.emulator.bytecode_to_rc(bytecode).ok()?;
        if !matches!(
            instr.opcode,
            Opcode::Cmp | Opcode::Seq | Opcode::Sne | Opcode::Slt
        ) {
            return None;
        }
        let core_size = self.config.core_size;
        let read_limit = self.config.read_limit;
        let read = |mode: AddrMode, field: FieldValue| -> FieldValue {
            resolve_read_target(
                &self.emulator,
                core_size,
                read_limit,
                pc,
                mode,
                field,
            )
        };
        Some((
            read(instr.a_addr_mode, a_field),
            read(instr.b_addr_mode, b_field),
        ))
    }

    /// Runs cycles until the cycle budget is spent, the sole warrior in a
    /// one-warrior battle dies, or only one warrior remains alive in a
    /// multi-warrior battle. Returns each warrior's final `alive` state, in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Engine`] if the underlying emulator fails
    /// unexpectedly.
    pub fn run(&mut self) -> Result<Vec<bool>, SimulatorError> {
        let warrior_count = self.warriors.len();
        if warrior_count == 0 {
            return Ok(Vec::new());
        }
        while self.cycle_count < self.config.cycles {
            let alive = self.run_cycle()?;
            if warrior_count == 1 && alive == 0 {
                break;
            }
            if warrior_count > 1 && alive == 1 {
                break;
            }
        }
        Ok(self.warriors.iter().map(Warrior::alive).collect())
    }
}

/// Per-cell classification of a before/after core diff.
struct CoreDiff {
    /// Addresses whose A- or B-field decreased by exactly one, modulo
    /// `core_size`, with nothing else about the cell changed.
    decrements: Vec<FieldValue>,
    /// Addresses whose bytecode changed, or whose A- and B-fields both
    /// changed, or whose single changed field didn't move by exactly one.
    writes: Vec<FieldValue>,
    /// Addresses whose A- or B-field increased by exactly one, modulo
    /// `core_size`, with nothing else about the cell changed.
    increments: Vec<FieldValue>,
}

/// Classifies every address where `before` and `after` differ as a write,
/// an increment, or a decrement.
///
/// This is a heuristic, not a reconstruction of the actual operand-
/// resolution side effects `engine` applied: a `{`/`<`/`}`/`>` addressing
/// mode touches exactly one field by exactly one, which is what this
/// distinguishes from a full-cell write by `MOV`/`ADD`/`SUB`/`MUL`/`DIV`/
/// `MOD`, which typically changes more than one field or the bytecode
/// itself.
fn classify_diff(
    before: &[RawCell],
    after: &[RawCell],
    core_size: FieldValue,
) -> CoreDiff {
    let mut decrements = Vec::new();
    let mut writes = Vec::new();
    let mut increments = Vec::new();

    for (addr, (b, a)) in before.iter().zip(after.iter()).enumerate() {
        if b == a {
            continue;
        }
        let addr = addr as FieldValue;
        if b.0 != a.0 {
            writes.push(addr);
            continue;
        }
        let a_changed = b.1 != a.1;
        let b_changed = b.2 != a.2;
        match (a_changed, b_changed) {
            (true, true) => writes.push(addr),
            (true, false) => classify_field_delta(
                b.1, a.1, core_size, addr, &mut increments, &mut decrements, &mut writes,
            ),
            (false, true) => classify_field_delta(
                b.2, a.2, core_size, addr, &mut increments, &mut decrements, &mut writes,
            ),
            (false, false) => {}
        }
    }

    CoreDiff {
        decrements,
        writes,
        increments,
    }
}

/// Classifies a single changed field as an increment, decrement, or write
/// based on its modular delta.
#[allow(clippy::too_many_arguments, reason = "internal diff-classification helper")]
fn classify_field_delta(
    old: FieldValue,
    new: FieldValue,
    core_size: FieldValue,
    addr: FieldValue,
    increments: &mut Vec<FieldValue>,
    decrements: &mut Vec<FieldValue>,
    writes: &mut Vec<FieldValue>,
) {
    let delta = (u64::from(new) + u64::from(core_size) - u64::from(old))
        % u64::from(core_size);
    if delta == 1 {
        increments.push(addr);
    } else if delta == u64::from(core_size) - 1 {
        decrements.push(addr);
    } else {
        writes.push(addr);
    }
}

/// Resolves the read-fold target address of a single operand, mirroring
/// `engine::emulators::generic_emulator::operands`'s fold logic without
/// re-triggering predecrement/postincrement side effects (those already
/// happened inside `step`).
fn resolve_read_target(
    emulator: &generic_emulator::Emulator,
    core_size: FieldValue,
    read_limit: FieldValue,
    pc: FieldValue,
    mode: AddrMode,
    field: FieldValue,
) -> FieldValue {
    if mode == AddrMode::Immediate {
        return pc;
    }
    let fold = |x: u64| -> u64 {
        let limit = u64::from(read_limit);
        let size = u64::from(core_size);
        let r = x % limit;
        if r > limit / 2 {
            r + (size - limit)
        } else {
            r
        }
    };
    let mut rp = fold(u64::from(field));
    let secondary = match mode {
        AddrMode::IndirectA | AddrMode::PredecA | AddrMode::PostincA => {
            let read_idx =
                ((u64::from(pc) + rp) % u64::from(core_size)) as FieldValue;
            emulator
                .read_core(read_idx)
                .map(|(_, a, _)| u64::from(a))
                .ok()
        }
        AddrMode::IndirectB | AddrMode::PredecB | AddrMode::PostincB => {
            let read_idx =
                ((u64::from(pc) + rp) % u64::from(core_size)) as FieldValue;
            emulator
                .read_core(read_idx)
                .map(|(_, _, b)| u64::from(b))
                .ok()
        }
        _ => None,
    };
    if let Some(secondary) = secondary {
        rp = fold((rp + secondary) % u64::from(core_size));
    }
    ((u64::from(pc) + rp) % u64::from(core_size)) as FieldValue
}

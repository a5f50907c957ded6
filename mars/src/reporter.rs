//! The observer bus every [`crate::Simulator`] dispatches game events
//! through.

use redcode::FieldValue;

/// The kind of event carried by a [`Report`].
///
/// Within a single instruction's execution, events are dispatched in the
/// order: decrements (pre), reads (for compare/skip opcodes), writes (for
/// writing opcodes), increments (post), then task-push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    /// The simulator's core and warrior states were reset to their initial
    /// values.
    SimReset,
    /// A simulator cycle is about to begin.
    CycleStart,
    /// A simulator cycle has finished.
    CycleEnd,
    /// A warrior's code was written into the core and its first task queued.
    WarriorSpawn,
    /// A task address was popped from a warrior's process queue for
    /// execution.
    WarriorTaskPop,
    /// A task address was pushed onto a warrior's process queue.
    WarriorTaskPush,
    /// A task was removed from a warrior's process queue without requeuing
    /// (a `DAT` was executed, or the queue was found empty).
    WarriorTaskTerminate,
    /// A warrior's process queue became empty; the warrior is now dead.
    WarriorTerminate,
    /// A core cell was read as an operand of a compare or skip opcode.
    WarriorRead,
    /// A core cell was overwritten by a writing opcode.
    WarriorWrite,
    /// A core cell's A- or B-field was incremented by a postincrement
    /// addressing mode.
    WarriorIncrement,
    /// A core cell's A- or B-field was decremented by a predecrement
    /// addressing mode.
    WarriorDecrement,
}

/// A single observable event, synthesized by a [`crate::Simulator`] and
/// dispatched to every registered [`Reporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Which kind of event this is.
    pub report_type: ReportType,
    /// The cycle count at the time of the event.
    pub cycle: FieldValue,
    /// The index of the warrior associated with the event, or `None` for
    /// events that aren't warrior-specific (`SimReset`, `CycleStart`,
    /// `CycleEnd`).
    pub warrior_index: Option<usize>,
    /// The core address associated with the event, if any.
    pub address: Option<FieldValue>,
}

/// Something that consumes [`Report`] events dispatched by a
/// [`crate::Simulator`].
///
/// Implementors must not call back into the simulator that is dispatching to
/// them; the simulator never observes its own event stream.
pub trait Reporter {
    /// Consume a single reported event.
    fn report(&mut self, report: Report);
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    struct CountingReporter {
        count: usize,
    }

    impl Reporter for CountingReporter {
        fn report(&mut self, _report: Report) {
            self.count += 1;
        }
    }

    #[test]
    fn a_reporter_receives_dispatched_reports() {
        let mut reporter = CountingReporter { count: 0 };
        reporter.report(Report {
            report_type: ReportType::CycleStart,
            cycle: 0,
            warrior_index: None,
            address: None,
        });
        assert_eq!(reporter.count, 1);
    }
}

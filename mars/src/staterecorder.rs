//! A per-cell ring buffer of recent [`crate::reporter::Report`] activity,
//! for driving visualizers.
//!
//! Grounded on the original `gmars` `StateRecorder` (`pkg/mars/staterecorder.go`),
//! which keeps only the single most recent `(CoreState, warriorIndex)` per
//! cell. This recorder supplements that with a configurable-depth ring
//! buffer per cell (so `getMemStateN` can look back further than one event)
//! and a seventh `CoreState::Terminated` variant the original didn't track.

use std::collections::VecDeque;

use redcode::FieldValue;

use crate::reporter::{Report, ReportType, Reporter};

/// The most recent operation observed at a core cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreState {
    /// No reported activity has touched this cell since the last reset.
    Empty,
    /// A warrior's code was written here by `WarriorSpawn`.
    Written,
    /// A task was popped for execution at this address.
    Executed,
    /// This cell was read by a compare or skip opcode.
    Read,
    /// This cell's A- or B-field was incremented by a postincrement mode.
    Incremented,
    /// This cell's A- or B-field was decremented by a predecrement mode.
    Decremented,
    /// A task at this address ran `DAT` or hit an empty queue and did not
    /// requeue.
    Terminated,
}

/// One ring-buffer entry: the observed state and the warrior index
/// responsible for it, or `-1` if none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    /// The observed core state.
    pub state: CoreState,
    /// The warrior index responsible, or `-1` for the initial `Empty` state.
    pub warrior_index: i64,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            state: CoreState::Empty,
            warrior_index: -1,
        }
    }
}

/// Records a bounded history of [`CoreState`] transitions per core cell.
///
/// Implements [`Reporter`], so it is driven by registering it on a
/// [`crate::Simulator`] rather than by polling. A toggle
/// ([`StateRecorder::set_record_reads`]) controls whether `WarriorRead`
/// events are recorded at all, since dense read traffic can dominate the
/// ring buffers of a core that's mostly being scanned rather than written.
pub struct StateRecorder {
    /// Per-cell ring buffers, most recent entry last.
    history: Vec<VecDeque<Entry>>,
    /// Maximum entries retained per cell.
    depth: usize,
    /// Whether `WarriorRead` reports are recorded.
    record_reads: bool,
}

impl StateRecorder {
    /// Builds a recorder for a core of `core_size` cells, each retaining up
    /// to `depth` history entries (`depth` of 0 is treated as 1).
    #[must_use]
    pub fn new(core_size: FieldValue, depth: usize) -> Self {
        let depth = depth.max(1);
        let mut history = Vec::with_capacity(core_size as usize);
        for _ in 0..core_size {
            let mut ring = VecDeque::with_capacity(depth);
            ring.push_back(Entry::default());
            history.push(ring);
        }
        Self {
            history,
            depth,
            record_reads: true,
        }
    }

    /// Enables or disables recording of `WarriorRead` events.
    pub fn set_record_reads(&mut self, record_reads: bool) {
        self.record_reads = record_reads;
    }

    /// The most recent recorded entry for `addr`, or the default `Empty`
    /// entry if `addr` is out of range.
    #[must_use]
    pub fn get_mem_state(&self, addr: FieldValue) -> Entry {
        self.history
            .get(addr as usize)
            .and_then(VecDeque::back)
            .copied()
            .unwrap_or_default()
    }

    /// The entry `n` events back from the most recent for `addr` (`n = 0`
    /// is identical to [`StateRecorder::get_mem_state`]). Returns the
    /// default `Empty` entry if there aren't `n` recorded events yet.
    #[must_use]
    pub fn get_mem_state_n(&self, addr: FieldValue, n: usize) -> Entry {
        let Some(ring) = self.history.get(addr as usize) else {
            return Entry::default();
        };
        let len = ring.len();
        if n >= len {
            return Entry::default();
        }
        ring.get(len - 1 - n).copied().unwrap_or_default()
    }

    /// Resets every cell's history back to its initial `Empty` entry.
    fn reset(&mut self) {
        for ring in &mut self.history {
            ring.clear();
            ring.push_back(Entry::default());
        }
    }

    /// Appends a new entry for `addr`, evicting the oldest if the ring is
    /// at capacity.
    fn push(&mut self, addr: FieldValue, entry: Entry) {
        if let Some(ring) = self.history.get_mut(addr as usize) {
            if ring.len() >= self.depth {
                ring.pop_front();
            }
            ring.push_back(entry);
        }
    }
}

impl Reporter for StateRecorder {
    fn report(&mut self, report: Report) {
        #[allow(
            clippy::wildcard_enum_match_arm,
            reason = "CycleStart/CycleEnd/WarriorTaskPush carry no per-cell \
                      state to record"
        )]
        match report.report_type {
            ReportType::SimReset => self.reset(),
            ReportType::WarriorSpawn => {
                // `length` cells starting at `address` were just written.
                // The simulator doesn't encode a length on the report
                // itself, so `WarriorSpawn`'s address marks only the first
                // cell; the simulator emits one `WarriorSpawn` per spawned
                // cell to keep this recorder's contract simple. See
                // `Simulator::spawn_warrior`.
                if let (Some(warrior_index), Some(address)) =
                    (report.warrior_index, report.address)
                {
                    self.push(
                        address,
                        Entry {
                            state: CoreState::Written,
                            #[allow(
                                clippy::as_underscore,
                                clippy::cast_possible_wrap,
                                reason = "warrior indices are small; wrapping \
                                          to negative is unreachable"
                            )]
                            warrior_index: warrior_index as i64,
                        },
                    );
                }
            }
            ReportType::WarriorTaskPop => {
                self.record_event(report, CoreState::Executed);
            }
            ReportType::WarriorTaskTerminate => {
                self.record_event(report, CoreState::Terminated);
            }
            ReportType::WarriorRead => {
                if self.record_reads {
                    self.record_event(report, CoreState::Read);
                }
            }
            ReportType::WarriorWrite => {
                self.record_event(report, CoreState::Written);
            }
            ReportType::WarriorIncrement => {
                self.record_event(report, CoreState::Incremented);
            }
            ReportType::WarriorDecrement => {
                self.record_event(report, CoreState::Decremented);
            }
            _ => {}
        }
    }
}

impl StateRecorder {
    /// Shared helper for report variants carrying both a warrior index and
    /// an address.
    fn record_event(&mut self, report: Report, state: CoreState) {
        if let (Some(warrior_index), Some(address)) =
            (report.warrior_index, report.address)
        {
            self.push(
                address,
                Entry {
                    state,
                    #[allow(
                        clippy::as_underscore,
                        clippy::cast_possible_wrap,
                        reason = "warrior indices are small; wrapping to \
                                  negative is unreachable"
                    )]
                    warrior_index: warrior_index as i64,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    fn report(report_type: ReportType, address: FieldValue) -> Report {
        Report {
            report_type,
            cycle: 0,
            warrior_index: Some(2),
            address: Some(address),
        }
    }

    #[test]
    fn a_fresh_cell_reports_empty() {
        let recorder = StateRecorder::new(16, 4);
        assert_eq!(recorder.get_mem_state(0), Entry::default());
    }

    #[test]
    fn write_reports_update_get_mem_state() {
        let mut recorder = StateRecorder::new(16, 4);
        recorder.report(report(ReportType::WarriorWrite, 5));
        let entry = recorder.get_mem_state(5);
        assert_eq!(entry.state, CoreState::Written);
        assert_eq!(entry.warrior_index, 2);
    }

    #[test]
    fn get_mem_state_n_looks_back_through_history() {
        let mut recorder = StateRecorder::new(16, 4);
        recorder.report(report(ReportType::WarriorWrite, 5));
        recorder.report(report(ReportType::WarriorIncrement, 5));
        recorder.report(report(ReportType::WarriorDecrement, 5));
        assert_eq!(recorder.get_mem_state_n(5, 0).state, CoreState::Decremented);
        assert_eq!(recorder.get_mem_state_n(5, 1).state, CoreState::Incremented);
        assert_eq!(recorder.get_mem_state_n(5, 2).state, CoreState::Written);
    }

    #[test]
    fn history_deeper_than_depth_is_unavailable() {
        let mut recorder = StateRecorder::new(16, 2);
        recorder.report(report(ReportType::WarriorWrite, 5));
        recorder.report(report(ReportType::WarriorIncrement, 5));
        recorder.report(report(ReportType::WarriorDecrement, 5));
        // depth 2: only Decremented and Incremented survive
        assert_eq!(recorder.get_mem_state_n(5, 0).state, CoreState::Decremented);
        assert_eq!(recorder.get_mem_state_n(5, 1).state, CoreState::Incremented);
        assert_eq!(recorder.get_mem_state_n(5, 2), Entry::default());
    }

    #[test]
    fn reads_can_be_disabled() {
        let mut recorder = StateRecorder::new(16, 4);
        recorder.set_record_reads(false);
        recorder.report(report(ReportType::WarriorRead, 3));
        assert_eq!(recorder.get_mem_state(3), Entry::default());
    }

    #[test]
    fn sim_reset_clears_all_history() {
        let mut recorder = StateRecorder::new(16, 4);
        recorder.report(report(ReportType::WarriorWrite, 5));
        recorder.report(Report {
            report_type: ReportType::SimReset,
            cycle: 0,
            warrior_index: None,
            address: None,
        });
        assert_eq!(recorder.get_mem_state(5), Entry::default());
    }
}

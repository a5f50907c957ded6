//! Warrior lifecycle tracking layered on top of [`engine`]'s process
//! queues.

use redcode::{FieldValue, WarriorData};

/// A warrior's position in the `Added -> Alive -> Dead` lifecycle described
/// by the simulator's data model.
///
/// A warrior is `Added` once registered with a [`crate::Simulator`] but
/// before its code has been written into the core. `SpawnWarrior` moves it
/// to `Alive`; its process queue emptying moves it to `Dead`. A simulator
/// `Reset` reverts every warrior back to `Added`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarriorState {
    /// Registered with the simulator, not yet placed in the core.
    Added,
    /// Placed in the core with at least one pending task.
    Alive,
    /// Placed in the core; its process queue has emptied.
    Dead,
}

/// A warrior as tracked by a [`crate::Simulator`]: its compiled code, its
/// assigned index, and its current lifecycle state.
///
/// The process queue itself lives in the underlying `engine` emulator,
/// indexed by the same `index`; `Warrior` only tracks the metadata and
/// state `engine::EmulatorCore` has no notion of.
#[derive(Debug, Clone)]
pub struct Warrior {
    /// The compiled program and metadata this warrior was registered with.
    data: WarriorData,
    /// Index assigned at registration time; also this warrior's
    /// `engine` warrior id.
    index: usize,
    /// Core offset this warrior was placed at, set by `spawn`.
    start_offset: Option<FieldValue>,
    /// Current lifecycle state.
    state: WarriorState,
}

impl Warrior {
    /// Registers a new warrior in the `Added` state.
    #[must_use]
    pub const fn new(data: WarriorData, index: usize) -> Self {
        Self {
            data,
            index,
            start_offset: None,
            state: WarriorState::Added,
        }
    }

    /// The compiled code and metadata this warrior was registered with.
    #[must_use]
    pub const fn data(&self) -> &WarriorData {
        &self.data
    }

    /// This warrior's assigned index, shared with `engine`'s `warrior_id`.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// This warrior's name, captured from a `;name` metadata comment.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// This warrior's author, captured from a `;author` metadata comment.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.data.author
    }

    /// Number of instructions in this warrior's compiled code.
    #[must_use]
    pub fn length(&self) -> usize {
        self.data.warrior.code.len()
    }

    /// Whether this warrior currently has a non-empty process queue.
    #[must_use]
    pub const fn alive(&self) -> bool {
        matches!(self.state, WarriorState::Alive)
    }

    /// This warrior's current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WarriorState {
        self.state
    }

    /// The core offset this warrior was placed at, if it has been spawned
    /// at least once since the last reset.
    #[must_use]
    pub const fn start_offset(&self) -> Option<FieldValue> {
        self.start_offset
    }

    /// Marks this warrior `Alive`, recording the offset its code was
    /// written to.
    pub fn mark_spawned(&mut self, start_offset: FieldValue) {
        self.start_offset = Some(start_offset);
        self.state = WarriorState::Alive;
    }

    /// Marks this warrior `Dead`: its process queue has emptied.
    pub fn mark_dead(&mut self) {
        self.state = WarriorState::Dead;
    }

    /// Reverts this warrior to `Added`, as if it had never been spawned.
    pub fn reset(&mut self) {
        self.start_offset = None;
        self.state = WarriorState::Added;
    }
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn a_new_warrior_starts_added() {
        let w = Warrior::new(WarriorData::default(), 0);
        assert_eq!(w.state(), WarriorState::Added);
        assert!(!w.alive());
    }

    #[test]
    fn spawning_marks_alive_and_records_offset() {
        let mut w = Warrior::new(WarriorData::default(), 1);
        w.mark_spawned(42);
        assert!(w.alive());
        assert_eq!(w.start_offset(), Some(42));
    }

    #[test]
    fn emptying_the_queue_marks_dead() {
        let mut w = Warrior::new(WarriorData::default(), 0);
        w.mark_spawned(0);
        w.mark_dead();
        assert_eq!(w.state(), WarriorState::Dead);
        assert!(!w.alive());
    }

    #[test]
    fn reset_reverts_to_added() {
        let mut w = Warrior::new(WarriorData::default(), 0);
        w.mark_spawned(10);
        w.mark_dead();
        w.reset();
        assert_eq!(w.state(), WarriorState::Added);
        assert_eq!(w.start_offset(), None);
    }
}

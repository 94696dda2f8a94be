//! Grouped undo history.
//!
//! The session collects the deltas of one logical operation and hands them to the
//! [`UndoManager`] as a list of [`DeltaGroup`]s. Undoing an entry asks the session (through
//! [`UndoTarget`]) to revert its document deltas in reverse order and to re-add any folds the
//! edit swallowed.
//!
//! Cleanliness is tracked with a signed counter, incremented by `execute`/`redo` and
//! decremented by `undo`. A counter that is negative when new work is executed can never
//! come back to zero, so it is poisoned until [`UndoManager::mark_clean`] or
//! [`UndoManager::reset`].

use crate::delta::Delta;
use crate::fold::Fold;
use crate::range::Range;

/// Folds that were removed as a side effect of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldDelta {
    /// The removed folds, in document coordinates at the time of removal.
    pub folds: Vec<Fold>,
}

/// One group of an undo entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaGroup {
    /// Document deltas, in the order they were applied.
    Doc(Vec<Delta>),
    /// Folds to restore on undo.
    Fold(Vec<FoldDelta>),
}

/// Whatever the undo manager replays its entries on.
pub trait UndoTarget {
    /// Revert `groups`, last group first. Returns the range to select, if any.
    fn undo_changes(&mut self, groups: &[DeltaGroup], dont_select: bool) -> Option<Range>;

    /// Re-apply the document groups of `groups` in order. Returns the range to select, if any.
    fn redo_changes(&mut self, groups: &[DeltaGroup], dont_select: bool) -> Option<Range>;
}

/// Undo and redo stacks of grouped deltas.
#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<Vec<DeltaGroup>>,
    redo_stack: Vec<Vec<DeltaGroup>>,
    dirty: Option<i64>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoManager {
    /// An empty, clean history.
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            dirty: Some(0),
        }
    }

    /// Record a new entry and drop the redo history.
    ///
    /// With `merge`, the entry is appended to the previous one so both undo in one step.
    pub fn execute(&mut self, groups: Vec<DeltaGroup>, merge: bool) {
        let mut groups = groups;
        if merge && let Some(mut previous) = self.undo_stack.pop() {
            self.dirty = self.dirty.map(|d| d - 1);
            previous.append(&mut groups);
            groups = previous;
        }
        self.undo_stack.push(groups);
        self.redo_stack.clear();
        if self.dirty.is_some_and(|d| d < 0) {
            self.dirty = None;
        }
        self.dirty = self.dirty.map(|d| d + 1);
    }

    /// Undo the most recent entry on `target`.
    pub fn undo<T: UndoTarget + ?Sized>(&mut self, target: &mut T, dont_select: bool) -> Option<Range> {
        let groups = self.undo_stack.pop()?;
        let range = target.undo_changes(&groups, dont_select);
        self.redo_stack.push(groups);
        self.dirty = self.dirty.map(|d| d - 1);
        tracing::debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "undo");
        range
    }

    /// Redo the most recently undone entry on `target`.
    pub fn redo<T: UndoTarget + ?Sized>(&mut self, target: &mut T, dont_select: bool) -> Option<Range> {
        let groups = self.redo_stack.pop()?;
        let range = target.redo_changes(&groups, dont_select);
        self.undo_stack.push(groups);
        self.dirty = self.dirty.map(|d| d + 1);
        tracing::debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "redo");
        range
    }

    /// Drop both stacks and mark the history clean.
    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.dirty = Some(0);
    }

    /// `true` if there is something to undo.
    pub fn has_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// `true` if there is something to redo.
    pub fn has_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Declare the current state clean.
    pub fn mark_clean(&mut self) {
        self.dirty = Some(0);
    }

    /// `true` if the counter is back at the last clean point.
    pub fn is_clean(&self) -> bool {
        self.dirty == Some(0)
    }

    /// The raw counter; `None` once poisoned.
    pub fn dirty_counter(&self) -> Option<i64> {
        self.dirty
    }

    /// Entries available for undo.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        undone: Vec<usize>,
        redone: Vec<usize>,
    }

    impl UndoTarget for Recorder {
        fn undo_changes(&mut self, groups: &[DeltaGroup], _: bool) -> Option<Range> {
            self.undone.push(groups.len());
            None
        }

        fn redo_changes(&mut self, groups: &[DeltaGroup], _: bool) -> Option<Range> {
            self.redone.push(groups.len());
            None
        }
    }

    fn group() -> Vec<DeltaGroup> {
        vec![DeltaGroup::Doc(vec![Delta::InsertText {
            range: Range::new(0, 0, 0, 1),
            text: "a".to_string(),
        }])]
    }

    #[test]
    fn test_execute_undo_redo_counts() {
        let mut um = UndoManager::new();
        let mut target = Recorder::default();
        um.execute(group(), false);
        um.execute(group(), false);
        assert!(!um.is_clean());
        um.undo(&mut target, false);
        um.undo(&mut target, false);
        assert!(um.is_clean());
        assert!(!um.has_undo());
        um.redo(&mut target, false);
        assert_eq!(um.dirty_counter(), Some(1));
        assert_eq!(target.undone, vec![1, 1]);
        assert_eq!(target.redone, vec![1]);
    }

    #[test]
    fn test_merge_concatenates_entries() {
        let mut um = UndoManager::new();
        let mut target = Recorder::default();
        um.execute(group(), false);
        um.execute(group(), true);
        assert_eq!(um.undo_depth(), 1);
        assert_eq!(um.dirty_counter(), Some(1));
        um.undo(&mut target, false);
        assert_eq!(target.undone, vec![2]);
        assert!(um.is_clean());
    }

    #[test]
    fn test_execute_clears_redo() {
        let mut um = UndoManager::new();
        let mut target = Recorder::default();
        um.execute(group(), false);
        um.undo(&mut target, false);
        assert!(um.has_redo());
        um.execute(group(), false);
        assert!(!um.has_redo());
    }

    #[test]
    fn test_negative_counter_poisons_until_mark_clean() {
        let mut um = UndoManager::new();
        let mut target = Recorder::default();
        um.execute(group(), false);
        um.mark_clean();
        um.undo(&mut target, false);
        assert_eq!(um.dirty_counter(), Some(-1));
        um.execute(group(), false);
        assert_eq!(um.dirty_counter(), None);
        assert!(!um.is_clean());
        um.mark_clean();
        assert!(um.is_clean());
    }
}

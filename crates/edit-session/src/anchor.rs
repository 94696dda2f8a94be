//! Self-adjusting positions.
//!
//! An [`Anchor`] is owned by the [`crate::Document`] it points into. The document feeds every
//! delta through [`Anchor::on_change`] before notifying any other listener, so by the time a
//! session or selection sees a change its anchors already sit at their shifted positions.

use crate::delta::Delta;
use crate::range::Position;

/// Handle to an anchor registered in a [`crate::Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub(crate) usize);

/// A move reported by an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorChange {
    /// Position before the move.
    pub old: Position,
    /// Position after the move.
    pub value: Position,
}

/// A tracked position inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub(crate) row: usize,
    pub(crate) column: usize,
    /// Stay left of text inserted exactly at the anchor.
    pub(crate) insert_right: bool,
}

impl Anchor {
    pub(crate) fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            insert_right: false,
        }
    }

    /// Current position.
    pub fn position(&self) -> Position {
        Position::new(self.row, self.column)
    }

    /// Whether insertions exactly at the anchor leave it in place.
    pub fn insert_right(&self) -> bool {
        self.insert_right
    }

    /// Where the anchor ends up after `delta`, computed from its current position alone.
    pub fn shifted(&self, delta: &Delta) -> Position {
        let range = delta.range();
        let (start, end) = (range.start, range.end);
        let (mut row, mut column) = (self.row, self.column);

        if start.row == end.row && start.row != row {
            return self.position();
        }
        if start.row > row {
            return self.position();
        }
        if start.row == row && start.column > column {
            return self.position();
        }

        match delta {
            Delta::InsertText { .. } => {
                if start.row == row && start.column <= column {
                    if start.column == column && self.insert_right {
                    } else if start.row == end.row {
                        column += end.column - start.column;
                    } else {
                        column -= start.column;
                        row += end.row - start.row;
                    }
                } else if start.row != end.row && start.row < row {
                    row += end.row - start.row;
                }
            }
            Delta::InsertLines { .. } => {
                if start.row == row && column == 0 && self.insert_right {
                } else if start.row <= row {
                    row += end.row - start.row;
                }
            }
            Delta::RemoveText { .. } => {
                if start.row == row && start.column < column {
                    // A removal running past this row swallows the rest of it.
                    if start.row != end.row || end.column >= column {
                        column = start.column;
                    } else {
                        column = column + start.column - end.column;
                    }
                } else if start.row != end.row && start.row < row {
                    if end.row == row {
                        column = column.saturating_sub(end.column) + start.column;
                    }
                    row -= end.row - start.row;
                } else if end.row == row {
                    row -= end.row - start.row;
                    column = column.saturating_sub(end.column) + start.column;
                }
            }
            Delta::RemoveLines { .. } => {
                if start.row <= row {
                    if end.row <= row {
                        row -= end.row - start.row;
                    } else {
                        row = start.row;
                        column = 0;
                    }
                }
            }
        }
        Position::new(row, column)
    }

    /// Apply `delta`, reporting the move if the position changed.
    pub(crate) fn on_change(&mut self, delta: &Delta) -> Option<AnchorChange> {
        let value = self.shifted(delta);
        self.set(value)
    }

    /// Unclipped assignment.
    pub(crate) fn set(&mut self, value: Position) -> Option<AnchorChange> {
        let old = self.position();
        if old == value {
            return None;
        }
        self.row = value.row;
        self.column = value.column;
        Some(AnchorChange { old, value })
    }
}

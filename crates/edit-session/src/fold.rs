//! A single collapsed range.
//!
//! A [`Fold`] hides `range` behind `placeholder`. Folds added inside an already folded range are
//! kept as sub-folds of the enclosing fold. Sub-fold ranges are stored relative to the parent's
//! start (row offset, and a column offset on the parent's first row), so they stay valid while
//! the parent moves around with edits. [`crate::EditSession::expand_fold`] turns them back into
//! absolute ranges.

use crate::error::{Result, SessionError};
use crate::range::{Position, Range};
use std::fmt;

/// Identifier of a fold, assigned when it is added to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FoldId(pub(crate) u64);

/// A collapsed range of text shown as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub(crate) id: FoldId,
    pub range: Range,
    pub(crate) placeholder: String,
    pub(crate) sub_folds: Vec<Fold>,
    pub(crate) collapse_children: usize,
}

impl Fold {
    /// A detached fold. Its id is assigned by the session it gets added to.
    pub fn new(range: Range, placeholder: impl Into<String>) -> Self {
        Self {
            id: FoldId::default(),
            range,
            placeholder: placeholder.into(),
            sub_folds: Vec::new(),
            collapse_children: 0,
        }
    }

    /// Session-assigned id.
    pub fn id(&self) -> FoldId {
        self.id
    }

    /// Hidden range in document coordinates.
    pub fn range(&self) -> Range {
        self.range
    }

    /// Start of the hidden range.
    pub fn start(&self) -> Position {
        self.range.start
    }

    /// End of the hidden range.
    pub fn end(&self) -> Position {
        self.range.end
    }

    /// Text shown instead of the hidden range.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Nested folds, relative to [`Fold::start`].
    pub fn sub_folds(&self) -> &[Fold] {
        &self.sub_folds
    }

    /// `true` if the fold starts and ends on the same row.
    pub fn is_same_row(&self) -> bool {
        self.range.start.row == self.range.end.row
    }

    /// Levels of nested structure to re-fold when this fold is expanded.
    pub fn collapse_children(&self) -> usize {
        self.collapse_children
    }

    /// Set [`Fold::collapse_children`].
    pub fn set_collapse_children(&mut self, depth: usize) {
        self.collapse_children = depth;
    }

    /// Builder form of [`Fold::set_collapse_children`].
    pub fn with_collapse_children(mut self, depth: usize) -> Self {
        self.collapse_children = depth;
        self
    }

    /// Nest `fold` (in absolute coordinates) inside this fold and return the id that now
    /// represents it.
    ///
    /// An equal range resolves to this fold. A fold that lands inside an existing sub-fold is
    /// nested one level deeper; sub-folds covered by `fold` become its own sub-folds.
    pub(crate) fn add_sub_fold(&mut self, mut fold: Fold) -> Result<FoldId> {
        if self.range == fold.range {
            return Ok(self.id);
        }
        if !self.range.contains_range(&fold.range) {
            return Err(SessionError::FoldIntersects {
                range: fold.range,
                existing: self.range,
            });
        }
        let origin = self.range.start;
        let absolute = fold.range;
        fold.range = consume_range(fold.range, origin);
        let (start, end) = (fold.range.start, fold.range.end);

        let mut i = 0;
        while i < self.sub_folds.len() && self.sub_folds[i].range.end <= start {
            i += 1;
        }
        if let Some(sub) = self.sub_folds.get_mut(i)
            && sub.range.start <= start
            && sub.range.end >= end
        {
            fold.range = absolute;
            let inner = restore_range(sub.range, origin);
            return sub.add_sub_fold_at(fold, inner);
        }

        let mut j = i;
        while j < self.sub_folds.len()
            && self.sub_folds[j].range.start >= start
            && self.sub_folds[j].range.end <= end
        {
            j += 1;
        }
        if let Some(sub) = self.sub_folds.get(j)
            && sub.range.start < end
        {
            return Err(SessionError::FoldIntersects {
                range: absolute,
                existing: restore_range(sub.range, origin),
            });
        }

        let consumed: Vec<Fold> = self.sub_folds.drain(i..j).collect();
        for mut sub in consumed {
            sub.range = consume_range(sub.range, start);
            fold.sub_folds.push(sub);
        }
        let id = fold.id;
        self.sub_folds.insert(i, fold);
        Ok(id)
    }

    /// [`Fold::add_sub_fold`] for a sub-fold whose absolute range is `absolute`.
    fn add_sub_fold_at(&mut self, fold: Fold, absolute: Range) -> Result<FoldId> {
        let relative = self.range;
        self.range = absolute;
        let result = self.add_sub_fold(fold);
        self.range = relative;
        result
    }

    /// Sub-folds converted back to absolute coordinates.
    pub(crate) fn restored_sub_folds(&self) -> Vec<Fold> {
        self.sub_folds
            .iter()
            .map(|sub| {
                let mut sub = sub.clone();
                sub.range = restore_range(sub.range, self.range.start);
                sub
            })
            .collect()
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.placeholder, self.range)
    }
}

fn consume_point(point: Position, anchor: Position) -> Position {
    let row = point.row.saturating_sub(anchor.row);
    let column = if row == 0 {
        point.column.saturating_sub(anchor.column)
    } else {
        point.column
    };
    Position::new(row, column)
}

fn restore_point(point: Position, anchor: Position) -> Position {
    let column = if point.row == 0 {
        point.column + anchor.column
    } else {
        point.column
    };
    Position::new(point.row + anchor.row, column)
}

/// Express `range` relative to `anchor`.
pub(crate) fn consume_range(range: Range, anchor: Position) -> Range {
    Range::from_points(consume_point(range.start, anchor), consume_point(range.end, anchor))
}

/// Inverse of [`consume_range`].
pub(crate) fn restore_range(range: Range, anchor: Position) -> Range {
    Range::from_points(restore_point(range.start, anchor), restore_point(range.end, anchor))
}

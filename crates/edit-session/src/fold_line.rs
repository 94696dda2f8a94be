//! Folds that share screen rows.
//!
//! Folds whose ranges touch the same row are rendered on one screen row, so they are grouped into
//! a [`FoldLine`]. A fold line spans from the start of its first fold to the end of its last one.
//! The session keeps its fold lines sorted by start row and never lets two of them overlap.

use crate::error::{Result, SessionError};
use crate::fold::Fold;
use crate::range::{Position, Range};

/// Where a point sits relative to the next fold of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FoldPlace {
    /// The fold starts at or after the point.
    After,
    /// The point is inside the fold.
    Inside,
}

/// An ordered group of folds covering one contiguous run of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldLine {
    pub(crate) range: Range,
    pub(crate) folds: Vec<Fold>,
}

impl FoldLine {
    /// Group `folds`, which must be sorted and non-empty.
    pub(crate) fn new(folds: Vec<Fold>) -> Self {
        let start = folds.first().map(Fold::start).unwrap_or_default();
        let end = folds.last().map(Fold::end).unwrap_or_default();
        Self {
            range: Range::from_points(start, end),
            folds,
        }
    }

    /// Range from the first fold's start to the last fold's end.
    pub fn range(&self) -> Range {
        self.range
    }

    /// Start of the first fold.
    pub fn start(&self) -> Position {
        self.range.start
    }

    /// End of the last fold.
    pub fn end(&self) -> Position {
        self.range.end
    }

    /// Folds in document order.
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// `true` if `row` is covered by this line.
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.range.start.row && row <= self.range.end.row
    }

    /// Move every fold by `shift` rows.
    pub(crate) fn shift_row(&mut self, shift: isize) {
        self.range.move_by(shift, 0);
        for fold in &mut self.folds {
            fold.range.move_by(shift, 0);
        }
    }

    /// Add a fold that touches this line's first or last row.
    pub(crate) fn add_fold(&mut self, fold: Fold) -> Result<()> {
        if fold.is_same_row() {
            if !self.contains_row(fold.start().row) {
                return Err(SessionError::FoldLineMismatch { range: fold.range });
            }
            self.range.start = self.range.start.min(fold.start());
            self.range.end = self.range.end.max(fold.end());
            self.folds.push(fold);
            self.folds.sort_by_key(Fold::start);
        } else if fold.start().row == self.range.end.row {
            self.range.end = fold.end();
            self.folds.push(fold);
        } else if fold.end().row == self.range.start.row {
            self.range.start = fold.start();
            self.folds.insert(0, fold);
        } else {
            return Err(SessionError::FoldLineMismatch { range: fold.range });
        }
        Ok(())
    }

    /// Walk the line's visible pieces up to `end`.
    ///
    /// The callback receives `(placeholder, row, column, last_column, is_new_row)`. For text
    /// pieces `placeholder` is `None` and the visible text of `row` is `last_column..column`.
    /// For a fold it is the fold's placeholder, reported at the fold's start. Returning `true`
    /// stops the walk.
    pub(crate) fn walk<F>(&self, mut callback: F, end: Position)
    where
        F: FnMut(Option<&str>, usize, usize, usize, bool) -> bool,
    {
        let mut last_end = 0;
        let mut is_new_row = true;
        for fold in &self.folds {
            let cmp = fold.range.compare_start(end.row, end.column);
            if cmp == -1 {
                callback(None, end.row, end.column, last_end, is_new_row);
                return;
            }
            let start = fold.start();
            if callback(None, start.row, start.column, last_end, is_new_row)
                || callback(Some(&fold.placeholder), start.row, start.column, last_end, false)
                || cmp == 0
            {
                return;
            }
            is_new_row = !fold.is_same_row();
            last_end = fold.end().column;
        }
        callback(None, end.row, end.column, last_end, is_new_row);
    }

    /// First fold not entirely before `(row, column)`, with the point's placement.
    pub(crate) fn next_fold_to(&self, row: usize, column: usize) -> Option<(usize, FoldPlace)> {
        self.folds.iter().enumerate().find_map(|(i, fold)| {
            if fold.range.is_start(row, column) {
                return Some((i, FoldPlace::After));
            }
            match fold.range.compare_end(row, column) {
                -1 => Some((i, FoldPlace::After)),
                0 => Some((i, FoldPlace::Inside)),
                _ => None,
            }
        })
    }

    /// Shift the folds on `row` that start at or after `column` by `len` columns.
    pub(crate) fn add_remove_chars(&mut self, row: usize, column: usize, len: isize) {
        let Some((index, place)) = self.next_fold_to(row, column) else {
            return;
        };
        let fold = &self.folds[index];
        if place == FoldPlace::Inside && fold.start().column != column && fold.start().row != row {
            tracing::warn!(row, column, fold = %fold, "edit inside a fold on another row");
            return;
        }
        if fold.start().row != row {
            return;
        }
        if index == 0 {
            self.range.start.column = self.range.start.column.saturating_add_signed(len);
        }
        for fold in &mut self.folds[index..] {
            fold.range.start.column = fold.range.start.column.saturating_add_signed(len);
            if !fold.is_same_row() {
                return;
            }
            fold.range.end.column = fold.range.end.column.saturating_add_signed(len);
        }
        self.range.end.column = self.range.end.column.saturating_add_signed(len);
    }

    /// Split off the folds that start at or after `(row, column)` into a new line.
    ///
    /// Returns `None` if the point is inside a fold or no fold follows it. Splitting before the
    /// first fold moves every fold and leaves this line empty.
    pub(crate) fn split(&mut self, row: usize, column: usize) -> Option<FoldLine> {
        let (index, place) = self.next_fold_to(row, column)?;
        if place == FoldPlace::Inside {
            return None;
        }
        let tail: Vec<Fold> = self.folds.split_off(index);
        match self.folds.last() {
            Some(before) => self.range.end = before.end(),
            None => self.range.end = self.range.start,
        }
        Some(FoldLine::new(tail))
    }

    /// Absorb every fold of `next`.
    pub(crate) fn merge(&mut self, next: FoldLine) -> Result<()> {
        for fold in next.folds {
            self.add_fold(fold)?;
        }
        Ok(())
    }

    /// Document position of the `idx`-th character of the line's display text.
    pub fn idx_to_position(&self, idx: usize) -> Position {
        let mut idx = idx as isize;
        let mut last_fold_end = 0isize;
        for fold in &self.folds {
            let start = fold.start();
            idx -= start.column as isize - last_fold_end;
            if idx < 0 {
                return Position::new(start.row, (start.column as isize + idx).max(0) as usize);
            }
            idx -= fold.placeholder.chars().count() as isize;
            if idx < 0 {
                return start;
            }
            last_fold_end = fold.end().column as isize;
        }
        Position::new(
            self.range.end.row,
            (self.range.end.column as isize + idx).max(0) as usize,
        )
    }
}

//! Positions and ranges in document coordinates.
//!
//! A [`Range`] is a plain `(start, end)` pair. Nothing forces `start <= end`; callers that build
//! reversed ranges get reversed answers. The comparison helpers return the small integer codes
//! the rest of the crate branches on, so their exact values are part of the contract.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A `(row, column)` location. Columns count `char`s, not bytes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Zero-based row.
    pub row: usize,
    /// Zero-based column in characters.
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, column): (usize, usize)) -> Self {
        Self { row, column }
    }
}

/// A start/end pair of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    /// Start of the range.
    pub start: Position,
    /// End of the range.
    pub end: Position,
}

impl Range {
    /// Create a range from raw coordinates.
    pub const fn new(start_row: usize, start_column: usize, end_row: usize, end_column: usize) -> Self {
        Self {
            start: Position::new(start_row, start_column),
            end: Position::new(end_row, end_column),
        }
    }

    /// Create a range spanning two points.
    pub const fn from_points(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at `pos`.
    pub const fn at(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    /// Order two points: row first, then column.
    pub fn compare_points(a: Position, b: Position) -> Ordering {
        a.cmp(&b)
    }

    /// Structural equality, spelled the way call sites read.
    pub fn is_equal(&self, other: &Range) -> bool {
        self == other
    }

    /// `true` if both ends coincide.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `true` if the range spans more than one row.
    pub fn is_multi_line(&self) -> bool {
        self.start.row != self.end.row
    }

    /// `true` if `(row, column)` is the start point.
    pub fn is_start(&self, row: usize, column: usize) -> bool {
        self.start.row == row && self.start.column == column
    }

    /// `true` if `(row, column)` is the end point.
    pub fn is_end(&self, row: usize, column: usize) -> bool {
        self.end.row == row && self.end.column == column
    }

    /// Move the start point in place.
    pub fn set_start(&mut self, row: usize, column: usize) {
        self.start = Position::new(row, column);
    }

    /// Move the end point in place.
    pub fn set_end(&mut self, row: usize, column: usize) {
        self.end = Position::new(row, column);
    }

    /// Locate a point relative to this range.
    ///
    /// Returns `-1` when the point lies before the range, `1` when it lies after it and `0`
    /// when it is inside (both ends included). A single-row range compares the column against
    /// `[start.column, end.column]` directly; a multi-row range only looks at columns on its
    /// first and last rows.
    pub fn compare(&self, row: usize, column: usize) -> i32 {
        if !self.is_multi_line() && row == self.start.row {
            return if column < self.start.column {
                -1
            } else if column > self.end.column {
                1
            } else {
                0
            };
        }

        if row < self.start.row {
            return -1;
        }
        if row > self.end.row {
            return 1;
        }
        if self.start.row == row {
            return if column >= self.start.column { 0 } else { -1 };
        }
        if self.end.row == row {
            return if column <= self.end.column { 0 } else { 1 };
        }
        0
    }

    /// [`Range::compare`] for a [`Position`].
    pub fn compare_point(&self, point: Position) -> i32 {
        self.compare(point.row, point.column)
    }

    /// Relative placement of `other` with respect to `self`.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | `-2` | `other` ends before `self` starts |
    /// | `-1` | `other` starts before `self` and ends inside it |
    /// | `0`  | `other` lies inside `self`, or starts before and ends after it |
    /// | `1`  | `other` starts inside `self` and ends after it |
    /// | `2`  | `other` starts after `self` ends |
    /// | `42` | `other` ends inside `self` but starts after it (a reversed range) |
    pub fn compare_range(&self, other: &Range) -> i32 {
        match self.compare_point(other.end) {
            1 => match self.compare_point(other.start) {
                1 => 2,
                0 => 1,
                _ => 0,
            },
            -1 => -2,
            _ => match self.compare_point(other.start) {
                -1 => -1,
                1 => 42,
                _ => 0,
            },
        }
    }

    /// `true` if `(row, column)` is inside, both ends included.
    pub fn contains(&self, row: usize, column: usize) -> bool {
        self.compare(row, column) == 0
    }

    /// `true` if both ends of `other` are inside `self`.
    pub fn contains_range(&self, other: &Range) -> bool {
        self.compare_point(other.start) == 0 && self.compare_point(other.end) == 0
    }

    /// `true` if the ranges overlap (codes `-1`, `0` and `1` of [`Range::compare_range`]).
    pub fn intersects(&self, other: &Range) -> bool {
        matches!(self.compare_range(other), -1..=1)
    }

    /// Like [`Range::compare`], but the start point itself counts as "before".
    pub fn compare_start(&self, row: usize, column: usize) -> i32 {
        if self.is_start(row, column) {
            -1
        } else {
            self.compare(row, column)
        }
    }

    /// Like [`Range::compare`], but the end point itself counts as "after".
    pub fn compare_end(&self, row: usize, column: usize) -> i32 {
        if self.is_end(row, column) {
            1
        } else {
            self.compare(row, column)
        }
    }

    /// Like [`Range::compare`], with both end points treated as outside.
    pub fn compare_inside(&self, row: usize, column: usize) -> i32 {
        if self.is_end(row, column) {
            1
        } else if self.is_start(row, column) {
            -1
        } else {
            self.compare(row, column)
        }
    }

    /// Strictly inside: contained and not on either end.
    pub fn inside(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_end(row, column) && !self.is_start(row, column)
    }

    /// Contained and not on the end point.
    pub fn inside_start(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_end(row, column)
    }

    /// Contained and not on the start point.
    pub fn inside_end(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_start(row, column)
    }

    /// Truncate the range to the row window `[first_row, last_row]`.
    ///
    /// Ends past the window snap to `(last_row + 1, 0)`, ends before it to `(first_row, 0)`.
    pub fn clip_rows(&self, first_row: usize, last_row: usize) -> Range {
        let clip = |p: Position| {
            if p.row > last_row {
                Position::new(last_row + 1, 0)
            } else if p.row < first_row {
                Position::new(first_row, 0)
            } else {
                p
            }
        };
        Range::from_points(clip(self.start), clip(self.end))
    }

    /// Smallest range covering `self` and `(row, column)`.
    pub fn extend(&self, row: usize, column: usize) -> Range {
        match self.compare(row, column) {
            0 => *self,
            -1 => Range::from_points(Position::new(row, column), self.end),
            _ => Range::from_points(self.start, Position::new(row, column)),
        }
    }

    /// Whole-row version of the range, starting at column 0.
    ///
    /// An end at column 0 does not pull its row in.
    pub fn collapse_rows(&self) -> Range {
        if self.end.column == 0 {
            Range::new(
                self.start.row,
                0,
                self.start.row.max(self.end.row.saturating_sub(1)),
                0,
            )
        } else {
            Range::new(self.start.row, 0, self.end.row, 0)
        }
    }

    /// Translate both ends in place. Coordinates saturate at zero.
    pub fn move_by(&mut self, rows: isize, columns: isize) {
        for p in [&mut self.start, &mut self.end] {
            p.row = p.row.saturating_add_signed(rows);
            p.column = p.column.saturating_add_signed(columns);
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range: [{}/{}] -> [{}/{}]",
            self.start.row, self.start.column, self.end.row, self.end.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_single_row() {
        let r = Range::new(1, 2, 1, 5);
        assert_eq!(r.compare(1, 1), -1);
        assert_eq!(r.compare(1, 2), 0);
        assert_eq!(r.compare(1, 5), 0);
        assert_eq!(r.compare(1, 6), 1);
        assert_eq!(r.compare(0, 9), -1);
        assert_eq!(r.compare(2, 0), 1);
    }

    #[test]
    fn test_compare_multi_row() {
        let r = Range::new(1, 4, 3, 2);
        assert_eq!(r.compare(0, 100), -1);
        assert_eq!(r.compare(1, 3), -1);
        assert_eq!(r.compare(1, 4), 0);
        assert_eq!(r.compare(2, 0), 0);
        assert_eq!(r.compare(2, 999), 0);
        assert_eq!(r.compare(3, 2), 0);
        assert_eq!(r.compare(3, 3), 1);
        assert_eq!(r.compare(4, 0), 1);
    }

    #[test]
    fn test_compare_range_codes() {
        let r = Range::new(2, 0, 4, 0);
        assert_eq!(r.compare_range(&Range::new(0, 0, 1, 0)), -2);
        assert_eq!(r.compare_range(&Range::new(1, 0, 3, 0)), -1);
        assert_eq!(r.compare_range(&Range::new(2, 5, 3, 0)), 0);
        assert_eq!(r.compare_range(&Range::new(1, 0, 5, 0)), 0);
        assert_eq!(r.compare_range(&Range::new(3, 0, 5, 0)), 1);
        assert_eq!(r.compare_range(&Range::new(5, 0, 6, 0)), 2);
        assert_eq!(r.compare_range(&Range::new(5, 0, 3, 0)), 42);
    }

    #[test]
    fn test_compare_start_end_inside() {
        let r = Range::new(0, 1, 0, 4);
        assert_eq!(r.compare_start(0, 1), -1);
        assert_eq!(r.compare_end(0, 4), 1);
        assert_eq!(r.compare_inside(0, 1), -1);
        assert_eq!(r.compare_inside(0, 4), 1);
        assert_eq!(r.compare_inside(0, 2), 0);
        assert!(r.inside(0, 2));
        assert!(!r.inside(0, 1));
        assert!(r.inside_start(0, 1));
        assert!(r.inside_end(0, 4));
    }

    #[test]
    fn test_clip_rows_and_extend() {
        let r = Range::new(0, 3, 10, 2);
        assert_eq!(r.clip_rows(2, 5), Range::new(2, 0, 6, 0));
        assert_eq!(r.clip_rows(0, 20), r);

        let r = Range::new(1, 1, 1, 3);
        assert_eq!(r.extend(1, 2), r);
        assert_eq!(r.extend(0, 0), Range::new(0, 0, 1, 3));
        assert_eq!(r.extend(2, 7), Range::new(1, 1, 2, 7));
    }

    #[test]
    fn test_collapse_rows() {
        assert_eq!(Range::new(1, 3, 4, 0).collapse_rows(), Range::new(1, 0, 3, 0));
        assert_eq!(Range::new(1, 3, 1, 0).collapse_rows(), Range::new(1, 0, 1, 0));
        assert_eq!(Range::new(1, 3, 4, 2).collapse_rows(), Range::new(1, 0, 4, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Range::new(1, 2, 3, 4).to_string(), "Range: [1/2] -> [3/4]");
    }
}

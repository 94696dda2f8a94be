//! Text helpers built on top of the session's mutations: word ranges, tab handling,
//! indentation and moving blocks of text or rows around while carrying their folds along.

use super::EditSession;
use crate::error::Result;
use crate::fold::Fold;
use crate::range::{Position, Range};

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Token,
    Space,
    Other,
}

impl EditSession {
    /// The run of word characters, whitespace or punctuation around `(row, column)`.
    ///
    /// Word characters win when the point touches a word on either side. Otherwise a run of
    /// whitespace is returned if both neighbours are whitespace, else a run of non-word
    /// characters.
    pub fn word_range(&self, row: usize, column: usize) -> Range {
        let chars: Vec<char> = self.doc.line(row).chars().collect();
        let column = column.min(chars.len());

        let touches_token = |at: Option<usize>| {
            at.and_then(|i| chars.get(i))
                .is_some_and(|&c| self.mode.is_token_char(c))
        };
        let class = if touches_token(column.checked_sub(1)) || touches_token(Some(column)) {
            CharClass::Token
        } else {
            let around = &chars[column.saturating_sub(1)..(column + 1).min(chars.len())];
            if column > 0 && !around.is_empty() && around.iter().all(|c| c.is_whitespace()) {
                CharClass::Space
            } else {
                CharClass::Other
            }
        };
        let matches = |c: char| match class {
            CharClass::Token => self.mode.is_token_char(c),
            CharClass::Space => c.is_whitespace(),
            CharClass::Other => self.mode.is_non_token_char(c),
        };

        let mut start = column;
        while start > 0 && matches(chars[start - 1]) {
            start -= 1;
        }
        let mut end = column;
        while end < chars.len() && matches(chars[end]) {
            end += 1;
        }
        Range::new(row, start, row, end)
    }

    /// [`EditSession::word_range`] extended over the spaces and tabs that follow it.
    pub fn a_word_range(&self, row: usize, column: usize) -> Range {
        let mut range = self.word_range(row, column);
        let trailing = self
            .doc
            .line(row)
            .chars()
            .skip(range.end.column)
            .take_while(|c| matches!(c, ' ' | '\t'))
            .count();
        range.end.column += trailing;
        range
    }

    /// One level of indentation: `tab_size` spaces with soft tabs, else a tab character.
    pub fn tab_string(&self) -> String {
        if self.use_soft_tabs() {
            " ".repeat(self.config.tab_size)
        } else {
            "\t".to_string()
        }
    }

    /// `true` if soft tabs are configured and `position` sits on a tab stop.
    pub fn is_tab_stop(&self, position: Position) -> bool {
        self.config.use_soft_tabs && position.column % self.config.tab_size.max(1) == 0
    }

    /// Move (or copy) the text of `from` to `to` and return where it landed. Folds inside the
    /// moved text are recreated at the destination.
    ///
    /// `to` is given in coordinates before the move.
    pub fn move_text(&mut self, from: Range, to: Position, copy: bool) -> Result<Range> {
        let text = self.doc.text_range(&from);
        let folds = self.folds_in_range(&from);
        let mut target = to;

        if !copy {
            self.remove(from);
            let row_diff = from.start.row as isize - from.end.row as isize;
            let col_diff = if row_diff != 0 {
                -(from.end.column as isize)
            } else {
                from.start.column as isize - from.end.column as isize
            };
            if col_diff != 0 && target.row == from.end.row && target.column > from.end.column {
                target.column = target.column.saturating_add_signed(col_diff);
            }
            if row_diff != 0 && target.row >= from.end.row {
                target.row = target.row.saturating_add_signed(row_diff);
            }
        }

        let end = self.insert(target, &text);
        let moved = Range::from_points(target, end);
        if !folds.is_empty() {
            let row_diff = target.row as isize - from.start.row as isize;
            let col_diff = target.column as isize - from.start.column as isize;
            let origin_row = from.start.row;
            let shifted = folds
                .into_iter()
                .map(|mut fold| {
                    for point in [&mut fold.range.start, &mut fold.range.end] {
                        if point.row == origin_row {
                            point.column = point.column.saturating_add_signed(col_diff);
                        }
                        point.row = point.row.saturating_add_signed(row_diff);
                    }
                    fold
                })
                .collect();
            self.add_folds(shifted)?;
        }
        Ok(moved)
    }

    /// Prefix every row of `start_row..=end_row` with `indent`. Tab characters in `indent` are
    /// replaced by [`EditSession::tab_string`].
    pub fn indent_rows(&mut self, start_row: usize, end_row: usize, indent: &str) {
        let indent = indent.replace('\t', &self.tab_string());
        for row in start_row..=end_row {
            self.insert(Position::new(row, 0), &indent);
        }
    }

    /// Remove one level of indentation from every row `range` touches: a leading tab (after
    /// fewer than `tab_size` spaces) or up to `tab_size` leading spaces.
    pub fn outdent_rows(&mut self, range: Range) {
        let rows = range.collapse_rows();
        let size = self.config.tab_size;
        for row in rows.start.row..=rows.end.row {
            let line = self.doc.line(row);
            let spaces = line.chars().take(size).take_while(|&c| c == ' ').count();
            let delete = if spaces < size && line.chars().nth(spaces) == Some('\t') {
                Range::new(row, spaces, row, spaces + 1)
            } else {
                Range::new(row, 0, row, spaces)
            };
            self.remove(delete);
        }
    }

    /// Move rows `first_row..=last_row` (widened to whole fold lines) one visible row up.
    /// Returns the row offset applied, `0` if the rows are already at the top.
    pub fn move_lines_up(&mut self, first_row: usize, last_row: usize) -> Result<isize> {
        self.move_lines(first_row, last_row, LineMove::Up)
    }

    /// Move rows `first_row..=last_row` (widened to whole fold lines) one visible row down.
    /// Returns the row offset applied, `0` if the rows are already at the bottom.
    pub fn move_lines_down(&mut self, first_row: usize, last_row: usize) -> Result<isize> {
        self.move_lines(first_row, last_row, LineMove::Down)
    }

    /// Insert a copy of rows `first_row..=last_row` below them. Returns the number of rows
    /// added.
    pub fn duplicate_lines(&mut self, first_row: usize, last_row: usize) -> Result<isize> {
        self.move_lines(first_row, last_row, LineMove::Duplicate)
    }

    fn move_lines(&mut self, first_row: usize, last_row: usize, how: LineMove) -> Result<isize> {
        let mut first_row = self.row_fold_start(first_row);
        let mut last_row = self.row_fold_end(last_row);
        let diff = match how {
            LineMove::Up => {
                let Some(above) = first_row.checked_sub(1) else {
                    return Ok(0);
                };
                self.row_fold_start(above) as isize - first_row as isize
            }
            LineMove::Down => {
                let below = self.row_fold_end(last_row + 1);
                if below + 1 > self.doc.len() {
                    return Ok(0);
                }
                below as isize - last_row as isize
            }
            LineMove::Duplicate => {
                first_row = self.clip_row_to_document(first_row);
                last_row = self.clip_row_to_document(last_row);
                (last_row - first_row + 1) as isize
            }
        };

        let range = Range::new(first_row, 0, last_row, usize::MAX);
        let folds: Vec<Fold> = self
            .folds_in_range(&range)
            .into_iter()
            .map(|mut fold| {
                fold.range.start.row = fold.range.start.row.saturating_add_signed(diff);
                fold.range.end.row = fold.range.end.row.saturating_add_signed(diff);
                fold
            })
            .collect();

        let lines = match how {
            LineMove::Duplicate => self.doc.lines(first_row, last_row).to_vec(),
            _ => self.remove_lines(first_row, last_row)?,
        };
        self.insert_lines(first_row.saturating_add_signed(diff), lines);
        if !folds.is_empty() {
            self.add_folds(folds)?;
        }
        tracing::debug!(first_row, last_row, diff, "moved rows");
        Ok(diff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineMove {
    Up,
    Down,
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(session: &EditSession) -> Vec<String> {
        session.lines(0, session.len()).to_vec()
    }

    #[test]
    fn test_word_range_classes() {
        let s = EditSession::new("foo_bar  += baz");
        assert_eq!(s.word_range(0, 2), Range::new(0, 0, 0, 7));
        // right after a word still selects the word
        assert_eq!(s.word_range(0, 7), Range::new(0, 0, 0, 7));
        assert_eq!(s.word_range(0, 8), Range::new(0, 7, 0, 9));
        // punctuation runs take the surrounding spaces along
        assert_eq!(s.word_range(0, 10), Range::new(0, 7, 0, 12));
        assert_eq!(s.a_word_range(0, 1), Range::new(0, 0, 0, 9));
    }

    #[test]
    fn test_tab_string_and_stops() {
        let mut s = EditSession::new("");
        assert_eq!(s.tab_string(), "    ");
        assert!(s.is_tab_stop(Position::new(0, 8)));
        assert!(!s.is_tab_stop(Position::new(0, 6)));
        s.set_use_soft_tabs(false);
        assert_eq!(s.tab_string(), "\t");
        assert!(!s.is_tab_stop(Position::new(0, 8)));
    }

    #[test]
    fn test_indent_and_outdent() {
        let mut s = EditSession::new("a\n\tb\n  c");
        s.indent_rows(0, 0, "\t");
        assert_eq!(s.line(0), "    a");
        s.outdent_rows(Range::new(0, 2, 2, 1));
        assert_eq!(lines(&s), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_text_within_row() {
        let mut s = EditSession::new("hello world");
        let moved = s.move_text(Range::new(0, 0, 0, 6), Position::new(0, 11), false).unwrap();
        assert_eq!(s.line(0), "worldhello ");
        assert_eq!(moved, Range::new(0, 5, 0, 11));
    }

    #[test]
    fn test_move_text_across_rows_carries_folds() {
        let mut s = EditSession::new("abcdef\nxyz\n");
        s.add_fold("..", Range::new(0, 1, 0, 4)).unwrap();
        let moved = s.move_text(Range::new(0, 0, 0, 6), Position::new(2, 0), false).unwrap();
        assert_eq!(lines(&s), vec!["", "xyz", "abcdef"]);
        assert_eq!(moved, Range::new(2, 0, 2, 6));
        assert_eq!(s.all_folds()[0].range(), Range::new(2, 1, 2, 4));
    }

    #[test]
    fn test_copy_text() {
        let mut s = EditSession::new("ab\ncd");
        let copied = s.move_text(Range::new(0, 0, 0, 2), Position::new(1, 2), true).unwrap();
        assert_eq!(lines(&s), vec!["ab", "cdab"]);
        assert_eq!(copied, Range::new(1, 2, 1, 4));
    }

    #[test]
    fn test_move_lines_up_and_down() {
        let mut s = EditSession::new("1\n2\n3\n4");
        assert_eq!(s.move_lines_up(0, 0).unwrap(), 0);
        assert_eq!(s.move_lines_down(1, 2).unwrap(), 1);
        assert_eq!(lines(&s), vec!["1", "4", "2", "3"]);
        assert_eq!(s.move_lines_down(2, 3).unwrap(), 0);
        assert_eq!(s.move_lines_up(1, 1).unwrap(), -1);
        assert_eq!(lines(&s), vec!["4", "1", "2", "3"]);
    }

    #[test]
    fn test_move_lines_skips_over_fold_lines() {
        let mut s = EditSession::new("a\nb {\nc\n}\nd");
        s.add_fold("...", Range::new(1, 3, 3, 0)).unwrap();
        assert_eq!(s.move_lines_up(4, 4).unwrap(), -3);
        assert_eq!(lines(&s), vec!["a", "d", "b {", "c", "}"]);
        assert_eq!(s.all_folds()[0].range(), Range::new(2, 3, 4, 0));
    }

    #[test]
    fn test_duplicate_lines_copies_folds() {
        let mut s = EditSession::new("x {\ny\n}");
        s.add_fold("...", Range::new(0, 2, 2, 0)).unwrap();
        assert_eq!(s.duplicate_lines(0, 0).unwrap(), 3);
        assert_eq!(lines(&s), vec!["x {", "y", "}", "x {", "y", "}"]);
        assert_eq!(s.all_folds().len(), 2);
        assert_eq!(s.all_folds()[1].range(), Range::new(3, 2, 5, 0));
    }
}

//! Soft wrap and the mapping between document and screen coordinates.
//!
//! A screen row is one visual row. Folded rows collapse into the screen rows of their fold
//! line; wrapped rows expand into `splits + 1` screen rows. The session remembers pairs of
//! `(doc row, screen row)` it has walked past so that repeated lookups do not start over from
//! the top of the document.

use super::{EditSession, row_cache_index};
use crate::config::WrapLimitRange;
use crate::document::Document;
use crate::events::SessionEvent;
use crate::fold_line::FoldLine;
use crate::layout::{self, compute_wrap_splits, display_tokens, placeholder_tokens};
use crate::range::{Position, Range};
use crate::text::{char_head, char_len, char_slice, char_tail};

impl EditSession {
    // ---- wrap settings ----

    /// Whether long rows are soft-wrapped.
    pub fn use_wrap_mode(&self) -> bool {
        self.config.use_wrap_mode
    }

    /// Turn soft wrap on or off. Split points are computed for every row when it turns on.
    pub fn set_use_wrap_mode(&mut self, use_wrap_mode: bool) {
        if use_wrap_mode == self.config.use_wrap_mode {
            return;
        }
        self.config.use_wrap_mode = use_wrap_mode;
        self.modified = true;
        self.reset_row_cache(0);
        if use_wrap_mode {
            self.rebuild_wrap_data();
        }
        self.emit(SessionEvent::ChangeWrapMode);
    }

    /// Recompute split points for every row.
    pub(crate) fn rebuild_wrap_data(&mut self) {
        self.wrap_data = vec![Vec::new(); self.doc.len()];
        let last = self.doc.len().saturating_sub(1);
        self.with_doc(|s, doc| s.update_wrap_data(doc, 0, last));
    }

    /// Bounds used by [`EditSession::adjust_wrap_limit`].
    pub fn wrap_limit_range(&self) -> WrapLimitRange {
        self.config.wrap_limit_range
    }

    /// Set the bounds used by [`EditSession::adjust_wrap_limit`].
    pub fn set_wrap_limit_range(&mut self, min: Option<usize>, max: Option<usize>) {
        let range = &mut self.config.wrap_limit_range;
        if range.min == min && range.max == max {
            return;
        }
        range.min = min;
        range.max = max;
        self.modified = true;
        if self.config.use_wrap_mode {
            self.emit(SessionEvent::ChangeWrapMode);
        }
    }

    /// Pin the wrap limit to `limit`.
    pub fn set_wrap_limit(&mut self, limit: usize) {
        self.set_wrap_limit_range(Some(limit), Some(limit));
        self.adjust_wrap_limit(limit, limit);
    }

    /// The wrap column in effect.
    pub fn wrap_limit(&self) -> usize {
        self.config.wrap_limit
    }

    /// Offer a new wrap column, typically derived from the viewport width.
    ///
    /// The column is constrained by the wrap limit range (or pinned to `print_margin` when the
    /// range follows it). Returns `true` if the effective limit changed, in which case split
    /// points are recomputed and [`SessionEvent::ChangeWrapLimit`] is emitted.
    pub fn adjust_wrap_limit(&mut self, desired_limit: usize, print_margin: usize) -> bool {
        let range = self.config.wrap_limit_range;
        let (min, max) = if range.follow_print_margin {
            (Some(print_margin), Some(print_margin))
        } else {
            (range.min, range.max)
        };
        let limit = constrain_wrap_limit(desired_limit, min, max);
        if limit == self.config.wrap_limit || limit <= 1 {
            return false;
        }
        self.config.wrap_limit = limit;
        self.modified = true;
        if self.config.use_wrap_mode {
            self.rebuild_wrap_data();
            self.reset_row_cache(0);
            self.emit(SessionEvent::ChangeWrapLimit);
        }
        true
    }

    /// Recompute split points for rows `first..=last` against `doc`.
    ///
    /// A row covered by a fold line is measured as the fold line's display text and its splits
    /// are stored at the fold line's first row.
    pub(crate) fn update_wrap_data(&mut self, doc: &Document, first: usize, last: usize) {
        let len = doc.len();
        if len == 0 {
            self.wrap_data.clear();
            return;
        }
        if self.wrap_data.len() < len {
            self.wrap_data.resize(len, Vec::new());
        }
        let tab_size = self.config.tab_size;
        let limit = self.config.wrap_limit;
        let as_code = self.config.wrap_as_code;
        let last = last.min(len - 1);

        let mut row = first;
        let mut fold_hint = 0;
        while row <= last {
            match self.fold_line_index(row, fold_hint) {
                None => {
                    let tokens = display_tokens(doc.line(row), 0, tab_size);
                    self.wrap_data[row] = compute_wrap_splits(&tokens, limit, as_code);
                    row += 1;
                }
                Some(index) => {
                    fold_hint = index;
                    let fold_line = &self.fold_data[index];
                    let start_row = fold_line.start().row;
                    let end_row = fold_line.end().row;
                    let tokens = fold_line_tokens(doc, fold_line, tab_size);
                    self.wrap_data[start_row] = compute_wrap_splits(&tokens, limit, as_code);
                    row = end_row + 1;
                }
            }
        }
    }

    /// Split points of `row` when wrapping, else `None`.
    pub fn row_split_data(&self, row: usize) -> Option<&[usize]> {
        if !self.config.use_wrap_mode {
            return None;
        }
        self.wrap_data.get(row).map(Vec::as_slice)
    }

    /// Screen rows taken by document row `row`, folds ignored.
    pub fn row_length(&self, row: usize) -> usize {
        if !self.config.use_wrap_mode {
            return 1;
        }
        self.wrap_data.get(row).map_or(1, |splits| splits.len() + 1)
    }

    /// Screen rows taken by `row`. Same as [`EditSession::row_length`].
    pub fn row_line_count(&self, row: usize) -> usize {
        self.row_length(row)
    }

    // ---- widths ----

    /// Width of a tab that starts at `screen_column`.
    pub fn screen_tab_size(&self, screen_column: usize) -> usize {
        layout::screen_tab_size(self.config.tab_size, screen_column)
    }

    /// `(screen column reached, characters consumed)` for `text` starting at `screen_column`.
    pub fn string_screen_width(
        &self,
        text: &str,
        max_screen_column: Option<usize>,
        screen_column: usize,
    ) -> (usize, usize) {
        layout::string_screen_width(text, max_screen_column, screen_column, self.config.tab_size)
    }

    /// Widest screen row. The wrap limit while wrapping.
    pub fn screen_width(&mut self) -> usize {
        self.compute_width(false);
        self.screen_width
    }

    /// Recompute the screen width if anything changed since the last call, or always with
    /// `force`.
    fn compute_width(&mut self, force: bool) {
        if !self.modified && !force {
            return;
        }
        self.modified = false;
        if self.config.use_wrap_mode {
            self.screen_width = self.config.wrap_limit;
            return;
        }

        let len = self.doc.len();
        if self.row_width_cache.len() < len {
            self.row_width_cache.resize(len, None);
        }
        let tab_size = self.config.tab_size;
        let mut longest = 0;
        let mut fold_index = 0;
        let mut row = 0;
        while row < len {
            if let Some(fold_line) = self.fold_data.get(fold_index)
                && fold_line.start().row == row
            {
                let text = fold_display_line(&self.doc, fold_line, None, None);
                longest = longest.max(layout::string_screen_width(&text, None, 0, tab_size).0);
                row = fold_line.end().row + 1;
                fold_index += 1;
                continue;
            }
            while self
                .fold_data
                .get(fold_index)
                .is_some_and(|fl| fl.start().row < row)
            {
                fold_index += 1;
            }
            let width = match self.row_width_cache[row] {
                Some(width) => width,
                None => {
                    let width =
                        layout::string_screen_width(self.doc.line(row), None, 0, tab_size).0;
                    self.row_width_cache[row] = Some(width);
                    width
                }
            };
            longest = longest.max(width);
            row += 1;
        }
        self.screen_width = longest;
    }

    // ---- coordinate mapping ----

    /// Number of screen rows the document takes.
    pub fn screen_length(&self) -> usize {
        if !self.config.use_wrap_mode {
            let hidden: usize = self
                .fold_data
                .iter()
                .map(|fl| fl.end().row - fl.start().row)
                .sum();
            return self.doc.len().saturating_sub(hidden);
        }

        let last_row = self.wrap_data.len();
        let mut screen_rows = 0;
        let mut row = 0;
        let mut next_fold = 0;
        let mut fold = self.fold_data.get(next_fold);
        while row < last_row {
            screen_rows += self.wrap_data[row].len() + 1;
            row += 1;
            if let Some(fold_line) = fold
                && row > fold_line.start().row
            {
                row = fold_line.end().row + 1;
                next_fold += 1;
                fold = self.fold_data.get(next_fold);
            }
        }
        screen_rows
    }

    /// Document position shown at `(screen_row, screen_column)`.
    ///
    /// Rows past the end map to the end of the document; columns past the end of a row map
    /// to the row end. A column inside a fold placeholder maps to the fold start.
    pub fn screen_to_document_position(
        &mut self,
        screen_row: usize,
        screen_column: usize,
    ) -> Position {
        let max_row = self.doc.len().saturating_sub(1);
        let mut doc_row = 0;
        let mut row = 0;
        let mut row_length = 0;

        let cached = row_cache_index(&self.screen_row_cache, screen_row);
        let do_cache;
        if cached >= 0 && !self.screen_row_cache.is_empty() {
            let i = cached as usize;
            row = self.screen_row_cache[i];
            doc_row = self.doc_row_cache[i];
            do_cache = screen_row > self.screen_row_cache[self.screen_row_cache.len() - 1];
        } else {
            do_cache = self.screen_row_cache.is_empty();
        }

        let mut fold_index = self.next_fold_line_index(doc_row, 0);
        while row <= screen_row {
            row_length = self.row_length(doc_row);
            if row + row_length > screen_row || doc_row >= max_row {
                break;
            }
            row += row_length;
            doc_row += 1;
            if let Some(fi) = fold_index
                && doc_row > self.fold_data[fi].start().row
            {
                doc_row = self.fold_data[fi].end().row + 1;
                fold_index = self.next_fold_line_index(doc_row, fi);
            }
            if do_cache {
                self.doc_row_cache.push(doc_row);
                self.screen_row_cache.push(row);
            }
        }

        let folded = fold_index.filter(|&fi| self.fold_data[fi].start().row <= doc_row);
        let line = match folded {
            Some(fi) => {
                let fold_line = &self.fold_data[fi];
                doc_row = fold_line.start().row;
                fold_display_line(&self.doc, fold_line, None, None)
            }
            None if row + row_length <= screen_row || doc_row > max_row => {
                return Position::new(max_row, self.doc.line_len(max_row));
            }
            None => self.doc.line(doc_row).to_string(),
        };

        let mut text: &str = &line;
        let mut doc_column = 0;
        let mut split_column = None;
        if self.config.use_wrap_mode
            && let Some(splits) = self.wrap_data.get(doc_row)
        {
            let split_index = screen_row - row;
            split_column = splits.get(split_index).copied();
            if split_index > 0
                && let Some(&last) = splits.last()
            {
                doc_column = splits.get(split_index - 1).copied().unwrap_or(last);
                text = char_tail(text, doc_column);
            }
        }

        doc_column += layout::string_screen_width(
            text,
            Some(screen_column),
            0,
            self.config.tab_size,
        )
        .1;

        if let Some(split) = split_column
            && doc_column >= split
        {
            doc_column = split.saturating_sub(1);
        }

        match folded {
            Some(fi) => self.fold_data[fi].idx_to_position(doc_column),
            None => Position::new(doc_row, doc_column),
        }
    }

    /// Document row shown at `screen_row`.
    pub fn screen_to_document_row(&mut self, screen_row: usize, screen_column: usize) -> usize {
        self.screen_to_document_position(screen_row, screen_column).row
    }

    /// Document column shown at `(screen_row, screen_column)`.
    pub fn screen_to_document_column(&mut self, screen_row: usize, screen_column: usize) -> usize {
        self.screen_to_document_position(screen_row, screen_column)
            .column
    }

    /// Screen position of the document position `(doc_row, doc_column)`.
    ///
    /// The position is clipped first. A position inside a fold is shown at the fold start.
    pub fn document_to_screen_position(&mut self, doc_row: usize, doc_column: usize) -> Position {
        let pos = self.clip_position_to_document(doc_row, doc_column);
        let (mut doc_row, mut doc_column) = (pos.row, pos.column);
        if let Some(fold) = self.fold_at(doc_row, doc_column, super::FoldSide::NotAtEnd) {
            doc_row = fold.start().row;
            doc_column = fold.start().column;
        }

        let mut row = 0;
        let mut screen_row = 0;
        let cached = row_cache_index(&self.doc_row_cache, doc_row);
        let do_cache;
        if cached >= 0 && !self.doc_row_cache.is_empty() {
            let i = cached as usize;
            row = self.doc_row_cache[i];
            screen_row = self.screen_row_cache[i];
            do_cache = doc_row > self.doc_row_cache[self.doc_row_cache.len() - 1];
        } else {
            do_cache = self.doc_row_cache.is_empty();
        }

        let mut fold_index = self.next_fold_line_index(row, 0);
        while row < doc_row {
            let row_end;
            match fold_index {
                Some(fi) if row >= self.fold_data[fi].start().row => {
                    row_end = self.fold_data[fi].end().row + 1;
                    if row_end > doc_row {
                        break;
                    }
                    fold_index = self.next_fold_line_index(row_end, fi);
                }
                _ => row_end = row + 1,
            }
            screen_row += self.row_length(row);
            row = row_end;
            if do_cache {
                self.doc_row_cache.push(row);
                self.screen_row_cache.push(screen_row);
            }
        }

        let (line, wrap_row) = match fold_index {
            Some(fi) if row >= self.fold_data[fi].start().row => {
                let fold_line = &self.fold_data[fi];
                let text = fold_display_line(
                    &self.doc,
                    fold_line,
                    Some(Position::new(doc_row, doc_column)),
                    None,
                );
                (text, fold_line.start().row)
            }
            _ => (
                char_head(self.doc.line(doc_row), doc_column).to_string(),
                doc_row,
            ),
        };

        let mut text: &str = &line;
        if self.config.use_wrap_mode
            && let Some(splits) = self.wrap_data.get(wrap_row)
        {
            let len = char_len(text);
            let mut offset = 0;
            while splits.get(offset).is_some_and(|&split| len >= split) {
                screen_row += 1;
                offset += 1;
            }
            let from = if offset > 0 { splits[offset - 1] } else { 0 };
            text = char_tail(text, from);
        }

        let column = layout::string_screen_width(text, None, 0, self.config.tab_size).0;
        Position::new(screen_row, column)
    }

    /// Screen row of a document position.
    pub fn document_to_screen_row(&mut self, doc_row: usize, doc_column: usize) -> usize {
        self.document_to_screen_position(doc_row, doc_column).row
    }

    /// Screen column of a document position.
    pub fn document_to_screen_column(&mut self, doc_row: usize, doc_column: usize) -> usize {
        self.document_to_screen_position(doc_row, doc_column)
            .column
    }

    /// A document range in screen coordinates.
    pub fn document_to_screen_range(&mut self, range: &Range) -> Range {
        let start = self.document_to_screen_position(range.start.row, range.start.column);
        let end = self.document_to_screen_position(range.end.row, range.end.column);
        Range::from_points(start, end)
    }

    /// Last screen column of `screen_row`.
    pub fn screen_last_row_column(&mut self, screen_row: usize) -> usize {
        let pos = self.screen_to_document_position(screen_row, usize::MAX);
        self.document_to_screen_column(pos.row, pos.column)
    }

    /// Last screen column of the screen row showing `(doc_row, doc_column)`.
    pub fn document_last_row_column(&mut self, doc_row: usize, doc_column: usize) -> usize {
        let screen_row = self.document_to_screen_row(doc_row, doc_column);
        self.screen_last_row_column(screen_row)
    }

    /// Document position at the end of the screen row showing `(doc_row, doc_column)`.
    pub fn document_last_row_column_position(
        &mut self,
        doc_row: usize,
        doc_column: usize,
    ) -> Position {
        let screen_row = self.document_to_screen_row(doc_row, doc_column);
        self.screen_to_document_position(screen_row, usize::MAX / 10)
    }

    // ---- clipping ----

    /// `row` clamped to the last document row.
    pub fn clip_row_to_document(&self, row: usize) -> usize {
        row.min(self.doc.len().saturating_sub(1))
    }

    /// `column` clamped to the length of `row`.
    pub fn clip_column_to_row(&self, row: usize, column: usize) -> usize {
        column.min(self.doc.line_len(row))
    }

    /// A position clamped into the document. Rows past the end map to the end of the last row.
    pub fn clip_position_to_document(&self, row: usize, column: usize) -> Position {
        let len = self.doc.len();
        if row >= len {
            let last = len.saturating_sub(1);
            return Position::new(last, self.doc.line_len(last));
        }
        Position::new(row, self.clip_column_to_row(row, column))
    }

    /// Both ends of `range` clamped into the document.
    pub fn clip_range_to_document(&self, range: &Range) -> Range {
        Range::from_points(
            self.clip_position_to_document(range.start.row, range.start.column),
            self.clip_position_to_document(range.end.row, range.end.column),
        )
    }
}

fn constrain_wrap_limit(limit: usize, min: Option<usize>, max: Option<usize>) -> usize {
    let mut limit = limit;
    if let Some(min) = min.filter(|&m| m > 0) {
        limit = limit.max(min);
    }
    if let Some(max) = max.filter(|&m| m > 0) {
        limit = limit.min(max);
    }
    limit
}

/// Display tokens of a whole fold line: visible text plus placeholders.
fn fold_line_tokens(doc: &Document, fold_line: &FoldLine, tab_size: usize) -> Vec<layout::DisplayToken> {
    let mut tokens = Vec::new();
    let end_row = fold_line.end().row;
    fold_line.walk(
        |placeholder, row, column, last_column, _| {
            match placeholder {
                Some(placeholder) => {
                    tokens.extend(placeholder_tokens(placeholder, tokens.len(), tab_size));
                }
                None => {
                    let text = char_slice(doc.line(row), last_column, column);
                    tokens.extend(display_tokens(text, tokens.len(), tab_size));
                }
            }
            false
        },
        Position::new(end_row, doc.line_len(end_row) + 1),
    );
    tokens
}

/// Text a fold line shows on screen, from `start` (default: the line start) up to `end`
/// (default: the end of its last row).
pub(crate) fn fold_display_line(
    doc: &Document,
    fold_line: &FoldLine,
    end: Option<Position>,
    start: Option<Position>,
) -> String {
    let (start_row, start_column) = start.map_or((fold_line.start().row, 0), |p| (p.row, p.column));
    let end = end.unwrap_or_else(|| {
        let row = fold_line.end().row;
        Position::new(row, doc.line_len(row))
    });

    let mut text = String::new();
    fold_line.walk(
        |placeholder, row, column, last_column, _| {
            if row < start_row || (row == start_row && column < start_column) {
                return false;
            }
            let from = if row == start_row {
                start_column.max(last_column)
            } else {
                last_column
            };
            match placeholder {
                Some(placeholder) => text.push_str(placeholder),
                None => text.push_str(char_slice(doc.line(row), from, column)),
            }
            false
        },
        end,
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constrain_wrap_limit() {
        assert_eq!(constrain_wrap_limit(50, Some(60), None), 60);
        assert_eq!(constrain_wrap_limit(50, None, Some(40)), 40);
        assert_eq!(constrain_wrap_limit(50, Some(0), Some(0)), 50);
        assert_eq!(constrain_wrap_limit(50, None, None), 50);
    }

    #[test]
    fn test_wrap_splits_and_screen_length() {
        let mut session = EditSession::new("aaaa bbbb cccc\nshort");
        session.set_use_wrap_mode(true);
        assert!(session.adjust_wrap_limit(5, 80));
        assert_eq!(session.row_split_data(0), Some(&[5, 10][..]));
        assert_eq!(session.row_length(0), 3);
        assert_eq!(session.screen_length(), 4);
        assert_eq!(session.screen_width(), 5);
    }

    #[test]
    fn test_wrapped_coordinate_mapping() {
        let mut session = EditSession::new("aaaa bbbb cccc\nshort");
        session.set_use_wrap_mode(true);
        session.adjust_wrap_limit(5, 80);
        assert_eq!(session.document_to_screen_position(0, 7), Position::new(1, 2));
        assert_eq!(session.document_to_screen_position(0, 5), Position::new(1, 0));
        assert_eq!(session.document_to_screen_position(1, 2), Position::new(3, 2));
        assert_eq!(session.screen_to_document_position(1, 2), Position::new(0, 7));
        assert_eq!(session.screen_to_document_position(1, 99), Position::new(0, 9));
        assert_eq!(session.screen_to_document_position(3, 1), Position::new(1, 1));
        assert_eq!(session.screen_to_document_position(9, 0), Position::new(1, 5));
    }

    #[test]
    fn test_tabs_and_wide_chars_in_columns() {
        let mut session = EditSession::new("\tx\n中文");
        assert_eq!(session.document_to_screen_position(0, 1), Position::new(0, 4));
        assert_eq!(session.document_to_screen_position(1, 1), Position::new(1, 2));
        assert_eq!(session.screen_to_document_position(0, 4), Position::new(0, 1));
        assert_eq!(session.screen_to_document_position(1, 3), Position::new(1, 1));
        assert_eq!(session.screen_width(), 5);
    }

    #[test]
    fn test_wrap_limit_follows_print_margin() {
        let mut session = EditSession::new("");
        session.config.wrap_limit_range.follow_print_margin = true;
        assert!(session.adjust_wrap_limit(120, 72));
        assert_eq!(session.wrap_limit(), 72);
        assert!(!session.adjust_wrap_limit(10, 72));
    }

    #[test]
    fn test_clip_helpers() {
        let session = EditSession::new("abc\nde");
        assert_eq!(session.clip_row_to_document(9), 1);
        assert_eq!(session.clip_column_to_row(1, 9), 2);
        assert_eq!(session.clip_position_to_document(5, 0), Position::new(1, 2));
        assert_eq!(
            session.clip_range_to_document(&Range::new(0, 9, 7, 7)),
            Range::new(0, 3, 1, 2)
        );
    }
}

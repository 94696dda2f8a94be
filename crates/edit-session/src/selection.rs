//! A single selection over an [`EditSession`].
//!
//! A [`Selection`] is two anchors registered with the session's document: the `anchor`, which
//! stays where the selection started, and the `lead`, which is the cursor. Both follow document
//! edits on their own. The selection keeps no reference to the session; every operation that
//! needs the document takes it as an argument.
//!
//! Cursor motions step over folds in one move, and horizontal motions jump a whole soft tab
//! when the cursor is on a tab stop and the skipped text is all spaces. Vertical motions
//! remember the screen column they started from.

use crate::anchor::AnchorId;
use crate::range::{Position, Range};
use crate::session::{EditSession, FoldSide, TextSide};
use serde::{Deserialize, Serialize};

/// Serialised form of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionData {
    /// Start of the selected range.
    pub start: Position,
    /// End of the selected range.
    pub end: Position,
    /// The cursor is at `start`.
    pub is_backwards: bool,
}

/// A range that remembers which end holds the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedRange {
    /// The range, start before end.
    pub range: Range,
    /// Either `range.start` or `range.end`.
    pub cursor: Position,
    /// Remembered screen column for vertical motion.
    pub desired_column: Option<usize>,
}

/// An anchor/lead pair with cursor-motion primitives.
#[derive(Debug)]
pub struct Selection {
    anchor: AnchorId,
    lead: AnchorId,
    is_empty: bool,
    desired_column: Option<usize>,
    last_lead: Position,
}

impl Selection {
    /// An empty selection at the start of the document.
    pub fn new(session: &mut EditSession) -> Self {
        let lead = session.create_anchor(0, 0);
        let anchor = session.create_anchor(0, 0);
        Self {
            anchor,
            lead,
            is_empty: true,
            desired_column: None,
            last_lead: Position::new(0, 0),
        }
    }

    /// Release both anchors. The selection must not be used afterwards.
    pub fn detach(self, session: &mut EditSession) {
        session.detach_anchor(self.lead);
        session.detach_anchor(self.anchor);
    }

    /// Forget the desired column if an edit moved the cursor sideways since the last motion.
    fn sync_lead(&mut self, session: &EditSession) {
        let lead = session.anchor_position(self.lead);
        if lead.column != self.last_lead.column {
            self.desired_column = None;
        }
        self.last_lead = lead;
    }

    // ---- state ----

    /// `true` if nothing is selected.
    pub fn is_empty(&self, session: &EditSession) -> bool {
        self.is_empty || session.anchor_position(self.anchor) == session.anchor_position(self.lead)
    }

    /// `true` if the selection spans rows.
    pub fn is_multi_line(&self, session: &EditSession) -> bool {
        !self.is_empty(session) && self.range(session).is_multi_line()
    }

    /// The cursor position.
    pub fn cursor(&self, session: &EditSession) -> Position {
        session.anchor_position(self.lead)
    }

    /// Where the selection started. For an empty selection this is the cursor.
    pub fn selection_anchor(&self, session: &EditSession) -> Position {
        if self.is_empty {
            self.cursor(session)
        } else {
            session.anchor_position(self.anchor)
        }
    }

    /// `true` if the anchor is after the cursor.
    pub fn is_backwards(&self, session: &EditSession) -> bool {
        session.anchor_position(self.anchor) > session.anchor_position(self.lead)
    }

    /// The selected range, start before end.
    pub fn range(&self, session: &EditSession) -> Range {
        let anchor = session.anchor_position(self.anchor);
        let lead = session.anchor_position(self.lead);
        if self.is_empty(session) {
            Range::at(lead)
        } else if anchor > lead {
            Range::from_points(lead, anchor)
        } else {
            Range::from_points(anchor, lead)
        }
    }

    /// Screen column vertical motion aims for.
    pub fn desired_column(&self) -> Option<usize> {
        self.desired_column
    }

    // ---- selecting ----

    /// Collapse the selection onto the cursor.
    pub fn clear(&mut self) {
        self.is_empty = true;
    }

    /// Put the selection anchor at `(row, column)`, making the selection non-empty.
    pub fn set_selection_anchor(&mut self, session: &mut EditSession, row: usize, column: usize) {
        session.set_anchor_position(self.anchor, row, column, false);
        self.is_empty = false;
    }

    /// Select the whole document.
    pub fn select_all(&mut self, session: &mut EditSession) {
        let last_row = session.len().saturating_sub(1);
        self.set_selection_anchor(session, 0, 0);
        let column = session.line_len(last_row);
        self.move_cursor_to(session, last_row, column, false);
    }

    /// Select `range`, with the cursor at its start when `reverse` is set.
    pub fn set_selection_range(&mut self, session: &mut EditSession, range: Range, reverse: bool) {
        let (from, to) = if reverse {
            (range.end, range.start)
        } else {
            (range.start, range.end)
        };
        self.set_selection_anchor(session, from.row, from.column);
        self.select_to(session, to.row, to.column);
        if self.range(session).is_empty() {
            self.is_empty = true;
        }
        self.desired_column = None;
    }

    /// Run a cursor motion that extends the selection instead of replacing it.
    fn move_selection(
        &mut self,
        session: &mut EditSession,
        mover: impl FnOnce(&mut Self, &mut EditSession),
    ) {
        if self.is_empty {
            let lead = self.cursor(session);
            self.set_selection_anchor(session, lead.row, lead.column);
        }
        mover(self, session);
    }

    /// Extend the selection to `(row, column)`.
    pub fn select_to(&mut self, session: &mut EditSession, row: usize, column: usize) {
        self.move_selection(session, |s, session| s.move_cursor_to(session, row, column, false));
    }

    /// Extend the selection to `position`.
    pub fn select_to_position(&mut self, session: &mut EditSession, position: Position) {
        self.select_to(session, position.row, position.column);
    }

    /// Clear the selection and put the cursor at `(row, column)`.
    pub fn move_to(&mut self, session: &mut EditSession, row: usize, column: usize) {
        self.clear();
        self.move_cursor_to(session, row, column, false);
    }

    /// Clear the selection and put the cursor at `position`.
    pub fn move_to_position(&mut self, session: &mut EditSession, position: Position) {
        self.move_to(session, position.row, position.column);
    }

    /// Extend the selection one row up.
    pub fn select_up(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_up);
    }

    /// Extend the selection one row down.
    pub fn select_down(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_down);
    }

    /// Extend the selection one column left.
    pub fn select_left(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_left);
    }

    /// Extend the selection one column right.
    pub fn select_right(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_right);
    }

    /// Extend the selection to the start of the line.
    pub fn select_line_start(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_line_start);
    }

    /// Extend the selection to the end of the line.
    pub fn select_line_end(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_line_end);
    }

    /// Extend the selection to the start of the document.
    pub fn select_file_start(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_file_start);
    }

    /// Extend the selection to the end of the document.
    pub fn select_file_end(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_file_end);
    }

    /// Extend the selection one word left.
    pub fn select_word_left(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_word_left);
    }

    /// Extend the selection one word right.
    pub fn select_word_right(&mut self, session: &mut EditSession) {
        self.move_selection(session, Self::move_cursor_word_right);
    }

    /// Word range around the cursor.
    pub fn word_range(&self, session: &EditSession) -> Range {
        let cursor = self.cursor(session);
        session.word_range(cursor.row, cursor.column)
    }

    /// Select the word under the cursor.
    pub fn select_word(&mut self, session: &mut EditSession) {
        let range = self.word_range(session);
        self.set_selection_range(session, range, false);
    }

    /// Select the word under the cursor plus the whitespace after it.
    pub fn select_a_word(&mut self, session: &mut EditSession) {
        let cursor = self.cursor(session);
        let range = session.a_word_range(cursor.row, cursor.column);
        self.set_selection_range(session, range, false);
    }

    /// The rows of `row` (the cursor row by default), widened to its fold line.
    ///
    /// The range ends at the start of the next row, or at the end of the last row with
    /// `exclude_last_char`.
    pub fn line_range(&self, session: &EditSession, row: Option<usize>, exclude_last_char: bool) -> Range {
        let row = row.unwrap_or_else(|| self.cursor(session).row);
        let (first, last) = match session.fold_line(row) {
            Some(fold_line) => (fold_line.start().row, fold_line.end().row),
            None => (row, row),
        };
        if exclude_last_char {
            Range::new(first, 0, last, session.line_len(last))
        } else {
            Range::new(first, 0, last + 1, 0)
        }
    }

    /// Select the cursor row.
    pub fn select_line(&mut self, session: &mut EditSession) {
        let range = self.line_range(session, None, false);
        self.set_selection_range(session, range, false);
    }

    /// Shift both ends of the selection by `columns`. An end at column 0 stays put unless it is
    /// the leading end.
    pub fn shift_selection(&mut self, session: &mut EditSession, columns: isize) {
        let lead = self.cursor(session);
        if self.is_empty {
            self.move_cursor_to(session, lead.row, lead.column.saturating_add_signed(columns), false);
            return;
        }
        let anchor = self.selection_anchor(session);
        let backwards = self.is_backwards(session);
        if !backwards || anchor.column != 0 {
            self.set_selection_anchor(session, anchor.row, anchor.column.saturating_add_signed(columns));
        }
        if backwards || lead.column != 0 {
            self.move_selection(session, |s, session| {
                s.move_cursor_to(session, lead.row, lead.column.saturating_add_signed(columns), false)
            });
        }
    }

    // ---- cursor motion ----

    /// Move the cursor to `(row, column)`, or to the start of the fold that position is in.
    /// With `keep_desired_column` vertical motion keeps aiming for the same screen column.
    pub fn move_cursor_to(
        &mut self,
        session: &mut EditSession,
        row: usize,
        column: usize,
        keep_desired_column: bool,
    ) {
        let (row, column) = match session.fold_at(row, column, FoldSide::NotAtEnd) {
            Some(fold) => (fold.start().row, fold.start().column),
            None => (row, column),
        };
        session.set_anchor_position(self.lead, row, column, false);
        self.last_lead = session.anchor_position(self.lead);
        if !keep_desired_column {
            self.desired_column = None;
        }
    }

    /// [`Selection::move_cursor_to`] for a position.
    pub fn move_cursor_to_position(&mut self, session: &mut EditSession, position: Position) {
        self.move_cursor_to(session, position.row, position.column, false);
    }

    /// Move the cursor to a screen position.
    pub fn move_cursor_to_screen(
        &mut self,
        session: &mut EditSession,
        screen_row: usize,
        screen_column: usize,
        keep_desired_column: bool,
    ) {
        let pos = session.screen_to_document_position(screen_row, screen_column);
        self.move_cursor_to(session, pos.row, pos.column, keep_desired_column);
    }

    /// Move the cursor by screen rows and document characters. Pure vertical motion aims for
    /// the remembered screen column.
    pub fn move_cursor_by(&mut self, session: &mut EditSession, rows: isize, chars: isize) {
        self.sync_lead(session);
        let lead = self.cursor(session);
        let mut screen = session.document_to_screen_position(lead.row, lead.column);
        if chars == 0 {
            match self.desired_column {
                Some(column) => screen.column = column,
                None => self.desired_column = Some(screen.column),
            }
        }
        let doc = match screen.row.checked_add_signed(rows) {
            Some(row) => session.screen_to_document_position(row, screen.column),
            None => Position::new(0, 0),
        };
        let column = doc.column.saturating_add_signed(chars);
        self.move_cursor_to(session, doc.row, column, chars == 0);
    }

    /// Move the cursor one screen row up.
    pub fn move_cursor_up(&mut self, session: &mut EditSession) {
        self.move_cursor_by(session, -1, 0);
    }

    /// Move the cursor one screen row down.
    pub fn move_cursor_down(&mut self, session: &mut EditSession) {
        self.move_cursor_by(session, 1, 0);
    }

    /// Move the cursor one character (or one soft tab, or over one fold) left.
    pub fn move_cursor_left(&mut self, session: &mut EditSession) {
        let cursor = self.cursor(session);
        if let Some(start) = session
            .fold_at(cursor.row, cursor.column, FoldSide::NotAtStart)
            .map(|f| f.start())
        {
            self.move_cursor_to(session, start.row, start.column, false);
        } else if cursor.column == 0 {
            if cursor.row > 0 {
                let column = session.line_len(cursor.row - 1);
                self.move_cursor_to(session, cursor.row - 1, column, false);
            }
        } else {
            let tab_size = session.tab_size();
            let soft_tab = session.is_tab_stop(cursor)
                && cursor.column >= tab_size
                && spaces_in(session.line(cursor.row), cursor.column - tab_size, cursor.column)
                    == tab_size;
            let step = if soft_tab { tab_size as isize } else { 1 };
            self.move_cursor_by(session, 0, -step);
        }
    }

    /// Move the cursor one character (or one soft tab, or over one fold) right.
    pub fn move_cursor_right(&mut self, session: &mut EditSession) {
        let cursor = self.cursor(session);
        if let Some(end) = session
            .fold_at(cursor.row, cursor.column, FoldSide::NotAtEnd)
            .map(|f| f.end())
        {
            self.move_cursor_to(session, end.row, end.column, false);
        } else if cursor.column == session.line_len(cursor.row) {
            if cursor.row + 1 < session.len() {
                self.move_cursor_to(session, cursor.row + 1, 0, false);
            }
        } else {
            let tab_size = session.tab_size();
            let soft_tab = session.is_tab_stop(cursor)
                && spaces_in(session.line(cursor.row), cursor.column, cursor.column + tab_size)
                    == tab_size;
            let step = if soft_tab { tab_size as isize } else { 1 };
            self.move_cursor_by(session, 0, step);
        }
    }

    /// Move the cursor to the first non-blank character of its screen row, or to the row's
    /// first column if it is already there (or the emacs-style option is on).
    pub fn move_cursor_line_start(&mut self, session: &mut EditSession) {
        let lead = self.cursor(session);
        let screen_row = session.document_to_screen_row(lead.row, lead.column);
        let mut first = session.screen_to_document_position(screen_row, 0);
        let before_cursor = session.display_line(lead.row, None, Some(first));
        let leading = before_cursor
            .chars()
            .take_while(|c| c.is_whitespace())
            .count();
        if leading != lead.column && !session.config().emacs_style_line_start {
            first.column += leading;
        }
        self.move_cursor_to_position(session, first);
    }

    /// Move the cursor to the end of its screen row. At the end of a row with trailing
    /// whitespace, the first press stops before the whitespace.
    pub fn move_cursor_line_end(&mut self, session: &mut EditSession) {
        let lead = self.cursor(session);
        let mut end = session.document_last_row_column_position(lead.row, lead.column);
        if lead.column == end.column {
            let line = session.line(end.row);
            if end.column == line.chars().count() {
                let trimmed = line.trim_end().chars().count();
                if trimmed > 0 && trimmed < end.column {
                    end.column = trimmed;
                }
            }
        }
        self.move_cursor_to(session, end.row, end.column, false);
    }

    /// Move the cursor to the start of the document.
    pub fn move_cursor_file_start(&mut self, session: &mut EditSession) {
        self.move_cursor_to(session, 0, 0, false);
    }

    /// Move the cursor to the end of the document.
    pub fn move_cursor_file_end(&mut self, session: &mut EditSession) {
        let row = session.len().saturating_sub(1);
        let column = session.line_len(row);
        self.move_cursor_to(session, row, column, false);
    }

    /// Word motion to the right; long or short words depending on the session option.
    pub fn move_cursor_word_right(&mut self, session: &mut EditSession) {
        if session.config().select_long_words {
            self.move_cursor_long_word_right(session);
        } else {
            self.move_cursor_short_word_right(session);
        }
    }

    /// Word motion to the left; long or short words depending on the session option.
    pub fn move_cursor_word_left(&mut self, session: &mut EditSession) {
        if session.config().select_long_words {
            self.move_cursor_long_word_left(session);
        } else {
            self.move_cursor_short_word_left(session);
        }
    }

    /// Skip non-word characters, then one word, to the right. At a line end the motion
    /// continues on the next row.
    pub fn move_cursor_long_word_right(&mut self, session: &mut EditSession) {
        let Position { row, mut column } = self.cursor(session);
        if let Some(end) = session.fold_at(row, column, FoldSide::NotAtEnd).map(|f| f.end()) {
            self.move_cursor_to(session, end.row, end.column, false);
            return;
        }
        let line: Vec<char> = session.line(row).chars().collect();
        let mode = session.mode();
        column += run_length(&line[column.min(line.len())..], |c| mode.is_non_token_char(c));

        if column >= line.len() {
            self.move_cursor_to(session, row, line.len(), false);
            self.move_cursor_right(session);
            if row + 1 < session.len() {
                self.move_cursor_word_right(session);
            }
            return;
        }
        let mode = session.mode();
        column += run_length(&line[column..], |c| mode.is_token_char(c));
        self.move_cursor_to(session, row, column, false);
    }

    /// Skip non-word characters, then one word, to the left. Folded text on the row is seen
    /// as its visible segment. At a line start the motion continues on the previous row.
    pub fn move_cursor_long_word_left(&mut self, session: &mut EditSession) {
        let Position { row, mut column } = self.cursor(session);
        if let Some(start) = session.fold_at(row, column, FoldSide::NotAtStart).map(|f| f.start()) {
            self.move_cursor_to(session, start.row, start.column, false);
            return;
        }
        let before: Vec<char> = match session.fold_string_at(row, column, TextSide::Before) {
            Some(text) => text.chars().rev().collect(),
            None => session.line(row).chars().take(column).collect::<Vec<_>>().into_iter().rev().collect(),
        };
        let mode = session.mode();
        let skipped = run_length(&before, |c| mode.is_non_token_char(c));
        column = column.saturating_sub(skipped);

        if column == 0 {
            self.move_cursor_to(session, row, 0, false);
            self.move_cursor_left(session);
            if row > 0 {
                self.move_cursor_word_left(session);
            }
            return;
        }
        let mode = session.mode();
        column = column.saturating_sub(run_length(&before[skipped..], |c| mode.is_token_char(c)));
        self.move_cursor_to(session, row, column, false);
    }

    /// Short-word motion to the right: stops at word ends and short punctuation runs, and
    /// skips blank rows.
    pub fn move_cursor_short_word_right(&mut self, session: &mut EditSession) {
        let Position { mut row, mut column } = self.cursor(session);
        if let Some(end) = session.fold_at(row, column, FoldSide::NotAtEnd).map(|f| f.end()) {
            self.move_cursor_to(session, end.row, end.column, false);
            return;
        }
        let mut right: Vec<char> = session.line(row).chars().skip(column).collect();
        if right.is_empty() {
            let len = session.len();
            loop {
                row += 1;
                right = session.line(row).chars().collect();
                if row >= len || !right.iter().all(|c| c.is_whitespace()) {
                    break;
                }
            }
            if !right.first().is_some_and(|c| c.is_whitespace()) {
                right.clear();
            }
            column = 0;
        }
        let index = short_word_end(session, &right);
        self.move_cursor_to(session, row, column + index, false);
    }

    /// Short-word motion to the left, mirroring [`Selection::move_cursor_short_word_right`].
    pub fn move_cursor_short_word_left(&mut self, session: &mut EditSession) {
        let Position { mut row, mut column } = self.cursor(session);
        if let Some(start) = session.fold_at(row, column, FoldSide::NotAtStart).map(|f| f.start()) {
            self.move_cursor_to(session, start.row, start.column, false);
            return;
        }
        let mut left: Vec<char> = session.line(row).chars().take(column).collect();
        if column == 0 {
            loop {
                let Some(prev) = row.checked_sub(1) else {
                    break;
                };
                row = prev;
                left = session.line(row).chars().collect();
                if row == 0 || !left.iter().all(|c| c.is_whitespace()) {
                    break;
                }
            }
            column = left.len();
            if !left.last().is_some_and(|c| c.is_whitespace()) {
                left.clear();
            }
        }
        left.reverse();
        let index = short_word_end(session, &left);
        self.move_cursor_to(session, row, column.saturating_sub(index), false);
    }

    // ---- orientation and serialisation ----

    /// The selection as a range that remembers its cursor end.
    pub fn to_oriented_range(&self, session: &EditSession) -> OrientedRange {
        let range = self.range(session);
        let cursor = if self.is_backwards(session) {
            range.start
        } else {
            range.end
        };
        OrientedRange {
            range,
            cursor,
            desired_column: self.desired_column,
        }
    }

    /// Restore a selection saved with [`Selection::to_oriented_range`].
    pub fn from_oriented_range(&mut self, session: &mut EditSession, oriented: &OrientedRange) {
        let reverse = oriented.cursor == oriented.range.start && !oriented.range.is_empty();
        self.set_selection_range(session, oriented.range, reverse);
        if oriented.desired_column.is_some() {
            self.desired_column = oriented.desired_column;
        }
    }

    /// Range between the cursor before and after `motion`. The cursor is put back afterwards.
    pub fn range_of_movements(
        &mut self,
        session: &mut EditSession,
        motion: impl FnOnce(&mut Self, &mut EditSession),
    ) -> Range {
        let start = self.cursor(session);
        motion(self, session);
        let end = self.cursor(session);
        self.move_cursor_to_position(session, start);
        Range::from_points(start, end)
    }

    /// Serialisable snapshot of the selection.
    pub fn to_data(&self, session: &EditSession) -> SelectionData {
        let range = self.range(session);
        SelectionData {
            start: range.start,
            end: range.end,
            is_backwards: self.is_backwards(session),
        }
    }

    /// Restore a snapshot made with [`Selection::to_data`].
    pub fn from_data(&mut self, session: &mut EditSession, data: &SelectionData) {
        let range = Range::from_points(data.start, data.end);
        self.set_selection_range(session, range, data.is_backwards);
    }
}

/// Number of spaces in columns `from..to` of `line`.
fn spaces_in(line: &str, from: usize, to: usize) -> usize {
    line.chars()
        .skip(from)
        .take(to.saturating_sub(from))
        .filter(|&c| c == ' ')
        .count()
}

/// Length of the leading run of `chars` matching `pred`.
fn run_length(chars: &[char], pred: impl Fn(char) -> bool) -> usize {
    chars.iter().take_while(|&&c| pred(c)).count()
}

/// How far a short-word motion goes into `text`: to the end of a leading word, over leading
/// whitespace, or over a short run of punctuation with at most one gap.
fn short_word_end(session: &EditSession, text: &[char]) -> usize {
    let mode = session.mode();
    let word = run_length(text, |c| mode.is_token_char(c));
    if word > 0 {
        return word;
    }
    let mut index = run_length(text, char::is_whitespace);
    if index >= 1 {
        return index;
    }
    while let Some(&ch) = text.get(index) {
        if mode.is_token_char(ch) {
            break;
        }
        index += 1;
        if ch.is_whitespace() {
            if index > 2 {
                index -= 1;
                break;
            }
            index += run_length(&text[index..], char::is_whitespace);
            if index > 2 {
                break;
            }
        }
    }
    index
}

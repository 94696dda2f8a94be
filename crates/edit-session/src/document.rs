//! The line buffer.
//!
//! A [`Document`] is a `Vec<String>` of lines plus the bookkeeping that has to move in lockstep
//! with it: the newline mode, the anchors that point into it and the delta listeners.
//!
//! Every public mutation is broken down into primitive steps (`insert_in_line`,
//! `insert_new_line`, `insert_lines`, `remove_in_line`, `remove_new_line`, `remove_lines`) and
//! each step emits one [`Delta`]. Anchors are shifted first, then the internal sink used by the
//! owning session runs, then subscribed listeners.
//!
//! Positions outside the document are clipped, never rejected.

use crate::anchor::{Anchor, AnchorChange, AnchorId};
use crate::delta::Delta;
use crate::error::{Result, SessionError};
use crate::newline::{self, NewLineMode};
use crate::range::{Position, Range};
use crate::text::{char_head, char_len, char_slice, char_tail, split_lines_preserve_trailing};
use slab::Slab;

/// Callback invoked with every delta after it has been applied.
pub type DocumentListener = Box<dyn FnMut(&Delta) + Send>;

/// Handle returned by [`Document::subscribe`] and [`crate::EditSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) usize);

/// Per-delta hook used by the session to keep its caches in step with the buffer.
pub(crate) type DeltaSink<'a> = &'a mut dyn FnMut(&Document, &Delta);

fn no_sink(_: &Document, _: &Delta) {}

/// A mutable text buffer that reports every change as a [`Delta`].
pub struct Document {
    lines: Vec<String>,
    auto_new_line: &'static str,
    new_line_mode: NewLineMode,
    anchors: Slab<Anchor>,
    listeners: Slab<DocumentListener>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("lines", &self.lines)
            .field("new_line_mode", &self.new_line_mode)
            .field("anchors", &self.anchors.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document {
    /// Create a document holding `text`.
    pub fn new(text: &str) -> Self {
        let mut doc = Self::empty();
        doc.insert(Position::new(0, 0), text);
        doc
    }

    /// Create a document from pre-split lines. An empty slice yields one empty line.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut doc = Self::empty();
        if !lines.is_empty() {
            doc.lines = lines.iter().map(|l| l.as_ref().to_string()).collect();
        }
        doc
    }

    fn empty() -> Self {
        Self {
            lines: vec![String::new()],
            auto_new_line: "",
            new_line_mode: NewLineMode::Auto,
            anchors: Slab::new(),
            listeners: Slab::new(),
        }
    }

    /// Register a listener for every future delta.
    pub fn subscribe<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&Delta) + Send + 'static,
    {
        ListenerId(self.listeners.insert(Box::new(callback)))
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.try_remove(id.0);
    }

    // ---- content queries ----

    /// Number of lines.
    ///
    /// At least one, except right after [`Document::remove_lines`] took every row. The next
    /// insertion recreates the first line.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// `true` only while every row has been removed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Row text, or `""` past the end.
    pub fn line(&self, row: usize) -> &str {
        self.lines.get(row).map(String::as_str).unwrap_or("")
    }

    /// Length of a row in characters.
    pub fn line_len(&self, row: usize) -> usize {
        char_len(self.line(row))
    }

    /// Rows `first..=last`, clamped to the document.
    pub fn lines(&self, first: usize, last: usize) -> &[String] {
        let end = last.saturating_add(1).min(self.lines.len());
        let start = first.min(end);
        &self.lines[start..end]
    }

    /// Every line.
    pub fn all_lines(&self) -> &[String] {
        &self.lines
    }

    /// Text of the document joined with the effective newline sequence.
    pub fn value(&self) -> String {
        self.lines.join(self.new_line_character())
    }

    /// Text covered by `range`, joined with the effective newline sequence.
    pub fn text_range(&self, range: &Range) -> String {
        if range.start.row == range.end.row {
            return char_slice(self.line(range.start.row), range.start.column, range.end.column)
                .to_string();
        }
        let mut lines: Vec<String> = self.lines(range.start.row, range.end.row).to_vec();
        if lines.is_empty() {
            return String::new();
        }
        lines[0] = char_tail(&lines[0], range.start.column).to_string();
        let l = lines.len() - 1;
        if range.end.row - range.start.row == l {
            lines[l] = char_head(&lines[l], range.end.column).to_string();
        }
        lines.join(self.new_line_character())
    }

    // ---- newline mode ----

    /// The sequence used to join lines.
    pub fn new_line_character(&self) -> &'static str {
        self.new_line_mode.resolve(self.auto_new_line)
    }

    /// Current newline mode.
    pub fn new_line_mode(&self) -> NewLineMode {
        self.new_line_mode
    }

    /// Change the newline mode. Returns `true` if it changed.
    pub fn set_new_line_mode(&mut self, mode: NewLineMode) -> bool {
        if self.new_line_mode == mode {
            return false;
        }
        self.new_line_mode = mode;
        true
    }

    /// `true` if `text` is a single newline sequence of any style.
    pub fn is_new_line(&self, text: &str) -> bool {
        newline::is_new_line(text)
    }

    // ---- positions ----

    /// Clip a position into the document.
    pub fn clip_position(&self, pos: Position) -> Position {
        let len = self.lines.len();
        if pos.row >= len {
            let row = len.saturating_sub(1);
            Position::new(row, self.line_len(row))
        } else {
            Position::new(pos.row, pos.column.min(self.line_len(pos.row)))
        }
    }

    /// Convert a character offset (newlines included) into a position, scanning from `start_row`.
    pub fn index_to_position(&self, index: usize, start_row: usize) -> Position {
        let nl = char_len(self.new_line_character()) as isize;
        let mut index = index as isize;
        for (row, line) in self.lines.iter().enumerate().skip(start_row) {
            let len = char_len(line) as isize;
            index -= len + nl;
            if index < 0 {
                return Position::new(row, (index + len + nl) as usize);
            }
        }
        let last = self.lines.len().saturating_sub(1);
        Position::new(last, self.line_len(last))
    }

    /// Convert a position into a character offset (newlines included), counting from `start_row`.
    pub fn position_to_index(&self, pos: Position, start_row: usize) -> usize {
        let nl = char_len(self.new_line_character());
        let row = pos.row.min(self.lines.len());
        let mut index = 0;
        for line in self.lines.iter().take(row).skip(start_row) {
            index += char_len(line) + nl;
        }
        index + pos.column
    }

    // ---- anchors ----

    /// Create an anchor at the clipped position.
    pub fn create_anchor(&mut self, row: usize, column: usize) -> AnchorId {
        let pos = self.clip_position(Position::new(row, column));
        AnchorId(self.anchors.insert(Anchor::new(pos.row, pos.column)))
    }

    /// Look up an anchor.
    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(id.0)
    }

    /// Position of an anchor, or the origin for a detached id.
    pub fn anchor_position(&self, id: AnchorId) -> Position {
        self.anchor(id).map(Anchor::position).unwrap_or_default()
    }

    /// Move an anchor, clipping into the document unless `no_clip` is set.
    pub fn set_anchor_position(
        &mut self,
        id: AnchorId,
        row: usize,
        column: usize,
        no_clip: bool,
    ) -> Option<AnchorChange> {
        let pos = if no_clip {
            Position::new(row, column)
        } else {
            self.clip_position(Position::new(row, column))
        };
        self.anchors.get_mut(id.0)?.set(pos)
    }

    /// Make insertions exactly at the anchor leave it in place.
    pub fn set_anchor_insert_right(&mut self, id: AnchorId, insert_right: bool) {
        if let Some(anchor) = self.anchors.get_mut(id.0) {
            anchor.insert_right = insert_right;
        }
    }

    /// Stop tracking an anchor.
    pub fn detach_anchor(&mut self, id: AnchorId) {
        self.anchors.try_remove(id.0);
    }

    // ---- mutations ----

    /// Replace the whole content.
    pub fn set_value(&mut self, text: &str) {
        self.set_value_with(text, &mut no_sink);
    }

    pub(crate) fn set_value_with(&mut self, text: &str, sink: DeltaSink<'_>) {
        let last = self.lines.len().saturating_sub(1);
        let all = Range::new(0, 0, last, self.line_len(last));
        self.remove_with(all, sink);
        self.insert_with(Position::new(0, 0), text, sink);
    }

    /// Insert `text` at `position` and return the end of the inserted text.
    pub fn insert(&mut self, position: Position, text: &str) -> Position {
        self.insert_with(position, text, &mut no_sink)
    }

    pub(crate) fn insert_with(
        &mut self,
        position: Position,
        text: &str,
        sink: DeltaSink<'_>,
    ) -> Position {
        if text.is_empty() {
            return position;
        }
        let position = self.clip_position(position);
        if self.lines.len() <= 1 {
            self.auto_new_line = newline::detect_in_text(text);
        }

        let mut lines = split_lines_preserve_trailing(text);
        let first = lines.remove(0);
        let last = lines.pop();

        let mut pos = self.insert_in_line_with(position, &first, sink);
        if let Some(last) = last {
            pos = self.insert_new_line_with(pos, sink);
            pos = self.insert_lines_raw(pos.row, lines, sink);
            pos = self.insert_in_line_with(pos, &last, sink);
        }
        pos
    }

    /// Insert whole lines before `row`. Past the end they are appended after a line break.
    pub fn insert_lines(&mut self, row: usize, lines: Vec<String>) -> Position {
        self.insert_lines_with(row, lines, &mut no_sink)
    }

    pub(crate) fn insert_lines_with(
        &mut self,
        row: usize,
        lines: Vec<String>,
        sink: DeltaSink<'_>,
    ) -> Position {
        if row >= self.lines.len() {
            let text = format!("\n{}", lines.join("\n"));
            return self.insert_with(Position::new(row, 0), &text, sink);
        }
        self.insert_lines_raw(row, lines, sink)
    }

    fn insert_lines_raw(&mut self, row: usize, lines: Vec<String>, sink: DeltaSink<'_>) -> Position {
        if lines.is_empty() {
            return Position::new(row, 0);
        }
        let count = lines.len();
        self.lines.splice(row..row, lines.iter().cloned());
        let range = Range::new(row, 0, row + count, 0);
        self.emit(Delta::InsertLines { range, lines }, sink);
        range.end
    }

    /// Split the line at `position`.
    pub fn insert_new_line(&mut self, position: Position) -> Position {
        self.insert_new_line_with(position, &mut no_sink)
    }

    fn insert_new_line_with(&mut self, position: Position, sink: DeltaSink<'_>) -> Position {
        let position = self.clip_position(position);
        self.ensure_row(position.row);
        let line = std::mem::take(&mut self.lines[position.row]);
        self.lines[position.row] = char_head(&line, position.column).to_string();
        self.lines
            .insert(position.row + 1, char_tail(&line, position.column).to_string());
        let end = Position::new(position.row + 1, 0);
        let text = self.new_line_character().to_string();
        self.emit(
            Delta::InsertText {
                range: Range::from_points(position, end),
                text,
            },
            sink,
        );
        end
    }

    /// Insert single-line `text` at `position`.
    pub fn insert_in_line(&mut self, position: Position, text: &str) -> Position {
        let position = self.clip_position(position);
        self.insert_in_line_with(position, text, &mut no_sink)
    }

    fn insert_in_line_with(&mut self, position: Position, text: &str, sink: DeltaSink<'_>) -> Position {
        if text.is_empty() {
            return position;
        }
        self.ensure_row(position.row);
        let line = &mut self.lines[position.row];
        let at = crate::text::byte_index(line, position.column);
        line.insert_str(at, text);
        let end = Position::new(position.row, position.column + char_len(text));
        self.emit(
            Delta::InsertText {
                range: Range::from_points(position, end),
                text: text.to_string(),
            },
            sink,
        );
        end
    }

    /// Remove the text in `range` and return its clipped start.
    pub fn remove(&mut self, range: Range) -> Position {
        self.remove_with(range, &mut no_sink)
    }

    pub(crate) fn remove_with(&mut self, range: Range, sink: DeltaSink<'_>) -> Position {
        let range = Range::from_points(self.clip_position(range.start), self.clip_position(range.end));
        if range.is_empty() {
            return range.start;
        }
        let first_row = range.start.row;
        let last_row = range.end.row;

        if range.is_multi_line() {
            let first_full_row = if range.start.column == 0 {
                first_row
            } else {
                first_row + 1
            };
            if range.end.column > 0 {
                self.remove_in_line_with(last_row, 0, range.end.column, sink);
            }
            if last_row > first_full_row {
                self.remove_lines_raw(first_full_row, last_row - 1, sink);
            }
            if first_full_row != first_row {
                let len = self.line_len(first_row);
                self.remove_in_line_with(first_row, range.start.column, len, sink);
                self.remove_new_line_with(first_row, sink);
            }
        } else {
            self.remove_in_line_with(first_row, range.start.column, range.end.column, sink);
        }
        range.start
    }

    /// Remove `start_column..end_column` from `row`.
    pub fn remove_in_line(&mut self, row: usize, start_column: usize, end_column: usize) -> Position {
        self.remove_in_line_with(row, start_column, end_column, &mut no_sink)
    }

    fn remove_in_line_with(
        &mut self,
        row: usize,
        start_column: usize,
        end_column: usize,
        sink: DeltaSink<'_>,
    ) -> Position {
        let range = Range::new(row, start_column, row, end_column);
        if start_column == end_column || row >= self.lines.len() {
            return range.start;
        }
        let line = &self.lines[row];
        let removed = char_slice(line, start_column, end_column).to_string();
        let rebuilt = format!("{}{}", char_head(line, start_column), char_tail(line, end_column));
        self.lines[row] = rebuilt;
        self.emit(
            Delta::RemoveText {
                range,
                text: removed,
            },
            sink,
        );
        range.start
    }

    /// Remove rows `first..=last` and return them.
    pub fn remove_lines(&mut self, first: usize, last: usize) -> Result<Vec<String>> {
        self.remove_lines_with(first, last, &mut no_sink)
    }

    pub(crate) fn remove_lines_with(
        &mut self,
        first: usize,
        last: usize,
        sink: DeltaSink<'_>,
    ) -> Result<Vec<String>> {
        if first > last || last >= self.lines.len() {
            return Err(SessionError::RowsOutOfBounds {
                first,
                last,
                len: self.lines.len(),
            });
        }
        Ok(self.remove_lines_raw(first, last, sink))
    }

    fn remove_lines_raw(&mut self, first: usize, last: usize, sink: DeltaSink<'_>) -> Vec<String> {
        let removed: Vec<String> = self.lines.drain(first..=last).collect();
        self.emit(
            Delta::RemoveLines {
                range: Range::new(first, 0, last + 1, 0),
                lines: removed.clone(),
            },
            sink,
        );
        removed
    }

    /// Join `row` with the row below it.
    pub fn remove_new_line(&mut self, row: usize) {
        self.remove_new_line_with(row, &mut no_sink);
    }

    fn remove_new_line_with(&mut self, row: usize, sink: DeltaSink<'_>) {
        if row + 1 >= self.lines.len() {
            return;
        }
        let second = self.lines.remove(row + 1);
        let first_len = self.line_len(row);
        self.lines[row].push_str(&second);
        let text = self.new_line_character().to_string();
        self.emit(
            Delta::RemoveText {
                range: Range::new(row, first_len, row + 1, 0),
                text,
            },
            sink,
        );
    }

    /// Replace `range` with `text`, returning the end of the new text.
    ///
    /// Replacing text with an identical string emits nothing.
    pub fn replace(&mut self, range: Range, text: &str) -> Position {
        self.replace_with(range, text, &mut no_sink)
    }

    pub(crate) fn replace_with(&mut self, range: Range, text: &str, sink: DeltaSink<'_>) -> Position {
        if text.is_empty() && range.is_empty() {
            return range.start;
        }
        if text == self.text_range(&range) {
            return range.end;
        }
        let start = self.remove_with(range, sink);
        if text.is_empty() {
            start
        } else {
            self.insert_with(start, text, sink)
        }
    }

    /// Re-apply deltas in order.
    pub fn apply_deltas(&mut self, deltas: &[Delta]) {
        self.apply_deltas_with(deltas, &mut no_sink);
    }

    pub(crate) fn apply_deltas_with(&mut self, deltas: &[Delta], sink: DeltaSink<'_>) {
        for delta in deltas {
            match delta {
                Delta::InsertLines { range, lines } => {
                    self.insert_lines_with(range.start.row, lines.clone(), sink);
                }
                Delta::InsertText { range, text } => {
                    self.insert_with(range.start, text, sink);
                }
                Delta::RemoveLines { range, .. } => {
                    self.remove_rows_lenient(range.start.row, range.end.row, sink);
                }
                Delta::RemoveText { range, .. } => {
                    self.remove_with(*range, sink);
                }
            }
        }
    }

    /// Undo deltas, last one first.
    pub fn revert_deltas(&mut self, deltas: &[Delta]) {
        self.revert_deltas_with(deltas, &mut no_sink);
    }

    pub(crate) fn revert_deltas_with(&mut self, deltas: &[Delta], sink: DeltaSink<'_>) {
        for delta in deltas.iter().rev() {
            match delta {
                Delta::InsertLines { range, .. } => {
                    self.remove_rows_lenient(range.start.row, range.end.row, sink);
                }
                Delta::InsertText { range, .. } => {
                    self.remove_with(*range, sink);
                }
                Delta::RemoveLines { range, lines } => {
                    let row = range.start.row.min(self.lines.len());
                    self.insert_lines_raw(row, lines.clone(), sink);
                }
                Delta::RemoveText { range, text } => {
                    self.insert_with(range.start, text, sink);
                }
            }
        }
    }

    /// Remove rows `start..end`, ignoring whatever falls outside the document.
    fn remove_rows_lenient(&mut self, start: usize, end: usize, sink: DeltaSink<'_>) {
        let end = end.min(self.lines.len());
        if start < end {
            self.remove_lines_raw(start, end - 1, sink);
        }
    }

    fn ensure_row(&mut self, row: usize) {
        while self.lines.len() <= row {
            self.lines.push(String::new());
        }
    }

    fn emit(&mut self, delta: Delta, sink: DeltaSink<'_>) {
        for (_, anchor) in self.anchors.iter_mut() {
            if let Some(change) = anchor.on_change(&delta) {
                tracing::trace!(?change, "anchor moved");
            }
        }
        sink(&*self, &delta);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_new_splits_and_detects_newline() {
        let doc = Document::new("a\r\nb\r\nc");
        assert_eq!(doc.all_lines(), ["a", "b", "c"]);
        assert_eq!(doc.new_line_character(), "\r\n");
        assert_eq!(doc.value(), "a\r\nb\r\nc");
    }

    #[test]
    fn test_insert_emits_primitive_deltas_in_order() {
        let mut doc = Document::from_lines(&["abc", "def"]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        doc.subscribe(move |d| sink.lock().unwrap().push(d.action()));
        let end = doc.insert(Position::new(0, 1), "X\nY\nZ");
        assert_eq!(end, Position::new(2, 1));
        assert_eq!(doc.all_lines(), ["aX", "Y", "Zbc", "def"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["insertText", "insertText", "insertLines", "insertText"]
        );
    }

    #[test]
    fn test_out_of_range_positions_are_clipped() {
        let mut doc = Document::from_lines(&["ab", "cd"]);
        assert_eq!(doc.insert(Position::new(9, 9), "!"), Position::new(1, 3));
        assert_eq!(doc.all_lines(), ["ab", "cd!"]);
        assert_eq!(doc.remove(Range::new(0, 1, 7, 0)), Position::new(0, 1));
        assert_eq!(doc.all_lines(), ["a"]);
    }

    #[test]
    fn test_remove_lines_bounds() {
        let mut doc = Document::from_lines(&["a", "b", "c"]);
        assert!(doc.remove_lines(1, 3).is_err());
        assert_eq!(doc.remove_lines(0, 1).unwrap(), vec!["a", "b"]);
        assert_eq!(doc.all_lines(), ["c"]);
    }

    #[test]
    fn test_replace_with_same_text_is_silent() {
        let mut doc = Document::from_lines(&["hello"]);
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        doc.subscribe(move |_| *c.lock().unwrap() += 1);
        assert_eq!(doc.replace(Range::new(0, 0, 0, 5), "hello"), Position::new(0, 5));
        assert_eq!(*count.lock().unwrap(), 0);
        assert_eq!(doc.replace(Range::new(0, 0, 0, 1), "J"), Position::new(0, 1));
        assert_eq!(doc.line(0), "Jello");
    }

    #[test]
    fn test_index_position_conversion() {
        let doc = Document::from_lines(&["ab", "cde", "f"]);
        assert_eq!(doc.index_to_position(4, 0), Position::new(1, 1));
        assert_eq!(doc.position_to_index(Position::new(1, 1), 0), 4);
        assert_eq!(doc.index_to_position(100, 0), Position::new(2, 1));
        assert_eq!(doc.position_to_index(Position::new(2, 0), 1), 4);
    }

    #[test]
    fn test_text_range_multi_line() {
        let doc = Document::from_lines(&["abc", "def", "ghi"]);
        assert_eq!(doc.text_range(&Range::new(0, 1, 2, 2)), "bc\ndef\ngh");
        assert_eq!(doc.text_range(&Range::new(1, 1, 1, 2)), "e");
    }

    #[test]
    fn test_anchor_clipped_on_create() {
        let mut doc = Document::from_lines(&["abc"]);
        let a = doc.create_anchor(5, 5);
        assert_eq!(doc.anchor_position(a), Position::new(0, 3));
        doc.detach_anchor(a);
        assert!(doc.anchor(a).is_none());
    }
}

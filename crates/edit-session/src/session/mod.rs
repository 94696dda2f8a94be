//! The editing session.
//!
//! An [`EditSession`] owns a [`Document`] and everything derived from it: folds, soft-wrap
//! split points, the row-mapping caches, the background tokenizer, markers, breakpoints,
//! annotations and the grouped undo history. Every document mutation goes through the session
//! so that all of these are updated for a delta before any subscriber hears about it.
//!
//! The implementation is spread over several files:
//!
//! - `screen`: soft wrap and document/screen coordinate mapping
//! - `folding`: the fold model and fold widgets
//! - `decorations`: markers, breakpoints, gutter decorations and annotations
//! - `editing`: line moves, indentation, word ranges and other text helpers

mod decorations;
mod editing;
mod folding;
mod screen;

pub use decorations::{Marker, MarkerId, MarkerType};
pub use folding::{FoldSide, ParentFoldRange, TextSide, ToggleFoldOptions};

use crate::anchor::{AnchorChange, AnchorId};
use crate::background_tokenizer::{BackgroundTokenizer, RowSpan};
use crate::config::SessionConfig;
use crate::delta::Delta;
use crate::document::{Document, ListenerId};
use crate::error::Result;
use crate::events::{SessionEvent, SessionListener};
use crate::fold_line::FoldLine;
use crate::mode::{FoldWidget, SessionMode};
use crate::newline::NewLineMode;
use crate::range::{Position, Range};
use crate::text::char_len;
use crate::tokenizer::{Token, TokenizerState};
use crate::undo::{DeltaGroup, FoldDelta, UndoManager, UndoTarget};
use crate::worker::{Annotation, LintWorker};
use slab::Slab;
use std::collections::BTreeMap;
use std::fmt;
use web_time::Instant;

/// The token under a document position, as returned by [`EditSession::token_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAt {
    /// The token.
    pub token: Token,
    /// Index of the token in its row.
    pub index: usize,
    /// Column at which the token starts.
    pub start: usize,
}

/// A document plus the view state derived from it.
pub struct EditSession {
    doc: Document,
    config: SessionConfig,
    mode: SessionMode,
    bg_tokenizer: BackgroundTokenizer,

    fold_data: Vec<FoldLine>,
    next_fold_id: u64,
    fold_widgets: Option<Vec<Option<FoldWidget>>>,

    wrap_data: Vec<Vec<usize>>,
    row_width_cache: Vec<Option<usize>>,
    doc_row_cache: Vec<usize>,
    screen_row_cache: Vec<usize>,
    screen_width: usize,
    modified: bool,

    undo_manager: Option<UndoManager>,
    deltas_doc: Vec<Delta>,
    deltas_fold: Vec<FoldDelta>,
    undo_pending: bool,
    from_undo: bool,
    merge_undo_deltas: bool,

    front_markers: BTreeMap<MarkerId, Marker>,
    back_markers: BTreeMap<MarkerId, Marker>,
    next_marker_id: u64,
    breakpoints: BTreeMap<usize, String>,
    gutter_decorations: BTreeMap<usize, String>,
    annotations: Vec<Annotation>,

    scroll_top: f64,
    scroll_left: f64,

    worker: Option<Box<dyn LintWorker>>,
    listeners: Slab<SessionListener>,
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("doc", &self.doc)
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("fold_lines", &self.fold_data.len())
            .field("undo", &self.undo_manager.as_ref().map(UndoManager::undo_depth))
            .field("worker", &self.worker.is_some())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditSession {
    /// A plain-text session over `text` with default options.
    pub fn new(text: &str) -> Self {
        Self::with_config(Document::new(text), SessionConfig::default())
    }

    /// A plain-text session over an existing document.
    pub fn with_config(mut doc: Document, config: SessionConfig) -> Self {
        doc.set_new_line_mode(config.new_line_mode);
        let mode = SessionMode::text();
        let mut bg_tokenizer =
            BackgroundTokenizer::new(mode.tokenizer().clone(), config.tokenizer.clone());
        bg_tokenizer.start(0, doc.len());

        let mut session = Self {
            doc,
            config,
            mode,
            bg_tokenizer,
            fold_data: Vec::new(),
            next_fold_id: 0,
            fold_widgets: None,
            wrap_data: Vec::new(),
            row_width_cache: Vec::new(),
            doc_row_cache: Vec::new(),
            screen_row_cache: Vec::new(),
            screen_width: 0,
            modified: true,
            undo_manager: Some(UndoManager::new()),
            deltas_doc: Vec::new(),
            deltas_fold: Vec::new(),
            undo_pending: false,
            from_undo: false,
            merge_undo_deltas: false,
            front_markers: BTreeMap::new(),
            back_markers: BTreeMap::new(),
            next_marker_id: 0,
            breakpoints: BTreeMap::new(),
            gutter_decorations: BTreeMap::new(),
            annotations: Vec::new(),
            scroll_top: 0.0,
            scroll_left: 0.0,
            worker: None,
            listeners: Slab::new(),
        };
        if session.config.use_wrap_mode {
            session.rebuild_wrap_data();
        }
        tracing::debug!(rows = session.doc.len(), "session created");
        session
    }

    // ---- events ----

    /// Register a listener for every future [`SessionEvent`].
    pub fn subscribe<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        ListenerId(self.listeners.insert(Box::new(callback)))
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.try_remove(id.0);
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    // ---- document access ----

    /// The underlying document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Number of document rows.
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    /// `true` only while every row has been removed.
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    /// Row text, or `""` past the end.
    pub fn line(&self, row: usize) -> &str {
        self.doc.line(row)
    }

    /// Length of a row in characters.
    pub fn line_len(&self, row: usize) -> usize {
        self.doc.line_len(row)
    }

    /// Rows `first..=last`, clamped to the document.
    pub fn lines(&self, first: usize, last: usize) -> &[String] {
        self.doc.lines(first, last)
    }

    /// Full text joined with the effective newline sequence.
    pub fn value(&self) -> String {
        self.doc.value()
    }

    /// Text covered by `range`.
    pub fn text_range(&self, range: &Range) -> String {
        self.doc.text_range(range)
    }

    /// Change the document's newline mode.
    pub fn set_new_line_mode(&mut self, mode: NewLineMode) {
        self.config.new_line_mode = mode;
        if self.doc.set_new_line_mode(mode) {
            self.emit(SessionEvent::ChangeNewLineMode);
        }
    }

    /// Current newline mode.
    pub fn new_line_mode(&self) -> NewLineMode {
        self.doc.new_line_mode()
    }

    // ---- document mutation ----

    /// Run `f` with the document moved out of `self`, so that the document can call back into
    /// the session for every delta. `self.doc` is an empty placeholder until `f` returns.
    fn with_doc<R>(&mut self, f: impl FnOnce(&mut Self, &mut Document) -> R) -> R {
        let mut doc = std::mem::take(&mut self.doc);
        let result = f(self, &mut doc);
        self.doc = doc;
        result
    }

    /// Insert `text` at `position` and return the end of the inserted text.
    pub fn insert(&mut self, position: Position, text: &str) -> Position {
        self.with_doc(|s, doc| {
            doc.insert_with(position, text, &mut |d: &Document, delta: &Delta| {
                s.on_change(d, delta)
            })
        })
    }

    /// Remove `range` and return its start.
    pub fn remove(&mut self, range: Range) -> Position {
        self.with_doc(|s, doc| {
            doc.remove_with(range, &mut |d: &Document, delta: &Delta| s.on_change(d, delta))
        })
    }

    /// Replace `range` with `text` and return the end of the new text.
    pub fn replace(&mut self, range: Range, text: &str) -> Position {
        self.with_doc(|s, doc| {
            doc.replace_with(range, text, &mut |d: &Document, delta: &Delta| {
                s.on_change(d, delta)
            })
        })
    }

    /// Insert whole lines before `row`.
    pub fn insert_lines(&mut self, row: usize, lines: Vec<String>) -> Position {
        self.with_doc(|s, doc| {
            doc.insert_lines_with(row, lines, &mut |d: &Document, delta: &Delta| {
                s.on_change(d, delta)
            })
        })
    }

    /// Remove rows `first..=last` and return their text.
    pub fn remove_lines(&mut self, first: usize, last: usize) -> Result<Vec<String>> {
        self.with_doc(|s, doc| {
            doc.remove_lines_with(first, last, &mut |d: &Document, delta: &Delta| {
                s.on_change(d, delta)
            })
        })
    }

    /// Apply deltas produced elsewhere, for example by a collaborator.
    pub fn apply_deltas(&mut self, deltas: &[Delta]) {
        self.with_doc(|s, doc| {
            doc.apply_deltas_with(deltas, &mut |d: &Document, delta: &Delta| {
                s.on_change(d, delta)
            })
        })
    }

    /// Replace the whole text and start a fresh undo history.
    ///
    /// Callers holding a [`crate::Selection`] should move it to the document start.
    pub fn set_value(&mut self, text: &str) {
        self.with_doc(|s, doc| {
            doc.set_value_with(text, &mut |d: &Document, delta: &Delta| s.on_change(d, delta))
        });
        self.reset_row_cache(0);
        self.deltas_doc.clear();
        self.deltas_fold.clear();
        self.undo_pending = false;
        self.merge_undo_deltas = false;
        if let Some(um) = self.undo_manager.as_mut() {
            um.reset();
        }
        self.bg_tokenizer.set_document();
        self.bg_tokenizer.start(0, self.doc.len());
        if let Some(worker) = self.worker.as_mut() {
            worker.attach(self.doc.all_lines());
        }
    }

    /// Per-delta hook. Runs while the document is moved out of `self`, so everything in here
    /// reads the buffer through `doc`.
    fn on_change(&mut self, doc: &Document, delta: &Delta) {
        self.modified = true;
        self.reset_row_cache(delta.range().start.row);

        let removed_folds = self.update_internal_data_on_change(doc, delta);
        if !self.from_undo && self.undo_manager.is_some() {
            self.deltas_doc.push(delta.clone());
            if !removed_folds.is_empty() {
                self.deltas_fold.push(FoldDelta {
                    folds: removed_folds,
                });
            }
            self.undo_pending = true;
        }

        self.update_fold_widgets(delta);
        self.bg_tokenizer.update_on_change(delta, doc.len());
        self.bg_tokenizer.schedule_start();
        if let Some(worker) = self.worker.as_mut() {
            worker.document_changed(delta);
        }
        self.emit(SessionEvent::Change(delta.clone()));
    }

    // ---- anchors ----

    /// Create an anchor at `(row, column)`, clipped into the document.
    pub fn create_anchor(&mut self, row: usize, column: usize) -> AnchorId {
        self.doc.create_anchor(row, column)
    }

    /// Current position of an anchor.
    pub fn anchor_position(&self, id: AnchorId) -> Position {
        self.doc.anchor_position(id)
    }

    /// Move an anchor. Returns the change if the position moved.
    pub fn set_anchor_position(
        &mut self,
        id: AnchorId,
        row: usize,
        column: usize,
        no_clip: bool,
    ) -> Option<AnchorChange> {
        self.doc.set_anchor_position(id, row, column, no_clip)
    }

    /// Make an anchor stay left of text inserted exactly at it, or move right with it.
    pub fn set_anchor_insert_right(&mut self, id: AnchorId, insert_right: bool) {
        self.doc.set_anchor_insert_right(id, insert_right)
    }

    /// Stop tracking an anchor.
    pub fn detach_anchor(&mut self, id: AnchorId) {
        self.doc.detach_anchor(id)
    }

    // ---- row caches ----

    /// Drop every cached doc/screen row pair at or after `doc_row`.
    pub(crate) fn reset_row_cache(&mut self, doc_row: usize) {
        if doc_row == 0 {
            self.doc_row_cache.clear();
            self.screen_row_cache.clear();
            return;
        }
        let keep = (row_cache_index(&self.doc_row_cache, doc_row) + 1) as usize;
        if self.doc_row_cache.len() > keep {
            self.doc_row_cache.truncate(keep);
            self.screen_row_cache.truncate(keep);
        }
    }

    /// Refresh wrap splits or row widths for `first..=last` from the current document.
    fn refresh_rows(&mut self, first: usize, last: usize) {
        self.with_doc(|s, doc| {
            if s.config.use_wrap_mode {
                s.update_wrap_data(doc, first, last);
            } else {
                s.update_row_length_cache(first, last);
            }
        });
    }

    fn update_row_length_cache(&mut self, first: usize, last: usize) {
        for row in [first, last] {
            if let Some(slot) = self.row_width_cache.get_mut(row) {
                *slot = None;
            }
        }
    }

    // ---- options ----

    /// The session's options.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Width of a tab stop.
    pub fn tab_size(&self) -> usize {
        self.config.tab_size
    }

    /// Change the tab size. Zero and the current value are ignored.
    pub fn set_tab_size(&mut self, tab_size: usize) {
        if tab_size == 0 || tab_size == self.config.tab_size {
            return;
        }
        self.modified = true;
        self.row_width_cache.clear();
        self.config.tab_size = tab_size;
        if self.config.use_wrap_mode {
            self.rebuild_wrap_data();
        }
        self.reset_row_cache(0);
        self.emit(SessionEvent::ChangeTabSize);
    }

    /// Soft tabs are in effect unless the mode forces hard tabs.
    pub fn use_soft_tabs(&self) -> bool {
        self.config.use_soft_tabs && !self.mode.indent_with_tabs()
    }

    /// Indent with spaces (`true`) or tab characters.
    pub fn set_use_soft_tabs(&mut self, use_soft_tabs: bool) {
        self.config.use_soft_tabs = use_soft_tabs;
    }

    /// Overwrite mode flag.
    pub fn overwrite(&self) -> bool {
        self.config.overwrite
    }

    /// Set overwrite mode.
    pub fn set_overwrite(&mut self, overwrite: bool) {
        if self.config.overwrite != overwrite {
            self.config.overwrite = overwrite;
            self.emit(SessionEvent::ChangeOverwrite);
        }
    }

    /// Flip overwrite mode.
    pub fn toggle_overwrite(&mut self) {
        self.set_overwrite(!self.config.overwrite);
    }

    /// Whether undo and redo report a range to select.
    pub fn set_undo_select(&mut self, enable: bool) {
        self.config.undo_select = enable;
    }

    /// Word motion granularity used by [`crate::Selection`].
    pub fn set_select_long_words(&mut self, enable: bool) {
        self.config.select_long_words = enable;
    }

    /// Line-start motion behaviour used by [`crate::Selection`].
    pub fn set_emacs_style_line_start(&mut self, enable: bool) {
        self.config.emacs_style_line_start = enable;
    }

    // ---- scrolling ----

    /// Vertical scroll offset.
    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Set the vertical scroll offset. `NaN` and the current value are ignored.
    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        if self.scroll_top == scroll_top || scroll_top.is_nan() {
            return;
        }
        self.scroll_top = scroll_top;
        self.emit(SessionEvent::ChangeScrollTop(scroll_top));
    }

    /// Horizontal scroll offset.
    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    /// Set the horizontal scroll offset. `NaN` and the current value are ignored.
    pub fn set_scroll_left(&mut self, scroll_left: f64) {
        if self.scroll_left == scroll_left || scroll_left.is_nan() {
            return;
        }
        self.scroll_left = scroll_left;
        self.emit(SessionEvent::ChangeScrollLeft(scroll_left));
    }

    // ---- mode, tokens, worker ----

    /// The active mode.
    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// Install a mode: swap the tokenizer, reset fold widgets and restart tokenization.
    pub fn set_mode(&mut self, mode: SessionMode) {
        tracing::debug!(mode = mode.id(), "set mode");
        self.mode = mode;
        self.bg_tokenizer
            .set_tokenizer(self.mode.tokenizer().clone(), self.doc.len());
        self.reset_folding();
        if let Some(worker) = self.worker.as_mut() {
            worker.attach(self.doc.all_lines());
        }
        self.emit(SessionEvent::ChangeMode);
    }

    /// Tokens of `row`, tokenizing it now if the background run has not reached it.
    pub fn tokens(&mut self, row: usize) -> Vec<Token> {
        self.bg_tokenizer.tokens(&self.doc, row)
    }

    /// Tokenizer state at the end of `row`.
    pub fn state(&mut self, row: usize) -> TokenizerState {
        self.bg_tokenizer.state(&self.doc, row)
    }

    /// The token covering `column` of `row`, or the last token of the row when `column` is
    /// `None`.
    ///
    /// A column exactly between two tokens belongs to the left one.
    pub fn token_at(&mut self, row: usize, column: Option<usize>) -> Option<TokenAt> {
        let tokens = self.tokens(row);
        let (index, end) = match column {
            None => (tokens.len().checked_sub(1)?, self.line_len(row)),
            Some(column) => {
                let mut end = 0;
                let mut index = tokens.len();
                for (i, token) in tokens.iter().enumerate() {
                    end += char_len(&token.value);
                    if end >= column {
                        index = i;
                        break;
                    }
                }
                (index, end)
            }
        };
        let token = tokens.into_iter().nth(index)?;
        let start = end - char_len(&token.value);
        Some(TokenAt {
            token,
            index,
            start,
        })
    }

    /// The background tokenizer, for hosts that schedule it themselves.
    pub fn background_tokenizer(&self) -> &BackgroundTokenizer {
        &self.bg_tokenizer
    }

    /// Tokenize every row that is not fresh yet.
    pub fn tokenize_all(&mut self) -> Option<RowSpan> {
        let span = self.bg_tokenizer.run_to_completion(&self.doc)?;
        self.invalidate_fold_widgets(span);
        self.emit(SessionEvent::TokenizerUpdate(span));
        Some(span)
    }

    /// Install or remove the linter. A new worker is sent the whole document.
    pub fn set_worker(&mut self, worker: Option<Box<dyn LintWorker>>) {
        self.worker = worker;
        if let Some(worker) = self.worker.as_mut() {
            worker.attach(self.doc.all_lines());
        }
    }

    /// Drive deferred work: run a due tokenizer batch, close the pending undo group and pick up
    /// annotations from the worker.
    pub fn poll(&mut self, now: Instant) -> Option<RowSpan> {
        let span = self.bg_tokenizer.run_pending(&self.doc, now);
        if let Some(span) = span {
            self.invalidate_fold_widgets(span);
            self.emit(SessionEvent::TokenizerUpdate(span));
        }
        if self.undo_pending {
            self.mark_undo_group();
        }
        if let Some(annotations) = self.worker.as_mut().and_then(|w| w.poll_annotations()) {
            self.set_annotations(annotations);
        }
        span
    }

    // ---- undo ----

    /// Replace the undo manager. Pending, unrecorded deltas are discarded.
    pub fn set_undo_manager(&mut self, undo_manager: Option<UndoManager>) {
        self.undo_manager = undo_manager;
        self.deltas_doc.clear();
        self.deltas_fold.clear();
        self.undo_pending = false;
        self.merge_undo_deltas = false;
    }

    /// The undo manager, if one is installed.
    pub fn undo_manager(&self) -> Option<&UndoManager> {
        self.undo_manager.as_ref()
    }

    /// Mutable access to the undo manager, for `mark_clean` and friends.
    pub fn undo_manager_mut(&mut self) -> Option<&mut UndoManager> {
        self.undo_manager.as_mut()
    }

    /// Close the current group of deltas and hand it to the undo manager.
    pub fn mark_undo_group(&mut self) {
        self.undo_pending = false;
        let merge = std::mem::take(&mut self.merge_undo_deltas);
        let Some(um) = self.undo_manager.as_mut() else {
            self.deltas_doc.clear();
            self.deltas_fold.clear();
            return;
        };
        let mut groups = Vec::new();
        if !self.deltas_fold.is_empty() {
            groups.push(DeltaGroup::Fold(std::mem::take(&mut self.deltas_fold)));
        }
        if !self.deltas_doc.is_empty() {
            groups.push(DeltaGroup::Doc(std::mem::take(&mut self.deltas_doc)));
        }
        if !groups.is_empty() {
            um.execute(groups, merge);
        }
    }

    /// Append the next group to the previous undo entry instead of starting a new one.
    pub fn merge_undo_deltas(&mut self) {
        self.merge_undo_deltas = true;
    }

    /// Undo the last group. Returns the range to select when `undo_select` is on.
    pub fn undo(&mut self, dont_select: bool) -> Option<Range> {
        self.mark_undo_group();
        let mut um = self.undo_manager.take()?;
        let range = um.undo(self, dont_select);
        self.undo_manager = Some(um);
        range
    }

    /// Redo the last undone group. Returns the range to select when `undo_select` is on.
    pub fn redo(&mut self, dont_select: bool) -> Option<Range> {
        self.mark_undo_group();
        let mut um = self.undo_manager.take()?;
        let range = um.redo(self, dont_select);
        self.undo_manager = Some(um);
        range
    }

    /// `true` if the undo manager has something to undo.
    pub fn has_undo(&self) -> bool {
        self.undo_manager.as_ref().is_some_and(UndoManager::has_undo)
    }

    /// `true` if the undo manager has something to redo.
    pub fn has_redo(&self) -> bool {
        self.undo_manager.as_ref().is_some_and(UndoManager::has_redo)
    }
}

impl UndoTarget for EditSession {
    fn undo_changes(&mut self, groups: &[DeltaGroup], dont_select: bool) -> Option<Range> {
        if groups.is_empty() {
            return None;
        }
        self.from_undo = true;
        let mut last_range = None;
        for group in groups.iter().rev() {
            match group {
                DeltaGroup::Doc(deltas) => {
                    self.with_doc(|s, doc| {
                        doc.revert_deltas_with(deltas, &mut |d: &Document, delta: &Delta| {
                            s.on_change(d, delta)
                        })
                    });
                    last_range = undo_selection(deltas, true, last_range);
                }
                DeltaGroup::Fold(fold_deltas) => {
                    for fold_delta in fold_deltas {
                        if let Err(err) = self.add_folds(fold_delta.folds.clone()) {
                            tracing::warn!(%err, "could not restore folds on undo");
                        }
                    }
                }
            }
        }
        self.from_undo = false;
        last_range.filter(|_| self.config.undo_select && !dont_select)
    }

    fn redo_changes(&mut self, groups: &[DeltaGroup], dont_select: bool) -> Option<Range> {
        if groups.is_empty() {
            return None;
        }
        self.from_undo = true;
        let mut last_range = None;
        for group in groups {
            if let DeltaGroup::Doc(deltas) = group {
                self.with_doc(|s, doc| {
                    doc.apply_deltas_with(deltas, &mut |d: &Document, delta: &Delta| {
                        s.on_change(d, delta)
                    })
                });
                last_range = undo_selection(deltas, false, last_range);
            }
        }
        self.from_undo = false;
        last_range.filter(|_| self.config.undo_select && !dont_select)
    }
}

/// Range covering what a replayed group of deltas touched, merged with `last_range` from the
/// groups replayed before it.
fn undo_selection(deltas: &[Delta], is_undo: bool, last_range: Option<Range>) -> Option<Range> {
    let Some(first) = deltas.first() else {
        return last_range;
    };
    let inserts = |delta: &Delta| delta.is_insert() != is_undo;

    let mut range = if inserts(first) {
        first.range()
    } else {
        Range::at(first.range().start)
    };
    for delta in &deltas[1..] {
        let r = delta.range();
        if inserts(delta) {
            if range.compare_point(r.start) == -1 {
                range.set_start(r.start.row, r.start.column);
            }
            if range.compare_point(r.end) == 1 {
                range.set_end(r.end.row, r.end.column);
            }
        } else if range.compare_point(r.start) == -1 {
            range = Range::at(r.start);
        }
    }

    if let Some(mut last) = last_range {
        if last.start == range.start {
            let shift = range.end.column as isize - range.start.column as isize;
            last.start.column = last.start.column.saturating_add_signed(shift);
            last.end.column = last.end.column.saturating_add_signed(shift);
        }
        match last.compare_range(&range) {
            1 => range.set_start(last.start.row, last.start.column),
            -1 => range.set_end(last.end.row, last.start.column),
            _ => {}
        }
    }
    Some(range)
}

/// Index of the last cached row `<= value`, or `-1`.
pub(crate) fn row_cache_index(cache: &[usize], value: usize) -> isize {
    cache.partition_point(|&row| row <= value) as isize - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FoldAction;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_row_cache_index() {
        let cache = [0, 3, 7];
        assert_eq!(row_cache_index(&cache, 0), 0);
        assert_eq!(row_cache_index(&cache, 5), 1);
        assert_eq!(row_cache_index(&cache, 9), 2);
        assert_eq!(row_cache_index(&[], 4), -1);
        assert_eq!(row_cache_index(&[2], 1), -1);
    }

    #[test]
    fn test_change_event_follows_cache_update() {
        let mut session = EditSession::new("abc\ndef");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        session.insert(Position::new(0, 1), "X");
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SessionEvent::Change(Delta::InsertText { text, .. }) if text == "X"));
        assert_eq!(session.line(0), "aXbc");
    }

    #[test]
    fn test_undo_restores_text_and_selects() {
        let mut session = EditSession::new("hello");
        session.insert(Position::new(0, 5), " world");
        session.mark_undo_group();
        assert!(session.has_undo());

        let range = session.undo(false);
        assert_eq!(session.value(), "hello");
        assert_eq!(range, Some(Range::new(0, 5, 0, 5)));

        let range = session.redo(false);
        assert_eq!(session.value(), "hello world");
        assert_eq!(range, Some(Range::new(0, 5, 0, 11)));
    }

    #[test]
    fn test_undo_select_off_returns_no_range() {
        let mut session = EditSession::new("a");
        session.set_undo_select(false);
        session.insert(Position::new(0, 1), "b");
        assert_eq!(session.undo(false), None);
        assert_eq!(session.value(), "a");
    }

    #[test]
    fn test_merge_undo_deltas_joins_groups() {
        let mut session = EditSession::new("");
        session.insert(Position::new(0, 0), "a");
        session.mark_undo_group();
        session.merge_undo_deltas();
        session.insert(Position::new(0, 1), "b");
        session.mark_undo_group();
        session.undo(true);
        assert_eq!(session.value(), "");
        assert!(!session.has_undo());
    }

    #[test]
    fn test_undo_restores_removed_fold() {
        let mut session = EditSession::new("abcdefgh\nsecond");
        session.add_fold("...", Range::new(0, 2, 0, 5)).unwrap();
        session.mark_undo_group();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        session.subscribe(move |event| {
            if let SessionEvent::ChangeFold { action, .. } = event {
                sink.lock().unwrap().push(*action);
            }
        });

        session.remove(Range::new(0, 1, 0, 6));
        assert!(session.all_folds().is_empty());
        session.undo(true);
        assert_eq!(session.value(), "abcdefgh\nsecond");
        let folds = session.all_folds();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].range(), Range::new(0, 2, 0, 5));
        assert_eq!(*events.lock().unwrap(), vec![FoldAction::Remove, FoldAction::Add]);
    }

    #[test]
    fn test_token_at() {
        let mut session = EditSession::new("hello world");
        let at = session.token_at(0, Some(3)).unwrap();
        assert_eq!(at.index, 0);
        assert_eq!(at.start, 0);
        assert_eq!(at.token.value, "hello world");
        assert!(session.token_at(0, Some(40)).is_none());
        assert_eq!(session.token_at(0, None).unwrap().token.kind, "text");
    }

    #[test]
    fn test_scroll_ignores_nan_and_repeats() {
        let mut session = EditSession::new("");
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        session.subscribe(move |_| *sink.lock().unwrap() += 1);
        session.set_scroll_top(10.0);
        session.set_scroll_top(10.0);
        session.set_scroll_top(f64::NAN);
        session.set_scroll_left(3.0);
        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(session.scroll_top(), 10.0);
    }

    #[test]
    fn test_set_value_resets_history() {
        let mut session = EditSession::new("one");
        session.insert(Position::new(0, 3), "!");
        session.set_value("two\nlines");
        assert_eq!(session.len(), 2);
        assert!(!session.has_undo());
    }

    #[test]
    fn test_soft_tabs_follow_mode() {
        let mut session = EditSession::new("");
        assert!(session.use_soft_tabs());
        session.set_mode(SessionMode::text().with_indent_with_tabs(true));
        assert!(!session.use_soft_tabs());
    }
}

//! Fold integration: the session's list of fold lines, fold widgets and the bookkeeping that
//! keeps folds aligned with document edits.
//!
//! Fold lines are kept sorted by start row and never overlap. Folds handed out by query
//! methods are snapshots; use their [`FoldId`] to act on them.

use super::EditSession;
use super::screen::fold_display_line;
use crate::background_tokenizer::RowSpan;
use crate::delta::Delta;
use crate::document::Document;
use crate::error::{Result, SessionError};
use crate::events::{FoldAction, SessionEvent};
use crate::fold::{Fold, FoldId};
use crate::fold_line::FoldLine;
use crate::mode::{FoldStyle, FoldWidget};
use crate::range::{Position, Range};
use crate::text::{char_head, char_slice, char_tail};

const DEFAULT_FOLD_DEPTH: usize = 100_000;

/// Which fold boundary a point lookup ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldSide {
    /// Any fold containing the point, boundaries included.
    #[default]
    Any,
    /// Skip a fold that ends exactly at the point.
    NotAtEnd,
    /// Skip a fold that starts exactly at the point.
    NotAtStart,
}

/// Part of the visible text around a point, for [`EditSession::fold_string_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSide {
    /// The whole visible segment.
    #[default]
    Whole,
    /// The segment up to the point.
    Before,
    /// The segment from the point on.
    After,
}

/// Modifiers for [`EditSession::toggle_fold_widget_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToggleFoldOptions {
    /// Fold or unfold the children of the block instead of the block itself.
    pub children: bool,
    /// Apply to every nesting level.
    pub all: bool,
    /// Fold the siblings of the block.
    pub siblings: bool,
}

/// Result of [`EditSession::parent_fold_range_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParentFoldRange {
    /// Innermost foldable range enclosing the row.
    pub range: Option<Range>,
    /// First foldable range met while scanning upward.
    pub first_range: Option<Range>,
}

impl EditSession {
    // ---- fold line lookup ----

    /// Every fold line, sorted by start row.
    pub fn fold_lines(&self) -> &[FoldLine] {
        &self.fold_data
    }

    /// Index of the fold line covering `row`, scanning from `from`.
    pub(crate) fn fold_line_index(&self, row: usize, from: usize) -> Option<usize> {
        for (i, fold_line) in self.fold_data.iter().enumerate().skip(from) {
            if fold_line.start().row <= row && fold_line.end().row >= row {
                return Some(i);
            }
            if fold_line.end().row > row {
                return None;
            }
        }
        None
    }

    /// Index of the first fold line ending at or after `row`, scanning from `from`.
    pub(crate) fn next_fold_line_index(&self, row: usize, from: usize) -> Option<usize> {
        (from..self.fold_data.len()).find(|&i| self.fold_data[i].end().row >= row)
    }

    /// The fold line covering `row`.
    pub fn fold_line(&self, row: usize) -> Option<&FoldLine> {
        self.fold_line_index(row, 0).map(|i| &self.fold_data[i])
    }

    /// The first fold line ending at or after `row`.
    pub fn next_fold_line(&self, row: usize) -> Option<&FoldLine> {
        self.next_fold_line_index(row, 0).map(|i| &self.fold_data[i])
    }

    // ---- fold queries ----

    /// The top-level fold containing `(row, column)`.
    pub fn fold_at(&self, row: usize, column: usize, side: FoldSide) -> Option<&Fold> {
        let fold_line = self.fold_line(row)?;
        fold_line.folds.iter().find(|fold| {
            let range = &fold.range;
            if !range.contains(row, column) {
                return false;
            }
            match side {
                FoldSide::NotAtEnd => !(range.is_end(row, column) && !range.is_empty()),
                FoldSide::NotAtStart => !(range.is_start(row, column) && !range.is_empty()),
                FoldSide::Any => true,
            }
        })
    }

    /// A top-level fold by id.
    pub fn fold(&self, id: FoldId) -> Option<&Fold> {
        self.locate_fold(id)
            .map(|(line, index)| &self.fold_data[line].folds[index])
    }

    fn locate_fold(&self, id: FoldId) -> Option<(usize, usize)> {
        self.fold_data.iter().enumerate().find_map(|(line, fold_line)| {
            fold_line
                .folds
                .iter()
                .position(|fold| fold.id == id)
                .map(|index| (line, index))
        })
    }

    /// Every top-level fold, in document order.
    pub fn all_folds(&self) -> Vec<&Fold> {
        self.fold_data
            .iter()
            .flat_map(|fold_line| fold_line.folds.iter())
            .collect()
    }

    /// Top-level folds overlapping `range`.
    ///
    /// The range is shrunk by one column at each end first, so folds that merely touch it are
    /// not included. A fold that contains the whole range ends the search.
    pub fn folds_in_range(&self, range: &Range) -> Vec<Fold> {
        let shrunk = ShrunkRange::new(range);
        let mut found = Vec::new();
        'lines: for fold_line in &self.fold_data {
            match shrunk.compared_by(&fold_line.range) {
                2 => continue,
                -2 => break,
                _ => {}
            }
            for fold in &fold_line.folds {
                match shrunk.compared_by(&fold.range) {
                    -2 | 42 => break 'lines,
                    2 => continue,
                    _ => found.push(fold.clone()),
                }
            }
        }
        found
    }

    /// [`EditSession::folds_in_range`] for several ranges.
    pub fn folds_in_ranges(&self, ranges: &[Range]) -> Vec<Fold> {
        ranges
            .iter()
            .flat_map(|range| self.folds_in_range(range))
            .collect()
    }

    /// Visible text of the segment of `row`'s fold line that contains `(row, column)`.
    ///
    /// Returns `None` when the row is not folded or the point is inside a fold.
    pub fn fold_string_at(&self, row: usize, column: usize, side: TextSide) -> Option<String> {
        let fold_line = self.fold_line(row)?;
        let mut last_end = 0;
        let mut text = None;
        for fold in &fold_line.folds {
            match fold.range.compare_end(row, column) {
                -1 => {
                    let line = self.doc.line(fold.start().row);
                    text = Some(char_slice(line, last_end, fold.start().column));
                    break;
                }
                0 => return None,
                _ => {}
            }
            last_end = fold.end().column;
        }
        let text = match text.filter(|t| !t.is_empty()) {
            Some(text) => text,
            None => char_tail(self.doc.line(fold_line.end().row), last_end),
        };
        let offset = column.saturating_sub(last_end);
        let text = match side {
            TextSide::Whole => text,
            TextSide::Before => char_head(text, offset),
            TextSide::After => char_tail(text, offset),
        };
        Some(text.to_string())
    }

    /// Rows of `first..=last` that are visible, counting each fold line once.
    pub fn folded_row_count(&self, first: usize, last: usize) -> usize {
        let mut count = (last + 1).saturating_sub(first) as isize;
        let (first, last) = (first as isize, last as isize);
        for fold_line in &self.fold_data {
            let start = fold_line.start().row as isize;
            let end = fold_line.end().row as isize;
            if end >= last {
                if start < last {
                    if start >= first {
                        count -= last - start;
                    } else {
                        count = 0;
                    }
                }
                break;
            } else if end >= first {
                if start >= first {
                    count -= end - start;
                } else {
                    count -= end - first + 1;
                }
            }
        }
        count.max(0) as usize
    }

    /// `true` if `row` is covered by a fold line.
    pub fn is_row_folded(&self, row: usize) -> bool {
        self.fold_line(row).is_some()
    }

    /// First row of the fold line covering `row`, or `row` itself.
    pub fn row_fold_start(&self, row: usize) -> usize {
        self.fold_line(row).map_or(row, |fl| fl.start().row)
    }

    /// Last row of the fold line covering `row`, or `row` itself.
    pub fn row_fold_end(&self, row: usize) -> usize {
        self.fold_line(row).map_or(row, |fl| fl.end().row)
    }

    /// Text shown for `row`: the fold line's display text if it is folded, else the row.
    ///
    /// `end_column` cuts the text at a column of `row`; `start` begins it at a document
    /// position.
    pub fn display_line(
        &self,
        row: usize,
        end_column: Option<usize>,
        start: Option<Position>,
    ) -> String {
        match self.fold_line(row) {
            None => {
                let line = self.doc.line(row);
                let from = start.map_or(0, |p| p.column);
                let to = end_column.unwrap_or_else(|| self.doc.line_len(row));
                char_slice(line, from, to).to_string()
            }
            Some(fold_line) => {
                let end = end_column.map(|column| Position::new(row, column));
                fold_display_line(&self.doc, fold_line, end, start)
            }
        }
    }

    /// Display text of a whole fold line.
    pub fn fold_display_line(&self, fold_line: &FoldLine) -> String {
        fold_display_line(&self.doc, fold_line, None, None)
    }

    /// Copy of every fold line, for saving and restoring fold state.
    pub fn clone_fold_data(&self) -> Vec<FoldLine> {
        self.fold_data.clone()
    }

    // ---- adding and removing ----

    /// Fold `range` behind `placeholder`.
    pub fn add_fold(&mut self, placeholder: &str, range: Range) -> Result<FoldId> {
        self.insert_fold(Fold::new(range, placeholder))
    }

    /// Add a prepared fold (its sub-folds and collapse depth are kept). Returns the id of the
    /// fold that now represents it, which is an existing fold's id when the range matches one.
    pub fn insert_fold(&mut self, mut fold: Fold) -> Result<FoldId> {
        fold.range = self.clip_range_to_document(&fold.range);
        let (start, end) = (fold.start(), fold.end());
        let wide_enough =
            start.row < end.row || (start.row == end.row && start.column + 2 <= end.column);
        if !wide_enough {
            return Err(SessionError::FoldTooSmall { range: fold.range });
        }
        // Claimed only once the fold is accepted.
        let new_id = FoldId(self.next_fold_id + 1);
        fold.id = new_id;

        let start_fold = self.fold_at(start.row, start.column, FoldSide::NotAtEnd).map(Fold::id);
        let end_fold = self.fold_at(end.row, end.column, FoldSide::NotAtStart).map(Fold::id);
        if let (Some(a), Some(b)) = (start_fold, end_fold)
            && a == b
        {
            let (line, index) = self.locate_fold(a).ok_or(SessionError::UnknownFold(a))?;
            let id = self.fold_data[line].folds[index].add_sub_fold(fold)?;
            if id == new_id {
                self.next_fold_id += 1;
            }
            tracing::debug!(?id, "nested fold");
            return Ok(id);
        }
        for (existing, at_start) in [(start_fold, true), (end_fold, false)] {
            let Some(existing) = existing.and_then(|id| self.fold(id)) else {
                continue;
            };
            let on_boundary = if at_start {
                existing.range.is_start(start.row, start.column)
            } else {
                existing.range.is_end(end.row, end.column)
            };
            if !on_boundary {
                return Err(SessionError::FoldIntersects {
                    range: fold.range,
                    existing: existing.range,
                });
            }
        }

        let inner = self.folds_in_range(&fold.range);
        if !inner.is_empty() {
            let mut nested = fold.clone();
            for sub in &inner {
                nested.add_sub_fold(sub.clone())?;
            }
            self.remove_folds(&inner);
            fold = nested;
        }
        self.next_fold_id += 1;

        let added = fold.clone();
        let same_row = fold.is_same_row();
        let mut target = None;
        for i in 0..self.fold_data.len() {
            let fold_line = &mut self.fold_data[i];
            if end.row == fold_line.start().row {
                fold_line.add_fold(fold.clone())?;
                target = Some(i);
                break;
            } else if start.row == fold_line.end().row {
                fold_line.add_fold(fold.clone())?;
                target = Some(i);
                if !same_row
                    && let Some(next) = self.fold_data.get(i + 1)
                    && next.start().row == end.row
                {
                    let next = self.fold_data.remove(i + 1);
                    self.fold_data[i].merge(next)?;
                }
                break;
            } else if end.row <= fold_line.start().row {
                break;
            }
        }
        let line_index = match target {
            Some(i) => i,
            None => {
                let at = self.fold_data.partition_point(|fl| fl.start().row < start.row);
                self.fold_data.insert(at, FoldLine::new(vec![fold]));
                at
            }
        };

        let first_row = self.fold_data[line_index].start().row;
        self.refresh_rows(first_row, first_row);
        self.modified = true;
        tracing::debug!(fold = %added, "add fold");
        let id = added.id;
        self.fold_changed(added, FoldAction::Add);
        Ok(id)
    }

    /// Add several prepared folds, stopping at the first failure.
    pub fn add_folds(&mut self, folds: Vec<Fold>) -> Result<()> {
        for fold in folds {
            self.insert_fold(fold)?;
        }
        Ok(())
    }

    /// Remove a top-level fold without restoring its sub-folds.
    pub fn remove_fold(&mut self, id: FoldId) -> Result<Fold> {
        let (line, index) = self.locate_fold(id).ok_or(SessionError::UnknownFold(id))?;
        let (fold, first_row, last_row) = self.detach_fold(line, index);
        self.refresh_rows(first_row, last_row);
        self.modified = true;
        tracing::debug!(fold = %fold, "remove fold");
        self.fold_changed(fold.clone(), FoldAction::Remove);
        Ok(fold)
    }

    /// Remove several top-level folds. Folds that are already gone are skipped.
    pub fn remove_folds(&mut self, folds: &[Fold]) {
        for fold in folds {
            if let Err(err) = self.remove_fold(fold.id) {
                tracing::debug!(%err, "fold already removed");
            }
        }
    }

    /// Remove folds as part of a document change. The caller refreshes the row caches.
    fn remove_folds_silently(&mut self, folds: &[Fold]) {
        for fold in folds {
            let Some((line, index)) = self.locate_fold(fold.id) else {
                continue;
            };
            let (fold, _, _) = self.detach_fold(line, index);
            self.modified = true;
            self.fold_changed(fold, FoldAction::Remove);
        }
    }

    /// Take a fold out of its fold line, shrinking or splitting the line. Returns the fold and
    /// the row span the line covered before.
    fn detach_fold(&mut self, line: usize, index: usize) -> (Fold, usize, usize) {
        let fold_line = &mut self.fold_data[line];
        let (first_row, last_row) = (fold_line.start().row, fold_line.end().row);
        let fold = fold_line.folds[index].clone();

        if fold_line.folds.len() == 1 {
            self.fold_data.remove(line);
        } else if fold_line.range.is_end(fold.end().row, fold.end().column) {
            fold_line.folds.pop();
            if let Some(last) = fold_line.folds.last() {
                fold_line.range.end = last.end();
            }
        } else if fold_line.range.is_start(fold.start().row, fold.start().column) {
            fold_line.folds.remove(0);
            if let Some(first) = fold_line.folds.first() {
                fold_line.range.start = first.start();
            }
        } else if fold.is_same_row() {
            fold_line.folds.remove(index);
        } else {
            match fold_line.split(fold.start().row, fold.start().column) {
                Some(mut tail) => {
                    tail.folds.remove(0);
                    if let Some(first) = tail.folds.first() {
                        tail.range.start = first.start();
                    }
                    self.fold_data.insert(line + 1, tail);
                }
                None => tracing::warn!(fold = %fold, "fold line could not be split"),
            }
        }
        (fold, first_row, last_row)
    }

    fn fold_changed(&mut self, fold: Fold, action: FoldAction) {
        self.reset_row_cache(fold.start().row);
        self.emit(SessionEvent::ChangeFold { fold, action });
    }

    /// Remove a fold and bring back its sub-folds as top-level folds. A fold with a collapse
    /// depth re-folds its inner blocks that many levels deep.
    pub fn expand_fold(&mut self, id: FoldId) -> Result<()> {
        let fold = self.remove_fold(id)?;
        for sub in fold.restored_sub_folds() {
            self.insert_fold(sub)?;
        }
        if fold.collapse_children > 0 {
            self.fold_all(
                Some(fold.start().row + 1),
                Some(fold.end().row),
                Some(fold.collapse_children - 1),
            );
        }
        Ok(())
    }

    /// Expand several folds, stopping at the first failure.
    pub fn expand_folds(&mut self, folds: &[Fold]) -> Result<()> {
        for fold in folds {
            self.expand_fold(fold.id)?;
        }
        Ok(())
    }

    /// Unfold everything inside `location` (the whole document for `None`).
    ///
    /// With `expand_inner` the folds and everything nested in them disappear at once;
    /// otherwise folds are expanded level by level until none is left in the range. Returns
    /// the outermost folds that were there.
    pub fn unfold(&mut self, location: Option<Range>, expand_inner: bool) -> Vec<Fold> {
        let range = location.unwrap_or_else(|| Range::new(0, 0, self.doc.len(), 0));
        let folds = self.folds_in_range(&range);
        if expand_inner {
            self.remove_folds(&folds);
        } else {
            let mut level = folds.clone();
            while !level.is_empty() {
                if let Err(err) = self.expand_folds(&level) {
                    tracing::warn!(%err, "unfold stopped");
                    break;
                }
                level = self.folds_in_range(&range);
            }
        }
        folds
    }

    /// Unfold every fold on `row`.
    pub fn unfold_row(&mut self, row: usize, expand_inner: bool) -> Vec<Fold> {
        let range = Range::new(row, 0, row, self.doc.line_len(row));
        self.unfold(Some(range), expand_inner)
    }

    /// Fold or unfold `range`, typically the selection.
    ///
    /// An empty range expands the fold at that point. A range that covers folds expands them
    /// when `try_to_unfold` is set. A range equal to an existing fold expands it. Otherwise the
    /// range is folded; a single-row range needs at least four characters and is shown as its
    /// first two characters followed by `..`.
    pub fn toggle_fold(&mut self, range: Range, try_to_unfold: bool) -> Result<()> {
        let mut fold = None;
        if range.is_empty() {
            if let Some(id) = self
                .fold_at(range.start.row, range.start.column, FoldSide::Any)
                .map(Fold::id)
            {
                return self.expand_fold(id);
            }
        } else {
            let folds = self.folds_in_range(&range);
            if try_to_unfold && !folds.is_empty() {
                return self.expand_folds(&folds);
            }
            if folds.len() == 1 {
                fold = Some((folds[0].id, folds[0].range));
            }
        }
        if fold.is_none() {
            fold = self
                .fold_at(range.start.row, range.start.column, FoldSide::Any)
                .map(|f| (f.id, f.range));
        }
        if let Some((id, fold_range)) = fold
            && fold_range == range
        {
            return self.expand_fold(id);
        }

        let placeholder = if range.is_multi_line() {
            "...".to_string()
        } else {
            let text = self.doc.text_range(&range);
            if text.chars().count() < 4 {
                return Ok(());
            }
            let head: String = text.trim().chars().take(2).collect();
            format!("{head}..")
        };
        self.add_fold(&placeholder, range).map(|_| ())
    }

    // ---- fold widgets ----

    /// The configured fold style.
    pub fn fold_style(&self) -> FoldStyle {
        self.config.fold_style
    }

    /// Change the fold style. Switching to manual unfolds everything.
    pub fn set_fold_style(&mut self, style: FoldStyle) -> Result<()> {
        if style == FoldStyle::All {
            return Err(SessionError::InvalidFoldStyle(style.to_string()));
        }
        if style == self.config.fold_style {
            return Ok(());
        }
        self.config.fold_style = style;
        if style == FoldStyle::Manual {
            self.unfold(None, true);
        }
        self.reset_folding();
        Ok(())
    }

    /// Drop the widget cache and re-enable it if the mode can fold in the current style.
    pub(crate) fn reset_folding(&mut self) {
        let enabled = self.mode.folding().is_some() && self.config.fold_style != FoldStyle::Manual;
        self.fold_widgets = enabled.then(Vec::new);
        self.emit(SessionEvent::ChangeAnnotation);
    }

    /// Widget for `row`, asking the folding mode when the cache has no answer.
    pub fn fold_widget(&mut self, row: usize) -> FoldWidget {
        if let Some(Some(widget)) = self.fold_widgets.as_ref().and_then(|w| w.get(row)) {
            return *widget;
        }
        if self.fold_widgets.is_none() || row >= self.doc.len() {
            return FoldWidget::Empty;
        }
        let Some(folding) = self.mode.folding().cloned() else {
            return FoldWidget::Empty;
        };
        let widget = folding.fold_widget(self, self.config.fold_style, row);
        if let Some(widgets) = self.fold_widgets.as_mut() {
            if widgets.len() <= row {
                widgets.resize(row + 1, None);
            }
            widgets[row] = Some(widget);
        }
        widget
    }

    /// Cached widget for `row`, without asking the folding mode.
    pub fn cached_fold_widget(&self, row: usize) -> Option<FoldWidget> {
        self.fold_widgets.as_ref()?.get(row).copied().flatten()
    }

    /// Range the widget on `row` would fold.
    pub fn fold_widget_range(&self, row: usize, force_multiline: bool) -> Option<Range> {
        let folding = self.mode.folding()?;
        folding.fold_widget_range(self, self.config.fold_style, row, force_multiline)
    }

    /// Fold every block that starts in `start_row..end_row` (the whole document by default),
    /// marking each new fold to re-fold `depth` levels of children when expanded.
    pub fn fold_all(&mut self, start_row: Option<usize>, end_row: Option<usize>, depth: Option<usize>) {
        if self.mode.folding().is_none() || self.fold_widgets.is_none() {
            return;
        }
        let depth = depth.unwrap_or(DEFAULT_FOLD_DEPTH);
        let start_row = start_row.unwrap_or(0);
        let end_row = end_row.filter(|&r| r != 0).unwrap_or(self.doc.len());

        let mut row = start_row;
        while row < end_row {
            if self.fold_widget(row) != FoldWidget::Start {
                row += 1;
                continue;
            }
            if let Some(range) = self.fold_widget_range(row, false)
                && range.is_multi_line()
                && range.end.row <= end_row
                && range.start.row >= start_row
            {
                row = range.end.row;
                let fold = Fold::new(range, "...").with_collapse_children(depth);
                if let Err(err) = self.insert_fold(fold) {
                    tracing::debug!(%err, "fold_all skipped a range");
                }
            }
            row += 1;
        }
    }

    /// The innermost foldable block enclosing `row`, found by scanning widgets upward.
    ///
    /// With `ignore_current`, a row that has a widget of its own yields nothing.
    pub fn parent_fold_range_data(&mut self, row: usize, ignore_current: bool) -> ParentFoldRange {
        let mut data = ParentFoldRange::default();
        if self.fold_widgets.is_none() {
            return data;
        }
        if ignore_current
            && matches!(
                self.cached_fold_widget(row),
                Some(FoldWidget::Start | FoldWidget::End)
            )
        {
            return data;
        }

        let mut range = None;
        let mut found = false;
        for i in (0..row).rev() {
            if self.fold_widget(i) != FoldWidget::Start {
                continue;
            }
            range = self.fold_widget_range(i, false);
            if data.first_range.is_none() {
                data.first_range = range;
            }
            if range.is_some_and(|r| r.end.row >= row) {
                found = true;
                break;
            }
        }
        if found {
            data.range = range;
        }
        data
    }

    /// Act on the fold widget of `row`: expand or remove an existing fold there, or fold the
    /// block (its children or its siblings, per `options`). Returns the range that was
    /// unfolded or folded, or `None` when the row offered nothing to act on.
    pub fn toggle_fold_widget_at(
        &mut self,
        row: usize,
        options: ToggleFoldOptions,
    ) -> Result<Option<Range>> {
        if self.mode.folding().is_none() || self.fold_widgets.is_none() {
            return Ok(None);
        }
        let widget = self.fold_widget(row);
        let (column, side) = if widget == FoldWidget::End {
            (0, FoldSide::NotAtStart)
        } else {
            (self.doc.line_len(row), FoldSide::NotAtEnd)
        };

        if let Some((id, range)) = self.fold_at(row, column, side).map(|f| (f.id, f.range)) {
            if options.children || options.all {
                self.remove_fold(id)?;
            } else {
                self.expand_fold(id)?;
            }
            return Ok(Some(range));
        }

        let range = self.fold_widget_range(row, true);
        if let Some(r) = range
            && !r.is_multi_line()
            && let Some(fold) = self.fold_at(r.start.row, r.start.column, FoldSide::NotAtEnd)
            && fold.range == r
        {
            let id = fold.id;
            self.remove_fold(id)?;
            return Ok(Some(r));
        }

        let depth = if options.all { 10_000 } else { 0 };
        if options.siblings {
            let data = self.parent_fold_range_data(row, false);
            match data.range {
                Some(parent) => self.fold_all(
                    Some(parent.start.row + 1),
                    Some(parent.end.row),
                    Some(depth),
                ),
                None => self.fold_all(None, None, Some(depth)),
            }
        } else if options.children {
            let end_row = range.map_or(self.doc.len(), |r| r.end.row);
            self.fold_all(Some(row + 1), Some(end_row), Some(depth));
        } else if let Some(r) = range {
            self.insert_fold(Fold::new(r, "...").with_collapse_children(depth))?;
        }
        Ok(range)
    }

    /// Toggle the fold that applies to the cursor on `row`: the row's own widget, else the
    /// enclosing block.
    pub fn toggle_fold_widget(&mut self, row: usize) -> Result<()> {
        let row = self.row_fold_start(row);
        if self
            .toggle_fold_widget_at(row, ToggleFoldOptions::default())?
            .is_some()
        {
            return Ok(());
        }
        let data = self.parent_fold_range_data(row, true);
        let Some(range) = data.range.or(data.first_range) else {
            return Ok(());
        };
        let row = range.start.row;
        let column = self.doc.line_len(row);
        match self.fold_at(row, column, FoldSide::NotAtEnd).map(Fold::id) {
            Some(id) => {
                self.remove_fold(id)?;
            }
            None => {
                self.add_fold("...", range)?;
            }
        }
        Ok(())
    }

    /// Keep the widget cache aligned with a document change.
    pub(crate) fn update_fold_widgets(&mut self, delta: &Delta) {
        let Some(widgets) = self.fold_widgets.as_mut() else {
            return;
        };
        let range = delta.range();
        let first = range.start.row;
        let len = range.end.row - first;
        if len == 0 {
            if let Some(slot) = widgets.get_mut(first) {
                *slot = None;
            }
        } else if delta.is_insert() {
            splice(widgets, first, 1, len + 1);
        } else {
            splice(widgets, first, len + 1, 1);
        }
    }

    /// Forget cached widgets of rows the tokenizer just refreshed.
    pub(crate) fn invalidate_fold_widgets(&mut self, span: RowSpan) {
        if let Some(widgets) = self.fold_widgets.as_mut() {
            let last = (span.last + 1).min(widgets.len());
            for slot in widgets.iter_mut().take(last).skip(span.first) {
                *slot = None;
            }
        }
    }

    // ---- document changes ----

    /// Shift, split, merge and drop folds for `delta` and refresh the wrap data or row widths
    /// of the touched rows. Returns the folds the change swallowed.
    pub(crate) fn update_internal_data_on_change(&mut self, doc: &Document, delta: &Delta) -> Vec<Fold> {
        let use_wrap = self.config.use_wrap_mode;
        let range = delta.range();
        let (start, end) = (range.start, range.end);
        let first_row = start.row;
        let mut last_row = end.row;
        let len = end.row - start.row;
        let is_insert = delta.is_insert();

        let removed = self.folds_touched_by(delta);
        self.remove_folds_silently(&removed);

        if len != 0 {
            if !is_insert {
                if use_wrap {
                    splice(&mut self.wrap_data, first_row, len, 0);
                } else {
                    splice(&mut self.row_width_cache, first_row, len, 0);
                }

                let mut next = 0;
                if let Some(mut index) = self.fold_line_index(end.row, 0) {
                    let shift = start.column as isize - end.column as isize;
                    self.fold_data[index].add_remove_chars(end.row, end.column, shift);
                    self.fold_data[index].shift_row(-(len as isize));
                    if let Some(before) = self.fold_line_index(first_row, 0)
                        && before != index
                    {
                        let merged = self.fold_data.remove(index);
                        if let Err(err) = self.fold_data[before].merge(merged) {
                            tracing::warn!(%err, "fold lines could not be merged");
                        }
                        index = before;
                    }
                    next = index + 1;
                }
                for fold_line in &mut self.fold_data[next..] {
                    if fold_line.start().row >= end.row {
                        fold_line.shift_row(-(len as isize));
                    }
                }
                last_row = first_row;
            } else {
                if use_wrap {
                    splice(&mut self.wrap_data, first_row, 0, len);
                } else {
                    splice(&mut self.row_width_cache, first_row, 0, len);
                }

                let mut next = 0;
                if let Some(mut index) = self.fold_line_index(first_row, 0) {
                    let shift = end.column as isize - start.column as isize;
                    match self.fold_data[index].range.compare_inside(start.row, start.column) {
                        0 => match self.fold_data[index].split(start.row, start.column) {
                            Some(mut tail) => {
                                tail.shift_row(len as isize);
                                tail.add_remove_chars(last_row, 0, shift);
                                if self.fold_data[index].folds.is_empty() {
                                    self.fold_data[index] = tail;
                                } else {
                                    index += 1;
                                    self.fold_data.insert(index, tail);
                                }
                            }
                            None => tracing::warn!(
                                row = start.row,
                                column = start.column,
                                "fold line could not be split"
                            ),
                        },
                        -1 => {
                            self.fold_data[index].add_remove_chars(first_row, 0, shift);
                            self.fold_data[index].shift_row(len as isize);
                        }
                        _ => {}
                    }
                    next = index + 1;
                }
                for fold_line in &mut self.fold_data[next..] {
                    if fold_line.start().row >= first_row {
                        fold_line.shift_row(len as isize);
                    }
                }
            }
        } else {
            let width = start.column.abs_diff(end.column) as isize;
            let shift = if is_insert { width } else { -width };
            if let Some(index) = self.fold_line_index(first_row, 0) {
                self.fold_data[index].add_remove_chars(first_row, start.column, shift);
            }
        }

        if use_wrap {
            if self.wrap_data.len() != doc.len() {
                tracing::error!(
                    wrap_rows = self.wrap_data.len(),
                    doc_rows = doc.len(),
                    "wrap data out of step with the document"
                );
            }
            self.update_wrap_data(doc, first_row, last_row);
        } else {
            self.update_row_length_cache(first_row, last_row);
        }
        removed
    }

    /// Folds a change cannot keep: folds overlapping removed text and folds with the edit point
    /// strictly inside them.
    fn folds_touched_by(&self, delta: &Delta) -> Vec<Fold> {
        let range = delta.range();
        let is_insert = delta.is_insert();
        let mut folds = if is_insert {
            Vec::new()
        } else {
            self.folds_in_range(&range)
        };
        for fold in self.fold_data.iter().flat_map(|fl| fl.folds.iter()) {
            let hit = fold.range.inside(range.start.row, range.start.column)
                || (!is_insert && fold.range.inside(range.end.row, range.end.column));
            if hit && !folds.iter().any(|f| f.id == fold.id) {
                folds.push(fold.clone());
            }
        }
        folds
    }
}

/// Replace `remove` entries at `at` with `insert` default entries. Positions past the end of
/// a lazily filled cache are left alone.
fn splice<T: Clone + Default>(cache: &mut Vec<T>, at: usize, remove: usize, insert: usize) {
    if at > cache.len() {
        return;
    }
    let end = (at + remove).min(cache.len());
    cache.splice(at..end, std::iter::repeat_n(T::default(), insert));
}

/// A range shrunk by one column at each end, with signed columns so an empty range can turn
/// "inside out".
struct ShrunkRange {
    start: (usize, isize),
    end: (usize, isize),
}

impl ShrunkRange {
    fn new(range: &Range) -> Self {
        Self {
            start: (range.start.row, signed(range.start.column).saturating_add(1)),
            end: (range.end.row, signed(range.end.column) - 1),
        }
    }

    /// `other.compare_range(self)`, with the same six codes.
    fn compared_by(&self, other: &Range) -> i32 {
        let cmp = compare_signed(other, self.end);
        if cmp == 1 {
            match compare_signed(other, self.start) {
                1 => 2,
                0 => 1,
                _ => 0,
            }
        } else if cmp == -1 {
            -2
        } else {
            match compare_signed(other, self.start) {
                -1 => -1,
                1 => 42,
                _ => 0,
            }
        }
    }
}

fn signed(column: usize) -> isize {
    isize::try_from(column).unwrap_or(isize::MAX)
}

/// [`Range::compare`] for a point whose column may be negative.
fn compare_signed(range: &Range, (row, column): (usize, isize)) -> i32 {
    let start_column = signed(range.start.column);
    let end_column = signed(range.end.column);
    if range.is_multi_line() {
        if row < range.start.row {
            return -1;
        }
        if row > range.end.row {
            return 1;
        }
        if row == range.start.row {
            return if column >= start_column { 0 } else { -1 };
        }
        if row == range.end.row {
            return if column <= end_column { 0 } else { 1 };
        }
        return 0;
    }
    if row < range.start.row {
        return -1;
    }
    if row > range.end.row {
        return 1;
    }
    if column < start_column {
        return -1;
    }
    if column > end_column {
        return 1;
    }
    0
}

//! Folding modes that need no grammar.

use crate::error::ModeError;
use edit_session::{EditSession, FoldStyle, FoldWidget, FoldingMode, Range, indentation_block};
use regex::Regex;

/// Folds blocks of rows indented deeper than the row above them.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentFoldMode;

fn indent_of(line: &str) -> Option<usize> {
    line.chars().position(|c| !c.is_whitespace())
}

/// Indentation of the next non-blank row after `row`.
fn next_indent(session: &EditSession, row: usize) -> Option<usize> {
    (row + 1..session.len()).find_map(|r| indent_of(session.line(r)))
}

impl FoldingMode for IndentFoldMode {
    fn fold_widget(&self, session: &EditSession, _style: FoldStyle, row: usize) -> FoldWidget {
        match (indent_of(session.line(row)), next_indent(session, row)) {
            (Some(indent), Some(next)) if next > indent => FoldWidget::Start,
            _ => FoldWidget::Empty,
        }
    }

    fn fold_widget_range(
        &self,
        session: &EditSession,
        _style: FoldStyle,
        row: usize,
        _force_multiline: bool,
    ) -> Option<Range> {
        indentation_block(session, row, None)
    }
}

/// Folds between rows matching a start marker and rows matching a stop marker.
///
/// Start and stop markers nest. A start row without a matching stop row folds its indentation
/// block instead. A row that matches both markers (`} else {`) closes one block and opens the
/// next.
#[derive(Debug, Clone)]
pub struct MarkerFoldMode {
    start: Regex,
    stop: Option<Regex>,
}

impl MarkerFoldMode {
    /// Markers as regexes. Without `stop`, every start row folds its indentation block.
    pub fn new(start: &str, stop: Option<&str>) -> Result<Self, ModeError> {
        Ok(Self {
            start: Regex::new(start)?,
            stop: stop.map(Regex::new).transpose()?,
        })
    }

    /// Brace blocks: `{`/`[` ending a row, `}`/`]` before any opening brace on a row.
    pub fn braces() -> Result<Self, ModeError> {
        Self::new(r"([\{\[])[^\}\]]*$", Some(r"^[^\{\[]*([\}\]])"))
    }

    /// Column where a fold opened on `line` begins: after the first capture group of the start
    /// marker, or after the whole match.
    fn start_column(&self, line: &str) -> Option<usize> {
        let caps = self.start.captures(line)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        Some(line[..m.end()].chars().count())
    }

    /// Column where a fold closed on `line` ends: at the first capture group of the stop
    /// marker, or at the start of the whole match.
    fn stop_column(&self, line: &str) -> Option<usize> {
        let caps = self.stop.as_ref()?.captures(line)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        Some(line[..m.start()].chars().count())
    }

    /// Range from the start marker on `row` to its matching stop marker.
    fn block_after(&self, session: &EditSession, row: usize) -> Option<Range> {
        let start_column = self.start_column(session.line(row))?;
        if self.stop.is_some() {
            let mut depth = 1usize;
            for next in row + 1..session.len() {
                let text = session.line(next);
                if let Some(end_column) = self.stop_column(text) {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Range::new(row, start_column, next, end_column));
                    }
                }
                if self.start.is_match(text) {
                    depth += 1;
                }
            }
        }
        indentation_block(session, row, Some(start_column))
    }

    /// Range from the start marker that `row`'s stop marker closes to that stop marker.
    fn block_before(&self, session: &EditSession, row: usize) -> Option<Range> {
        let end_column = self.stop_column(session.line(row))?;
        let mut depth = 1usize;
        for prev in (0..row).rev() {
            let text = session.line(prev);
            if let Some(start_column) = self.start_column(text) {
                depth -= 1;
                if depth == 0 {
                    return Some(Range::new(prev, start_column, row, end_column));
                }
            }
            if self.stop_column(text).is_some() {
                depth += 1;
            }
        }
        None
    }
}

impl FoldingMode for MarkerFoldMode {
    fn fold_widget(&self, session: &EditSession, style: FoldStyle, row: usize) -> FoldWidget {
        let line = session.line(row);
        if self.start.is_match(line) {
            return FoldWidget::Start;
        }
        if style == FoldStyle::MarkBeginEnd && self.stop_column(line).is_some() {
            return FoldWidget::End;
        }
        FoldWidget::Empty
    }

    fn fold_widget_range(
        &self,
        session: &EditSession,
        _style: FoldStyle,
        row: usize,
        force_multiline: bool,
    ) -> Option<Range> {
        let line = session.line(row);
        let range = if self.start.is_match(line) {
            self.block_after(session, row)
        } else {
            self.block_before(session, row)
        }?;
        if force_multiline && !range.is_multi_line() {
            return indentation_block(session, row, None);
        }
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn session_with(text: &str, folding: impl FoldingMode + 'static) -> EditSession {
        let mut session = EditSession::new(text);
        let mode = edit_session::SessionMode::text().with_folding(Arc::new(folding));
        session.set_mode(mode);
        session
    }

    const PYTHONISH: &str = "def f():\n    a = 1\n\n    return a\nprint(f())";

    #[test]
    fn test_indent_widgets() {
        let s = session_with(PYTHONISH, IndentFoldMode);
        let widgets: Vec<_> = (0..s.len())
            .map(|row| IndentFoldMode.fold_widget(&s, FoldStyle::MarkBegin, row))
            .collect();
        assert_eq!(
            widgets,
            vec![
                FoldWidget::Start,
                FoldWidget::Empty,
                FoldWidget::Empty,
                FoldWidget::Empty,
                FoldWidget::Empty,
            ]
        );
    }

    #[test]
    fn test_indent_range_skips_blank_rows() {
        let s = session_with(PYTHONISH, IndentFoldMode);
        assert_eq!(
            IndentFoldMode.fold_widget_range(&s, FoldStyle::MarkBegin, 0, false),
            Some(Range::new(0, 8, 3, 12))
        );
    }

    #[test]
    fn test_session_folds_through_indent_mode() {
        let mut s = session_with(PYTHONISH, IndentFoldMode);
        assert_eq!(s.fold_widget(0), FoldWidget::Start);
        s.toggle_fold_widget(0).unwrap();
        assert!(s.is_row_folded(2));
        assert_eq!(s.screen_length(), 2);
    }

    const BRACES: &str = "fn main() {\n    if x {\n        y();\n    }\n}";

    #[test]
    fn test_brace_widgets() {
        let mode = MarkerFoldMode::braces().unwrap();
        let s = session_with(BRACES, mode.clone());
        assert_eq!(mode.fold_widget(&s, FoldStyle::MarkBegin, 0), FoldWidget::Start);
        assert_eq!(mode.fold_widget(&s, FoldStyle::MarkBegin, 3), FoldWidget::Empty);
        assert_eq!(mode.fold_widget(&s, FoldStyle::MarkBeginEnd, 3), FoldWidget::End);
    }

    #[test]
    fn test_brace_ranges_nest() {
        let mode = MarkerFoldMode::braces().unwrap();
        let s = session_with(BRACES, mode.clone());
        assert_eq!(
            mode.fold_widget_range(&s, FoldStyle::MarkBegin, 0, false),
            Some(Range::new(0, 11, 4, 0))
        );
        assert_eq!(
            mode.fold_widget_range(&s, FoldStyle::MarkBegin, 1, false),
            Some(Range::new(1, 10, 3, 4))
        );
        assert_eq!(
            mode.fold_widget_range(&s, FoldStyle::MarkBeginEnd, 4, false),
            Some(Range::new(0, 11, 4, 0))
        );
    }

    #[test]
    fn test_unclosed_marker_falls_back_to_indentation() {
        let mode = MarkerFoldMode::braces().unwrap();
        let s = session_with("a {\n    b\nc", mode.clone());
        assert_eq!(
            mode.fold_widget_range(&s, FoldStyle::MarkBegin, 0, false),
            Some(Range::new(0, 3, 1, 5))
        );
    }

    #[test]
    fn test_start_only_markers() {
        let mode = MarkerFoldMode::new(r"^#region", None).unwrap();
        let s = session_with("#region\n  x\n  y\nz", mode.clone());
        assert_eq!(
            mode.fold_widget_range(&s, FoldStyle::MarkBegin, 0, false),
            Some(Range::new(0, 7, 2, 3))
        );
        assert!(MarkerFoldMode::new("(", None).is_err());
    }
}

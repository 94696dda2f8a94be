//! The plain text mode and the behaviour every mode shares.

use crate::error::ModeError;
use crate::rules::HighlightRules;
use edit_session::{EditSession, FoldingMode, Position, Range, SessionMode};
use std::sync::Arc;

/// Mode id of plain text.
pub const TEXT_MODE_ID: &str = "mode/text";

/// A language mode: highlight rules, comment syntax and an optional folding mode.
///
/// The default is plain text with no comments and no folding.
#[derive(Clone)]
pub struct TextMode {
    id: String,
    rules: HighlightRules,
    line_comment_start: Vec<String>,
    folding: Option<Arc<dyn FoldingMode>>,
    indent_with_tabs: bool,
}

impl std::fmt::Debug for TextMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextMode")
            .field("id", &self.id)
            .field("line_comment_start", &self.line_comment_start)
            .field("folding", &self.folding.is_some())
            .finish()
    }
}

impl Default for TextMode {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMode {
    /// Plain text.
    pub fn new() -> Self {
        Self {
            id: TEXT_MODE_ID.to_string(),
            rules: HighlightRules::text(),
            line_comment_start: Vec::new(),
            folding: None,
            indent_with_tabs: false,
        }
    }

    /// Rename the mode.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the highlight rules.
    pub fn with_rules(mut self, rules: HighlightRules) -> Self {
        self.rules = rules;
        self
    }

    /// Line comment markers. The first one is inserted when commenting; all of them are
    /// recognised when uncommenting.
    pub fn with_line_comment(mut self, markers: &[&str]) -> Self {
        self.line_comment_start = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Attach a folding mode.
    pub fn with_folding(mut self, folding: impl FoldingMode + 'static) -> Self {
        self.folding = Some(Arc::new(folding));
        self
    }

    /// Force hard tabs while the mode is active.
    pub fn with_indent_with_tabs(mut self, indent_with_tabs: bool) -> Self {
        self.indent_with_tabs = indent_with_tabs;
        self
    }

    /// Mode id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Highlight rules.
    pub fn rules(&self) -> &HighlightRules {
        &self.rules
    }

    /// Compile the rules and package everything the session needs.
    pub fn session_mode(&self) -> Result<SessionMode, ModeError> {
        let tokenizer = self.rules.build()?;
        let mut mode = SessionMode::new(self.id.clone(), tokenizer)
            .with_indent_with_tabs(self.indent_with_tabs);
        if let Some(folding) = &self.folding {
            mode = mode.with_folding(folding.clone());
        }
        Ok(mode)
    }

    /// Indentation for the row after `line`: the same as `line`.
    pub fn next_line_indent<'a>(&self, line: &'a str) -> &'a str {
        let end = line.len() - line.trim_start().len();
        &line[..end]
    }

    /// Comment rows `start_row..=end_row`, or uncomment them if every non-blank row already
    /// starts with a comment marker. Returns `false` if the mode has no line comments.
    ///
    /// Markers go at the smallest indentation of the block, snapped down to a tab stop when soft
    /// tabs are on. Blank rows are left alone unless the whole block is blank.
    pub fn toggle_comment_lines(
        &self,
        session: &mut EditSession,
        start_row: usize,
        end_row: usize,
    ) -> bool {
        let Some(marker) = self.line_comment_start.first() else {
            return false;
        };
        let tab_size = session.tab_size().max(1);
        let end_row = end_row.min(session.len().saturating_sub(1));

        let mut min_indent = usize::MAX;
        let mut min_empty = usize::MAX;
        let mut should_remove = true;
        for row in start_row..=end_row {
            let line = session.line(row);
            match line.chars().position(|c| !c.is_whitespace()) {
                Some(indent) => {
                    min_indent = min_indent.min(indent);
                    if should_remove && self.comment_prefix(line).is_none() {
                        should_remove = false;
                    }
                }
                None => min_empty = min_empty.min(line.chars().count()),
            }
        }
        let ignore_blank = min_indent != usize::MAX;
        if !ignore_blank {
            min_indent = min_empty;
            should_remove = false;
        }
        if session.use_soft_tabs() && min_indent % tab_size != 0 {
            min_indent = min_indent / tab_size * tab_size;
        }

        for row in start_row..=end_row {
            let line = session.line(row).to_string();
            if should_remove {
                if let Some((start, mut end)) = self.comment_prefix(&line) {
                    if !should_insert_space(&line, start, end, tab_size)
                        && line[..end].ends_with(' ')
                    {
                        end -= 1;
                    }
                    let start_col = line[..start].chars().count();
                    let end_col = line[..end].chars().count();
                    session.remove(Range::new(row, start_col, row, end_col));
                }
            } else if !ignore_blank || !line.trim().is_empty() {
                let text = if should_insert_space(&line, min_indent, min_indent, tab_size) {
                    format!("{marker} ")
                } else {
                    marker.clone()
                };
                session.insert(Position::new(row, min_indent), &text);
            }
        }
        tracing::debug!(start_row, end_row, removed = should_remove, "toggled line comments");
        true
    }

    /// Byte span of leading whitespace plus a comment marker and one optional space, as
    /// `(indent end, marker end)`.
    fn comment_prefix(&self, line: &str) -> Option<(usize, usize)> {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        let marker = self
            .line_comment_start
            .iter()
            .filter(|m| rest.starts_with(m.as_str()))
            .max_by_key(|m| m.len())?;
        let mut end = indent + marker.len();
        if line[end..].starts_with(' ') {
            end += 1;
        }
        Some((indent, end))
    }
}

/// Whether a space belongs between a comment marker and the text: only when the indentation
/// before is a whole number of tabs and adding one keeps the text after on a tab stop.
fn should_insert_space(line: &str, before: usize, after: usize, tab_size: usize) -> bool {
    let bytes = line.as_bytes();
    let spaces_before = bytes[..before.min(bytes.len())]
        .iter()
        .rev()
        .take_while(|&&b| b == b' ')
        .count();
    if spaces_before % tab_size != 0 {
        return false;
    }
    let spaces_after = bytes
        .get(after..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b' ')
        .count();
    if tab_size > 2 {
        spaces_after % tab_size != tab_size - 1
    } else {
        spaces_after % tab_size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rust_like() -> TextMode {
        TextMode::new().with_id("test/mode").with_line_comment(&["//"])
    }

    #[test]
    fn test_session_mode_uses_rules() {
        let mut session = EditSession::new("hello");
        session.set_mode(TextMode::new().session_mode().unwrap());
        assert_eq!(session.mode().id(), TEXT_MODE_ID);
        assert_eq!(session.tokens(0)[0].kind, "text");
    }

    #[test]
    fn test_next_line_indent() {
        let mode = TextMode::new();
        assert_eq!(mode.next_line_indent("    let x;"), "    ");
        assert_eq!(mode.next_line_indent("\tx"), "\t");
        assert_eq!(mode.next_line_indent("x"), "");
    }

    #[test]
    fn test_toggle_comment_without_markers() {
        let mut session = EditSession::new("a");
        assert!(!TextMode::new().toggle_comment_lines(&mut session, 0, 0));
        assert_eq!(session.value(), "a");
    }

    #[test]
    fn test_comment_and_uncomment_block() {
        let mode = rust_like();
        let mut session = EditSession::new("    a();\n\n        b();");
        assert!(mode.toggle_comment_lines(&mut session, 0, 2));
        assert_eq!(session.value(), "    // a();\n\n    //     b();");

        assert!(mode.toggle_comment_lines(&mut session, 0, 2));
        assert_eq!(session.value(), "    a();\n\n        b();");
    }

    #[test]
    fn test_mixed_block_gets_commented() {
        let mode = rust_like();
        let mut session = EditSession::new("// a\nb");
        mode.toggle_comment_lines(&mut session, 0, 1);
        assert_eq!(session.value(), "// // a\n// b");
    }

    #[test]
    fn test_blank_block_is_commented() {
        let mode = rust_like();
        let mut session = EditSession::new("\n");
        mode.toggle_comment_lines(&mut session, 0, 1);
        assert_eq!(session.value(), "// \n// ");
    }

    #[test]
    fn test_any_marker_uncomments() {
        let mode = TextMode::new().with_line_comment(&["#", "//"]);
        let mut session = EditSession::new("# a\n// b");
        mode.toggle_comment_lines(&mut session, 0, 1);
        assert_eq!(session.value(), "a\nb");
    }
}

//! Language modes as seen by the session.
//!
//! A [`SessionMode`] bundles what a session needs from a language: the tokenizer that feeds
//! the background tokenizer, the regexes that define a "word" and an optional
//! [`FoldingMode`]. The session never probes a mode for capabilities; folding is either
//! present or it is not.

use crate::error::{Result, SessionError};
use crate::range::Range;
use crate::session::EditSession;
use crate::tokenizer::Tokenizer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which fold widgets a folding mode reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldStyle {
    /// No widgets. Folds only come from explicit calls.
    Manual,
    /// Widgets on block starts.
    #[default]
    MarkBegin,
    /// Widgets on block starts and block ends.
    MarkBeginEnd,
    /// Used internally when a mode is asked for every candidate range, single-line ones
    /// included.
    #[serde(skip)]
    All,
}

impl FoldStyle {
    /// Name used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            FoldStyle::Manual => "manual",
            FoldStyle::MarkBegin => "markbegin",
            FoldStyle::MarkBeginEnd => "markbeginend",
            FoldStyle::All => "all",
        }
    }
}

impl FromStr for FoldStyle {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(FoldStyle::Manual),
            "markbegin" => Ok(FoldStyle::MarkBegin),
            "markbeginend" => Ok(FoldStyle::MarkBeginEnd),
            other => Err(SessionError::InvalidFoldStyle(other.to_string())),
        }
    }
}

impl fmt::Display for FoldStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gutter marker proposed for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldWidget {
    /// Nothing to fold here.
    Empty,
    /// A foldable block starts on this row.
    Start,
    /// A foldable block ends on this row.
    End,
}

/// Language-specific knowledge of where foldable blocks are.
///
/// Implementations only propose ranges; the fold model itself is language-agnostic.
pub trait FoldingMode: Send + Sync {
    /// Widget for `row`. Must be cheap: the session caches the answer per row and recomputes it
    /// only after edits touch the row.
    fn fold_widget(&self, session: &EditSession, style: FoldStyle, row: usize) -> FoldWidget;

    /// Range the widget on `row` would fold. With `force_multiline`, a single-row candidate may
    /// be widened to the section it introduces.
    fn fold_widget_range(
        &self,
        session: &EditSession,
        style: FoldStyle,
        row: usize,
        force_multiline: bool,
    ) -> Option<Range>;
}

/// The block of rows indented deeper than `row`.
///
/// Blank rows inside the block are skipped. The range starts at `column` (or the end of `row`)
/// and ends at the end of the last deeper row. Returns `None` for a blank `row` or when no
/// deeper row follows.
pub fn indentation_block(session: &EditSession, row: usize, column: Option<usize>) -> Option<Range> {
    let line = session.line(row);
    let start_level = first_non_space(line)?;
    let start_column = column.unwrap_or_else(|| line.chars().count());
    let max_row = session.len();
    let mut end_row = row;

    for next in row + 1..max_row {
        let Some(level) = first_non_space(session.line(next)) else {
            continue;
        };
        if level <= start_level {
            break;
        }
        end_row = next;
    }

    (end_row > row).then(|| Range::new(row, start_column, end_row, session.line_len(end_row)))
}

fn first_non_space(line: &str) -> Option<usize> {
    line.chars().position(|c| !c.is_whitespace())
}

const TOKEN_CLASS: &str = r"[\p{L}\p{Mn}\p{Mc}\p{Nd}\p{Pc}\$_]";
const NON_TOKEN_CLASS: &str = r"[^\p{L}\p{Mn}\p{Mc}\p{Nd}\p{Pc}\$_]";

/// Everything the session takes from a language mode.
#[derive(Clone)]
pub struct SessionMode {
    id: String,
    tokenizer: Arc<Tokenizer>,
    folding: Option<Arc<dyn FoldingMode>>,
    token_re: Regex,
    non_token_re: Regex,
    indent_with_tabs: bool,
}

impl fmt::Debug for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMode")
            .field("id", &self.id)
            .field("folding", &self.folding.is_some())
            .field("token_re", &self.token_re.as_str())
            .field("non_token_re", &self.non_token_re.as_str())
            .field("indent_with_tabs", &self.indent_with_tabs)
            .finish()
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::text()
    }
}

impl SessionMode {
    /// A mode with the given id and tokenizer, default word regexes and no folding.
    pub fn new(id: impl Into<String>, tokenizer: Tokenizer) -> Self {
        Self {
            id: id.into(),
            tokenizer: Arc::new(tokenizer),
            folding: None,
            token_re: word_regex(TOKEN_CLASS),
            non_token_re: word_regex(NON_TOKEN_CLASS),
            indent_with_tabs: false,
        }
    }

    /// Plain text: every row is a single `text` token.
    pub fn text() -> Self {
        Self::new("mode/text", Tokenizer::plain())
    }

    /// Attach a folding mode.
    pub fn with_folding(mut self, folding: Arc<dyn FoldingMode>) -> Self {
        self.folding = Some(folding);
        self
    }

    /// Replace the word-character classes. Each pattern must match a single character.
    pub fn with_word_regexes(mut self, token: &str, non_token: &str) -> Result<Self> {
        self.token_re = Regex::new(&format!("^(?:{token})$"))?;
        self.non_token_re = Regex::new(&format!("^(?:{non_token})$"))?;
        Ok(self)
    }

    /// Make soft tabs unavailable while this mode is active.
    pub fn with_indent_with_tabs(mut self, indent_with_tabs: bool) -> Self {
        self.indent_with_tabs = indent_with_tabs;
        self
    }

    /// Mode identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared tokenizer.
    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }

    /// Folding mode, if the language has one.
    pub fn folding(&self) -> Option<&Arc<dyn FoldingMode>> {
        self.folding.as_ref()
    }

    /// Whether this mode forces hard tabs.
    pub fn indent_with_tabs(&self) -> bool {
        self.indent_with_tabs
    }

    /// `true` if `ch` belongs to a word.
    pub fn is_token_char(&self, ch: char) -> bool {
        let mut buf = [0u8; 4];
        self.token_re.is_match(ch.encode_utf8(&mut buf))
    }

    /// `true` if `ch` is a separator.
    pub fn is_non_token_char(&self, ch: char) -> bool {
        let mut buf = [0u8; 4];
        self.non_token_re.is_match(ch.encode_utf8(&mut buf))
    }
}

fn word_regex(class: &str) -> Regex {
    // The built-in classes are constant and known to compile.
    Regex::new(&format!("^(?:{class})$")).unwrap_or_else(|_| unreachable!("word class {class}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_style_parses_known_names() {
        assert_eq!("manual".parse::<FoldStyle>().unwrap(), FoldStyle::Manual);
        assert_eq!(
            "markbeginend".parse::<FoldStyle>().unwrap(),
            FoldStyle::MarkBeginEnd
        );
        let err = "all".parse::<FoldStyle>().unwrap_err();
        assert!(matches!(err, SessionError::InvalidFoldStyle(ref s) if s == "all"));
    }

    #[test]
    fn test_default_word_classes() {
        let mode = SessionMode::text();
        assert!(mode.is_token_char('a'));
        assert!(mode.is_token_char('_'));
        assert!(mode.is_token_char('$'));
        assert!(mode.is_token_char('é'));
        assert!(!mode.is_token_char('-'));
        assert!(mode.is_non_token_char(' '));
        assert!(!mode.is_non_token_char('7'));
    }

    #[test]
    fn test_custom_word_regexes() {
        let mode = SessionMode::text()
            .with_word_regexes(r"[a-z\-]", r"[^a-z\-]")
            .unwrap();
        assert!(mode.is_token_char('-'));
        assert!(!mode.is_token_char('A'));
        assert!(SessionMode::text().with_word_regexes("(", "x").is_err());
    }

    #[test]
    fn test_indentation_block() {
        let session = EditSession::new("fn main\n    a\n\n    b\nend");
        assert_eq!(
            indentation_block(&session, 0, None),
            Some(Range::new(0, 7, 3, 5))
        );
        assert_eq!(indentation_block(&session, 1, None), None);
        assert_eq!(indentation_block(&session, 2, None), None);
        assert_eq!(
            indentation_block(&session, 0, Some(2)),
            Some(Range::new(0, 2, 3, 5))
        );
    }
}

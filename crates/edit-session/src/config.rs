//! Session configuration.
//!
//! Everything that used to be a global option lives in [`SessionConfig`], which is handed to
//! [`crate::EditSession::with_config`] and owned by that session from then on.

use crate::mode::FoldStyle;
use crate::newline::NewLineMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds on the automatic wrap limit. `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapLimitRange {
    /// Lower bound.
    pub min: Option<usize>,
    /// Upper bound.
    pub max: Option<usize>,
    /// Ignore both bounds and pin the limit to the print margin passed to
    /// `adjust_wrap_limit`.
    pub follow_print_margin: bool,
}

/// Background tokenizer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens per line before the rest of the line becomes overflow tokens.
    pub max_token_count: usize,
    /// Characters per overflow token.
    pub overflow_chunk: usize,
    /// Delay before a freshly started run does its first batch.
    #[serde(with = "duration_ms")]
    pub start_delay: Duration,
    /// Rows tokenized between two budget checks.
    pub batch_rows: usize,
    /// Time a single batch may take before yielding.
    #[serde(with = "duration_ms")]
    pub batch_budget: Duration,
    /// Delay before a batch that ran out of budget resumes.
    #[serde(with = "duration_ms")]
    pub resume_delay: Duration,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_token_count: crate::tokenizer::DEFAULT_MAX_TOKEN_COUNT,
            overflow_chunk: crate::tokenizer::DEFAULT_OVERFLOW_CHUNK,
            start_delay: Duration::from_millis(700),
            batch_rows: 5,
            batch_budget: Duration::from_millis(20),
            resume_delay: Duration::from_millis(20),
        }
    }
}

/// Per-session options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Width of a tab stop.
    pub tab_size: usize,
    /// Indent with spaces instead of tab characters.
    pub use_soft_tabs: bool,
    /// Soft-wrap long rows.
    pub use_wrap_mode: bool,
    /// Wrap column used until the first `adjust_wrap_limit`.
    pub wrap_limit: usize,
    /// Bounds applied by `adjust_wrap_limit`.
    pub wrap_limit_range: WrapLimitRange,
    /// Use the narrower code-oriented lookback window when choosing wrap points.
    pub wrap_as_code: bool,
    /// Newline sequence used by `value()`.
    pub new_line_mode: NewLineMode,
    /// Which fold widgets the folding mode reports.
    pub fold_style: FoldStyle,
    /// Return a selection range from undo/redo.
    pub undo_select: bool,
    /// Overwrite mode flag.
    pub overwrite: bool,
    /// Word motion skips whole tokens instead of short words.
    pub select_long_words: bool,
    /// Line-start motion goes to column 0 first.
    pub emacs_style_line_start: bool,
    /// Background tokenizer tuning.
    pub tokenizer: TokenizerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tab_size: 4,
            use_soft_tabs: true,
            use_wrap_mode: false,
            wrap_limit: 80,
            wrap_limit_range: WrapLimitRange::default(),
            wrap_as_code: false,
            new_line_mode: NewLineMode::Auto,
            fold_style: FoldStyle::MarkBegin,
            undo_select: true,
            overwrite: false,
            select_long_words: false,
            emacs_style_line_start: false,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

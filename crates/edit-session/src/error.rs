//! Error types shared by the document, tokenizer and fold model.

use crate::fold::FoldId;
use crate::range::Range;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session core.
///
/// Out-of-range positions passed to editing operations are clipped silently and never show up
/// here; these variants describe caller mistakes that cannot be recovered by clamping.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A fold must hide at least two characters.
    #[error("The range has to be at least 2 characters width: {range}")]
    FoldTooSmall {
        /// The rejected range (after clipping to the document).
        range: Range,
    },

    /// The new fold partially overlaps an existing one.
    #[error("A fold can't intersect already existing fold: {range} / {existing}")]
    FoldIntersects {
        /// The rejected range.
        range: Range,
        /// Range of the fold it collides with.
        existing: Range,
    },

    /// A fold was offered to a fold line that does not share a row with it.
    #[error("Trying to add fold to a fold line that doesn't have a matching row: {range}")]
    FoldLineMismatch {
        /// Range of the offending fold.
        range: Range,
    },

    /// No fold with this id is currently registered.
    #[error("unknown fold: {0:?}")]
    UnknownFold(FoldId),

    /// The fold style name is not one of `manual`, `markbegin` or `markbeginend`.
    #[error("invalid fold style: {0} [manual, markbegin, markbeginend]")]
    InvalidFoldStyle(String),

    /// `remove_lines` was called with rows outside the document.
    #[error("rows {first}..={last} out of bounds for a document of {len} lines")]
    RowsOutOfBounds {
        /// First requested row.
        first: usize,
        /// Last requested row.
        last: usize,
        /// Current line count.
        len: usize,
    },

    /// An array token does not line up with the capture groups of its regex.
    #[error(
        "number of classes and regexp groups doesn't match in state '{state}' rule {rule}: {groups} != {tokens}"
    )]
    TokenCountMismatch {
        /// State containing the rule.
        state: String,
        /// Index of the rule inside the state.
        rule: usize,
        /// Capture groups in the regex.
        groups: usize,
        /// Token types supplied.
        tokens: usize,
    },

    /// A rule table without a `start` state.
    #[error("rule table has no 'start' state")]
    MissingStartState,

    /// A word regex failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// A grammar rule pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] fancy_regex::Error),
}

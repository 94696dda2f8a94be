//! `edit-session-modes` - Mode building blocks for `edit-session`.
//!
//! This crate has no language grammars. It provides the pieces a grammar is assembled from:
//!
//! - [`HighlightRules`]: a rule table under construction, with includes, prefixed embedding of
//!   other tables and default tokens, compiled into an `edit_session::Tokenizer`.
//! - [`TextMode`]: the plain-text mode, also the base for modes with line comments.
//! - [`IndentFoldMode`] and [`MarkerFoldMode`]: folding that works from indentation or from
//!   start/stop regexes.

mod error;
mod folding;
mod rules;
mod text_mode;

pub use error::ModeError;
pub use folding::{IndentFoldMode, MarkerFoldMode};
pub use rules::{HighlightRules, KeywordMapper, RuleEntry};
pub use text_mode::{TEXT_MODE_ID, TextMode};

//! Session change notifications.
//!
//! Subscribers registered with [`crate::EditSession::subscribe`] receive every
//! [`SessionEvent`] in the order the session produces it. Document deltas arrive as
//! [`SessionEvent::Change`] after all session caches have been updated for them.

use crate::background_tokenizer::RowSpan;
use crate::delta::Delta;
use crate::fold::Fold;

/// Whether a fold appeared or went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldAction {
    /// The fold was added.
    Add,
    /// The fold was removed or expanded.
    Remove,
}

/// Something observable changed in an [`crate::EditSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The document changed.
    Change(Delta),
    /// A top-level fold was added or removed.
    ChangeFold {
        /// The fold as it was at the time of the change.
        fold: Fold,
        /// Add or remove.
        action: FoldAction,
    },
    /// The background tokenizer refreshed these rows.
    TokenizerUpdate(RowSpan),
    /// Annotations were replaced or cleared.
    ChangeAnnotation,
    /// Breakpoints or gutter decorations changed.
    ChangeBreakpoint,
    /// A front marker was added or removed.
    ChangeFrontMarker,
    /// A back marker was added or removed.
    ChangeBackMarker,
    /// Wrap mode or the wrap limit range changed.
    ChangeWrapMode,
    /// The effective wrap limit changed.
    ChangeWrapLimit,
    /// The tab size changed.
    ChangeTabSize,
    /// Overwrite mode was toggled.
    ChangeOverwrite,
    /// New vertical scroll offset.
    ChangeScrollTop(f64),
    /// New horizontal scroll offset.
    ChangeScrollLeft(f64),
    /// A new mode was installed.
    ChangeMode,
    /// The document's newline mode changed.
    ChangeNewLineMode,
}

/// Callback invoked for every session event.
pub type SessionListener = Box<dyn FnMut(&SessionEvent) + Send>;

#![warn(missing_docs)]
//! Edit Session - Headless Document and Screen Model for Code Editors
//!
//! # Overview
//!
//! `edit-session` is the model behind an editor view: a line-based document, a table-driven
//! tokenizer that runs incrementally, code folding, and the mapping between document positions
//! and screen positions once tabs, wide characters, folds and soft wrapping are applied.
//! It does not render anything. A host feeds it text and edits, and reads back tokens,
//! display rows and events.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Selection (anchor/lead cursor motions)     │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  EditSession (config, events, undo)         │  ← Session state
//! ├─────────────────────────────────────────────┤
//! │  Folding + Screen mapping (wrap, tabs)      │  ← Visual model
//! ├─────────────────────────────────────────────┤
//! │  Background tokenizer (row cache)           │  ← Highlighting
//! ├─────────────────────────────────────────────┤
//! │  Document (lines, deltas, anchors)          │  ← Text storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use edit_session::{EditSession, Position, Range, Selection};
//!
//! let mut session = EditSession::new("fn main() {\n    body();\n}");
//!
//! // Fold the body away behind a placeholder
//! session.add_fold("...", Range::new(0, 11, 2, 0)).unwrap();
//! assert_eq!(session.screen_length(), 1);
//! assert_eq!(session.display_line(0, None, None), "fn main() {...}");
//!
//! // Screen and document coordinates
//! assert_eq!(
//!     session.document_to_screen_position(2, 1),
//!     Position::new(0, 15)
//! );
//!
//! // Cursor motions step over the fold
//! let mut selection = Selection::new(&mut session);
//! selection.move_to(&mut session, 0, 11);
//! selection.move_cursor_right(&mut session);
//! assert_eq!(selection.cursor(&session), Position::new(2, 0));
//! ```
//!
//! # Module Description
//!
//! - [`document`] - lines, deltas and anchors
//! - [`tokenizer`] - regex rule tables turned into tokens, one row at a time
//! - [`background_tokenizer`] - cached per-row tokens kept in step with edits
//! - [`fold`] / [`fold_line`] - folded ranges and the rows they join
//! - [`layout`] - display widths and soft-wrap split points
//! - [`session`] - the [`EditSession`] that ties everything together
//! - [`selection`] - a single cursor and selection over a session
//! - [`undo`] - undo/redo of delta groups, including removed folds
//! - [`worker`] - off-thread lint workers reporting annotations

pub mod anchor;
pub mod background_tokenizer;
pub mod config;
pub mod delta;
pub mod document;
pub mod error;
pub mod events;
pub mod fold;
pub mod fold_line;
pub mod layout;
pub mod mode;
pub mod newline;
pub mod range;
pub mod selection;
pub mod session;
mod text;
pub mod tokenizer;
pub mod undo;
pub mod worker;

pub use anchor::{Anchor, AnchorChange, AnchorId};
pub use background_tokenizer::{BackgroundTokenizer, RowSpan};
pub use config::{SessionConfig, TokenizerConfig, WrapLimitRange};
pub use delta::Delta;
pub use document::{Document, ListenerId};
pub use error::{Result, SessionError};
pub use events::{FoldAction, SessionEvent, SessionListener};
pub use fold::{Fold, FoldId};
pub use fold_line::FoldLine;
pub use layout::DisplayToken;
pub use mode::{FoldStyle, FoldWidget, FoldingMode, SessionMode, indentation_block};
pub use newline::NewLineMode;
pub use range::{Position, Range};
pub use selection::{OrientedRange, Selection, SelectionData};
pub use session::{
    EditSession, FoldSide, Marker, MarkerId, MarkerType, ParentFoldRange, TextSide, TokenAt,
    ToggleFoldOptions,
};
pub use tokenizer::{
    LineTokens, NextState, Rule, RuleTable, Token, TokenOutput, TokenSpec, Tokenizer,
    TokenizerState,
};
pub use undo::{DeltaGroup, FoldDelta, UndoManager, UndoTarget};
pub use worker::{
    Annotation, AnnotationKind, ChannelWorker, LintWorker, WorkerEndpoint, WorkerMessage,
};

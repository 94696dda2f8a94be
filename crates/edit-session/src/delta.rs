//! Structured document change deltas.
//!
//! Every mutation of a [`crate::Document`] is reported as exactly one [`Delta`]. A delta carries
//! enough data to be re-applied or reverted, which is what undo/redo, anchors, the background
//! tokenizer and the fold model all consume.
//!
//! The serde representation is the replayable wire format:
//!
//! ```json
//! {"action":"insertText","range":{"start":{"row":0,"column":3},"end":{"row":1,"column":0}},"text":"\n"}
//! ```

use crate::range::Range;
use serde::{Deserialize, Serialize};

/// A single atomic document mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Delta {
    /// `text` was inserted; `range` spans the inserted text in the post-edit document.
    InsertText {
        /// Span of the new text.
        range: Range,
        /// Inserted text. Either a single line fragment or exactly one newline sequence.
        text: String,
    },
    /// `text` was removed; `range` spans it in the pre-edit document.
    RemoveText {
        /// Span of the removed text.
        range: Range,
        /// Removed text.
        text: String,
    },
    /// Whole lines were inserted before `range.start.row`.
    InsertLines {
        /// `(row, 0) -> (row + lines.len(), 0)`.
        range: Range,
        /// Inserted lines without terminators.
        lines: Vec<String>,
    },
    /// Whole lines were removed starting at `range.start.row`.
    RemoveLines {
        /// `(first, 0) -> (last + 1, 0)`.
        range: Range,
        /// Removed lines without terminators.
        lines: Vec<String>,
    },
}

impl Delta {
    /// Range covered by the change.
    pub fn range(&self) -> Range {
        match self {
            Delta::InsertText { range, .. }
            | Delta::RemoveText { range, .. }
            | Delta::InsertLines { range, .. }
            | Delta::RemoveLines { range, .. } => *range,
        }
    }

    /// `true` for `insertText` and `insertLines`.
    pub fn is_insert(&self) -> bool {
        matches!(self, Delta::InsertText { .. } | Delta::InsertLines { .. })
    }

    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Delta::InsertText { .. } => "insertText",
            Delta::RemoveText { .. } => "removeText",
            Delta::InsertLines { .. } => "insertLines",
            Delta::RemoveLines { .. } => "removeLines",
        }
    }

    /// The structural inverse: insert and remove swap, range and payload stay.
    pub fn inverse(&self) -> Delta {
        match self.clone() {
            Delta::InsertText { range, text } => Delta::RemoveText { range, text },
            Delta::RemoveText { range, text } => Delta::InsertText { range, text },
            Delta::InsertLines { range, lines } => Delta::RemoveLines { range, lines },
            Delta::RemoveLines { range, lines } => Delta::InsertLines { range, lines },
        }
    }

    /// Signed change in line count caused by this delta.
    pub fn row_delta(&self) -> isize {
        let range = self.range();
        let span = (range.end.row - range.start.row) as isize;
        if self.is_insert() { span } else { -span }
    }
}

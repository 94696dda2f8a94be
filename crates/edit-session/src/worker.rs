//! Boundary to an out-of-process linter.
//!
//! The session does not know how linting happens. It hands a [`LintWorker`] a snapshot of the
//! document when the worker is installed, forwards every delta afterwards and asks for fresh
//! annotations whenever it is polled. [`ChannelWorker`] is the message-passing implementation
//! for hosts that lint on another thread or in a browser worker.

use crate::delta::Delta;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Severity of an [`Annotation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// A hard error.
    Error,
    /// A warning.
    Warning,
    /// Informational.
    Info,
}

/// A gutter message attached to a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Row the message belongs to.
    pub row: usize,
    /// Column, when the linter reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Message text.
    pub text: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
}

impl Annotation {
    /// An annotation without a column.
    pub fn new(row: usize, kind: AnnotationKind, text: impl Into<String>) -> Self {
        Self {
            row,
            column: None,
            text: text.into(),
            kind,
        }
    }

    /// Attach a column.
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

/// A linter the session talks to without blocking.
pub trait LintWorker: Send {
    /// Called once with the whole document when the worker is installed.
    fn attach(&mut self, lines: &[String]);

    /// Called for every delta applied to the document.
    fn document_changed(&mut self, delta: &Delta);

    /// Newest complete annotation set, if one arrived since the last call.
    fn poll_annotations(&mut self) -> Option<Vec<Annotation>>;
}

/// Message sent from a [`ChannelWorker`] to the linting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Full document snapshot.
    SetValue {
        /// Document lines.
        lines: Vec<String>,
    },
    /// One document delta.
    Change {
        /// The delta, in its wire format.
        delta: Delta,
    },
}

/// A [`LintWorker`] backed by a pair of channels.
///
/// The session side owns the `ChannelWorker`; the linting side owns the matching
/// [`WorkerEndpoint`].
#[derive(Debug)]
pub struct ChannelWorker {
    outbox: Sender<WorkerMessage>,
    inbox: Receiver<Vec<Annotation>>,
    disconnected: bool,
}

/// The linting side of a [`ChannelWorker`].
#[derive(Debug)]
pub struct WorkerEndpoint {
    /// Messages from the session.
    pub messages: Receiver<WorkerMessage>,
    /// Annotation sets back to the session.
    pub annotations: Sender<Vec<Annotation>>,
}

impl ChannelWorker {
    /// Create a connected worker/endpoint pair.
    pub fn pair() -> (ChannelWorker, WorkerEndpoint) {
        let (outbox, messages) = mpsc::channel();
        let (annotations, inbox) = mpsc::channel();
        (
            ChannelWorker {
                outbox,
                inbox,
                disconnected: false,
            },
            WorkerEndpoint {
                messages,
                annotations,
            },
        )
    }

    /// `true` once the endpoint has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn send(&mut self, message: WorkerMessage) {
        if self.disconnected {
            return;
        }
        if self.outbox.send(message).is_err() {
            tracing::warn!("lint worker endpoint dropped");
            self.disconnected = true;
        }
    }
}

impl LintWorker for ChannelWorker {
    fn attach(&mut self, lines: &[String]) {
        self.send(WorkerMessage::SetValue {
            lines: lines.to_vec(),
        });
    }

    fn document_changed(&mut self, delta: &Delta) {
        self.send(WorkerMessage::Change {
            delta: delta.clone(),
        });
    }

    fn poll_annotations(&mut self) -> Option<Vec<Annotation>> {
        let mut latest = None;
        loop {
            match self.inbox.try_recv() {
                Ok(set) => latest = Some(set),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        latest
    }
}

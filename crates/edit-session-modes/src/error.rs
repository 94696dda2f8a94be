use edit_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced while assembling a rule table or a mode.
pub enum ModeError {
    #[error("unknown state '{0}' in include")]
    /// An include names a state the table does not have.
    UnknownInclude(String),

    #[error("include cycle detected involving '{0}'")]
    /// A state includes itself, directly or through other states.
    IncludeCycle(String),

    #[error(transparent)]
    /// The tokenizer rejected the normalised table.
    Session(#[from] SessionError),

    #[error("marker regex compile error: {0}")]
    /// A folding marker failed to compile.
    Marker(#[from] regex::Error),
}

use thiserror::Error;

/// Failure modes for [`crate::Store`] operations and session construction.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SessionError {
    /// `Get`, `Set`, or `Clear` was called for a UUID with no session on
    /// record.
    #[error("no session found for this client")]
    NotFound,

    /// `New` was called for a UUID that already has a session on record.
    #[error("a session already exists for this client")]
    AlreadyExists,

    /// The requested sequence length falls outside `1..=65535`.
    #[error("sequence length {0} is outside the allowed range of 1..=65535")]
    InvalidLength(usize),

    /// A write targeted a slot index at or beyond the sequence length.
    #[error("slot index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

use thiserror::Error;

/// Failure modes for message encoding/decoding and transport I/O.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying transport failed (socket error, broken pipe, ...).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame's first byte did not decode to a known [`crate::ConnectionState`].
    #[error("invalid connection state byte: {0}")]
    InvalidState(u8),

    /// A frame was the wrong length for the message type being decoded.
    #[error("invalid frame length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// The remote end closed the connection (clean EOF).
    #[error("the remote end closed the connection")]
    Disconnected,
}

/// Convenience alias for `Result<T, ProtocolError>`.
pub type Result<T> = std::result::Result<T, ProtocolError>;

use thiserror::Error;

use risp_checksum::ChecksumError;
use risp_proto::ProtocolError;
use risp_session::SessionError;

/// Failure modes for the server-side handler and dispatcher (§4.4, §4.5, §7).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A reconnecting client declared a different sequence length than the
    /// one already on record for its UUID — an unresumable identity
    /// collision (§4.5 step 2).
    #[error("client declared sequence length {declared}, but {stored} is on record")]
    SequenceLengthMismatch { stored: usize, declared: usize },

    /// A client reported an ack beyond the sequence length (§4.4 edge cases).
    #[error("client ack {ack} exceeds sequence length {len}")]
    AckExceedsLength { ack: u32, len: usize },

    /// The handshake message's state tag was not CONNECTING.
    #[error("expected a CONNECTING handshake, got {0:?}")]
    UnexpectedHandshakeState(risp_proto::ConnectionState),

    /// No handshake arrived before the dispatcher gave up waiting.
    #[error("timed out waiting for the connection handshake")]
    HandshakeTimeout,
}

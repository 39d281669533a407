use thiserror::Error;

use risp_checksum::ChecksumError;
use risp_proto::ProtocolError;
use risp_session::SessionError;

/// Failure modes for the client engine and its retry wrapper (§4.6, §7).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server sent CLOSING before the engine's Ack reached L.
    #[error("server sent CLOSING before the sequence was fully received (ack {ack} of {len})")]
    ClosingBeforeComplete { ack: u16, len: usize },

    /// The server sent CLOSED before the engine had a recorded checksum.
    #[error("server sent CLOSED before a checksum was recorded")]
    ClosedBeforeChecksum,

    /// The recomputed checksum does not match the server-reported one —
    /// corruption, not loss, so there is no automatic retry (§7).
    #[error("checksum mismatch: server reported {expected}, recomputed {actual}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    /// The server sent CONNECTING, which only ever flows client -> server.
    #[error("server sent an unexpected CONNECTING message")]
    UnexpectedServerState,

    /// A transient transport failure. Distinct from every other variant so
    /// the retry wrapper can tell "try again" from "give up" (§7).
    #[error("connection lost; a reconnect may resume this session")]
    ClientDisconnected,
}

use crate::errors::SessionError;
use crate::sequence::Sequence;

/// The authoritative per-client record: a sequence, how much of it the
/// client has confirmed (`ack`), and how much more the sender is currently
/// authorised to transmit (`window`).
///
/// `ack` is monotonically non-decreasing and never exceeds `sequence.len()`
/// for the lifetime of a session — callers that mutate a `Session` directly
/// (rather than through [`crate::Store::with_session`]) are responsible for
/// preserving that invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub sequence: Sequence,
    pub ack: u16,
    pub window: u16,
}

impl Session {
    /// Server-side construction (§4.2 `New`): every slot is pre-filled with
    /// a pseudo-random value, ack and window start at zero until the first
    /// handshake overwrites them.
    pub fn new_server(len: usize) -> Result<Self, SessionError> {
        Ok(Self {
            sequence: Sequence::random(len)?,
            ack: 0,
            window: 0,
        })
    }

    /// Client-side construction: no slot is filled yet.
    pub fn new_client(len: usize, window: u16) -> Result<Self, SessionError> {
        Ok(Self {
            sequence: Sequence::empty(len)?,
            ack: 0,
            window,
        })
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// `true` once every slot has been filled, i.e. `ack == len`.
    pub fn is_complete(&self) -> bool {
        usize::from(self.ack) == self.len()
    }

    /// Recomputes `ack` from the sequence's contiguous filled prefix and
    /// stores it back. Used after a slot is filled to keep `ack` in sync
    /// without the caller doing the arithmetic itself.
    pub fn recompute_ack(&mut self) {
        self.ack = self.sequence.contiguous_prefix_len() as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_session_starts_fully_populated_but_unacked() {
        let session = Session::new_server(4).unwrap();
        assert_eq!(session.ack, 0);
        assert!(session.sequence.is_complete());
        assert!(!session.is_complete());
    }

    #[test]
    fn client_session_starts_empty() {
        let session = Session::new_client(4, 4).unwrap();
        assert_eq!(session.ack, 0);
        assert!(!session.sequence.is_complete());
    }

    #[test]
    fn recompute_ack_tracks_filled_prefix() {
        let mut session = Session::new_client(3, 4).unwrap();
        session.sequence.fill(0, 1).unwrap();
        session.recompute_ack();
        assert_eq!(session.ack, 1);
        session.sequence.fill(1, 2).unwrap();
        session.sequence.fill(2, 3).unwrap();
        session.recompute_ack();
        assert_eq!(session.ack, 3);
        assert!(session.is_complete());
    }
}

use rand::Rng;

use crate::errors::SessionError;

/// An ordered sequence of hole-representable 32-bit payload slots.
///
/// Each slot is `None` (empty) or `Some(value)` (filled), never a sentinel
/// value — zero is a legal payload and must stay distinguishable from an
/// unfilled slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence(Vec<Option<u32>>);

impl Sequence {
    /// Builds a sequence of `len` empty slots, as used client-side at
    /// startup: nothing has arrived yet.
    pub fn empty(len: usize) -> Result<Self, SessionError> {
        validate_len(len)?;
        Ok(Self(vec![None; len]))
    }

    /// Builds a sequence of `len` slots, every one pre-filled with a
    /// pseudo-random `u32`, as used server-side on session creation (§4.2
    /// `New`). The seed source is whatever `rand`'s thread-local generator
    /// uses; the protocol only requires that it not be predictable from one
    /// session to the next.
    pub fn random(len: usize) -> Result<Self, SessionError> {
        validate_len(len)?;
        let mut rng = rand::thread_rng();
        Ok(Self((0..len).map(|_| Some(rng.gen::<u32>())).collect()))
    }

    /// Reconstructs a sequence from already-known slots, e.g. when a store
    /// hands back a session. Used internally and by tests.
    pub fn from_slots(slots: Vec<Option<u32>>) -> Result<Self, SessionError> {
        validate_len(slots.len())?;
        Ok(Self(slots))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fills `index` with `value`. Errors if `index` is out of bounds;
    /// overwriting an already-filled slot is allowed (the handler may
    /// legitimately retransmit after a reconnect).
    pub fn fill(&mut self, index: usize, value: u32) -> Result<(), SessionError> {
        let len = self.0.len();
        let slot = self
            .0
            .get_mut(index)
            .ok_or(SessionError::IndexOutOfBounds { index, len })?;
        *slot = Some(value);
        Ok(())
    }

    /// The value at `index`, if filled.
    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied().flatten()
    }

    pub fn as_slots(&self) -> &[Option<u32>] {
        &self.0
    }

    /// Count of contiguously-filled prefix slots — the definition of Ack.
    /// Scanning always starts from zero so a hole anywhere in the prefix is
    /// never missed, even if a caller believes a later slot is filled.
    pub fn contiguous_prefix_len(&self) -> usize {
        self.0.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.contiguous_prefix_len() == self.len()
    }
}

fn validate_len(len: usize) -> Result<(), SessionError> {
    if len == 0 || len > crate::MAX_SEQUENCE_LEN {
        return Err(SessionError::InvalidLength(len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_has_no_contiguous_prefix() {
        let seq = Sequence::empty(4).unwrap();
        assert_eq!(seq.contiguous_prefix_len(), 0);
        assert!(!seq.is_complete());
    }

    #[test]
    fn random_sequence_is_fully_populated() {
        let seq = Sequence::random(8).unwrap();
        assert!(seq.is_complete());
        assert_eq!(seq.contiguous_prefix_len(), 8);
    }

    #[test]
    fn contiguous_prefix_stops_at_first_hole() {
        let mut seq = Sequence::empty(5).unwrap();
        seq.fill(0, 10).unwrap();
        seq.fill(1, 20).unwrap();
        seq.fill(3, 40).unwrap();
        assert_eq!(seq.contiguous_prefix_len(), 2);
    }

    #[test]
    fn fill_out_of_bounds_errors() {
        let mut seq = Sequence::empty(2).unwrap();
        assert_eq!(
            seq.fill(5, 1),
            Err(SessionError::IndexOutOfBounds { index: 5, len: 2 })
        );
    }

    #[test]
    fn rejects_zero_and_oversized_lengths() {
        assert_eq!(Sequence::empty(0), Err(SessionError::InvalidLength(0)));
        assert!(Sequence::empty(70_000).is_err());
    }

    #[test]
    fn boundary_lengths_are_accepted() {
        assert!(Sequence::empty(1).is_ok());
        assert!(Sequence::random(65_535).is_ok());
    }
}

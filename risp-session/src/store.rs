use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::errors::SessionError;
use crate::session::Session;

/// Keyed store of session records, one per [`Uuid`].
///
/// All four operations are linearizable: `Get` may run concurrently with
/// other `Get`s, but `New`/`Set`/`Clear` exclude every other operation for
/// the duration of the write. A single [`RwLock`] around the map gives
/// exactly that discipline, the same shape the teacher uses for its
/// single-field `RwLock<ConnectionState>` generalized to a map.
///
/// `Get` hands back a snapshot (`Session` is `Clone`); a caller that wants
/// to mutate a session must do so via a subsequent `Set`, accepting
/// last-writer-wins semantics between racing writers.
#[derive(Default)]
pub struct Store {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new server-side session for `uuid` with the given
    /// sequence length, populated per [`Session::new_server`]. Fails with
    /// [`SessionError::AlreadyExists`] if one is already on record.
    pub fn new_session(&self, uuid: Uuid, len: usize) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().unwrap();
        if sessions.contains_key(&uuid) {
            return Err(SessionError::AlreadyExists);
        }
        sessions.insert(uuid, Session::new_server(len)?);
        Ok(())
    }

    /// Returns a copy of the session for `uuid`.
    pub fn get(&self, uuid: &Uuid) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(uuid).cloned().ok_or(SessionError::NotFound)
    }

    /// Replaces the session for `uuid` atomically. Fails with
    /// [`SessionError::NotFound`] if no session is on record — `Set` never
    /// implicitly creates one.
    pub fn set(&self, uuid: &Uuid, session: Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().unwrap();
        if !sessions.contains_key(uuid) {
            return Err(SessionError::NotFound);
        }
        sessions.insert(*uuid, session);
        Ok(())
    }

    /// Removes the session for `uuid`.
    pub fn clear(&self, uuid: &Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(uuid).map(|_| ()).ok_or(SessionError::NotFound)
    }

    /// Convenience wrapper over `Get` + mutate + `Set`, avoiding a
    /// read-modify-write sequence at every call site (the handler calls
    /// this once per inbound message). Not part of the four primitive
    /// store operations; it composes them and accepts the same
    /// last-writer-wins semantics.
    pub fn with_session<F>(&self, uuid: &Uuid, mutate: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.get(uuid)?;
        mutate(&mut session);
        self.set(uuid, session.clone())?;
        Ok(session)
    }
}

//! Session data model and session store for RISP.
//!
//! A [`Session`] is the authoritative record of what a server intends to
//! deliver to one client (or, client-side, what has been received so far),
//! keyed by a stable per-client [`Uuid`] and held in a [`Store`].

mod errors;
mod sequence;
mod session;
mod store;

pub use errors::SessionError;
pub use risp_checksum::MAX_SEQUENCE_LEN;
pub use sequence::Sequence;
pub use session::Session;
pub use store::Store;

pub use uuid::Uuid;

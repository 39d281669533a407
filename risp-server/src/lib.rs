//! Server-side session handler and connection dispatcher for RISP (§4.4, §4.5).

mod dispatcher;
mod errors;
mod handler;

pub use dispatcher::{
    dispatch_connection, dispatch_connection_with_handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use errors::ServerError;
pub use handler::{SessionHandler, MAX_WINDOW};

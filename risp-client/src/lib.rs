//! Client-side session engine and reconnect wrapper for RISP (§4.6, §7).

mod engine;
mod errors;
mod reconnect;

pub use engine::{Engine, DEFAULT_WINDOW, MAX_WINDOW};
pub use errors::ClientError;
pub use reconnect::{connect_with_retry, DEFAULT_BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS};

pub use risp_session::Sequence;

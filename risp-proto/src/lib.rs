//! Wire message model and transport abstraction for RISP (§4.3, §6).

mod errors;
mod message;
mod transport;

pub use errors::ProtocolError;
pub use message::{ClientMessage, ConnectionState, ServerMessage};
pub use transport::{ChannelTransport, TcpTransport, Transport};

pub use uuid::Uuid;

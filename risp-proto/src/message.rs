use uuid::Uuid;

use crate::errors::ProtocolError;

/// The intent a peer is currently signalling, carried by every message in
/// both directions (§4.3). Values match the wire enumeration in §6.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl TryFrom<u8> for ConnectionState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ConnectionState::Connecting),
            1 => Ok(ConnectionState::Connected),
            2 => Ok(ConnectionState::Closing),
            3 => Ok(ConnectionState::Closed),
            other => Err(ProtocolError::InvalidState(other)),
        }
    }
}

/// Message sent client -> server.
///
/// `ack`/`window` are transmitted as 32-bit fields even though the session
/// data model (§3) bounds both to 16 bits — the wire width is generous on
/// purpose, the domain is what's actually constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessage {
    pub state: ConnectionState,
    pub uuid: Uuid,
    pub len: u32,
    pub ack: u32,
    pub window: u32,
}

const CLIENT_MESSAGE_LEN: usize = 1 + 16 + 4 + 4 + 4;

impl ClientMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CLIENT_MESSAGE_LEN);
        buf.push(self.state as u8);
        buf.extend_from_slice(self.uuid.as_bytes());
        buf.extend_from_slice(&self.len.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.extend_from_slice(&self.window.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != CLIENT_MESSAGE_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: CLIENT_MESSAGE_LEN,
                got: bytes.len(),
            });
        }
        let state = ConnectionState::try_from(bytes[0])?;
        let uuid = Uuid::from_slice(&bytes[1..17]).map_err(|_| ProtocolError::InvalidLength {
            expected: CLIENT_MESSAGE_LEN,
            got: bytes.len(),
        })?;
        let len = u32::from_be_bytes(bytes[17..21].try_into().unwrap());
        let ack = u32::from_be_bytes(bytes[21..25].try_into().unwrap());
        let window = u32::from_be_bytes(bytes[25..29].try_into().unwrap());
        Ok(Self {
            state,
            uuid,
            len,
            ack,
            window,
        })
    }
}

/// Message sent server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerMessage {
    pub state: ConnectionState,
    pub index: u32,
    pub payload: u32,
    pub checksum: u64,
}

const SERVER_MESSAGE_LEN: usize = 1 + 4 + 4 + 8;

impl ServerMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SERVER_MESSAGE_LEN);
        buf.push(self.state as u8);
        buf.extend_from_slice(&self.index.to_be_bytes());
        buf.extend_from_slice(&self.payload.to_be_bytes());
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != SERVER_MESSAGE_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: SERVER_MESSAGE_LEN,
                got: bytes.len(),
            });
        }
        let state = ConnectionState::try_from(bytes[0])?;
        let index = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        let payload = u32::from_be_bytes(bytes[5..9].try_into().unwrap());
        let checksum = u64::from_be_bytes(bytes[9..17].try_into().unwrap());
        Ok(Self {
            state,
            index,
            payload,
            checksum,
        })
    }

    /// Builds the CONNECTED payload message for `index`/`payload`, the only
    /// combination the handler emits while `Active` (§4.4).
    pub fn payload(index: u32, payload: u32) -> Self {
        Self {
            state: ConnectionState::Connected,
            index,
            payload,
            checksum: 0,
        }
    }

    /// Builds a CLOSING message carrying the computed checksum.
    pub fn closing(checksum: u64) -> Self {
        Self {
            state: ConnectionState::Closing,
            index: 0,
            payload: 0,
            checksum,
        }
    }

    /// Builds the terminal CLOSED message.
    pub fn closed() -> Self {
        Self {
            state: ConnectionState::Closed,
            index: 0,
            payload: 0,
            checksum: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_roundtrips() {
        let msg = ClientMessage {
            state: ConnectionState::Connected,
            uuid: Uuid::new_v4(),
            len: 4,
            ack: 2,
            window: 8,
        };
        let decoded = ClientMessage::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn server_message_roundtrips() {
        let msg = ServerMessage::payload(3, 15);
        let decoded = ServerMessage::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn closing_message_carries_checksum() {
        let msg = ServerMessage::closing(190);
        let decoded = ServerMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.checksum, 190);
        assert_eq!(decoded.state, ConnectionState::Closing);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            ClientMessage::decode(&[0u8; 5]),
            Err(ProtocolError::InvalidLength { .. })
        ));
    }

    #[test]
    fn rejects_invalid_state_byte() {
        let mut bytes = ServerMessage::closed().encode();
        bytes[0] = 9;
        assert!(matches!(
            ServerMessage::decode(&bytes),
            Err(ProtocolError::InvalidState(9))
        ));
    }
}

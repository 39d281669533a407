use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::ProtocolError;

/// The "reliable, ordered, bidirectional message stream" the protocol spec
/// assumes and treats as an external collaborator (§1, §6). A `Transport`
/// moves opaque, length-delimited frames; message encoding/decoding happens
/// above this layer (see [`crate::ClientMessage`]/[`crate::ServerMessage`]).
///
/// Implementations must deliver frames in order and must not reorder
/// `send` calls relative to each other.
pub trait Transport: Send + Sync {
    /// Sends one frame. A failure here is terminal for the connection.
    fn send(&self, frame: &[u8]) -> Result<(), ProtocolError>;

    /// Waits up to `timeout` for the next frame. `Ok(None)` means the
    /// timeout elapsed with nothing to read — not a failure, just "no
    /// event this tick." `Err(ProtocolError::Disconnected)` means the
    /// remote end is gone for good.
    fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, ProtocolError>;

    /// Half- or fully-closes the transport, unblocking any in-flight
    /// `recv`/`send` on the peer.
    fn shutdown(&self) -> Result<(), ProtocolError>;
}

/// A length-prefixed framing over a raw TCP stream: a 4-byte big-endian
/// length, followed by that many bytes of message body. Grounded on the
/// teacher's `rx`/`tx` free functions, which use the exact same shape for
/// HSMS messages.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Transport for TcpTransport {
    fn send(&self, frame: &[u8]) -> Result<(), ProtocolError> {
        let mut stream = &self.stream;
        let len = frame.len() as u32;
        if let Err(error) = stream
            .write_all(&len.to_be_bytes())
            .and_then(|()| stream.write_all(frame))
        {
            warn!(%error, "tcp transport send failed");
            return Err(error.into());
        }
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, ProtocolError> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut stream = &self.stream;
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::WouldBlock || error.kind() == ErrorKind::TimedOut => {
                return Ok(None)
            }
            Err(error)
                if error.kind() == ErrorKind::UnexpectedEof || error.kind() == ErrorKind::ConnectionReset =>
            {
                debug!(%error, "tcp transport peer disconnected");
                return Err(ProtocolError::Disconnected)
            }
            Err(error) => {
                warn!(%error, "tcp transport recv failed");
                return Err(error.into());
            }
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;
        Ok(Some(body))
    }

    fn shutdown(&self) -> Result<(), ProtocolError> {
        // Both directions: unblocks a peer parked in `recv` on this stream.
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotConnected => Ok(()),
            Err(error) => {
                warn!(%error, "tcp transport shutdown failed");
                Err(error.into())
            }
        }
    }
}

/// An in-memory transport backed by a pair of `mpsc` channels — a loopback
/// stand-in for a real socket, used by the integration tests that drive a
/// full session without a network.
///
/// The two endpoints returned by [`ChannelTransport::pair`] share one
/// `closed` flag, the same way a real socket's two ends share one
/// connection: calling `shutdown` on either endpoint trips the flag for
/// both, so a killswitch closing its own side is observed as a disconnect
/// by the peer too, not just locally.
pub struct ChannelTransport {
    tx: Mutex<Sender<Vec<u8>>>,
    rx: Mutex<Receiver<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Builds two endpoints wired to each other: whatever is sent into one
    /// arrives out of the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = std::sync::mpsc::channel();
        let (tx_b, rx_b) = std::sync::mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx: Mutex::new(tx_a),
                rx: Mutex::new(rx_b),
                closed: Arc::clone(&closed),
            },
            Self {
                tx: Mutex::new(tx_b),
                rx: Mutex::new(rx_a),
                closed,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: &[u8]) -> Result<(), ProtocolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::Disconnected);
        }
        self.tx
            .lock()
            .unwrap()
            .send(frame.to_vec())
            .map_err(|_| ProtocolError::Disconnected)
    }

    fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::Disconnected);
        }
        match self.rx.lock().unwrap().recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProtocolError::Disconnected),
        }
    }

    fn shutdown(&self) -> Result<(), ProtocolError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_transport_delivers_frames_in_order() {
        let (a, b) = ChannelTransport::pair();
        a.send(b"first").unwrap();
        a.send(b"second").unwrap();
        assert_eq!(
            b.recv(Duration::from_millis(50)).unwrap(),
            Some(b"first".to_vec())
        );
        assert_eq!(
            b.recv(Duration::from_millis(50)).unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[test]
    fn channel_transport_times_out_with_no_data() {
        let (_a, b) = ChannelTransport::pair();
        assert_eq!(b.recv(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn channel_transport_signals_disconnect_when_peer_dropped() {
        let (a, b) = ChannelTransport::pair();
        drop(a);
        assert!(matches!(
            b.recv(Duration::from_millis(10)),
            Err(ProtocolError::Disconnected)
        ));
    }

    #[test]
    fn shutdown_on_one_end_disconnects_the_other() {
        let (a, b) = ChannelTransport::pair();
        a.shutdown().unwrap();
        assert!(matches!(
            b.recv(Duration::from_millis(10)),
            Err(ProtocolError::Disconnected)
        ));
        assert!(matches!(
            b.send(b"anything"),
            Err(ProtocolError::Disconnected)
        ));
        assert!(matches!(a.send(b"anything"), Err(ProtocolError::Disconnected)));
    }
}

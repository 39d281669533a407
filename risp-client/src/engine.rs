use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use risp_proto::{ClientMessage, ConnectionState, ProtocolError, ServerMessage, Transport};
use risp_session::{Session, Uuid, MAX_SEQUENCE_LEN};
use tracing::{debug, warn};

use crate::errors::ClientError;

/// Initial window grant, used at startup and after every reconnection or
/// killswitch reset (§4.6).
pub const DEFAULT_WINDOW: u16 = 4;

/// Ceiling the adaptive window policy never exceeds (§4.6).
pub const MAX_WINDOW: u16 = 256;

/// Mirror state machine for the client side of one session (§4.6).
///
/// Survives across reconnection attempts within a single [`crate::connect_with_retry`]
/// call: the partially-filled [`Session`] and its `uuid` persist, only
/// `started`/`window`/`last_window` reset via [`Engine::reconnect`].
pub struct Engine {
    uuid: Uuid,
    session: Session,
    started: bool,
    closing: bool,
    done: bool,
    checksum: Option<u64>,
    last_window: u16,
}

impl Engine {
    /// Builds a new engine. `len` fixes the sequence length; `None` picks a
    /// random length in `[1, 65535]` (§4.6 Startup).
    pub fn new(len: Option<usize>) -> Result<Self, ClientError> {
        let len = match len {
            Some(len) => len,
            None => rand::thread_rng().gen_range(1..=MAX_SEQUENCE_LEN),
        };
        let session = Session::new_client(len, DEFAULT_WINDOW)?;
        Ok(Self {
            uuid: Uuid::new_v4(),
            session,
            started: false,
            closing: false,
            done: false,
            checksum: None,
            last_window: DEFAULT_WINDOW,
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn len(&self) -> usize {
        self.session.len()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn ack(&self) -> u16 {
        self.session.ack
    }

    /// The slots received so far. Fully populated, in order, only once
    /// [`Engine::is_done`] is true.
    pub fn sequence(&self) -> &risp_session::Sequence {
        &self.session.sequence
    }

    /// Resets the per-attempt fields ahead of a fresh connection: session
    /// progress (Ack, filled slots) survives, but the handshake must run
    /// again and the window grant reverts to [`DEFAULT_WINDOW`] (§4.6
    /// "On reset (reconnection, killswitch), revert to DefaultWindow").
    pub fn reconnect(&mut self) {
        self.started = false;
        self.session.window = DEFAULT_WINDOW;
        self.last_window = DEFAULT_WINDOW;
    }

    fn is_complete(&self) -> bool {
        usize::from(self.session.ack) == self.session.len()
    }

    /// Applies one inbound server message (§4.6 HandleMessage).
    fn handle_message(&mut self, msg: ServerMessage) -> Result<(), ClientError> {
        match msg.state {
            ConnectionState::Connecting => Err(ClientError::UnexpectedServerState),
            ConnectionState::Connected => {
                self.session.sequence.fill(msg.index as usize, msg.payload)?;
                self.session.recompute_ack();
                self.session.window = self.session.window.saturating_sub(1);
                Ok(())
            }
            ConnectionState::Closing => {
                if !self.is_complete() {
                    return Err(ClientError::ClosingBeforeComplete {
                        ack: self.session.ack,
                        len: self.session.len(),
                    });
                }
                self.checksum = Some(msg.checksum);
                self.closing = true;
                Ok(())
            }
            ConnectionState::Closed => {
                if !self.is_complete() || self.checksum.is_none() {
                    return Err(ClientError::ClosedBeforeChecksum);
                }
                self.done = true;
                Ok(())
            }
        }
    }

    /// Builds the next ClientMessage and advances `started` as a side
    /// effect, per the state-tag precedence in §4.6 NextMessage.
    fn next_message(&mut self) -> ClientMessage {
        let state = if !self.started {
            self.started = true;
            ConnectionState::Connecting
        } else if self.closing && self.checksum.is_some() {
            ConnectionState::Closed
        } else if self.checksum.is_none() && self.is_complete() {
            ConnectionState::Closing
        } else {
            ConnectionState::Connected
        };
        ClientMessage {
            state,
            uuid: self.uuid,
            len: self.session.len() as u32,
            ack: u32::from(self.session.ack),
            window: u32::from(self.session.window),
        }
    }

    /// Doubles the last granted window, capped at [`MAX_WINDOW`] (§4.6
    /// adaptive window policy).
    fn grant_new_window(&mut self) {
        let doubled = u32::from(self.last_window) * 2;
        let window = doubled.min(u32::from(MAX_WINDOW)) as u16;
        self.session.window = window;
        self.last_window = window;
    }

    /// Decides whether the send ticker should emit this tick, and builds
    /// the message if so (§4.6 "Send ticker").
    fn on_send_tick(&mut self) -> Option<ClientMessage> {
        if self.done {
            return None;
        }
        if !self.started {
            return Some(self.next_message());
        }
        if self.session.window == 0 {
            self.grant_new_window();
            return Some(self.next_message());
        }
        if self.checksum.is_none() && self.is_complete() {
            return Some(self.next_message());
        }
        None
    }

    /// Verifies the received sequence against the server-reported checksum
    /// (§4.6 Finish).
    fn finish(&self) -> Result<(), ClientError> {
        let checksum = self.checksum.ok_or(ClientError::ClosedBeforeChecksum)?;
        let actual = risp_checksum::sum(self.session.sequence.as_slots())?;
        if actual != checksum {
            return Err(ClientError::ChecksumMismatch {
                expected: checksum,
                actual,
            });
        }
        Ok(())
    }

    /// Runs one connection attempt to completion: spawns a receive thread,
    /// optionally a killswitch thread, then drives the send/handle loop on
    /// the calling thread until `done`, a protocol error, or disconnection
    /// (§4.6 main loop, §5 per-connection tasks).
    ///
    /// Returns `Ok(())` only once the checksum has been verified.
    pub fn run_once(
        &mut self,
        transport: Arc<dyn Transport>,
        tick: Duration,
        killswitch: Option<Duration>,
    ) -> Result<(), ClientError> {
        let (inbound_tx, inbound_rx) = channel::<ServerMessage>();

        let recv_transport = Arc::clone(&transport);
        let receiver = thread::spawn(move || -> Result<(), ClientError> {
            loop {
                match recv_transport.recv(tick) {
                    Ok(Some(bytes)) => {
                        let msg = ServerMessage::decode(&bytes)?;
                        let is_closed = msg.state == ConnectionState::Closed;
                        if inbound_tx.send(msg).is_err() {
                            return Ok(());
                        }
                        if is_closed {
                            return Ok(());
                        }
                    }
                    Ok(None) => continue,
                    Err(ProtocolError::Disconnected) => return Ok(()),
                    Err(error) => return Err(error.into()),
                }
            }
        });

        let killswitch_handle = killswitch.map(|delay| {
            let kill_transport = Arc::clone(&transport);
            thread::spawn(move || {
                thread::sleep(delay);
                debug!("killswitch firing, simulating a disconnect");
                let _ = kill_transport.shutdown();
            })
        });

        let handshake = self.next_message();
        let outcome = transport.send(&handshake.encode()).map_err(ClientError::from);

        let result = outcome.and_then(|()| loop {
            match inbound_rx.recv_timeout(tick) {
                Ok(msg) => {
                    self.handle_message(msg)?;
                    if self.done {
                        break Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(msg) = self.on_send_tick() {
                        if transport.send(&msg.encode()).is_err() {
                            break Err(ClientError::ClientDisconnected);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(ClientError::ClientDisconnected);
                }
            }
        });

        let _ = transport.shutdown();
        if let Ok(Err(error)) = receiver.join() {
            warn!(%error, "client receive thread ended with an error");
        }
        if let Some(handle) = killswitch_handle {
            let _ = handle.join();
        }

        result.and_then(|()| if self.done { self.finish() } else { Ok(()) })
    }
}

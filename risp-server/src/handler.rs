use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use risp_proto::{ClientMessage, ConnectionState, ServerMessage};
use risp_session::{Sequence, Store, Uuid};

use crate::errors::ServerError;

/// The largest window a client may grant in one update; larger grants are
/// clamped (§4.6 "MaxWindow").
pub const MAX_WINDOW: u16 = 256;

/// The handler's three states (§4.4): transmitting payloads, winding down
/// with a checksum, or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerState {
    Active,
    Closing,
    Done,
}

/// Per-connection state machine that advances one client's session.
///
/// Owns a working copy of the session: the full (immutable, server-
/// generated) sequence, a locally-advanced "next to send" pointer, and a
/// local window balance. The store's `ack` is the last value the *client*
/// confirmed and is what a fresh handler re-anchors on after a reconnect;
/// `next_to_send` is this handler instance's own optimistic send cursor
/// and is never written back to the store. See §4.4's rationale and §9's
/// note on keeping the two separate.
pub struct SessionHandler {
    uuid: Uuid,
    store: Arc<Store>,
    state: HandlerState,
    sequence: Sequence,
    next_to_send: u16,
    window: u16,
    closed_reply_sent: bool,
}

impl SessionHandler {
    /// Builds a handler for `uuid`, re-reading the store so `next_to_send`
    /// starts from the last client-confirmed ack (the rewind-on-reconnect
    /// property).
    pub fn new(uuid: Uuid, store: Arc<Store>) -> Result<Self, ServerError> {
        let session = store.get(&uuid)?;
        Ok(Self {
            uuid,
            store,
            state: HandlerState::Active,
            sequence: session.sequence,
            next_to_send: session.ack,
            window: session.window,
            closed_reply_sent: false,
        })
    }

    fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Applies one inbound client message (§4.4 Transitions).
    fn handle_inbound(&mut self, msg: ClientMessage) -> Result<(), ServerError> {
        match msg.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                if msg.ack as usize > self.len() {
                    return Err(ServerError::AckExceedsLength {
                        ack: msg.ack,
                        len: self.len(),
                    });
                }
                let window = msg.window.min(u32::from(MAX_WINDOW)) as u16;
                self.store.with_session(&self.uuid, |session| {
                    session.ack = msg.ack as u16;
                    session.window = window;
                })?;
                self.window = window;
            }
            ConnectionState::Closing => {
                self.state = HandlerState::Closing;
            }
            ConnectionState::Closed => {
                self.store.clear(&self.uuid)?;
                self.state = HandlerState::Done;
            }
        }
        Ok(())
    }

    /// Produces the message (if any) this tick should emit (§4.4 ticker
    /// transitions).
    fn on_tick(&mut self) -> Result<Option<ServerMessage>, ServerError> {
        match self.state {
            HandlerState::Active => {
                if usize::from(self.next_to_send) < self.len() && self.window > 0 {
                    let index = self.next_to_send;
                    let payload = self
                        .sequence
                        .get(usize::from(index))
                        .expect("server sequence is fully populated at creation");
                    self.window -= 1;
                    self.next_to_send += 1;
                    Ok(Some(ServerMessage::payload(u32::from(index), payload)))
                } else {
                    Ok(None)
                }
            }
            HandlerState::Closing => {
                let checksum = risp_checksum::sum(self.sequence.as_slots())?;
                Ok(Some(ServerMessage::closing(checksum)))
            }
            HandlerState::Done => {
                // The client only considers itself done once it has received
                // this reply, so it is sent exactly once here rather than on
                // the transition into `Done` (§4.4 closing handshake).
                if self.closed_reply_sent {
                    Ok(None)
                } else {
                    self.closed_reply_sent = true;
                    Ok(Some(ServerMessage::closed()))
                }
            }
        }
    }

    fn is_done(&self) -> bool {
        self.state == HandlerState::Done
    }

    /// `true` once `Done` has been reached and the final CLOSED reply has
    /// gone out (or there is no longer any way to send it).
    fn is_finished(&self) -> bool {
        self.is_done() && self.closed_reply_sent
    }

    /// Runs the handler to completion: selects between inbound messages
    /// and ticker ticks until the client sends CLOSED (normal completion)
    /// or the inbound channel disconnects (the connection dropped and a
    /// reconnect is expected to recreate the handler, §4.4 edge cases).
    ///
    /// `outbound` is closed (dropped) when this function returns, which is
    /// how the send-drainer task (§4.5 step 6) learns to stop.
    pub fn run(
        uuid: Uuid,
        store: Arc<Store>,
        inbound: Receiver<ClientMessage>,
        outbound: Sender<ServerMessage>,
        ticker: Duration,
    ) -> Result<(), ServerError> {
        let mut handler = Self::new(uuid, store)?;
        loop {
            match inbound.recv_timeout(ticker) {
                Ok(msg) => handler.handle_inbound(msg)?,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(msg) = handler.on_tick()? {
                        if outbound.send(msg).is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
            if handler.is_finished() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn store_with_session(len: usize) -> (Arc<Store>, Uuid) {
        let store = Arc::new(Store::new());
        let uuid = Uuid::new_v4();
        store.new_session(uuid, len).unwrap();
        store
            .with_session(&uuid, |s| {
                s.ack = 0;
                s.window = 4;
            })
            .unwrap();
        (store, uuid)
    }

    #[test]
    fn emits_payloads_while_window_and_remaining_slots_allow() {
        let (store, uuid) = store_with_session(4);
        let mut handler = SessionHandler::new(uuid, store).unwrap();
        for expected_index in 0..4u32 {
            let msg = handler.on_tick().unwrap().unwrap();
            assert_eq!(msg.state, ConnectionState::Connected);
            assert_eq!(msg.index, expected_index);
        }
        // window exhausted: no more payloads until a new grant arrives.
        assert_eq!(handler.on_tick().unwrap(), None);
    }

    #[test]
    fn window_zero_grant_suppresses_all_emission() {
        let store = Arc::new(Store::new());
        let uuid = Uuid::new_v4();
        store.new_session(uuid, 4).unwrap();
        store
            .with_session(&uuid, |s| {
                s.ack = 0;
                s.window = 0;
            })
            .unwrap();
        let mut handler = SessionHandler::new(uuid, store).unwrap();
        assert_eq!(handler.on_tick().unwrap(), None);
    }

    #[test]
    fn inbound_window_clamped_to_max() {
        let (store, uuid) = store_with_session(4);
        let mut handler = SessionHandler::new(uuid, store.clone()).unwrap();
        handler
            .handle_inbound(ClientMessage {
                state: ConnectionState::Connected,
                uuid,
                len: 4,
                ack: 0,
                window: 10_000,
            })
            .unwrap();
        assert_eq!(handler.window, MAX_WINDOW);
        assert_eq!(store.get(&uuid).unwrap().window, MAX_WINDOW);
    }

    #[test]
    fn ack_beyond_length_is_rejected() {
        let (store, uuid) = store_with_session(4);
        let mut handler = SessionHandler::new(uuid, store).unwrap();
        let result = handler.handle_inbound(ClientMessage {
            state: ConnectionState::Connected,
            uuid,
            len: 4,
            ack: 5,
            window: 4,
        });
        assert!(matches!(
            result,
            Err(ServerError::AckExceedsLength { ack: 5, len: 4 })
        ));
    }

    #[test]
    fn closing_then_closed_clears_session_and_stops() {
        let (store, uuid) = store_with_session(1);
        let mut handler = SessionHandler::new(uuid, store.clone()).unwrap();
        handler
            .handle_inbound(ClientMessage {
                state: ConnectionState::Closing,
                uuid,
                len: 1,
                ack: 1,
                window: 0,
            })
            .unwrap();
        let closing = handler.on_tick().unwrap().unwrap();
        assert_eq!(closing.state, ConnectionState::Closing);
        // repeated CLOSING emission is idempotent: tick again, same result.
        let closing_again = handler.on_tick().unwrap().unwrap();
        assert_eq!(closing_again.checksum, closing.checksum);

        handler
            .handle_inbound(ClientMessage {
                state: ConnectionState::Closed,
                uuid,
                len: 1,
                ack: 1,
                window: 0,
            })
            .unwrap();
        assert!(handler.is_done());
        assert!(store.get(&uuid).is_err());
    }

    #[test]
    fn run_exits_when_inbound_channel_drops() {
        let (store, uuid) = store_with_session(4);
        let (_inbound_tx, inbound_rx) = channel();
        let (outbound_tx, _outbound_rx) = channel();
        // dropping the sender immediately simulates a lost connection.
        drop(_inbound_tx);
        let result = SessionHandler::run(
            uuid,
            store,
            inbound_rx,
            outbound_tx,
            Duration::from_millis(5),
        );
        assert!(result.is_ok());
    }
}

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use risp_proto::{ClientMessage, ConnectionState, ServerMessage, Transport};
use risp_session::{Store, Uuid};
use tracing::{info, warn};

use crate::errors::ServerError;
use crate::handler::{SessionHandler, MAX_WINDOW};

/// Default time the dispatcher waits for a handshake message before giving
/// up on a freshly-accepted connection (§4.5 step 2).
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives a single accepted connection end to end (§4.5): reads the
/// handshake, creates or resumes the session, applies the handshake's
/// Ack/Window to the store, then runs a receive-loop thread and a handler
/// thread concurrently, forwarding outbound messages back onto `transport`
/// on the calling thread until the handler finishes.
///
/// Mirrors the teacher's `rx_handle`/`tx_handle` split, generalized from a
/// two-thread connection actor to three roles: receive, handle, send.
pub fn dispatch_connection(
    transport: Arc<dyn Transport>,
    store: Arc<Store>,
    ticker: Duration,
) -> Result<(), ServerError> {
    dispatch_connection_with_handshake_timeout(transport, store, ticker, DEFAULT_HANDSHAKE_TIMEOUT)
}

/// Same as [`dispatch_connection`] but with an explicit handshake timeout,
/// split out so tests don't have to wait on the production default.
pub fn dispatch_connection_with_handshake_timeout(
    transport: Arc<dyn Transport>,
    store: Arc<Store>,
    ticker: Duration,
    handshake_timeout: Duration,
) -> Result<(), ServerError> {
    let handshake_bytes = transport
        .recv(handshake_timeout)?
        .ok_or(ServerError::HandshakeTimeout)?;
    let handshake = ClientMessage::decode(&handshake_bytes)?;
    if handshake.state != ConnectionState::Connecting {
        return Err(ServerError::UnexpectedHandshakeState(handshake.state));
    }

    let uuid = handshake.uuid;
    match store.get(&uuid) {
        Ok(session) => {
            if session.len() != handshake.len as usize {
                return Err(ServerError::SequenceLengthMismatch {
                    stored: session.len(),
                    declared: handshake.len as usize,
                });
            }
            info!(%uuid, "resuming existing session");
        }
        Err(risp_session::SessionError::NotFound) => {
            store.new_session(uuid, handshake.len as usize)?;
            info!(%uuid, len = handshake.len, "created new session");
        }
        Err(error) => return Err(error.into()),
    }

    // §4.5 step 3: the handshake's Ack/Window are the client's own record of
    // what it already has, and must land in the store before the handler is
    // constructed below — the handler's "next to send" pointer is seeded
    // once, from whatever the store holds at that moment.
    if handshake.ack as usize > handshake.len as usize {
        return Err(ServerError::AckExceedsLength {
            ack: handshake.ack,
            len: handshake.len as usize,
        });
    }
    let window = handshake.window.min(u32::from(MAX_WINDOW)) as u16;
    store.with_session(&uuid, |session| {
        session.ack = handshake.ack as u16;
        session.window = window;
    })?;

    let (inbound_tx, inbound_rx) = channel::<ClientMessage>();
    let (outbound_tx, outbound_rx) = channel::<ServerMessage>();

    let recv_transport = Arc::clone(&transport);
    let receive_loop = thread::spawn(move || -> Result<(), ServerError> {
        loop {
            match recv_transport.recv(ticker) {
                Ok(Some(bytes)) => {
                    let msg = match ClientMessage::decode(&bytes) {
                        Ok(msg) => msg,
                        Err(error) => {
                            warn!(%uuid, %error, "dropping connection after a malformed client message");
                            return Err(error.into());
                        }
                    };
                    let is_closed = msg.state == ConnectionState::Closed;
                    if inbound_tx.send(msg).is_err() {
                        return Ok(());
                    }
                    if is_closed {
                        return Ok(());
                    }
                }
                Ok(None) => continue,
                Err(risp_proto::ProtocolError::Disconnected) => return Ok(()),
                Err(error) => {
                    warn!(%uuid, %error, "receive loop ended on a non-cancellation transport error");
                    return Err(error.into());
                }
            }
        }
    });

    let handler_store = Arc::clone(&store);
    let handler_thread = thread::spawn(move || {
        SessionHandler::run(uuid, handler_store, inbound_rx, outbound_tx, ticker)
    });

    for msg in outbound_rx {
        if transport.send(&msg.encode()).is_err() {
            break;
        }
    }

    let _ = transport.shutdown();

    match receive_loop.join() {
        Ok(result) => result?,
        Err(_) => warn!(%uuid, "receive loop thread panicked"),
    }
    match handler_thread.join() {
        Ok(result) => result?,
        Err(_) => warn!(%uuid, "handler thread panicked"),
    }

    Ok(())
}

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use risp_proto::Transport;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::ClientError;

/// Default bound on reconnection attempts before giving up (§C.3).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default incremental backoff step between attempts (§C.3).
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Drives `engine` to completion, reconnecting on [`ClientError::ClientDisconnected`]
/// up to `max_attempts` times with incremental backoff (attempt `n` waits
/// `n * backoff_step`), reusing `engine`'s UUID and partial progress across
/// attempts (§7, §C.3). Any other error is fatal and returned immediately.
///
/// `connect` is called once per attempt and must yield a fresh transport to
/// the same endpoint; `killswitch` (if any) only applies to the first
/// attempt, matching the "fires once" semantics of §4.6.
pub fn connect_with_retry(
    engine: &mut Engine,
    mut connect: impl FnMut() -> Result<Arc<dyn Transport>, ClientError>,
    tick: Duration,
    killswitch: Option<Duration>,
    max_attempts: u32,
    backoff_step: Duration,
) -> Result<(), ClientError> {
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            engine.reconnect();
        }
        let this_killswitch = if attempt == 0 { killswitch } else { None };
        let outcome = connect().and_then(|transport| engine.run_once(transport, tick, this_killswitch));
        match outcome {
            Ok(()) => return Ok(()),
            Err(ClientError::ClientDisconnected) => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!(attempt, max_attempts, "exhausted reconnection attempts");
                    return Err(ClientError::ClientDisconnected);
                }
                let delay = backoff_step * attempt;
                info!(attempt, ?delay, "reconnecting after disconnect");
                thread::sleep(delay);
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// A transport that returns `Disconnected` on every call, standing in
    /// for an endpoint that is simply unreachable.
    struct DeadTransport;

    impl Transport for DeadTransport {
        fn send(&self, _frame: &[u8]) -> Result<(), risp_proto::ProtocolError> {
            Err(risp_proto::ProtocolError::Disconnected)
        }
        fn recv(
            &self,
            _timeout: Duration,
        ) -> Result<Option<Vec<u8>>, risp_proto::ProtocolError> {
            Err(risp_proto::ProtocolError::Disconnected)
        }
        fn shutdown(&self) -> Result<(), risp_proto::ProtocolError> {
            Ok(())
        }
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut engine = Engine::new(Some(1)).unwrap();
        let calls = AtomicU32::new(0);
        let result = connect_with_retry(
            &mut engine,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(DeadTransport) as Arc<dyn Transport>)
            },
            Duration::from_millis(5),
            None,
            3,
            Duration::from_millis(1),
        );
        assert!(matches!(result, Err(ClientError::ClientDisconnected)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn connect_failures_are_retried_like_disconnects() {
        let mut engine = Engine::new(Some(1)).unwrap();
        let calls = Mutex::new(0u32);
        let result = connect_with_retry(
            &mut engine,
            || {
                *calls.lock().unwrap() += 1;
                Err(ClientError::ClientDisconnected)
            },
            Duration::from_millis(5),
            None,
            3,
            Duration::from_millis(1),
        );
        assert!(matches!(result, Err(ClientError::ClientDisconnected)));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[test]
    fn fatal_connect_error_is_not_retried() {
        let mut engine = Engine::new(Some(1)).unwrap();
        let calls = Mutex::new(0u32);
        let result = connect_with_retry(
            &mut engine,
            || {
                *calls.lock().unwrap() += 1;
                Err(ClientError::UnexpectedServerState)
            },
            Duration::from_millis(5),
            None,
            3,
            Duration::from_millis(1),
        );
        assert!(matches!(result, Err(ClientError::UnexpectedServerState)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}

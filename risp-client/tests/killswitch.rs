use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use risp_client::{connect_with_retry, Engine};
use risp_proto::{ChannelTransport, Transport};
use risp_server::dispatch_connection;
use risp_session::Store;

const TICK: Duration = Duration::from_millis(5);

/// §8 scenario 6: a killswitch fires mid-stream, the engine reports
/// `ClientDisconnected`, and `connect_with_retry` reconnects with the same
/// UUID and finishes delivery of the full sequence.
#[test]
fn killswitch_mid_stream_recovers_via_retry_and_completes() {
    let store = Arc::new(Store::new());
    let len = 16;
    let mut engine = Engine::new(Some(len)).unwrap();
    let attempts = AtomicUsize::new(0);

    let result = connect_with_retry(
        &mut engine,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            let (server_side, client_side) = ChannelTransport::pair();
            let server_store = Arc::clone(&store);
            thread::spawn(move || {
                let _ = dispatch_connection(Arc::new(server_side), server_store, TICK);
            });
            Ok(Arc::new(client_side) as Arc<dyn Transport>)
        },
        TICK,
        Some(Duration::from_millis(20)),
        5,
        Duration::from_millis(5),
    );

    assert!(result.is_ok(), "killswitch scenario failed: {result:?}");
    assert!(engine.is_done());
    assert_eq!(usize::from(engine.ack()), len);
    assert!(
        attempts.load(Ordering::SeqCst) >= 2,
        "the killswitch should have forced at least one reconnect"
    );
}

mod config;

use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use config::{Cli, Command};
use risp_client::{connect_with_retry, Engine, DEFAULT_BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS};
use risp_proto::{ProtocolError, TcpTransport, Transport};
use risp_server::dispatch_connection;
use risp_session::Store;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.clone())
        .init();

    let result = match cli.command {
        Command::Server { server_ticker_ms } => run_server(cli.port, server_ticker_ms),
        Command::Client {
            sequence_length,
            client_ticker_ms,
            client_killswitch_ms,
            host,
        } => run_client(
            &host,
            cli.port,
            sequence_length,
            client_ticker_ms,
            client_killswitch_ms,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run_server(port: u16, ticker_ms: u64) -> Result<(), String> {
    let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|e| e.to_string())?;
    info!(port, "listening");

    let store = Arc::new(Store::new());
    let ticker = Duration::from_millis(ticker_ms);

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(error) => {
                warn!(%error, "failed to accept connection");
                continue;
            }
        };
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(stream));
            if let Err(error) = dispatch_connection(transport, store, ticker) {
                warn!(%error, "connection ended with an error");
            }
        });
    }

    Ok(())
}

fn run_client(
    host: &str,
    port: u16,
    sequence_length: Option<usize>,
    ticker_ms: u64,
    killswitch_ms: u64,
) -> Result<(), String> {
    let mut engine = Engine::new(sequence_length).map_err(|e| e.to_string())?;
    info!(uuid = %engine.uuid(), len = engine.len(), "starting session");

    let tick = Duration::from_millis(ticker_ms);
    let killswitch = (killswitch_ms > 0).then(|| Duration::from_millis(killswitch_ms));
    let host = host.to_string();

    connect_with_retry(
        &mut engine,
        move || dial(&host, port),
        tick,
        killswitch,
        DEFAULT_MAX_ATTEMPTS,
        DEFAULT_BACKOFF_STEP,
    )
    .map_err(|e| e.to_string())?;

    info!(uuid = %engine.uuid(), "session complete, checksum verified");
    Ok(())
}

fn dial(host: &str, port: u16) -> Result<Arc<dyn Transport>, risp_client::ClientError> {
    let stream = TcpStream::connect((host, port)).map_err(ProtocolError::from)?;
    Ok(Arc::new(TcpTransport::new(stream)))
}

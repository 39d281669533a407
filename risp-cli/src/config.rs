use clap::{Parser, Subcommand};

/// RISP client and server, selected by subcommand (§6 CLI surface).
#[derive(Parser)]
#[command(name = "risp", about = "Reliable Integer Stream Protocol client and server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Listen/connect port.
    #[arg(long, env = "RISP_PORT", default_value_t = 9000, global = true)]
    pub port: u16,

    /// One of trace, debug, info, warn, error.
    #[arg(long, env = "RISP_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to a server and receive a sequence.
    Client {
        /// Sequence length in [1, 65535]; random if omitted.
        sequence_length: Option<usize>,

        /// Client send-ticker period, in milliseconds.
        #[arg(long, env = "RISP_CLIENT_TICKER_MS", default_value_t = 2000)]
        client_ticker_ms: u64,

        /// Simulated mid-stream disconnect, in milliseconds; 0 disables.
        #[arg(long, env = "RISP_CLIENT_KILLSWITCH_MS", default_value_t = 0)]
        client_killswitch_ms: u64,

        /// Server address to connect to.
        #[arg(long, env = "RISP_SERVER_ADDR", default_value = "127.0.0.1")]
        host: String,
    },
    /// Accept connections and serve generated sequences.
    Server {
        /// Server send-ticker period, in milliseconds.
        #[arg(long, env = "RISP_SERVER_TICKER_MS", default_value_t = 1000)]
        server_ticker_ms: u64,
    },
}

//! Tandem server binary.
//!
//! # Usage
//!
//! ```bash
//! # Telegram delivery, token in SERVER_SETTINGS/BOT_TOKEN.txt
//! tandem-server --bind 0.0.0.0:9090
//!
//! # Local development: codes are written to the log instead
//! tandem-server --log-codes --history-db tandem.redb
//! ```
//!
//! Type `shutdown` on stdin to stop the server.

use std::path::PathBuf;

use clap::Parser;
use tandem_server::{
    Authenticator, DEFAULT_OUTBOUND_QUEUE, DriverConfig, FileTranscripts, MemoryAuthenticator, RedbTranscripts, Server,
    ServerRuntimeConfig, TelegramAuthenticator, TranscriptStore, auth::load_bot_token,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tandem chat relay server
#[derive(Parser, Debug)]
#[command(name = "tandem-server")]
#[command(about = "Turn-based two-party chat relay server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:9090")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Messages buffered per connection before a non-reading client is dropped
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_QUEUE)]
    outbound_queue: usize,

    /// File whose first line is the Telegram bot token
    #[arg(long, default_value = "SERVER_SETTINGS/BOT_TOKEN.txt")]
    bot_token_file: PathBuf,

    /// Log login codes instead of sending them through Telegram
    #[arg(long)]
    log_codes: bool,

    /// Directory for per-pair transcript files
    #[arg(long, default_value = "HISTORY")]
    history_dir: PathBuf,

    /// Keep transcripts in a redb database instead of text files
    #[arg(long)]
    history_db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Tandem server starting");

    // Built before the async runtime: the Telegram client is blocking.
    let authenticator: Box<dyn Authenticator> = if args.log_codes {
        tracing::warn!("Login codes are logged, not delivered");
        tracing::warn!("This is NOT suitable for production use!");
        Box::new(MemoryAuthenticator::logging())
    } else {
        let token = load_bot_token(&args.bot_token_file)?;
        Box::new(TelegramAuthenticator::new(&token)?)
    };

    let transcripts: Box<dyn TranscriptStore> = match &args.history_db {
        Some(path) => {
            tracing::info!("Transcripts in redb database {}", path.display());
            Box::new(RedbTranscripts::open(path)?)
        },
        None => {
            tracing::info!("Transcripts in directory {}", args.history_dir.display());
            Box::new(FileTranscripts::new(&args.history_dir))
        },
    };

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        driver: DriverConfig { max_connections: args.max_connections },
        outbound_queue: args.outbound_queue,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(async move {
        let server = Server::bind(config, authenticator, transcripts).await?;
        tracing::info!("Server listening on {}", server.local_addr()?);

        let operator = tokio::io::BufReader::new(tokio::io::stdin());
        server.run(operator).await
    });

    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_background();
    result?;

    Ok(())
}

//! sealboxd - the sealbox storage and rendezvous server

use clap::Parser;
use sealbox_server::{ServerConfig, run_server};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sealboxd")]
#[command(about = "Zero-trust server for end-to-end encrypted file sharing")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SEALBOX_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8420", env = "SEALBOX_PORT")]
    port: u16,

    /// Directory for the ledger snapshot and blob files
    #[arg(long, default_value = "./sealbox-data", env = "SEALBOX_DATA_DIR")]
    data_dir: PathBuf,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "SEALBOX_MEMORY_STORE")]
    memory_store: bool,

    /// Rate limit in requests per second per identity
    #[arg(long, default_value = "100", env = "SEALBOX_RATE_LIMIT")]
    rate_limit: u32,

    /// Enable debug logging
    #[arg(short, long, env = "SEALBOX_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sealbox_server={},tower_http=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting sealbox server on {}:{}", args.host, args.port);
    if args.memory_store {
        tracing::warn!("⚠ using in-memory storage - data will NOT persist!");
    } else {
        tracing::info!("data directory: {}", args.data_dir.display());
    }

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        data_dir: args.data_dir,
        use_memory_store: args.memory_store,
        rate_limit_rps: args.rate_limit,
        ..Default::default()
    };

    run_server(config).await
}

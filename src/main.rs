//! UTXO Ledger Indexer - Main Entry Point
//!
//! Reads configuration, opens the SQLite-backed store, wires up the
//! Serialization Gate and the three indexing engines, and serves the HTTP
//! boundary.

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use utxoledger_database::SqliteStore;
use utxoledger_http::{router, AppState};
use utxoledger_store::UtxoStore;

/// Command line arguments for the UTXO ledger indexer.
#[derive(Parser)]
#[clap(name = "utxoledger")]
#[clap(about = "UTXO-model chain indexer with single-writer ingestion and rollback")]
struct Cli {
    /// Address to bind the HTTP server to
    #[clap(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// SQLite database URL; overrides the DATABASE_URL environment variable
    #[clap(long)]
    database_url: Option<String>,

    /// Verbosity level (0-5)
    #[clap(short, long, default_value = "3")]
    verbosity: u8,
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    info!("Starting UTXO ledger indexer");

    let database_url = cli.database_url.or_else(|| std::env::var("DATABASE_URL").ok());
    let database_url = match database_url {
        Some(url) => url,
        None => {
            error!("DATABASE_URL is not set and --database-url was not provided");
            process::exit(1);
        }
    };

    let store = match SqliteStore::connect(&database_url) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open database at {database_url}: {e}");
            process::exit(1);
        }
    };

    let tip = match store.tip().await {
        Ok(tip) => tip,
        Err(e) => {
            error!("Failed to read chain tip: {e}");
            process::exit(1);
        }
    };
    info!("Opened store at {database_url}, current tip height {tip}");

    let bind_addr: SocketAddr = match cli.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {e}", cli.bind);
            process::exit(1);
        }
    };

    let state = AppState::new(Arc::new(store) as Arc<dyn UtxoStore>);
    let app = router(state);

    info!("Listening on {bind_addr}");
    if let Err(e) = axum::Server::bind(&bind_addr)
        .serve(app.into_make_service())
        .await
    {
        error!("HTTP server error: {e}");
        process::exit(1);
    }
}

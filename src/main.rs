//! Earthquake data API server.
//!
//! ```text
//!     Client ──▶ http (axum) ──▶ /earthquakes ─────────────▶ store (postgres)
//!                             └─▶ /earthquakes/live
//!                                   │ breaker allows?
//!                                   ├─ yes ──▶ upstream client ──▶ feed
//!                                   │           (timeout, retry, backoff)
//!                                   └─ no / failure ──▶ store fallback
//!
//!     quake-api ingest ──▶ upstream client ──▶ store (insert new ids only)
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use quake_api::config::{load_config, AppConfig};
use quake_api::ingest::{
    run_ingest, IngestOptions, DEFAULT_DAYS_BACK, DEFAULT_MIN_MAGNITUDE, MAX_FEED_LIMIT,
};
use quake_api::lifecycle::{build_state, build_store, build_upstream, spawn_signal_listener};
use quake_api::observability::{logging::init_logging, metrics::init_metrics};
use quake_api::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "quake-api")]
#[command(about = "Earthquake data API with a resilient live query path", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(short, long, env = "QUAKE_API_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (the default)
    Serve,
    /// Fetch recent events from the upstream feed into the store
    Ingest {
        /// Number of past days to fetch
        #[arg(long, default_value_t = DEFAULT_DAYS_BACK,
              value_parser = clap::value_parser!(u32).range(1..))]
        days_back: u32,
        /// Minimum magnitude to include
        #[arg(long, default_value_t = DEFAULT_MIN_MAGNITUDE)]
        min_magnitude: f64,
        /// Maximum events requested from the feed
        #[arg(long, default_value_t = MAX_FEED_LIMIT,
              value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FEED_LIMIT)))]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.observability);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Ingest {
            days_back,
            min_magnitude,
            limit,
        } => {
            let options = IngestOptions {
                days_back,
                min_magnitude,
                limit,
            };
            let store = build_store(&config)?;
            let client = build_upstream(&config)?;
            let report = run_ingest(&client, store.as_ref(), &options).await?;
            println!(
                "{} records fetched, {} inserted, {} skipped",
                report.fetched, report.inserted, report.skipped
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "quake-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        upstream_timeout_secs = config.upstream.timeout_secs,
        max_retries = config.upstream.max_retries,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = build_state(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    spawn_signal_listener(shutdown);

    HttpServer::new(&config, state).run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

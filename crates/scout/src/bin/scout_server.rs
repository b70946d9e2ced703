//! Scout REST Server
//!
//! HTTP API over the candidate corpus: status, corpus statistics and hybrid
//! search.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use scout::config::ScoutConfig;
use scout::server::{start_server, AppState};
use scout::services::Services;

#[derive(Parser)]
#[command(name = "scout_server")]
#[command(about = "Scout REST API Server")]
#[command(version)]
struct Args {
  /// Server bind address
  #[arg(long, default_value = "127.0.0.1:3000")]
  bind: SocketAddr,

  /// Path to a YAML config file
  #[arg(long, env = "SCOUT_CONFIG")]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let default = if args.verbose { "scout=debug,tower_http=debug,info" } else { "scout=info,warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  info!(version = env!("CARGO_PKG_VERSION"), bind = %args.bind, "Starting Scout REST Server");

  let config = ScoutConfig::load(args.config.as_deref())?;
  let services = Services::open(config)?;

  let retriever = match services.retriever(true) {
    Ok(retriever) => Some(Arc::new(retriever)),
    Err(e) => {
      warn!(error = %e, "Search disabled");
      None
    }
  };

  let state = AppState::new(
    services.store.clone(),
    retriever,
    services.config.search.clone(),
    services.data_dir.clone(),
  );
  start_server(args.bind, state).await?;

  Ok(())
}

//! REST server startup

use anyhow::Result;
use axum::serve;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::server::routing::create_router;
use crate::server::state::AppState;

/// Bind and serve until the process is stopped
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<()> {
  info!(%addr, "Starting scout REST server");

  let app = create_router(state)
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

  let listener = TcpListener::bind(addr).await?;
  info!(%addr, "Server listening");

  match serve(listener, app).await {
    Ok(_) => {
      info!("Server shutdown gracefully");
      Ok(())
    }
    Err(e) => {
      error!(error = %e, "Server error");
      Err(anyhow::anyhow!("Server error: {}", e))
    }
  }
}

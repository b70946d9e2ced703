//! REST API for candidate search
//!
//! Exposes corpus status and hybrid search over HTTP. Uses axum for routing
//! and schemars for OpenAPI-ready response types.

pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod state;
pub mod types;

pub use routing::create_router;
pub use server::start_server;
pub use state::AppState;

//! REST API exposing the live simulation state.
//!
//! Provides two GET endpoints:
//! - `/state`: plant parameters, dispatch policy, and the latest tick
//! - `/health`: liveness probe

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::runner::SharedStatus;
use crate::sim::DispatchPolicy;
use crate::sim::types::PlantConfig;

pub use types::{ErrorResponse, StateResponse, StatusRecord};

/// Application state shared across all request handlers.
///
/// Plant and policy are fixed for the run; the tick loop keeps `status`
/// current.
pub struct AppState {
    pub plant: PlantConfig,
    pub policy: DispatchPolicy,
    /// Latest tick report, written by the tick loop.
    pub status: SharedStatus,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/health", get(handlers::get_health))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}

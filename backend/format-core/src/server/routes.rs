use crate::{SHUTDOWN_ACKNOWLEDGEMENT, SHUTDOWN_PATH};
use crate::server::backend::Backend;
use crate::session::shutdown::ShutdownCoordinator;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use log::{debug, info};

/// The complete application: `/shutdown`, the backend's endpoints and the
/// request body limit.
pub fn app(backend: Backend, coordinator: Arc<ShutdownCoordinator>, body_limit: usize) -> Router {
    Router::new()
        .route(SHUTDOWN_PATH, post(shutdown))
        .with_state(coordinator)
        .merge(backend.router())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Acknowledge first; the coordinator starts draining only after the
/// acknowledgement delay, so this response is always delivered.
async fn shutdown(State(coordinator): State<Arc<ShutdownCoordinator>>) -> &'static str {
    if coordinator.request() {
        info!("Graceful shutdown requested");
    } else {
        debug!("Shutdown already in progress");
    }
    SHUTDOWN_ACKNOWLEDGEMENT
}

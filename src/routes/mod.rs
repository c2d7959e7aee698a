// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::dispatcher::ActionDispatcher;
use crate::scheduler::SchedulerHandle;

pub use http::{SnapshotView, status_for};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) scheduler: SchedulerHandle,
    pub(crate) dispatcher: Arc<ActionDispatcher>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

pub fn app(
    scheduler: SchedulerHandle,
    dispatcher: Arc<ActionDispatcher>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        scheduler,
        dispatcher,
        ws_connections: Arc::new(AtomicUsize::new(0)),
        config,
    };
    Router::new()
        .route("/", get(http::root_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/refresh", post(http::refresh_handler)) // POST /api/refresh
        .route("/api/services/{name}/toggle", post(http::toggle_handler)) // POST /api/services/{name}/toggle
        .route("/api/reboot", post(http::reboot_handler)) // POST /api/reboot
        .route("/api/shutdown", post(http::shutdown_handler)) // POST /api/shutdown
        .route("/ws/snapshot", get(ws::ws_snapshot)) // WS /ws/snapshot
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

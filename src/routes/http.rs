// HTTP handlers: identity, snapshot reads, actions

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::AppState;
use crate::classify::SnapshotTiers;
use crate::error::{ActionError, ErrorKind};
use crate::models::{ActionRequest, HealthSnapshot};
use crate::version::{NAME, VERSION, banner};

/// Body of `GET /api/snapshot` and of each `/ws/snapshot` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub snapshot: HealthSnapshot,
    pub tiers: SnapshotTiers,
}

impl SnapshotView {
    pub fn of(snapshot: &Arc<HealthSnapshot>) -> Self {
        Self {
            tiers: SnapshotTiers::of(snapshot),
            snapshot: snapshot.as_ref().clone(),
        }
    }
}

/// HTTP status for a failed action.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Unreachable | ErrorKind::AuthFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::ExecutionFailure | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "kind": self.kind,
            "detail": self.detail,
        }));
        (status_for(self.kind), body).into_response()
    }
}

pub(super) async fn root_handler() -> impl IntoResponse {
    banner()
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/snapshot: 503 until the first cycle has been published.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> Response {
    match state.scheduler.current() {
        Some(snapshot) => Json(SnapshotView::of(&snapshot)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "kind": ErrorKind::Unknown,
                "detail": "no snapshot published yet",
            })),
        )
            .into_response(),
    }
}

pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sequence = state.scheduler.current().map(|s| s.sequence);
    Json(serde_json::json!({
        "state": state.scheduler.state(),
        "sequence": sequence,
        "sampleIntervalMs": state.config.monitoring.sample_interval_ms,
        "wsClients": state.ws_connections.load(Ordering::Relaxed),
    }))
}

pub(super) async fn refresh_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(state.dispatcher.refresh()))
}

pub(super) async fn toggle_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    dispatch(&state, ActionRequest::toggle(name)).await
}

pub(super) async fn reboot_handler(State(state): State<AppState>) -> Response {
    dispatch(&state, ActionRequest::reboot()).await
}

pub(super) async fn shutdown_handler(State(state): State<AppState>) -> Response {
    dispatch(&state, ActionRequest::shutdown()).await
}

async fn dispatch(state: &AppState, request: ActionRequest) -> Response {
    match state.dispatcher.dispatch(request).await {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => e.into_response(),
    }
}

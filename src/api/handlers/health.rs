use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// `503` while the state file cannot be written: alerts would repeat after a restart.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let persistence_ok = state.persistence_ok.load(Ordering::Relaxed);
    let alerts = state.notifier.alert_count();

    if persistence_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "alerts_sent": alerts })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "persistence": "failing", "alerts_sent": alerts })),
        )
    }
}

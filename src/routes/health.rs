use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::store::migrate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "runtime": {
            "running": state.runtime().is_running(),
            "droppedFrames": state.runtime().dropped_frames(),
        },
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// 手势运行时停止后不再接收帧
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.runtime().is_running() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn database_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let version = migrate::get_current_version(state.store());
    let latency_us = start.elapsed().as_micros() as u64;

    Json(serde_json::json!({
        "healthy": version.is_ok(),
        "schemaVersion": version.ok(),
        "latencyUs": latency_us,
    }))
}

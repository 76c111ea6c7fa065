use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_FRAMES_PER_REQUEST;
use crate::extractors::JsonBody;
use crate::gesture::types::PoseFrame;
use crate::gesture::GestureError;
use crate::response::{accepted, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_frames))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitFramesRequest {
    frames: Vec<PoseFrame>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitFramesResponse {
    accepted: usize,
    dropped: usize,
}

/// 帧按请求内顺序入队；识别结果通过 SSE 推送
async fn submit_frames(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitFramesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.frames.len() > MAX_FRAMES_PER_REQUEST {
        return Err(AppError::payload_too_large(&format!(
            "at most {MAX_FRAMES_PER_REQUEST} frames per request"
        )));
    }
    if !state.runtime().is_running() {
        return Err(GestureError::RuntimeClosed.into());
    }

    let mut result = SubmitFramesResponse {
        accepted: 0,
        dropped: 0,
    };
    for frame in req.frames {
        if state.runtime().feed_pose(frame) {
            result.accepted += 1;
        } else {
            result.dropped += 1;
        }
    }

    Ok(accepted(result))
}

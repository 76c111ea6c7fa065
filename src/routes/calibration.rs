use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::table::ThresholdLookup;
use crate::calibration::CalibrationConfig;
use crate::calibration::types::{CalibrationSample, CalibrationStatus};
use crate::constants::MAX_CALIBRATION_SAMPLES;
use crate::extractors::JsonBody;
use crate::gesture::types::{
    CalibrationContext, FeedbackKind, GestureType, InstrumentType, LightingQuality,
};
use crate::response::{created, ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(calibrate_batch))
        .route("/feedback", post(submit_feedback))
        .route("/outcomes", post(submit_outcome))
        .route("/optimization-tasks", post(schedule_task).get(list_tasks))
        .route("/threshold", get(get_threshold))
        .route("/history", get(get_history))
        .route("/report", get(get_report))
        .route("/config", get(get_config).put(update_config))
}

/// 请求未指定上下文时使用运行时当前上下文
async fn resolve_context(
    state: &AppState,
    context: Option<CalibrationContext>,
) -> Result<CalibrationContext, AppError> {
    match context {
        Some(ctx) => Ok(ctx.normalized()),
        None => Ok(state.runtime().status().await?.context),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalibrateBatchRequest {
    gesture_type: GestureType,
    context: Option<CalibrationContext>,
    samples: Vec<f64>,
}

async fn calibrate_batch(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CalibrateBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.samples.len() > MAX_CALIBRATION_SAMPLES {
        return Err(AppError::payload_too_large(&format!(
            "at most {MAX_CALIBRATION_SAMPLES} samples per batch"
        )));
    }
    if req.samples.iter().any(|v| !v.is_finite()) {
        return Err(AppError::bad_request(
            "INVALID_SAMPLE",
            "samples must be finite numbers",
        ));
    }

    let context = resolve_context(&state, req.context).await?;
    let samples: Vec<CalibrationSample> = req
        .samples
        .into_iter()
        .map(|value| CalibrationSample::new(req.gesture_type, value, context))
        .collect();

    let result = state
        .engine()
        .calibrate(req.gesture_type, context, &samples)
        .await;
    Ok(ok(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest {
    gesture_type: GestureType,
    feedback: FeedbackKind,
    context: Option<CalibrationContext>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackResponse {
    gesture_type: GestureType,
    context: CalibrationContext,
    threshold: f64,
}

async fn submit_feedback(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = resolve_context(&state, req.context).await?;
    let threshold = state
        .engine()
        .record_feedback(req.gesture_type, req.feedback, context)
        .await;

    Ok(ok(FeedbackResponse {
        gesture_type: req.gesture_type,
        context,
        threshold,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRequest {
    gesture_type: GestureType,
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeResponse {
    gesture_type: GestureType,
    accuracy: Option<f64>,
}

async fn submit_outcome(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OutcomeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine()
        .record_outcome(req.gesture_type, req.success)
        .await;
    Ok(ok(OutcomeResponse {
        gesture_type: req.gesture_type,
        accuracy: state.engine().accuracy(req.gesture_type).await,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleTaskRequest {
    gesture_type: GestureType,
    context: Option<CalibrationContext>,
    target_accuracy: f64,
    deadline: Option<DateTime<Utc>>,
}

async fn schedule_task(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ScheduleTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !(req.target_accuracy > 0.0 && req.target_accuracy <= 1.0) {
        return Err(AppError::bad_request(
            "INVALID_TARGET_ACCURACY",
            "targetAccuracy must be in (0,1]",
        ));
    }
    if let Some(deadline) = req.deadline {
        if deadline <= Utc::now() {
            return Err(AppError::bad_request(
                "INVALID_DEADLINE",
                "deadline must be in the future",
            ));
        }
    }

    let context = resolve_context(&state, req.context).await?;
    let task = state
        .engine()
        .schedule_optimization(req.gesture_type, context, req.target_accuracy, req.deadline)
        .await;
    Ok(created(task))
}

async fn list_tasks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().pending_tasks().await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdQuery {
    gesture_type: Option<String>,
    instrument: Option<String>,
    lighting: Option<String>,
    distance_cm: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdResponse {
    gesture_type: GestureType,
    context: CalibrationContext,
    #[serde(flatten)]
    lookup: ThresholdLookup,
    status: CalibrationStatus,
}

fn required_gesture(raw: Option<&str>) -> Result<GestureType, AppError> {
    let raw = raw.ok_or_else(|| {
        AppError::bad_request("INVALID_PARAMETER", "gestureType is required")
    })?;
    Ok(raw.parse::<GestureType>()?)
}

/// 查询参数中缺省的部分由运行时当前上下文补齐
async fn get_threshold(
    State(state): State<AppState>,
    Query(query): Query<ThresholdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let gesture_type = required_gesture(query.gesture_type.as_deref())?;
    let current = state.runtime().status().await?.context;

    let instrument = match query.instrument.as_deref() {
        Some(raw) => raw.parse::<InstrumentType>()?,
        None => current.instrument,
    };
    let lighting = match query.lighting.as_deref() {
        Some(raw) => raw.parse::<LightingQuality>()?,
        None => current.lighting,
    };
    let distance = match query.distance_cm {
        Some(d) if d.is_finite() && d > 0.0 => d,
        Some(_) => {
            return Err(AppError::bad_request(
                "INVALID_PARAMETER",
                "distanceCm must be > 0",
            ))
        }
        None => current.user_distance_cm as f64,
    };
    let context = CalibrationContext::new(instrument, lighting, distance);

    let lookup = state.engine().lookup(gesture_type, &context).await;
    let status = state.engine().status(gesture_type, &context).await;
    Ok(ok(ThresholdResponse {
        gesture_type,
        context,
        lookup,
        status,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GestureQuery {
    gesture_type: Option<String>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<GestureQuery>,
) -> Result<impl IntoResponse, AppError> {
    let gesture_type = query
        .gesture_type
        .as_deref()
        .map(str::parse::<GestureType>)
        .transpose()?;
    Ok(ok(state.engine().history(gesture_type).await))
}

async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<GestureQuery>,
) -> Result<impl IntoResponse, AppError> {
    let gesture_type = required_gesture(query.gesture_type.as_deref())?;
    Ok(ok(state.engine().report(gesture_type).await))
}

async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().get_config().await))
}

/// 校验失败时保留原配置
async fn update_config(
    State(state): State<AppState>,
    JsonBody(config): JsonBody<CalibrationConfig>,
) -> Result<impl IntoResponse, AppError> {
    state
        .engine()
        .reload_config(config)
        .await
        .map_err(|reason| AppError::bad_request("INVALID_CONFIG", &reason))?;
    Ok(ok(state.engine().get_config().await))
}

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;

use crate::extractors::{JsonBody, ParsedPath};
use crate::gesture::profile::GestureProfile;
use crate::gesture::types::{CalibrationContext, InstrumentType, LightingQuality};
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::settings::RuntimeSettings;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route(
            "/profiles/:instrument",
            get(get_profile).put(update_profile).delete(reset_profile),
        )
        .route("/active-profile", get(get_active).put(switch_active))
        .route("/context", put(update_context))
}

async fn list_profiles(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let profiles = InstrumentType::ALL
        .into_iter()
        .map(|instrument| state.store().get_profile_or_default(instrument))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ok(profiles))
}

async fn get_profile(
    State(state): State<AppState>,
    ParsedPath(instrument): ParsedPath<InstrumentType>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().get_profile_or_default(instrument)?))
}

/// 保存 profile；如果是当前使用的乐器，立即热切换
async fn update_profile(
    State(state): State<AppState>,
    ParsedPath(instrument): ParsedPath<InstrumentType>,
    JsonBody(mut profile): JsonBody<GestureProfile>,
) -> Result<impl IntoResponse, AppError> {
    profile.instrument = instrument;
    state.store().upsert_profile(&profile)?;

    let status = state.runtime().status().await?;
    if status.profile.instrument == instrument {
        state.runtime().set_profile(profile.clone()).await?;
    }

    Ok(ok(profile))
}

/// 删除保存的 profile，恢复内置默认值
async fn reset_profile(
    State(state): State<AppState>,
    ParsedPath(instrument): ParsedPath<InstrumentType>,
) -> Result<impl IntoResponse, AppError> {
    state.store().delete_profile(instrument)?;
    let profile = GestureProfile::default_for(instrument);

    let status = state.runtime().status().await?;
    if status.profile.instrument == instrument {
        state.runtime().set_profile(profile.clone()).await?;
    }

    Ok(ok(profile))
}

async fn get_active(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.runtime().status().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchActiveRequest {
    instrument: InstrumentType,
}

async fn switch_active(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SwitchActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.store().get_profile_or_default(req.instrument)?;
    state.runtime().set_profile(profile).await?;

    let previous = state.runtime().status().await?.context;
    let context = CalibrationContext {
        instrument: req.instrument,
        ..previous
    };
    state.runtime().set_context(context).await?;

    state.store().save_runtime_settings(&RuntimeSettings {
        active_instrument: req.instrument,
        context,
    })?;
    tracing::info!(instrument = req.instrument.as_str(), "Active instrument switched");

    Ok(ok(state.runtime().status().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContextRequest {
    lighting: LightingQuality,
    user_distance_cm: f64,
}

/// 环境变化（光照、距离）后切换阈值上下文
async fn update_context(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UpdateContextRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !req.user_distance_cm.is_finite() || req.user_distance_cm <= 0.0 {
        return Err(AppError::bad_request(
            "INVALID_DISTANCE",
            "userDistanceCm must be > 0",
        ));
    }

    let status = state.runtime().status().await?;
    let context = CalibrationContext::new(
        status.profile.instrument,
        req.lighting,
        req.user_distance_cm,
    );
    state.runtime().set_context(context).await?;
    state.store().save_runtime_settings(&RuntimeSettings {
        active_instrument: status.profile.instrument,
        context,
    })?;

    Ok(ok(context))
}

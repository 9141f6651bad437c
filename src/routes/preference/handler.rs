use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, success_to_api_response},
};

use super::model::{Preference, SavePreferenceRequest};

#[axum::debug_handler]
pub async fn save_preference(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SavePreferenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pref = Preference::upsert(&state.pool, &claims.sub, req.normalize()).await?;
    Ok((StatusCode::OK, success_to_api_response(pref)))
}

#[axum::debug_handler]
pub async fn get_preference(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let pref = Preference::find_by_user(&state.pool, &claims.sub)
        .await?
        .ok_or(AppError::NotFound("preference"))?;
    Ok((StatusCode::OK, success_to_api_response(pref)))
}

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, success_to_api_response},
};

use super::model::{CreateSwipeRequest, Swipe};

#[axum::debug_handler]
pub async fn create_swipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSwipeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.location_id.trim().is_empty() {
        return Err(AppError::Validation("location_id is required".into()));
    }

    let swipe = Swipe::create(&state.pool, &claims.sub, &req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(swipe)))
}

#[axum::debug_handler]
pub async fn get_swiped(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let ids = Swipe::swiped_location_ids(&state.pool, &claims.sub).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(serde_json::json!({ "swiped_location_ids": ids })),
    ))
}

#[axum::debug_handler]
pub async fn get_liked_locations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let locations = Swipe::liked_locations(&state.pool, &claims.sub).await?;
    Ok((StatusCode::OK, success_to_api_response(locations)))
}

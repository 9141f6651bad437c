use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    routes::group::model::Group,
    utils::success_to_api_response,
};

use super::model::{CreateLocationRequest, Location, SuggestLocationRequest};

#[axum::debug_handler]
pub async fn create_location(
    State(state): State<AppState>,
    Json(req): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() || req.activity.trim().is_empty() {
        return Err(AppError::Validation("name and activity are required".into()));
    }

    let location = Location::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(location)))
}

#[axum::debug_handler]
pub async fn all_locations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let locations = Location::all(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(locations)))
}

// 按分组活动推荐地点
#[axum::debug_handler]
pub async fn suggest_location(
    State(state): State<AppState>,
    Json(req): Json<SuggestLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::find_by_id(&state.pool, &state.redis, &req.group_id)
        .await?
        .ok_or(AppError::NotFound("group"))?;

    let location = Location::suggest(&state.pool, &group.activity, &req.tags)
        .await?
        .ok_or(AppError::NotFound("location"))?;

    Ok((StatusCode::OK, success_to_api_response(location)))
}

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, success_to_api_response},
};

use super::model::request_match;

#[axum::debug_handler]
pub async fn match_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = request_match(&state, &claims.sub).await?;
    Ok((StatusCode::OK, success_to_api_response(outcome)))
}

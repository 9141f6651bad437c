use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    utils::{
        Claims, error_codes, error_to_api_response, generate_temp_token, generate_token,
        success_to_api_response,
    },
};

use super::model::{
    CheckTokenResponse, CreateRegisteredUserRequest, CreateUserResponse, LoginRequest,
    LoginResponse, User, is_valid_user_id,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateRegisteredUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_user_id(&req.user_id) {
        return Err(AppError::Validation(
            "用户ID格式无效，只允许使用字母、数字和下划线".to_string(),
        ));
    }
    if req.password.len() < 6 || req.password.len() > 24 {
        return Err(AppError::Validation(
            "密码长度必须在6到24个字符之间".to_string(),
        ));
    }

    match User::create(&state.pool, req).await {
        Ok(user) => {
            let token = generate_token(&user.user_id, &state.config)
                .map_err(|_| AppError::Internal("生成令牌失败".to_string()))?;
            Ok((
                StatusCode::OK,
                success_to_api_response(CreateUserResponse {
                    user_id: user.user_id,
                    nickname: user.nickname,
                    token,
                }),
            ))
        }
        Err(e) if e.to_string().contains("unique constraint") => Ok((
            StatusCode::OK,
            error_to_api_response(error_codes::USER_EXISTS, "用户已存在".to_string()),
        )),
        Err(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn create_temporary(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    // 随机用户ID和昵称
    let user_id = uuid::Uuid::new_v4().simple().to_string();
    let nickname = format!("用户{}", &user_id[0..6]);

    let user = User::create_temporary(&state.pool, &user_id, &nickname).await?;
    let token = generate_temp_token(&user.user_id, &state.config)
        .map_err(|_| AppError::Internal("生成临时令牌失败".to_string()))?;

    Ok((
        StatusCode::OK,
        success_to_api_response(CreateUserResponse {
            user_id: user.user_id,
            nickname: user.nickname,
            token,
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.pool, &req.user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    // 临时用户没有密码
    if user.is_temporary || !user.verify_login(&req.password).await? {
        return Ok((
            StatusCode::OK,
            error_to_api_response(error_codes::AUTH_FAILED, "用户名或密码无效".to_string()),
        ));
    }

    let token = generate_token(&user.user_id, &state.config)
        .map_err(|_| AppError::Internal("生成令牌失败".to_string()))?;

    Ok((
        StatusCode::OK,
        success_to_api_response(LoginResponse {
            user_id: user.user_id,
            token,
        }),
    ))
}

/// token 已在中间件验证过，这里直接回显
#[axum::debug_handler]
pub async fn check_token(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(CheckTokenResponse {
            user_id: claims.sub,
            is_temporary: claims.is_temp,
        }),
    )
}

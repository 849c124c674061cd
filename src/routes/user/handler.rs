use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState, geo,
    utils::{
        Claims, Role, error_codes, error_to_api_response, generate_token,
        success_to_api_response, verify_password,
    },
};

use super::model::{
    AuthResponse, LoginRequest, RegisterRequest, UpdateLocationRequest, UpdateLocationResponse,
    User,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if req.user_id.is_empty() || !req.user_id.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "User id may only contain letters, digits and underscores".to_string(),
            ),
        );
    }
    if req.password.len() < 8 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Password must be at least 8 characters".to_string(),
            ),
        );
    }

    match User::create(&state.pool, req).await {
        Ok(user) => match generate_token(&user.user_id, Role::User, &state.config) {
            Ok((token, _)) => (
                StatusCode::CREATED,
                success_to_api_response(AuthResponse {
                    user_id: user.user_id,
                    nickname: user.nickname,
                    token,
                }),
            ),
            Err(e) => {
                tracing::error!("Failed to generate token: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to generate token".to_string(),
                    ),
                )
            }
        },
        Err(e) => {
            if e.to_string().contains("unique constraint") {
                (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response(
                        error_codes::USER_EXISTS,
                        "User already exists".to_string(),
                    ),
                )
            } else {
                tracing::error!("Failed to create user: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to create user".to_string(),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match User::find_by_id(&state.pool, &req.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(
                    error_codes::AUTH_FAILED,
                    "Invalid user id or password".to_string(),
                ),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "Login failed".to_string()),
            );
        }
    };

    let verified = user
        .password_hash
        .as_deref()
        .map(|hash| verify_password(&req.password, hash).unwrap_or(false))
        .unwrap_or(false);

    if !verified {
        return (
            StatusCode::UNAUTHORIZED,
            error_to_api_response(
                error_codes::AUTH_FAILED,
                "Invalid user id or password".to_string(),
            ),
        );
    }

    match generate_token(&user.user_id, Role::from_str_or_user(&user.role), &state.config) {
        Ok((token, _)) => (
            StatusCode::OK,
            success_to_api_response(AuthResponse {
                user_id: user.user_id,
                nickname: user.nickname,
                token,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to generate token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to generate token".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    match User::find_by_id(&state.pool, &claims.sub).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to load user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load user".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateLocationRequest>,
) -> impl IntoResponse {
    if !geo::is_valid_coordinate(req.latitude, req.longitude) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Coordinates out of range".to_string(),
            ),
        );
    }

    match User::update_location(&state.pool, &claims.sub, req.latitude, req.longitude).await {
        Ok(location_updated_at) => (
            StatusCode::OK,
            success_to_api_response(UpdateLocationResponse {
                location_updated_at,
            }),
        ),
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to update location: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to update location".to_string(),
                ),
            )
        }
    }
}

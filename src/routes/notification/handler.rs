use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{ListNotificationsQuery, MarkReadRequest, Notification};

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListNotificationsQuery>,
) -> impl IntoResponse {
    let unread_only = query.unread_only.unwrap_or(false);
    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    match Notification::list(&state.pool, &claims.sub, unread_only, limit).await {
        Ok(notifications) => (StatusCode::OK, success_to_api_response(notifications)),
        Err(e) => {
            tracing::error!("Failed to list notifications: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to list notifications".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> impl IntoResponse {
    match Notification::mark_read(&state.pool, &req.notification_id, &claims.sub).await {
        Ok(()) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "success": true })),
        ),
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Notification not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to mark notification read: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to mark notification read".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    match Notification::mark_all_read(&state.pool, &claims.sub).await {
        Ok(updated) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "updated": updated })),
        ),
        Err(e) => {
            tracing::error!("Failed to mark notifications read: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to mark notifications read".to_string(),
                ),
            )
        }
    }
}

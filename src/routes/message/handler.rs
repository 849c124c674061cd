use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::analysis::pipeline;
use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{CreateMessageRequest, ListMessagesRequest, MessageInfo};

#[axum::debug_handler]
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> impl IntoResponse {
    if req.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Message content must not be empty".to_string(),
            ),
        );
    }

    match MessageInfo::create(&state.pool, req, claims.sub).await {
        Ok(message) => {
            // Classification runs detached; the response does not wait for it.
            tokio::spawn(pipeline::process_message(state.clone(), message.clone()));

            (
                StatusCode::CREATED,
                success_to_api_response(serde_json::json!({
                    "message_id": message.message_id
                })),
            )
        }
        Err(e) => {
            let status = if e.to_string().contains("not a member") {
                StatusCode::FORBIDDEN
            } else {
                tracing::error!("Failed to create message: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let code = if status == StatusCode::FORBIDDEN {
                error_codes::PERMISSION_DENIED
            } else {
                error_codes::INTERNAL_ERROR
            };
            (
                status,
                error_to_api_response(code, "Failed to create message".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ListMessagesRequest>,
) -> impl IntoResponse {
    match MessageInfo::list(&state.pool, req, &claims.sub).await {
        Ok(messages) => (StatusCode::OK, success_to_api_response(messages)),
        Err(e) => {
            let status = if e.to_string().contains("not a member") {
                StatusCode::FORBIDDEN
            } else {
                tracing::error!("Failed to list messages: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let code = if status == StatusCode::FORBIDDEN {
                error_codes::PERMISSION_DENIED
            } else {
                error_codes::INTERNAL_ERROR
            };
            (
                status,
                error_to_api_response(code, "Failed to list messages".to_string()),
            )
        }
    }
}

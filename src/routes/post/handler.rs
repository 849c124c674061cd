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

use super::model::{CreatePostRequest, ListPostsRequest, PostInfo};

#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> impl IntoResponse {
    if req.title.trim().is_empty() || req.title.len() > 200 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Post title must be between 1 and 200 characters".to_string(),
            ),
        );
    }
    if req.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Post content must not be empty".to_string(),
            ),
        );
    }

    match PostInfo::create(&state.pool, req, claims.sub).await {
        Ok(post) => {
            tokio::spawn(pipeline::process_post(state.clone(), post.clone()));

            (
                StatusCode::CREATED,
                success_to_api_response(serde_json::json!({
                    "post_id": post.post_id
                })),
            )
        }
        Err(e) => {
            let status = if e.to_string().contains("not a member") {
                StatusCode::FORBIDDEN
            } else {
                tracing::error!("Failed to create post: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let code = if status == StatusCode::FORBIDDEN {
                error_codes::PERMISSION_DENIED
            } else {
                error_codes::INTERNAL_ERROR
            };
            (
                status,
                error_to_api_response(code, "Failed to create post".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ListPostsRequest>,
) -> impl IntoResponse {
    match PostInfo::list(&state.pool, req, &claims.sub).await {
        Ok(posts) => (StatusCode::OK, success_to_api_response(posts)),
        Err(e) => {
            let status = if e.to_string().contains("not a member") {
                StatusCode::FORBIDDEN
            } else {
                tracing::error!("Failed to list posts: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let code = if status == StatusCode::FORBIDDEN {
                error_codes::PERMISSION_DENIED
            } else {
                error_codes::INTERNAL_ERROR
            };
            (
                status,
                error_to_api_response(code, "Failed to list posts".to_string()),
            )
        }
    }
}

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    routes::community::model::{Community, CommunityInfo},
    routes::notification::model::{Notification, kinds},
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

#[derive(Debug, Deserialize)]
pub struct ReviewCommunityRequest {
    pub community_id: String,
}

fn forbidden<T>() -> (StatusCode, axum::Json<crate::utils::ApiResponse<T>>) {
    (
        StatusCode::FORBIDDEN,
        error_to_api_response(
            error_codes::PERMISSION_DENIED,
            "Requires platform admin role".to_string(),
        ),
    )
}

#[axum::debug_handler]
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return forbidden();
    }

    match Community::list_pending(&state.pool).await {
        Ok(communities) => {
            let infos = communities
                .into_iter()
                .map(CommunityInfo::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => {
            tracing::error!("Failed to list pending communities: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to list pending communities".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn approve_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReviewCommunityRequest>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return forbidden();
    }

    match Community::approve(&state.pool, &state.redis, &req.community_id).await {
        Ok(community) => {
            if let Err(e) = Notification::create(
                &state.pool,
                &community.creator_id,
                kinds::COMMUNITY_APPROVED,
                "NORMAL",
                "Community approved",
                &format!("Your community \"{}\" is now active.", community.name),
                Some(&community.community_id),
            )
            .await
            {
                tracing::error!("Failed to notify creator of approval: {}", e);
            }

            (
                StatusCode::OK,
                success_to_api_response(CommunityInfo::from(community)),
            )
        }
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Community not found".to_string()),
        ),
        Err(e) if e.to_string().contains("not pending") => (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Community is not pending".to_string(),
            ),
        ),
        Err(e) => {
            tracing::error!("Failed to approve community: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to approve community".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn reject_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReviewCommunityRequest>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return forbidden();
    }

    match Community::reject(&state.pool, &state.redis, &req.community_id).await {
        Ok(community) => {
            // The notification outlives the purged community row.
            if let Err(e) = Notification::create(
                &state.pool,
                &community.creator_id,
                kinds::COMMUNITY_REJECTED,
                "NORMAL",
                "Community request rejected",
                &format!("Your community request \"{}\" was rejected.", community.name),
                None,
            )
            .await
            {
                tracing::error!("Failed to notify creator of rejection: {}", e);
            }

            (
                StatusCode::OK,
                success_to_api_response(serde_json::json!({ "deleted": true })),
            )
        }
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Community not found".to_string()),
        ),
        Err(e) if e.to_string().contains("not pending") => (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Community is not pending".to_string(),
            ),
        ),
        Err(e) => {
            tracing::error!("Failed to reject community: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to reject community".to_string(),
                ),
            )
        }
    }
}

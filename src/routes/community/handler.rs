use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState, geo,
    routes::user::model::User,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{
    Community, CommunityInfo, CreateCommunityRequest, NearbyCommunityInfo,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub community_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct JoinCommunityRequest {
    pub community_id: String,
}

#[axum::debug_handler]
pub async fn create_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommunityRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() || req.name.len() > 100 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Community name must be between 1 and 100 characters".to_string(),
            ),
        );
    }
    if !geo::is_valid_coordinate(req.latitude, req.longitude) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Coordinates out of range".to_string(),
            ),
        );
    }
    if let Some(radius) = req.radius_km {
        if !radius.is_finite() || radius < 0.0 {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "Radius must be a non-negative number".to_string(),
                ),
            );
        }
    }

    match Community::create(&state.pool, req, claims.sub).await {
        Ok(community) => (
            StatusCode::CREATED,
            success_to_api_response(CommunityInfo::from(community)),
        ),
        Err(e) => {
            tracing::error!("Failed to create community: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to create community".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn list_communities(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    match Community::list_active(&state.pool, limit).await {
        Ok(communities) => {
            let infos = communities
                .into_iter()
                .map(CommunityInfo::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => {
            tracing::error!("Failed to list communities: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to list communities".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match Community::find_by_id(&state.pool, &state.redis, &query.community_id).await {
        Ok(Some(community)) => (
            StatusCode::OK,
            success_to_api_response(CommunityInfo::from(community)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Community not found".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to load community: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load community".to_string(),
                ),
            )
        }
    }
}

/// Nearby search uses the coordinates from the query string when present,
/// falling back to the caller's stored location.
#[axum::debug_handler]
pub async fn find_nearby(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NearbyQuery>,
) -> impl IntoResponse {
    let origin = match (query.latitude, query.longitude) {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        (None, None) => match User::location(&state.pool, &claims.sub).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!("Failed to load stored location: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to resolve location".to_string(),
                    ),
                );
            }
        },
        _ => None,
    };

    let (latitude, longitude) = match origin {
        Some(coords) => coords,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "No coordinates given and no stored location".to_string(),
                ),
            );
        }
    };

    if !geo::is_valid_coordinate(latitude, longitude) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Coordinates out of range".to_string(),
            ),
        );
    }

    match Community::find_nearby(
        &state.pool,
        latitude,
        longitude,
        state.config.max_search_radius_km,
        state.config.default_community_radius_km,
    )
    .await
    {
        Ok(nearby) => {
            let infos = nearby
                .into_iter()
                .map(|(c, distance_km)| NearbyCommunityInfo {
                    community_id: c.community_id,
                    name: c.name,
                    description: c.description,
                    latitude: c.latitude,
                    longitude: c.longitude,
                    radius_km: c.radius_km,
                    member_count: c.member_count,
                    distance_km,
                })
                .collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => {
            tracing::error!("Failed to search nearby communities: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to search nearby communities".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn join_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinCommunityRequest>,
) -> impl IntoResponse {
    match Community::join(&state.pool, &state.redis, &req.community_id, &claims.sub).await {
        Ok(()) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "success": true })),
        ),
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Community not found".to_string()),
        ),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("Already a member") {
                (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response(
                        error_codes::ALREADY_MEMBER,
                        "Already a member of this community".to_string(),
                    ),
                )
            } else if msg.contains("not active") {
                (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response(
                        error_codes::VALIDATION_ERROR,
                        "Community is not active".to_string(),
                    ),
                )
            } else {
                tracing::error!("Failed to join community: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to join community".to_string(),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn leave_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IdQuery>,
) -> impl IntoResponse {
    match Community::leave(&state.pool, &state.redis, &req.community_id, &claims.sub).await {
        Ok(()) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "success": true })),
        ),
        Err(e) => {
            if e.to_string().contains("not a member") {
                (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response(
                        error_codes::VALIDATION_ERROR,
                        "User is not a member of this community".to_string(),
                    ),
                )
            } else {
                tracing::error!("Failed to leave community: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to leave community".to_string(),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn get_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match Community::is_member(&state.pool, &query.community_id, &claims.sub).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                error_to_api_response(
                    error_codes::PERMISSION_DENIED,
                    "Only members can view the roster".to_string(),
                ),
            );
        }
        Err(e) => {
            tracing::error!("Failed to check membership: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load members".to_string(),
                ),
            );
        }
    }

    match Community::members(&state.pool, &query.community_id).await {
        Ok(members) => (StatusCode::OK, success_to_api_response(members)),
        Err(e) => {
            tracing::error!("Failed to load members: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to load members".to_string(),
                ),
            )
        }
    }
}

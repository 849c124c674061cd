use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState,
    utils::{error_codes, error_to_api_response, verify_token},
};

/// Verifies the bearer token and makes the decoded [`crate::utils::Claims`]
/// available to handlers as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return (
            StatusCode::UNAUTHORIZED,
            error_to_api_response::<()>(
                error_codes::AUTH_FAILED,
                "Missing bearer token".to_string(),
            ),
        )
            .into_response();
    };

    match verify_token(bearer.token(), &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Rejected token: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                error_to_api_response::<()>(
                    error_codes::AUTH_FAILED,
                    "Invalid or expired token".to_string(),
                ),
            )
                .into_response()
        }
    }
}

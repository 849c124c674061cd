use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

const LOGGED_BODY_LIMIT: usize = 4096;

/// Logs the status and body of every 5xx response, then rebuilds the
/// response so the client still receives it.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;

    if response.status().is_server_error() {
        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, LOGGED_BODY_LIMIT).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                return Response::from_parts(parts, Body::empty());
            }
        };

        error!(
            "Server error occurred - Status: {}, Body: {}",
            parts.status,
            String::from_utf8_lossy(&bytes)
        );

        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

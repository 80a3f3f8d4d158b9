use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_cookies::Cookies;

use crate::error::AlertError;
use crate::metrics::RequestMetrics;

/// Session cookie set by the account service; carries the numeric user id.
pub const USER_COOKIE: &str = "pawalert_user";

pub async fn auth_middleware(cookies: Cookies, mut request: Request, next: Next) -> Response {
    if let Some(cookie) = cookies.get(USER_COOKIE) {
        if let Ok(user_id) = cookie.value().parse::<i32>() {
            tracing::Span::current().record("user_id", user_id);
            request.extensions_mut().insert(user_id);
            return next.run(request).await;
        }
    }
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "UNAUTHORIZED", "message": "Unauthorized"})))
        .into_response()
}

/// Header carrying the key shared with the fan-out service.
pub const INTERNAL_KEY_HEADER: &str = "x-api-key";

/// Key required on collaborator-only routes. `None` leaves them open (local
/// development).
#[derive(Debug, Clone, Default)]
pub struct InternalApiKey(pub Option<String>);

pub async fn internal_key_middleware(
    Extension(key): Extension<InternalApiKey>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = key.0.as_deref() {
        let provided = request
            .headers()
            .get(INTERNAL_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            return AlertError::Unauthorized("missing or invalid API key".into()).into_response();
        }
    }
    next.run(request).await
}

pub async fn track_requests(
    Extension(metrics): Extension<Arc<RequestMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status();
    metrics.record(status.is_client_error() || status.is_server_error(), started.elapsed());
    response
}

pub mod alerts;
pub mod middleware;

use axum::{
    routing::{get, patch, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::metrics::{RequestMetrics, RequestMetricsSnapshot};
use middleware::InternalApiKey;
use crate::service::AlertService;

async fn health_check() -> &'static str {
    "OK"
}

async fn request_metrics(
    Extension(metrics): Extension<Arc<RequestMetrics>>,
) -> Json<RequestMetricsSnapshot> {
    Json(metrics.snapshot())
}

/// Alert routes with auth, cookies and request accounting. Transport-level
/// layers (tracing, CORS, Prometheus) are added by the server binary.
pub fn router(
    service: Arc<AlertService>,
    metrics: Arc<RequestMetrics>,
    internal_key: InternalApiKey,
) -> Router {
    let public_routes = Router::new()
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/nearby", get(alerts::list_nearby))
        .route("/alerts/map", get(alerts::list_for_map))
        .route("/alerts/:id", get(alerts::get_alert));

    // Counters are reported by the fan-out service, not by end users.
    let internal_routes = Router::new()
        .route("/alerts/:id/stats", patch(alerts::update_stats))
        .route_layer(axum::middleware::from_fn(middleware::internal_key_middleware));

    let protected_routes = Router::new()
        .route("/alerts", post(alerts::create_alert))
        .route("/users/me/alerts", get(alerts::list_my_alerts))
        .route("/alerts/:id/responses", post(alerts::add_response))
        .route("/alerts/:id/resolve", post(alerts::resolve_alert))
        .route("/alerts/:id/cancel", post(alerts::cancel_alert))
        .route("/alerts/:id/extend", post(alerts::extend_alert))
        .route_layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/internal/request-metrics", get(request_metrics))
        .merge(public_routes)
        .merge(internal_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(middleware::track_requests))
        .layer(Extension(service))
        .layer(Extension(metrics))
        .layer(Extension(internal_key))
        .layer(tower_cookies::CookieManagerLayer::new())
}

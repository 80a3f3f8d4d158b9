use axum::routing::get;
use pawalert_server::api::{self, middleware::InternalApiKey};
use pawalert_server::{config::AppConfig, metrics::RequestMetrics, migrator};
use sea_orm::Database;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("Invalid configuration");
    pawalert_server::telemetry::init_telemetry("pawalert-server", &config);

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let service = pawalert_server::build_service(&config, db).expect("Invalid Redis URL");
    let request_metrics = Arc::new(RequestMetrics::new(config.metrics_history));

    if config.internal_api_key.is_none() {
        tracing::warn!("PAWALERT_INTERNAL_API_KEY is not set, stats updates are unauthenticated");
    }
    let internal_key = InternalApiKey(config.internal_api_key.clone());

    let app = api::router(Arc::new(service), request_metrics, internal_key)
        .layer(prometheus_layer)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    // "METHOD /path", e.g. "POST /alerts/:id/responses"
                    let span_name = match matched_path {
                        Some(path) => format!("{} {}", request.method(), path),
                        None => format!("{} {}", request.method(), request.uri().path()),
                    };

                    let client_ip = request
                        .headers()
                        .get("x-forwarded-for")
                        .and_then(|v| v.to_str().ok())
                        .or_else(|| request.headers().get("x-real-ip").and_then(|v| v.to_str().ok()))
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        client_ip = client_ip,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        // Filled in by handlers
                        table = tracing::field::Empty,
                        action = tracing::field::Empty,
                        alert_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        business_event = tracing::field::Empty,
                        error = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency = tracing::field::Empty,
                    )
                })
                .on_request(|_request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {})
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", tracing::field::display(response.status()));
                        span.record("latency", tracing::field::debug(latency));
                        tracing::info!("request completed");
                    },
                ),
        )
        .layer(cors_layer(&config.cors_origin))
        .route("/metrics", get(|| async move { metric_handle.render() }));

    tracing::info!(
        platform = ?config.platform.platform,
        "listening on {}",
        config.bind_addr
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down server");
}

fn cors_layer(origin: &str) -> tower_http::cors::CorsLayer {
    let origin = origin
        .parse::<axum::http::HeaderValue>()
        .expect("PAWALERT_CORS_ORIGIN is not a valid header value");
    tower_http::cors::CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

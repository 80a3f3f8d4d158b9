use pawalert_server::{config::AppConfig, worker};
use sea_orm::Database;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("Invalid configuration");
    pawalert_server::telemetry::init_telemetry("pawalert-worker", &config);

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Spawn metrics server
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route(
                "/metrics",
                axum::routing::get(|| async move { metric_handle.render() }),
            )
            .layer(prometheus_layer);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 9091));
        tracing::info!("Metrics server listening on {}", addr);
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Metrics server stopped: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to bind metrics server: {}", e),
        }
    });

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let service = pawalert_server::build_service(&config, db).expect("Invalid Redis URL");

    tracing::info!("Starting expiry worker...");
    let sweeper = worker::spawn_expiry_sweeper(
        Arc::new(service),
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down worker process"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
    sweeper.abort();
}

pub mod api;
pub mod clock;
pub mod config;
pub mod directory;
pub mod entities;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod migrator;
pub mod model;
pub mod propagation;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use sea_orm;

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::directory::HttpDirectory;
use crate::propagation::RedisPropagationQueue;
use crate::service::AlertService;
use crate::store::SeaOrmAlertStore;

/// Wires the store, directories and propagation queue described by `config`.
pub fn build_service(config: &AppConfig, db: sea_orm::DatabaseConnection) -> Result<AlertService, redis::RedisError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(SeaOrmAlertStore::new(db, clock.clone()));
    let mut service = AlertService::new(store, clock);

    match HttpDirectory::from_platform(&config.platform) {
        Some(directory) => {
            let directory = Arc::new(directory);
            service = service.with_directories(directory.clone(), directory);
        }
        None => tracing::warn!(
            platform = ?config.platform.platform,
            "No directory base URL configured, reporter and pet ids are not checked"
        ),
    }

    if let Some(url) = &config.redis_url {
        let client = redis::Client::open(url.as_str())?;
        service = service.with_dispatcher(Arc::new(RedisPropagationQueue::new(client)));
    }

    Ok(service)
}

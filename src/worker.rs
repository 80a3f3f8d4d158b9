use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::service::AlertService;

/// Runs one expiry pass. Failures are logged and retried on the next tick.
pub async fn sweep_once(service: &AlertService) -> u64 {
    match service.expire_elapsed().await {
        Ok(expired) => expired,
        Err(e) => {
            tracing::error!("Expiry sweep failed: {}", e);
            0
        }
    }
}

/// Marks elapsed alerts as expired every `interval`, standing in for a
/// storage-side TTL index.
pub fn spawn_expiry_sweeper(service: Arc<AlertService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Expiry sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = sweep_once(&service).await;
            tracing::debug!(expired, "Expiry sweep finished");
        }
    })
}

//! Propagation policy and the hand-off to the notification fan-out.
//!
//! The policy only decides *how* an alert should be propagated. Delivery is
//! done by an external consumer of the jobs produced here.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlertError, AlertResult};
use crate::model::{
    AlertType, EmergencyAlert, PropagationRequest, PropagationSettings, UrgencyLevel,
    DELAY_SECS_RANGE, DURATION_HOURS_RANGE, RADIUS_KM_RANGE,
};

pub const PROPAGATION_QUEUE: &str = "propagation_queue";

#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationPolicy {
    defaults: PropagationSettings,
}

impl PropagationPolicy {
    pub fn new(defaults: PropagationSettings) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> PropagationSettings {
        self.defaults
    }

    /// Explicit caller values win over defaults and are clamped into range.
    ///
    /// Urgency and alert type are not consulted: delay and force stay exactly
    /// as the caller set them.
    pub fn resolve(&self, request: &PropagationRequest) -> PropagationSettings {
        let (min_radius, max_radius) = RADIUS_KM_RANGE;
        let (min_delay, max_delay) = DELAY_SECS_RANGE;
        let (min_duration, max_duration) = DURATION_HOURS_RANGE;

        PropagationSettings {
            force_propagation: request
                .force_propagation
                .unwrap_or(self.defaults.force_propagation),
            propagation_radius: request
                .propagation_radius
                .unwrap_or(self.defaults.propagation_radius)
                .clamp(min_radius, max_radius),
            propagation_delay: request
                .propagation_delay
                .unwrap_or(self.defaults.propagation_delay)
                .clamp(min_delay, max_delay),
            propagation_duration: request
                .propagation_duration
                .unwrap_or(self.defaults.propagation_duration)
                .clamp(min_duration, max_duration),
        }
    }

    pub fn plan(&self, alert: &EmergencyAlert) -> PropagationJob {
        let settings = alert.propagation_settings;
        PropagationJob {
            alert_id: alert.id,
            alert_type: alert.alert_type,
            urgency_level: alert.urgency_level,
            latitude: alert.location.latitude,
            longitude: alert.location.longitude,
            radius_km: settings.propagation_radius,
            force_propagation: settings.force_propagation,
            notify_after: alert.report_time + Duration::seconds(i64::from(settings.propagation_delay)),
            stop_at: alert.expires_at.unwrap_or_else(|| {
                alert.report_time + Duration::hours(i64::from(settings.propagation_duration))
            }),
        }
    }
}

/// Work item for the notification fan-out service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationJob {
    pub alert_id: Uuid,
    pub alert_type: AlertType,
    pub urgency_level: UrgencyLevel,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub force_propagation: bool,
    pub notify_after: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

#[async_trait]
pub trait PropagationDispatcher: Send + Sync {
    async fn dispatch(&self, job: PropagationJob) -> AlertResult<()>;
}

/// Used when no queue is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyDispatcher;

#[async_trait]
impl PropagationDispatcher for LogOnlyDispatcher {
    async fn dispatch(&self, job: PropagationJob) -> AlertResult<()> {
        tracing::info!(
            alert_id = %job.alert_id,
            radius_km = job.radius_km,
            force = job.force_propagation,
            "No propagation queue configured, dropping job"
        );
        Ok(())
    }
}

/// Pushes jobs as JSON onto a Redis list for the fan-out workers.
#[derive(Clone)]
pub struct RedisPropagationQueue {
    client: redis::Client,
    queue: String,
}

impl RedisPropagationQueue {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            queue: PROPAGATION_QUEUE.to_string(),
        }
    }
}

#[async_trait]
impl PropagationDispatcher for RedisPropagationQueue {
    async fn dispatch(&self, job: PropagationJob) -> AlertResult<()> {
        let payload = serde_json::to_string(&job)
            .map_err(|e| AlertError::Collaborator(format!("cannot encode propagation job: {}", e)))?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AlertError::Collaborator(format!("redis connection failed: {}", e)))?;

        let depth: u64 = conn
            .rpush(&self.queue, payload)
            .await
            .map_err(|e| AlertError::Collaborator(format!("redis push failed: {}", e)))?;

        metrics::gauge!("pawalert_queue_depth", "queue" => self.queue.clone()).set(depth as f64);
        tracing::debug!(alert_id = %job.alert_id, depth, "Queued propagation job");
        Ok(())
    }
}

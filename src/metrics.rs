use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::model::{AlertType, ResponseType, UrgencyLevel};

/// Request counters plus a bounded window of recent response times.
///
/// One instance is created at startup and handed to the request pipeline.
#[derive(Debug)]
pub struct RequestMetrics {
    total: AtomicU64,
    errors: AtomicU64,
    capacity: usize,
    history: Mutex<VecDeque<Duration>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetricsSnapshot {
    pub total_requests: u64,
    pub error_requests: u64,
    pub samples: usize,
    pub average_ms: f64,
    pub p95_ms: f64,
}

impl RequestMetrics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            total: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            capacity,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, is_error: bool, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(latency);

        metrics::histogram!("pawalert_request_duration_seconds").record(latency.as_secs_f64());
    }

    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        let mut samples: Vec<f64> = {
            let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.iter().map(|d| d.as_secs_f64() * 1000.0).collect()
        };
        samples.sort_by(|a, b| a.total_cmp(b));

        let (average_ms, p95_ms) = if samples.is_empty() {
            (0.0, 0.0)
        } else {
            let average = samples.iter().sum::<f64>() / samples.len() as f64;
            let rank = ((samples.len() as f64) * 0.95).ceil() as usize;
            (average, samples[rank.saturating_sub(1).min(samples.len() - 1)])
        };

        RequestMetricsSnapshot {
            total_requests: self.total.load(Ordering::Relaxed),
            error_requests: self.errors.load(Ordering::Relaxed),
            samples: samples.len(),
            average_ms,
            p95_ms,
        }
    }
}

pub fn increment_alerts_created(alert_type: AlertType, urgency: UrgencyLevel) {
    metrics::counter!(
        "pawalert_alerts_created_total",
        "alert_type" => alert_type.as_str(),
        "urgency" => urgency.as_str()
    )
    .increment(1);
}

pub fn increment_responses(response_type: ResponseType) {
    metrics::counter!("pawalert_alert_responses_total", "response_type" => response_type.as_str())
        .increment(1);
}

pub fn increment_alerts_closed(outcome: &'static str) {
    metrics::counter!("pawalert_alerts_closed_total", "outcome" => outcome).increment(1);
}

pub fn increment_alerts_expired(count: u64) {
    metrics::counter!("pawalert_alerts_expired_total").increment(count);
}

pub fn increment_propagation_failed() {
    metrics::counter!("pawalert_propagation_jobs_failed_total").increment(1);
}

pub fn increment_propagation_enqueued() {
    metrics::counter!("pawalert_propagation_jobs_enqueued_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded_to_capacity() {
        let metrics = RequestMetrics::new(3);
        for ms in [100, 200, 300, 400, 500] {
            metrics.record(false, Duration::from_millis(ms));
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 5);
        assert_eq!(snapshot.samples, 3);
        // Only 300, 400 and 500 remain.
        assert!((snapshot.average_ms - 400.0).abs() < 1e-6);
        assert!((snapshot.p95_ms - 500.0).abs() < 1e-6);
    }

    #[test]
    fn errors_are_counted_separately() {
        let metrics = RequestMetrics::new(10);
        metrics.record(true, Duration::from_millis(5));
        metrics.record(false, Duration::from_millis(5));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.error_requests, 1);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let snapshot = RequestMetrics::new(0).snapshot();
        assert_eq!(snapshot.samples, 0);
        assert_eq!(snapshot.average_ms, 0.0);
        assert_eq!(snapshot.p95_ms, 0.0);
    }
}

//! Alert lifecycle: submission, responses, resolution and expiry, layered on
//! an `AlertStore`.
//!
//! ```text
//! active --resolve--> resolved
//! active --cancel---> cancelled
//! active --elapse---> expired
//! ```
//! Terminal states never change again; asking for a transition out of one is
//! a successful no-op that returns the alert as stored. The store enforces
//! this with conditional updates, so racing requests cannot undo each other.

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::directory::{OpenDirectory, PetDirectory, UserDirectory};
use crate::error::{AlertError, AlertResult};
use crate::metrics;
use crate::model::{
    check_duration, AlertInput, AlertType, EmergencyAlert, ResponseInput, StatsUpdate,
};
use crate::propagation::{LogOnlyDispatcher, PropagationDispatcher, PropagationPolicy};
use crate::store::AlertStore;

/// Area for map listings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapQuery {
    Everywhere,
    Within {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
}

#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn AlertStore>,
    clock: Arc<dyn Clock>,
    policy: PropagationPolicy,
    dispatcher: Arc<dyn PropagationDispatcher>,
    users: Arc<dyn UserDirectory>,
    pets: Arc<dyn PetDirectory>,
}

impl AlertService {
    pub fn new(store: Arc<dyn AlertStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            policy: PropagationPolicy::default(),
            dispatcher: Arc::new(LogOnlyDispatcher),
            users: Arc::new(OpenDirectory),
            pets: Arc::new(OpenDirectory),
        }
    }

    pub fn with_policy(mut self, policy: PropagationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn PropagationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_directories(
        mut self,
        users: Arc<dyn UserDirectory>,
        pets: Arc<dyn PetDirectory>,
    ) -> Self {
        self.users = users;
        self.pets = pets;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn submit_alert(&self, input: AlertInput) -> AlertResult<EmergencyAlert> {
        let new_alert = input.validate(self.clock.now())?;

        if !self.users.user_exists(new_alert.reporter_id).await? {
            return Err(AlertError::validation(format!(
                "reporterId {} does not match a known user",
                new_alert.reporter_id
            )));
        }
        if !self.pets.pet_exists(new_alert.pet_id).await? {
            return Err(AlertError::validation(format!(
                "petId {} does not match a known pet",
                new_alert.pet_id
            )));
        }

        let settings = self.policy.resolve(&new_alert.propagation);
        let alert = self.store.create(new_alert, settings).await?;

        info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            urgency = %alert.urgency_level,
            radius_km = settings.propagation_radius,
            "Alert submitted"
        );
        metrics::increment_alerts_created(alert.alert_type, alert.urgency_level);

        // The alert is already stored; a failed hand-off must not undo it.
        let job = self.policy.plan(&alert);
        match self.dispatcher.dispatch(job).await {
            Ok(()) => metrics::increment_propagation_enqueued(),
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Failed to hand alert to propagation");
                metrics::increment_propagation_failed();
            }
        }

        Ok(alert)
    }

    pub async fn get_alert(&self, alert_id: Uuid) -> AlertResult<EmergencyAlert> {
        self.store.find_by_id(alert_id).await
    }

    pub async fn record_response(
        &self,
        alert_id: Uuid,
        responder_id: i32,
        input: ResponseInput,
    ) -> AlertResult<EmergencyAlert> {
        let entry = input.validate(responder_id, self.clock.now())?;
        if !self.users.user_exists(responder_id).await? {
            return Err(AlertError::validation(format!(
                "responder {} does not match a known user",
                responder_id
            )));
        }

        let response_type = entry.response_type;
        let alert = self.store.add_response(alert_id, entry).await?;
        info!(%alert_id, responder_id, %response_type, "Response recorded");
        metrics::increment_responses(response_type);
        Ok(alert)
    }

    /// Any signed-in user may resolve: the person who finds the pet is often
    /// not the reporter.
    pub async fn resolve_alert(&self, alert_id: Uuid, resolver_id: i32) -> AlertResult<EmergencyAlert> {
        let transition = self.store.mark_resolved(alert_id).await?;
        if transition.applied {
            info!(%alert_id, resolver_id, "Alert resolved");
            metrics::increment_alerts_closed("resolved");
        }
        Ok(transition.alert)
    }

    /// Reporter only.
    pub async fn cancel_alert(&self, alert_id: Uuid, user_id: i32) -> AlertResult<EmergencyAlert> {
        self.ensure_reporter(alert_id, user_id).await?;
        let transition = self.store.mark_cancelled(alert_id).await?;
        if transition.applied {
            info!(%alert_id, user_id, "Alert cancelled");
            metrics::increment_alerts_closed("cancelled");
        }
        Ok(transition.alert)
    }

    /// Pushes automatic expiry back to `now + hours`. Reporter only; terminal
    /// alerts are left alone.
    pub async fn extend_expiration(
        &self,
        alert_id: Uuid,
        user_id: i32,
        hours: i32,
    ) -> AlertResult<EmergencyAlert> {
        check_duration(hours)?;
        self.ensure_reporter(alert_id, user_id).await?;
        let alert = self.store.extend_expiration(alert_id, hours).await?;
        info!(%alert_id, hours, expires_at = ?alert.expires_at, status = %alert.status, "Alert expiry extension requested");
        Ok(alert)
    }

    async fn ensure_reporter(&self, alert_id: Uuid, user_id: i32) -> AlertResult<()> {
        let alert = self.store.find_by_id(alert_id).await?;
        if alert.reporter_id != user_id {
            return Err(AlertError::Forbidden(format!(
                "only the reporter may change alert {}",
                alert_id
            )));
        }
        Ok(())
    }

    pub async fn update_propagation_stats(
        &self,
        alert_id: Uuid,
        update: StatsUpdate,
    ) -> AlertResult<EmergencyAlert> {
        update.validate()?;
        self.store.update_propagation_stats(alert_id, update).await
    }

    pub async fn list_active(&self) -> AlertResult<Vec<EmergencyAlert>> {
        self.store.find_active().await
    }

    pub async fn list_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> AlertResult<Vec<EmergencyAlert>> {
        check_search_area(latitude, longitude, radius_km)?;
        self.store.find_nearby(latitude, longitude, radius_km).await
    }

    pub async fn list_by_type(&self, alert_type: AlertType) -> AlertResult<Vec<EmergencyAlert>> {
        self.store.find_by_type(alert_type).await
    }

    pub async fn list_by_reporter(&self, reporter_id: i32) -> AlertResult<Vec<EmergencyAlert>> {
        self.store.find_by_reporter(reporter_id).await
    }

    /// Highest urgency score first; equal scores show the newest alert first.
    pub async fn list_for_map(&self, query: MapQuery) -> AlertResult<Vec<EmergencyAlert>> {
        let alerts = match query {
            MapQuery::Everywhere => self.store.find_active().await?,
            MapQuery::Within {
                latitude,
                longitude,
                radius_km,
            } => self.list_nearby(latitude, longitude, radius_km).await?,
        };

        let now = self.clock.now();
        let mut scored: Vec<(f64, EmergencyAlert)> = alerts
            .into_iter()
            .map(|alert| (alert.urgency_score(now), alert))
            .collect();
        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(scored.into_iter().map(|(_, alert)| alert).collect())
    }

    pub async fn expire_elapsed(&self) -> AlertResult<u64> {
        let expired = self.store.expire_elapsed().await?;
        if expired > 0 {
            info!(expired, "Expired elapsed alerts");
            metrics::increment_alerts_expired(expired);
        }
        Ok(expired)
    }
}

fn check_search_area(latitude: f64, longitude: f64, radius_km: f64) -> AlertResult<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AlertError::validation(format!(
            "({}, {}) is not a valid coordinate",
            latitude, longitude
        )));
    }
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AlertError::validation(format!(
            "radius must be a positive number of km, got {}",
            radius_km
        )));
    }
    Ok(())
}

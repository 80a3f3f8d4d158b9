//! Alert persistence port and its sea-orm implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::entities::{emergency_alert, EmergencyAlerts};
use crate::error::{AlertError, AlertResult};
use crate::geo::BoundingBox;
use crate::model::{
    check_duration, AlertStatus, AlertType, EmergencyAlert, Location, NewAlert, PropagationSettings,
    PropagationStats, ResponseEntry, StatsUpdate,
};

/// Outcome of a status change. `applied` is false when the alert was already
/// terminal and was returned untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub alert: EmergencyAlert,
    pub applied: bool,
}

/// Storage operations over the alert collection. Every mutation refreshes
/// `updated_at`; nothing here deletes an alert.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(
        &self,
        alert: NewAlert,
        settings: PropagationSettings,
    ) -> AlertResult<EmergencyAlert>;

    async fn find_by_id(&self, id: Uuid) -> AlertResult<EmergencyAlert>;

    /// Active and unexpired, most urgent first, then newest first.
    async fn find_active(&self) -> AlertResult<Vec<EmergencyAlert>>;

    async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> AlertResult<Vec<EmergencyAlert>>;

    async fn find_by_type(&self, alert_type: AlertType) -> AlertResult<Vec<EmergencyAlert>>;

    async fn find_by_reporter(&self, reporter_id: i32) -> AlertResult<Vec<EmergencyAlert>>;

    async fn add_response(&self, id: Uuid, response: ResponseEntry)
        -> AlertResult<EmergencyAlert>;

    async fn mark_resolved(&self, id: Uuid) -> AlertResult<Transition>;

    async fn mark_cancelled(&self, id: Uuid) -> AlertResult<Transition>;

    async fn update_propagation_stats(
        &self,
        id: Uuid,
        update: StatsUpdate,
    ) -> AlertResult<EmergencyAlert>;

    /// Sets `expires_at = now + hours` on an active alert; terminal alerts are
    /// returned unchanged. `hours` must be within 1..=168.
    async fn extend_expiration(&self, id: Uuid, hours: i32) -> AlertResult<EmergencyAlert>;

    /// Moves every active alert whose window has elapsed to `expired`.
    async fn expire_elapsed(&self) -> AlertResult<u64>;
}

#[derive(Clone)]
pub struct SeaOrmAlertStore {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl SeaOrmAlertStore {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    async fn load<C: ConnectionTrait>(conn: &C, id: Uuid) -> AlertResult<emergency_alert::Model> {
        EmergencyAlerts::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| AlertError::alert_not_found(id))
    }

    /// Row lock held until the surrounding transaction ends. SQLite has no
    /// `FOR UPDATE`; its single writer serializes the transaction instead.
    async fn load_for_update<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> AlertResult<emergency_alert::Model> {
        EmergencyAlerts::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| AlertError::alert_not_found(id))
    }

    fn live_condition(now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(emergency_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .add(
                Condition::any()
                    .add(emergency_alert::Column::ExpiresAt.is_null())
                    .add(emergency_alert::Column::ExpiresAt.gt(now.naive_utc())),
            )
    }

    /// Only rows still `active` are touched, so racing transitions cannot
    /// overwrite each other.
    async fn transition(&self, id: Uuid, to: AlertStatus) -> AlertResult<Transition> {
        let result = EmergencyAlerts::update_many()
            .col_expr(emergency_alert::Column::Status, Expr::value(to.as_str()))
            .col_expr(
                emergency_alert::Column::UpdatedAt,
                Expr::value(self.clock.now().naive_utc()),
            )
            .filter(emergency_alert::Column::Id.eq(id))
            .filter(emergency_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .exec(&self.db)
            .await?;

        let alert = EmergencyAlert::try_from(Self::load(&self.db, id).await?)?;
        let applied = result.rows_affected > 0;
        if !applied {
            tracing::debug!(alert_id = %id, status = %alert.status, requested = %to, "Alert already terminal");
        }
        Ok(Transition { alert, applied })
    }
}

#[async_trait]
impl AlertStore for SeaOrmAlertStore {
    async fn create(
        &self,
        alert: NewAlert,
        settings: PropagationSettings,
    ) -> AlertResult<EmergencyAlert> {
        settings.validate()?;

        let now = self.clock.now();
        let expires_at = now + Duration::hours(i64::from(settings.propagation_duration));

        let model = emergency_alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            alert_type: Set(alert.alert_type.as_str().to_string()),
            pet_id: Set(alert.pet_id),
            reporter_id: Set(alert.reporter_id),
            title: Set(alert.title),
            description: Set(alert.description),
            latitude: Set(alert.location.latitude),
            longitude: Set(alert.location.longitude),
            address: Set(alert.location.address),
            accuracy: Set(alert.location.accuracy),
            incident_time: Set(alert.incident_time.naive_utc()),
            report_time: Set(now.naive_utc()),
            urgency_level: Set(alert.urgency_level.as_str().to_string()),
            urgency_rank: Set(alert.urgency_level.weight()),
            status: Set(AlertStatus::Active.as_str().to_string()),
            attachments: Set(to_json(&alert.attachments)?),
            contact_info: Set(alert.contact_info.as_ref().map(to_json).transpose()?),
            force_propagation: Set(settings.force_propagation),
            propagation_radius: Set(settings.propagation_radius),
            propagation_delay: Set(settings.propagation_delay),
            propagation_duration: Set(settings.propagation_duration),
            responses: Set(serde_json::json!([])),
            total_reached: Set(0),
            total_views: Set(0),
            total_shares: Set(0),
            total_responses: Set(0),
            expires_at: Set(Some(expires_at.naive_utc())),
            created_at: Set(now.naive_utc()),
            updated_at: Set(now.naive_utc()),
        };

        EmergencyAlert::try_from(model.insert(&self.db).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> AlertResult<EmergencyAlert> {
        EmergencyAlert::try_from(Self::load(&self.db, id).await?)
    }

    async fn find_active(&self) -> AlertResult<Vec<EmergencyAlert>> {
        let models = EmergencyAlerts::find()
            .filter(Self::live_condition(self.clock.now()))
            .order_by_desc(emergency_alert::Column::UrgencyRank)
            .order_by_desc(emergency_alert::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models.into_iter().map(EmergencyAlert::try_from).collect()
    }

    async fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> AlertResult<Vec<EmergencyAlert>> {
        let bbox = BoundingBox::around(latitude, longitude, radius_km);
        let models = EmergencyAlerts::find()
            .filter(Self::live_condition(self.clock.now()))
            .filter(emergency_alert::Column::Latitude.between(bbox.min_latitude, bbox.max_latitude))
            .filter(
                emergency_alert::Column::Longitude.between(bbox.min_longitude, bbox.max_longitude),
            )
            .order_by_desc(emergency_alert::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models.into_iter().map(EmergencyAlert::try_from).collect()
    }

    async fn find_by_type(&self, alert_type: AlertType) -> AlertResult<Vec<EmergencyAlert>> {
        let models = EmergencyAlerts::find()
            .filter(emergency_alert::Column::AlertType.eq(alert_type.as_str()))
            .filter(emergency_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .order_by_desc(emergency_alert::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models.into_iter().map(EmergencyAlert::try_from).collect()
    }

    async fn find_by_reporter(&self, reporter_id: i32) -> AlertResult<Vec<EmergencyAlert>> {
        let models = EmergencyAlerts::find()
            .filter(emergency_alert::Column::ReporterId.eq(reporter_id))
            .order_by_desc(emergency_alert::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models.into_iter().map(EmergencyAlert::try_from).collect()
    }

    async fn add_response(
        &self,
        id: Uuid,
        response: ResponseEntry,
    ) -> AlertResult<EmergencyAlert> {
        let txn = self.db.begin().await?;
        let model = Self::load_for_update(&txn, id).await?;
        let mut responses: Vec<ResponseEntry> = from_json(model.responses.clone())?;
        responses.push(response);
        let total_responses = model.total_responses + 1;

        let mut active = model.into_active_model();
        active.responses = Set(to_json(&responses)?);
        active.total_responses = Set(total_responses);
        active.updated_at = Set(self.clock.now().naive_utc());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        EmergencyAlert::try_from(updated)
    }

    async fn mark_resolved(&self, id: Uuid) -> AlertResult<Transition> {
        self.transition(id, AlertStatus::Resolved).await
    }

    async fn mark_cancelled(&self, id: Uuid) -> AlertResult<Transition> {
        self.transition(id, AlertStatus::Cancelled).await
    }

    async fn update_propagation_stats(
        &self,
        id: Uuid,
        update: StatsUpdate,
    ) -> AlertResult<EmergencyAlert> {
        update.validate()?;
        let txn = self.db.begin().await?;
        let model = Self::load_for_update(&txn, id).await?;
        let mut stats = stats_of(&model);
        stats.merge(&update);

        // Only supplied counters are written.
        let mut active = model.into_active_model();
        if update.total_reached.is_some() {
            active.total_reached = Set(stats.total_reached);
        }
        if update.total_views.is_some() {
            active.total_views = Set(stats.total_views);
        }
        if update.total_shares.is_some() {
            active.total_shares = Set(stats.total_shares);
        }
        if update.total_responses.is_some() {
            active.total_responses = Set(stats.total_responses);
        }
        active.updated_at = Set(self.clock.now().naive_utc());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        EmergencyAlert::try_from(updated)
    }

    async fn extend_expiration(&self, id: Uuid, hours: i32) -> AlertResult<EmergencyAlert> {
        check_duration(hours)?;
        let now = self.clock.now();
        let expires_at = now + Duration::hours(i64::from(hours));

        EmergencyAlerts::update_many()
            .col_expr(emergency_alert::Column::ExpiresAt, Expr::value(expires_at.naive_utc()))
            .col_expr(emergency_alert::Column::UpdatedAt, Expr::value(now.naive_utc()))
            .filter(emergency_alert::Column::Id.eq(id))
            .filter(emergency_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .exec(&self.db)
            .await?;

        EmergencyAlert::try_from(Self::load(&self.db, id).await?)
    }

    async fn expire_elapsed(&self) -> AlertResult<u64> {
        let now = self.clock.now().naive_utc();
        let result = EmergencyAlerts::update_many()
            .col_expr(
                emergency_alert::Column::Status,
                Expr::value(AlertStatus::Expired.as_str()),
            )
            .col_expr(emergency_alert::Column::UpdatedAt, Expr::value(now))
            .filter(emergency_alert::Column::Status.eq(AlertStatus::Active.as_str()))
            .filter(emergency_alert::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn corrupt(err: AlertError) -> AlertError {
    AlertError::Storage(DbErr::Custom(format!("stored alert is malformed: {}", err)))
}

fn to_json<T: serde::Serialize>(value: &T) -> AlertResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AlertError::Storage(DbErr::Custom(format!("cannot encode column: {}", e))))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> AlertResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AlertError::Storage(DbErr::Custom(format!("cannot decode column: {}", e))))
}

fn stats_of(model: &emergency_alert::Model) -> PropagationStats {
    PropagationStats {
        total_reached: model.total_reached,
        total_views: model.total_views,
        total_shares: model.total_shares,
        total_responses: model.total_responses,
    }
}

impl TryFrom<emergency_alert::Model> for EmergencyAlert {
    type Error = AlertError;

    fn try_from(model: emergency_alert::Model) -> Result<Self, Self::Error> {
        let propagation_stats = stats_of(&model);
        Ok(Self {
            id: model.id,
            alert_type: model.alert_type.parse().map_err(corrupt)?,
            pet_id: model.pet_id,
            reporter_id: model.reporter_id,
            title: model.title,
            description: model.description,
            location: Location {
                latitude: model.latitude,
                longitude: model.longitude,
                address: model.address,
                accuracy: model.accuracy,
            },
            incident_time: model.incident_time.and_utc(),
            report_time: model.report_time.and_utc(),
            urgency_level: model.urgency_level.parse().map_err(corrupt)?,
            status: model.status.parse().map_err(corrupt)?,
            attachments: from_json(model.attachments)?,
            contact_info: model.contact_info.map(from_json).transpose()?,
            propagation_settings: PropagationSettings {
                force_propagation: model.force_propagation,
                propagation_radius: model.propagation_radius,
                propagation_delay: model.propagation_delay,
                propagation_duration: model.propagation_duration,
            },
            responses: from_json(model.responses)?,
            propagation_stats,
            expires_at: model.expires_at.map(|at| at.and_utc()),
            created_at: model.created_at.and_utc(),
            updated_at: model.updated_at.and_utc(),
        })
    }
}

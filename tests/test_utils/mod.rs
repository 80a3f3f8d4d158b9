//! Shared fixtures: an in-memory SQLite database with migrations applied and
//! a service wired to a manual clock.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pawalert_server::clock::{Clock, ManualClock};
use pawalert_server::error::{AlertError, AlertResult};
use pawalert_server::migrator::Migrator;
use pawalert_server::model::{AlertInput, LocationInput, PropagationRequest};
use pawalert_server::propagation::{PropagationDispatcher, PropagationJob};
use pawalert_server::service::AlertService;
use pawalert_server::store::SeaOrmAlertStore;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::{Arc, Mutex};

pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub jobs: Mutex<Vec<PropagationJob>>,
    pub fail: bool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<PropagationJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PropagationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: PropagationJob) -> AlertResult<()> {
        if self.fail {
            return Err(AlertError::Collaborator("queue offline".into()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub struct TestContext {
    pub db: DatabaseConnection,
    pub clock: Arc<ManualClock>,
    pub store: Arc<SeaOrmAlertStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub service: Arc<AlertService>,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        Self::with_dispatcher(RecordingDispatcher::default()).await
    }

    pub async fn with_dispatcher(dispatcher: RecordingDispatcher) -> Result<Self> {
        let db = setup_test_db().await?;
        let clock = Arc::new(ManualClock::new(start_time()));
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(SeaOrmAlertStore::new(db.clone(), shared_clock.clone()));
        let dispatcher = Arc::new(dispatcher);
        let service = AlertService::new(store.clone(), shared_clock)
            .with_dispatcher(dispatcher.clone());

        Ok(Self {
            db,
            clock,
            store,
            dispatcher,
            service: Arc::new(service),
        })
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub fn alert_input(title: &str, urgency: &str, latitude: f64, longitude: f64) -> AlertInput {
    AlertInput {
        alert_type: Some("lost_pet".into()),
        pet_id: Some(11),
        reporter_id: Some(21),
        title: Some(title.into()),
        description: Some("3yo, red collar".into()),
        location: Some(LocationInput {
            latitude: Some(latitude),
            longitude: Some(longitude),
            address: Some("Dongcheng District".into()),
            accuracy: Some(15.0),
        }),
        incident_time: Some(start_time() - Duration::hours(1)),
        urgency_level: Some(urgency.into()),
        ..Default::default()
    }
}

pub fn lost_golden_retriever() -> AlertInput {
    alert_input("Lost Golden Retriever", "high", 39.9042, 116.4074)
}

pub fn with_propagation(mut input: AlertInput, request: PropagationRequest) -> AlertInput {
    input.propagation_settings = Some(request);
    input
}

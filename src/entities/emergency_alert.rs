use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "emergency_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub alert_type: String,
    pub pet_id: i32,
    pub reporter_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub accuracy: Option<f64>,
    pub incident_time: DateTime,
    pub report_time: DateTime,
    pub urgency_level: String,
    // low=1 .. critical=4, sortable copy of urgency_level
    pub urgency_rank: i16,
    pub status: String,
    pub attachments: Json,
    pub contact_info: Option<Json>,
    pub force_propagation: bool,
    pub propagation_radius: f64,
    pub propagation_delay: i32,
    pub propagation_duration: i32,
    pub responses: Json,
    pub total_reached: i64,
    pub total_views: i64,
    pub total_shares: i64,
    pub total_responses: i64,
    pub expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AlertError, AlertResult};
use crate::model::{AlertInput, AlertType, AlertView, EmergencyAlert, ResponseInput, StatsUpdate};
use crate::service::{AlertService, MapQuery};

const DEFAULT_SEARCH_RADIUS_KM: f64 = 5.0;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius: Option<f64>,
}

#[derive(Deserialize)]
pub struct MapParams {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Deserialize)]
pub struct ExtendRequest {
    pub hours: i32,
}

fn record_action(action: &str, alert_id: Option<Uuid>) {
    let span = tracing::Span::current();
    span.record("table", "emergency_alerts");
    span.record("action", action);
    if let Some(id) = alert_id {
        span.record("alert_id", tracing::field::display(id));
    }
}

fn view(service: &AlertService, alert: EmergencyAlert) -> AlertView {
    AlertView::at(alert, service.clock().now())
}

fn views(service: &AlertService, alerts: Vec<EmergencyAlert>) -> Json<Vec<AlertView>> {
    let now = service.clock().now();
    Json(alerts.into_iter().map(|a| AlertView::at(a, now)).collect())
}

// POST /alerts
pub async fn create_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
    payload: Result<Json<AlertInput>, JsonRejection>,
) -> AlertResult<Response> {
    let Json(mut payload) = payload?;
    // The signed-in user is always the reporter.
    payload.reporter_id = Some(user_id);
    let alert = service.submit_alert(payload).await?;

    record_action("create_alert", Some(alert.id));
    tracing::Span::current().record("business_event", "Emergency alert submitted");

    Ok((StatusCode::CREATED, Json(view(&service, alert))).into_response())
}

// GET /alerts?type=lost_pet
pub async fn list_alerts(
    Extension(service): Extension<Arc<AlertService>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AlertResult<Json<Vec<AlertView>>> {
    let Query(query) = query?;
    record_action("list_alerts", None);
    let alerts = match query.alert_type.as_deref() {
        Some(raw) => service.list_by_type(raw.parse::<AlertType>()?).await?,
        None => service.list_active().await?,
    };
    Ok(views(&service, alerts))
}

// GET /alerts/nearby?lat=..&lon=..&radius=..
pub async fn list_nearby(
    Extension(service): Extension<Arc<AlertService>>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> AlertResult<Json<Vec<AlertView>>> {
    let Query(query) = query?;
    record_action("list_nearby", None);
    let radius = query.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
    let alerts = service.list_nearby(query.lat, query.lon, radius).await?;
    Ok(views(&service, alerts))
}

// GET /alerts/map
pub async fn list_for_map(
    Extension(service): Extension<Arc<AlertService>>,
    params: Result<Query<MapParams>, QueryRejection>,
) -> AlertResult<Json<Vec<AlertView>>> {
    let Query(params) = params?;
    record_action("list_for_map", None);
    let query = match (params.lat, params.lon) {
        (Some(latitude), Some(longitude)) => MapQuery::Within {
            latitude,
            longitude,
            radius_km: params.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_KM),
        },
        (None, None) => MapQuery::Everywhere,
        _ => {
            return Err(AlertError::validation(
                "lat and lon must be given together",
            ))
        }
    };
    let alerts = service.list_for_map(query).await?;
    Ok(views(&service, alerts))
}

// GET /alerts/:id
pub async fn get_alert(
    Extension(service): Extension<Arc<AlertService>>,
    alert_id: Result<Path<Uuid>, PathRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    record_action("get_alert", Some(alert_id));
    let alert = service.get_alert(alert_id).await?;
    Ok(Json(view(&service, alert)))
}

// GET /users/me/alerts
pub async fn list_my_alerts(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
) -> AlertResult<Json<Vec<AlertView>>> {
    record_action("list_my_alerts", None);
    let alerts = service.list_by_reporter(user_id).await?;
    Ok(views(&service, alerts))
}

// POST /alerts/:id/responses
pub async fn add_response(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
    alert_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ResponseInput>, JsonRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    let Json(payload) = payload?;
    record_action("add_response", Some(alert_id));
    let alert = service.record_response(alert_id, user_id, payload).await?;
    Ok(Json(view(&service, alert)))
}

// POST /alerts/:id/resolve
pub async fn resolve_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
    alert_id: Result<Path<Uuid>, PathRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    record_action("resolve_alert", Some(alert_id));
    let alert = service.resolve_alert(alert_id, user_id).await?;
    Ok(Json(view(&service, alert)))
}

// POST /alerts/:id/cancel
pub async fn cancel_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
    alert_id: Result<Path<Uuid>, PathRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    record_action("cancel_alert", Some(alert_id));
    let alert = service.cancel_alert(alert_id, user_id).await?;
    Ok(Json(view(&service, alert)))
}

// POST /alerts/:id/extend
pub async fn extend_alert(
    Extension(service): Extension<Arc<AlertService>>,
    Extension(user_id): Extension<i32>,
    alert_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ExtendRequest>, JsonRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    let Json(payload) = payload?;
    record_action("extend_alert", Some(alert_id));
    let alert = service.extend_expiration(alert_id, user_id, payload.hours).await?;
    Ok(Json(view(&service, alert)))
}

// PATCH /alerts/:id/stats
pub async fn update_stats(
    Extension(service): Extension<Arc<AlertService>>,
    alert_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatsUpdate>, JsonRejection>,
) -> AlertResult<Json<AlertView>> {
    let Path(alert_id) = alert_id?;
    let Json(payload) = payload?;
    record_action("update_stats", Some(alert_id));
    let alert = service.update_propagation_stats(alert_id, payload).await?;
    Ok(Json(view(&service, alert)))
}

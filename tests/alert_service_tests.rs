//! Alert lifecycle through `AlertService`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use pawalert_server::directory::{PetDirectory, UserDirectory};
use pawalert_server::error::{AlertError, AlertResult};
use pawalert_server::model::{AlertStatus, PropagationRequest, ResponseInput, StatsUpdate};
use pawalert_server::service::MapQuery;
use std::sync::Arc;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{
    alert_input, lost_golden_retriever, start_time, with_propagation, RecordingDispatcher,
    TestContext,
};

fn sighting(message: &str) -> ResponseInput {
    ResponseInput {
        response_type: "sighting".into(),
        message: Some(message.into()),
        location: None,
    }
}

#[tokio::test]
async fn submitted_alert_is_active_with_default_settings() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;

    assert_eq!(alert.status, AlertStatus::Active);
    assert!(alert.propagation_settings.force_propagation);
    assert_eq!(alert.propagation_settings.propagation_radius, 5.0);
    assert_eq!(alert.propagation_settings.propagation_delay, 0);
    assert_eq!(alert.propagation_settings.propagation_duration, 24);
    assert!(alert.is_active(start_time()));
    Ok(())
}

#[tokio::test]
async fn caller_propagation_values_are_kept() -> Result<()> {
    let ctx = TestContext::new().await?;
    let input = with_propagation(
        alert_input("Found tabby", "low", 31.23, 121.47),
        PropagationRequest {
            force_propagation: Some(false),
            propagation_radius: Some(12.5),
            propagation_delay: Some(600),
            propagation_duration: Some(72),
        },
    );

    let alert = ctx.service.submit_alert(input).await?;
    let settings = alert.propagation_settings;
    assert!(!settings.force_propagation);
    assert_eq!(settings.propagation_radius, 12.5);
    assert_eq!(settings.propagation_delay, 600);
    assert_eq!(settings.propagation_duration, 72);
    assert_eq!(alert.expires_at, Some(start_time() + Duration::hours(72)));
    Ok(())
}

#[tokio::test]
async fn out_of_range_propagation_is_rejected() -> Result<()> {
    let ctx = TestContext::new().await?;
    let input = with_propagation(
        lost_golden_retriever(),
        PropagationRequest {
            propagation_radius: Some(0.5),
            ..Default::default()
        },
    );

    let err = ctx.service.submit_alert(input).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    assert!(ctx.service.list_active().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_required_field_is_rejected() -> Result<()> {
    let ctx = TestContext::new().await?;
    let mut input = lost_golden_retriever();
    input.title = Some("   ".into());

    let err = ctx.service.submit_alert(input).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(msg) if msg.contains("title")));
    Ok(())
}

#[tokio::test]
async fn submission_hands_a_job_to_the_dispatcher() -> Result<()> {
    let ctx = TestContext::new().await?;
    let input = with_propagation(
        lost_golden_retriever(),
        PropagationRequest {
            propagation_delay: Some(300),
            ..Default::default()
        },
    );
    let alert = ctx.service.submit_alert(input).await?;

    let jobs = ctx.dispatcher.jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.alert_id, alert.id);
    assert_eq!(job.radius_km, 5.0);
    assert_eq!(job.notify_after, start_time() + Duration::seconds(300));
    assert_eq!(job.stop_at, start_time() + Duration::hours(24));
    Ok(())
}

#[tokio::test]
async fn failed_dispatch_keeps_the_alert() -> Result<()> {
    let ctx = TestContext::with_dispatcher(RecordingDispatcher::failing()).await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;

    let stored = ctx.service.get_alert(alert.id).await?;
    assert_eq!(stored.status, AlertStatus::Active);
    Ok(())
}

struct KnownIds {
    users: Vec<i32>,
    pets: Vec<i32>,
}

#[async_trait]
impl UserDirectory for KnownIds {
    async fn user_exists(&self, user_id: i32) -> AlertResult<bool> {
        Ok(self.users.contains(&user_id))
    }
}

#[async_trait]
impl PetDirectory for KnownIds {
    async fn pet_exists(&self, pet_id: i32) -> AlertResult<bool> {
        Ok(self.pets.contains(&pet_id))
    }
}

#[tokio::test]
async fn unknown_reporter_or_pet_is_rejected() -> Result<()> {
    let ctx = TestContext::new().await?;
    let directory = Arc::new(KnownIds {
        users: vec![21],
        pets: vec![99],
    });
    let service = (*ctx.service)
        .clone()
        .with_directories(directory.clone(), directory);

    let err = service.submit_alert(lost_golden_retriever()).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(msg) if msg.contains("petId")));

    let mut input = lost_golden_retriever();
    input.pet_id = Some(99);
    input.reporter_id = Some(7);
    let err = service.submit_alert(input).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(msg) if msg.contains("reporterId")));
    Ok(())
}

#[tokio::test]
async fn responses_are_recorded_in_order() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;

    ctx.advance(Duration::minutes(10));
    ctx.service
        .record_response(alert.id, 31, sighting("Near the park gate"))
        .await?;
    ctx.advance(Duration::minutes(10));
    let updated = ctx
        .service
        .record_response(
            alert.id,
            32,
            ResponseInput {
                response_type: "can_help".into(),
                message: None,
                location: None,
            },
        )
        .await?;

    assert_eq!(updated.propagation_stats.total_responses, 2);
    assert_eq!(updated.responses[0].user_id, 31);
    assert_eq!(updated.responses[0].timestamp, start_time() + Duration::minutes(10));
    assert_eq!(updated.responses[1].user_id, 32);
    assert!(!updated.responses[1].is_verified);
    Ok(())
}

#[tokio::test]
async fn response_to_unknown_alert_is_not_found() -> Result<()> {
    let ctx = TestContext::new().await?;
    let err = ctx
        .service
        .record_response(Uuid::new_v4(), 31, sighting("?"))
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn invalid_response_type_is_rejected() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;
    let err = ctx
        .service
        .record_response(
            alert.id,
            31,
            ResponseInput {
                response_type: "applause".into(),
                message: None,
                location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn resolving_twice_is_idempotent() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;

    ctx.advance(Duration::minutes(30));
    let first = ctx.service.resolve_alert(alert.id, 21).await?;
    ctx.advance(Duration::minutes(30));
    let second = ctx.service.resolve_alert(alert.id, 21).await?;

    assert_eq!(first.status, AlertStatus::Resolved);
    assert_eq!(second, first);
    assert!(ctx.service.list_active().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_after_resolve_changes_nothing() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;
    ctx.service.resolve_alert(alert.id, 21).await?;

    let after = ctx.service.cancel_alert(alert.id, 21).await?;
    assert_eq!(after.status, AlertStatus::Resolved);
    Ok(())
}

#[tokio::test]
async fn extend_only_touches_active_alerts() -> Result<()> {
    let ctx = TestContext::new().await?;
    let active = ctx.service.submit_alert(lost_golden_retriever()).await?;
    let cancelled = ctx.service.submit_alert(lost_golden_retriever()).await?;
    ctx.service.cancel_alert(cancelled.id, 21).await?;

    ctx.advance(Duration::hours(1));
    let extended = ctx.service.extend_expiration(active.id, 21, 12).await?;
    assert_eq!(
        extended.expires_at,
        Some(start_time() + Duration::hours(13))
    );

    let untouched = ctx.service.extend_expiration(cancelled.id, 21, 12).await?;
    assert_eq!(untouched.expires_at, cancelled.expires_at);
    assert_eq!(untouched.status, AlertStatus::Cancelled);

    let err = ctx.service.extend_expiration(active.id, 21, 0).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    let err = ctx.service.extend_expiration(active.id, 21, 169).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn negative_stats_are_rejected() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;
    let err = ctx
        .service
        .update_propagation_stats(
            alert.id,
            StatsUpdate {
                total_views: Some(-1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn urgency_score_grows_with_incident_age() -> Result<()> {
    let ctx = TestContext::new().await?;
    let mut input = lost_golden_retriever();
    input.incident_time = Some(start_time() - Duration::hours(6));
    let alert = ctx.service.submit_alert(input).await?;

    // high = 3, plus 6h / 24h.
    let score = alert.urgency_score(start_time());
    assert!((score - 3.25).abs() < 1e-9);

    let capped = alert.urgency_score(start_time() + Duration::days(3));
    assert!((capped - 4.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn map_listing_orders_by_score_then_recency() -> Result<()> {
    let ctx = TestContext::new().await?;

    let mut old_medium = alert_input("Old medium", "medium", 39.9, 116.4);
    old_medium.incident_time = Some(start_time() - Duration::hours(23));
    let old_medium = ctx.service.submit_alert(old_medium).await?;

    let mut fresh_high = alert_input("Fresh high", "high", 39.9, 116.4);
    fresh_high.incident_time = Some(start_time());
    let fresh_high = ctx.service.submit_alert(fresh_high).await?;

    let critical = ctx
        .service
        .submit_alert(alert_input("Critical", "critical", 39.9, 116.4))
        .await?;

    let far_away = ctx
        .service
        .submit_alert(alert_input("Elsewhere", "critical", -33.86, 151.2))
        .await?;

    let everywhere: Vec<Uuid> = ctx
        .service
        .list_for_map(MapQuery::Everywhere)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(everywhere.len(), 4);
    assert_eq!(everywhere[2], fresh_high.id);
    assert_eq!(everywhere[3], old_medium.id);

    let nearby: Vec<Uuid> = ctx
        .service
        .list_for_map(MapQuery::Within {
            latitude: 39.9,
            longitude: 116.4,
            radius_km: 10.0,
        })
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(nearby, vec![critical.id, fresh_high.id, old_medium.id]);
    assert!(!nearby.contains(&far_away.id));
    Ok(())
}

#[tokio::test]
async fn nearby_search_rejects_bad_area() -> Result<()> {
    let ctx = TestContext::new().await?;
    let err = ctx.service.list_nearby(95.0, 0.0, 5.0).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    let err = ctx.service.list_nearby(0.0, 0.0, 0.0).await.unwrap_err();
    assert!(matches!(err, AlertError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn sweep_expires_elapsed_alerts() -> Result<()> {
    let ctx = TestContext::new().await?;
    let short = with_propagation(
        lost_golden_retriever(),
        PropagationRequest {
            propagation_duration: Some(1),
            ..Default::default()
        },
    );
    let alert = ctx.service.submit_alert(short).await?;

    ctx.advance(Duration::minutes(61));
    assert!(!ctx.service.get_alert(alert.id).await?.is_active(start_time() + Duration::minutes(61)));
    assert!(ctx.service.list_active().await?.is_empty());

    assert_eq!(pawalert_server::worker::sweep_once(&ctx.service).await, 1);
    assert_eq!(ctx.service.get_alert(alert.id).await?.status, AlertStatus::Expired);
    Ok(())
}

#[tokio::test]
async fn reporter_listing_includes_closed_alerts() -> Result<()> {
    let ctx = TestContext::new().await?;
    let mine = ctx.service.submit_alert(lost_golden_retriever()).await?;
    ctx.service.resolve_alert(mine.id, 21).await?;
    let mut other = lost_golden_retriever();
    other.reporter_id = Some(22);
    ctx.service.submit_alert(other).await?;

    let alerts = ctx.service.list_by_reporter(21).await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, mine.id);
    assert_eq!(alerts[0].status, AlertStatus::Resolved);
    Ok(())
}

#[tokio::test]
async fn only_the_reporter_may_cancel_or_extend() -> Result<()> {
    let ctx = TestContext::new().await?;
    let alert = ctx.service.submit_alert(lost_golden_retriever()).await?;

    let err = ctx.service.cancel_alert(alert.id, 99).await.unwrap_err();
    assert!(matches!(err, AlertError::Forbidden(_)));
    let err = ctx.service.extend_expiration(alert.id, 99, 12).await.unwrap_err();
    assert!(matches!(err, AlertError::Forbidden(_)));
    assert_eq!(ctx.service.get_alert(alert.id).await?.status, AlertStatus::Active);

    // Finders close alerts too.
    let resolved = ctx.service.resolve_alert(alert.id, 99).await?;
    assert_eq!(resolved.status, AlertStatus::Resolved);
    Ok(())
}

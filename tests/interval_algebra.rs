//! Integration tests for the validation engine (`rcalendar::domain::validation`)
//! running against a real Postgres database via `#[sqlx::test]`.

use chrono::{Duration, TimeZone, Utc};
use rcalendar::data;
use rcalendar::domain::events::EventSink;
use rcalendar::domain::model::{Interval, IntervalKind};
use rcalendar::domain::time::Instant;
use rcalendar::domain::validation;
use sqlx::PgPool;

fn at(hour: i64) -> Instant {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + Duration::hours(hour)
}

async fn org_reserved(resource_id: i64, organization_id: i64, start: Instant, end: Instant) -> Interval {
    Interval {
        id: None,
        resource_id,
        kind: IntervalKind::OrgReserved,
        start,
        end,
        organization_id: Some(organization_id),
        manager_id: None,
        comment: None,
    }
}

#[sqlx::test]
async fn save_org_reserved_interval_succeeds(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    let mut interval = org_reserved(resource.id, org.id, at(9), at(17)).await;
    let mut sink = EventSink::new();
    validation::save_interval(&pool, &mut interval, true, true, &mut sink)
        .await
        .expect("save should succeed");

    assert!(interval.id.is_some());
    assert_eq!(sink.as_slice().len(), 1);
}

#[sqlx::test]
async fn overlapping_org_reserved_from_another_organization_is_rejected(pool: PgPool) {
    let org_a = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let org_b = data::organizations::create(&pool, "app1", 2).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org_a.id).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org_b.id).await.unwrap();

    let mut first = org_reserved(resource.id, org_a.id, at(9), at(17)).await;
    let mut sink = EventSink::new();
    validation::save_interval(&pool, &mut first, true, true, &mut sink)
        .await
        .expect("first save should succeed");

    let mut second = org_reserved(resource.id, org_b.id, at(12), at(14)).await;
    let err = validation::save_interval(&pool, &mut second, true, true, &mut sink)
        .await
        .expect_err("overlapping reservation from another organization must fail");

    match err {
        rcalendar::domain::error::DomainError::Validation(field_error) => {
            assert!(field_error.message.contains("another organization"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[sqlx::test]
async fn manager_reserved_requires_continuous_organization_coverage(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let manager = data::managers::find_or_create(&pool, "app1", 1).await.unwrap();
    data::organizations::add_manager(&pool, org.id, manager.id).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    let mut interval = Interval {
        id: None,
        resource_id: resource.id,
        kind: IntervalKind::ManagerReserved,
        start: at(9),
        end: at(10),
        organization_id: Some(org.id),
        manager_id: Some(manager.id),
        comment: None,
    };
    let mut sink = EventSink::new();
    let err = validation::save_interval(&pool, &mut interval, true, true, &mut sink)
        .await
        .expect_err("no organization time exists yet, so this must fail");

    match err {
        rcalendar::domain::error::DomainError::Validation(field_error) => {
            assert!(field_error.message.contains("organization time"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[sqlx::test]
async fn adjacent_intervals_within_join_gap_merge_into_one(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    let mut first = org_reserved(resource.id, org.id, at(9), at(12)).await;
    let mut sink = EventSink::new();
    validation::save_interval(&pool, &mut first, true, true, &mut sink).await.unwrap();

    // Starts exactly where the first interval ends -- well within JOIN_GAP.
    let mut second = org_reserved(resource.id, org.id, at(12), at(15)).await;
    validation::save_interval(&pool, &mut second, true, true, &mut sink).await.unwrap();

    let all = data::intervals::between(&pool, resource.id, at(0), at(24)).await.unwrap();
    assert_eq!(all.len(), 1, "adjacent same-identity intervals should have merged");
    assert_eq!(all[0].start, at(9));
    assert_eq!(all[0].end, at(15));
}

#[sqlx::test]
async fn delete_interval_emits_event(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    let mut interval = org_reserved(resource.id, org.id, at(9), at(17)).await;
    let mut sink = EventSink::new();
    validation::save_interval(&pool, &mut interval, true, true, &mut sink).await.unwrap();

    let mut delete_sink = EventSink::new();
    validation::delete_interval(&pool, &interval, true, &mut delete_sink).await.unwrap();

    assert_eq!(delete_sink.as_slice().len(), 1);
    assert!(data::intervals::find_by_id(&pool, interval.id.unwrap()).await.unwrap().is_none());
}

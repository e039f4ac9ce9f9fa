//! Integration tests for the schedule materializer
//! (`rcalendar::domain::schedule`) against a real Postgres database.

use chrono::{NaiveTime, TimeZone, Utc};
use rcalendar::data;
use rcalendar::domain::algebra::WeeklyPiece;
use rcalendar::domain::events::EventSink;
use rcalendar::domain::schedule;
use sqlx::PgPool;

#[sqlx::test]
async fn apply_schedule_projects_one_interval_per_matching_weekday(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    let membership = data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    // Monday is internal day-of-week 1. 2024-03-04 is a Monday.
    let fragments = vec![WeeklyPiece {
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    }];

    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap();

    let mut sink = EventSink::new();
    let changed = schedule::apply_schedule(&pool, &membership, start, end, Some(fragments), true, None, &mut sink)
        .await
        .expect("apply_schedule should succeed");
    assert!(changed);

    // Two Mondays (3/4 and 3/11) fall within the two-week window.
    let projected = data::intervals::between(&pool, resource.id, start, end).await.unwrap();
    assert_eq!(projected.len(), 2);
    for interval in &projected {
        assert_eq!(interval.duration(), chrono::Duration::hours(8));
    }

    let persisted_fragments = data::schedule_fragments::for_membership(&pool, membership.id).await.unwrap();
    assert_eq!(persisted_fragments.len(), 1);

    assert_eq!(sink.as_slice().len(), 1);
}

#[sqlx::test]
async fn extend_schedule_is_idempotent_once_watermark_reaches_target(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    let mut membership = data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    data::schedule_fragments::replace_for_membership(
        &pool,
        membership.id,
        &[WeeklyPiece {
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }],
    )
    .await
    .unwrap();

    let target = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    let mut sink = EventSink::new();
    let first = schedule::extend_schedule(&pool, &mut membership, target, None, &mut sink).await.unwrap();
    assert!(first);
    assert_eq!(membership.schedule_extended_to, Some(target));

    let second = schedule::extend_schedule(&pool, &mut membership, target, None, &mut sink).await.unwrap();
    assert!(!second, "rolling forward to an already-reached watermark is a no-op");
}

#[sqlx::test]
async fn apply_schedule_rejects_fragments_overlapping_another_organization(pool: PgPool) {
    let org_a = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let org_b = data::organizations::create(&pool, "app1", 2).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    let membership_a = data::memberships::find_or_create(&pool, resource.id, org_a.id).await.unwrap();
    let membership_b = data::memberships::find_or_create(&pool, resource.id, org_b.id).await.unwrap();

    let monday_morning = vec![WeeklyPiece {
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    }];
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();

    let mut sink = EventSink::new();
    schedule::apply_schedule(&pool, &membership_a, start, end, Some(monday_morning.clone()), true, None, &mut sink)
        .await
        .expect("first organization's schedule should apply cleanly");

    let overlapping = vec![WeeklyPiece {
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
    }];
    let mut sink = EventSink::new();
    let err = schedule::apply_schedule(&pool, &membership_b, start, end, Some(overlapping), true, None, &mut sink)
        .await
        .expect_err("a second organization must not claim an already-reserved weekly slot");

    match err {
        rcalendar::domain::error::DomainError::Validation(field_error) => {
            assert!(field_error.message.contains("another organization"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[sqlx::test]
async fn strip_organization_time_truncates_coverage_to_now(pool: PgPool) {
    let org = data::organizations::create(&pool, "app1", 1).await.unwrap();
    let resource = data::resources::find_or_create(&pool, "app1", 1).await.unwrap();
    let mut membership = data::memberships::find_or_create(&pool, resource.id, org.id).await.unwrap();

    let far_future_start = Utc::now() - chrono::Duration::hours(1);
    let far_future_end = Utc::now() + chrono::Duration::days(30);
    let interval = rcalendar::domain::model::Interval {
        id: None,
        resource_id: resource.id,
        kind: rcalendar::domain::model::IntervalKind::OrgReserved,
        start: far_future_start,
        end: far_future_end,
        organization_id: Some(org.id),
        manager_id: None,
        comment: None,
    };
    data::intervals::insert(&pool, &interval).await.unwrap();

    schedule::strip_organization_time(&pool, &mut membership).await.unwrap();

    let remaining = data::intervals::between(&pool, resource.id, far_future_start, far_future_end)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].end <= Utc::now());
}

//! Database operations for the `intervals` table.

use sqlx::PgExecutor;

use crate::domain::error::DomainResult;
use crate::domain::model::{Interval, IntervalKind};
use crate::domain::time::Instant;

/// Row shape as stored: `kind` is the raw `i16` discriminant, everything
/// else matches [`Interval`] directly.
#[derive(Debug, Clone, sqlx::FromRow)]
struct IntervalRow {
    id: i64,
    resource_id: i64,
    kind: i16,
    start_at: Instant,
    end_at: Instant,
    organization_id: Option<i64>,
    manager_id: Option<i64>,
    comment: Option<String>,
}

impl From<IntervalRow> for Interval {
    fn from(row: IntervalRow) -> Self {
        Interval {
            id: Some(row.id),
            resource_id: row.resource_id,
            kind: IntervalKind::from_i16(row.kind).unwrap_or(IntervalKind::OrgReserved),
            start: row.start_at,
            end: row.end_at,
            organization_id: row.organization_id,
            manager_id: row.manager_id,
            comment: row.comment,
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, resource_id, kind, start_at, end_at, organization_id, manager_id, comment";

/// Members matching `probe`'s identity `(resource, kind, organization,
/// manager)`, excluding `probe` itself (by id, when it has one), optionally
/// restricted to those overlapping `[window_start, window_end)`. Used by
/// both `join_into_db` (window widened by the join tolerance) and
/// `subtract_from_db` (window = the probe's own span).
pub async fn fetch_similar<'e, E>(
    executor: E,
    probe: &Interval,
    window_start: Option<Instant>,
    window_end: Option<Instant>,
) -> DomainResult<Vec<Interval>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, IntervalRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM intervals \
         WHERE resource_id = $1 AND kind = $2 \
           AND organization_id IS NOT DISTINCT FROM $3 \
           AND manager_id IS NOT DISTINCT FROM $4 \
           AND ($5::bigint IS NULL OR id != $5) \
           AND ($6::timestamptz IS NULL OR end_at > $6) \
           AND ($7::timestamptz IS NULL OR start_at < $7) \
         ORDER BY start_at"
    ))
    .bind(probe.resource_id)
    .bind(probe.kind.as_i16())
    .bind(probe.organization_id)
    .bind(probe.manager_id)
    .bind(probe.id)
    .bind(window_start)
    .bind(window_end)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Interval::from).collect())
}

/// All intervals on a resource overlapping `[start, end)`, any kind or
/// identity -- used by the validation engine's continuity checks.
pub async fn between<'e, E>(
    executor: E,
    resource_id: i64,
    start: Instant,
    end: Instant,
) -> DomainResult<Vec<Interval>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, IntervalRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM intervals \
         WHERE resource_id = $1 AND end_at > $2 AND start_at < $3 \
         ORDER BY start_at"
    ))
    .bind(resource_id)
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Interval::from).collect())
}

/// Intervals on a resource covering a single instant (e.g. "is this
/// resource available right now").
pub async fn at<'e, E>(executor: E, resource_id: i64, instant: Instant) -> DomainResult<Vec<Interval>>
where
    E: PgExecutor<'e>,
{
    between(executor, resource_id, instant, instant + chrono::Duration::nanoseconds(1)).await
}

/// Intervals visible to an organization (its own OrgReserved/ManagerReserved
/// intervals across every resource it has a membership with) overlapping a
/// window -- backs `GET /organization/:id/intervals`.
pub async fn for_organization<'e, E>(
    executor: E,
    organization_id: i64,
    start: Instant,
    end: Instant,
) -> DomainResult<Vec<Interval>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, IntervalRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM intervals \
         WHERE organization_id = $1 AND end_at > $2 AND start_at < $3 \
         ORDER BY start_at"
    ))
    .bind(organization_id)
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Interval::from).collect())
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Option<Interval>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, IntervalRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM intervals WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(Interval::from))
}

pub async fn insert<'e, E>(executor: E, interval: &Interval) -> DomainResult<Interval>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, IntervalRow>(&format!(
        "INSERT INTO intervals (resource_id, kind, start_at, end_at, organization_id, manager_id, comment) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(interval.resource_id)
    .bind(interval.kind.as_i16())
    .bind(interval.start)
    .bind(interval.end)
    .bind(interval.organization_id)
    .bind(interval.manager_id)
    .bind(&interval.comment)
    .fetch_one(executor)
    .await?;
    Ok(Interval::from(row))
}

/// Insert a new interval, or persist bounds/comment changes to an existing
/// one. Identity fields (`resource`, `kind`, `organization`, `manager`)
/// never change on an update -- only a fresh interval can establish them.
pub async fn save<'e, E>(executor: E, interval: &Interval) -> DomainResult<Interval>
where
    E: PgExecutor<'e>,
{
    match interval.id {
        None => insert(executor, interval).await,
        Some(id) => {
            sqlx::query("UPDATE intervals SET start_at = $1, end_at = $2, comment = $3 WHERE id = $4")
                .bind(interval.start)
                .bind(interval.end)
                .bind(&interval.comment)
                .bind(id)
                .execute(executor)
                .await?;
            Ok(interval.clone())
        }
    }
}

/// Persist a bounds change to an already-existing interval (by id).
pub async fn update_bounds<'e, E>(executor: E, interval: &Interval) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    let id = interval
        .id
        .expect("update_bounds requires a persisted interval");
    sqlx::query("UPDATE intervals SET start_at = $1, end_at = $2 WHERE id = $3")
        .bind(interval.start)
        .bind(interval.end)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete_many<'e, E>(executor: E, ids: &[i64]) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("DELETE FROM intervals WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete_one<'e, E>(executor: E, id: i64) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    delete_many(executor, &[id]).await
}

/// Ids of the managers who administer the organization that owns `interval`
/// (empty for resource-scoped `Unavailable` intervals with no organization),
/// used by `authorize_interval_actor`.
pub async fn managers_of_owning_organization<'e, E>(
    executor: E,
    organization_id: i64,
) -> DomainResult<Vec<i64>>
where
    E: PgExecutor<'e>,
{
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT manager_id FROM organization_managers WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

//! Database operations for the `resources` table.

use std::collections::HashMap;

use sqlx::PgExecutor;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::model::Resource;

pub async fn find_by_external<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Option<Resource>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Resource>(
        "SELECT id, app, external_id FROM resources WHERE app = $1 AND external_id = $2",
    )
    .bind(app)
    .bind(external_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Option<Resource>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Resource>("SELECT id, app, external_id FROM resources WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn require_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Resource>
where
    E: PgExecutor<'e>,
{
    find_by_id(executor, id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("resource {id}")))
}

pub async fn find_or_create<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Resource>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Resource>(
        "INSERT INTO resources (app, external_id) VALUES ($1, $2) \
         ON CONFLICT (app, external_id) DO UPDATE SET app = EXCLUDED.app \
         RETURNING id, app, external_id",
    )
    .bind(app)
    .bind(external_id)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// Batch `id -> external_id` lookup, used when rendering a page of
/// intervals on the wire without one round-trip per row.
pub async fn external_ids_by_id<'e, E>(executor: E, ids: &[i64]) -> DomainResult<HashMap<i64, i64>>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT id, external_id FROM resources WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().collect())
}

/// `SELECT ... FOR UPDATE` row lock on the resource, acquired by mutating
/// handlers before running the join/subtract/validate sequence.
pub async fn lock_for_update<'e, E>(executor: E, id: i64) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT id FROM resources WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(())
}

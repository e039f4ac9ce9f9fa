//! Database operations for the `managers` table.

use std::collections::HashMap;

use sqlx::PgExecutor;

use crate::domain::error::DomainResult;
use crate::domain::model::Manager;

pub async fn find_by_external<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Option<Manager>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Manager>(
        "SELECT id, app, external_id FROM managers WHERE app = $1 AND external_id = $2",
    )
    .bind(app)
    .bind(external_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Option<Manager>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Manager>("SELECT id, app, external_id FROM managers WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Insert if absent, returning the existing or newly created row. Backs
/// `POST /manager/add_many`, which is idempotent over already-known
/// managers.
pub async fn find_or_create<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Manager>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Manager>(
        "INSERT INTO managers (app, external_id) VALUES ($1, $2) \
         ON CONFLICT (app, external_id) DO UPDATE SET app = EXCLUDED.app \
         RETURNING id, app, external_id",
    )
    .bind(app)
    .bind(external_id)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// Batch `id -> external_id` lookup, mirroring `resources::external_ids_by_id`.
pub async fn external_ids_by_id<'e, E>(executor: E, ids: &[i64]) -> DomainResult<HashMap<i64, i64>>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT id, external_id FROM managers WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().collect())
}

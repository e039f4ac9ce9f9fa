//! Database operations for the `organizations` table and its manager
//! membership edge (`organization_managers`).

use std::collections::HashMap;

use sqlx::PgExecutor;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::model::Organization;

pub async fn find_by_external<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Option<Organization>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Organization>(
        "SELECT id, app, external_id FROM organizations WHERE app = $1 AND external_id = $2",
    )
    .bind(app)
    .bind(external_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn require_by_external<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Organization>
where
    E: PgExecutor<'e>,
{
    find_by_external(executor, app, external_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("organization {external_id}")))
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Option<Organization>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Organization>("SELECT id, app, external_id FROM organizations WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn create<'e, E>(executor: E, app: &str, external_id: i64) -> DomainResult<Organization>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Organization>(
        "INSERT INTO organizations (app, external_id) VALUES ($1, $2) RETURNING id, app, external_id",
    )
    .bind(app)
    .bind(external_id)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            DomainError::Conflict(format!("organization {external_id} already exists"))
        }
        other => DomainError::Storage(other),
    })?;
    Ok(row)
}

pub async fn delete<'e, E>(executor: E, id: i64) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Batch `id -> external_id` lookup, mirroring `resources::external_ids_by_id`.
pub async fn external_ids_by_id<'e, E>(executor: E, ids: &[i64]) -> DomainResult<HashMap<i64, i64>>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT id, external_id FROM organizations WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Ids of the managers assigned to this organization.
pub async fn manager_ids<'e, E>(executor: E, organization_id: i64) -> DomainResult<Vec<i64>>
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

pub async fn is_manager_member<'e, E>(executor: E, manager_id: i64, organization_id: i64) -> DomainResult<bool>
where
    E: PgExecutor<'e>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM organization_managers WHERE manager_id = $1 AND organization_id = $2",
    )
    .bind(manager_id)
    .bind(organization_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.is_some())
}

pub async fn add_manager<'e, E>(executor: E, organization_id: i64, manager_id: i64) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO organization_managers (organization_id, manager_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(organization_id)
    .bind(manager_id)
    .execute(executor)
    .await?;
    Ok(())
}

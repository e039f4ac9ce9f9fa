//! Database operations for `api_keys` -- the `Api-Key` header → `app` label
//! mapping that scopes every request.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::model::ApiKey;

pub async fn find_active_by_key<'e, E>(executor: E, key: Uuid) -> DomainResult<Option<ApiKey>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key, app, is_active FROM api_keys WHERE key = $1 AND is_active",
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn list<'e, E>(executor: E) -> DomainResult<Vec<ApiKey>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ApiKey>("SELECT id, key, app, is_active FROM api_keys ORDER BY app")
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Backs the `generate-api-key` CLI subcommand.
pub async fn create<'e, E>(executor: E, app: &str) -> DomainResult<ApiKey>
where
    E: PgExecutor<'e>,
{
    let key = Uuid::new_v4();
    let row = sqlx::query_as::<_, ApiKey>(
        "INSERT INTO api_keys (key, app, is_active) VALUES ($1, $2, true) \
         RETURNING id, key, app, is_active",
    )
    .bind(key)
    .bind(app)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

//! API-key identity and the `author_id`-based interval authorization rule.
//!
//! Every route requires a valid `Api-Key` header, checked as a blanket
//! permission ahead of any handler logic. Mutating interval endpoints
//! additionally require `author_id` to name a manager or resource entitled
//! to act on the target interval -- see DESIGN.md for where this rule comes
//! from.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::data;
use crate::domain::error::DomainError;
use crate::domain::model::Interval;
use crate::state::AppState;
use crate::web::error::{db_error, ApiError};

/// The authenticated caller's tenant label, resolved from `Api-Key`.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    pub app: String,
}

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Api-Key")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Authorization("missing Api-Key header".into()))?;

        let key = Uuid::parse_str(header).map_err(|_| ApiError::Authorization("malformed Api-Key header".into()))?;

        let api_key = data::api_keys::find_active_by_key(&state.db_pool, key)
            .await?
            .ok_or_else(|| ApiError::Authorization("unknown or inactive Api-Key".into()))?;

        Ok(ApiKeyAuth { app: api_key.app })
    }
}

/// `author_id` must be the interval's manager, a manager of the interval's
/// organization, or (for `Unavailable` intervals only) the interval's own
/// resource.
pub async fn authorize_interval_actor<'c, A>(
    executor: A,
    app: &str,
    author_id: i64,
    interval: &Interval,
) -> Result<(), ApiError>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await.map_err(|e| db_error("acquire connection", e))?;

    if let Some(manager_id) = interval.manager_id {
        if let Some(manager) = data::managers::find_by_id(&mut *conn, manager_id).await? {
            if manager.app == app && manager.external_id == author_id {
                return Ok(());
            }
        }
    }

    if let Some(organization_id) = interval.organization_id {
        for candidate_id in data::organizations::manager_ids(&mut *conn, organization_id).await? {
            if let Some(manager) = data::managers::find_by_id(&mut *conn, candidate_id).await? {
                if manager.app == app && manager.external_id == author_id {
                    return Ok(());
                }
            }
        }
    }

    if interval.kind == crate::domain::model::IntervalKind::Unavailable {
        if let Some(resource) = data::resources::find_by_id(&mut *conn, interval.resource_id).await? {
            if resource.app == app && resource.external_id == author_id {
                return Ok(());
            }
        }
    }

    Err(DomainError::Authorization(format!("author {author_id} may not act on this interval")).into())
}

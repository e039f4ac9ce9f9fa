//! `POST/PATCH/DELETE /interval`, `DELETE /interval/delete_many` -- direct
//! interval mutation, independent of the schedule materializer.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum_extra::extract::Query;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::data;
use crate::domain::events::EventSink;
use crate::domain::model::{Interval, IntervalKind};
use crate::domain::time::Instant;
use crate::domain::validation;
use crate::state::AppState;
use crate::web::auth::{authorize_interval_actor, ApiKeyAuth};
use crate::web::error::{db_error, ApiError, OptionNotFoundExt};
use crate::web::json::ok_with_events;

/// Wire shape for an interval: `{id, start, end, kind, resource, organization,
/// manager, comment, object}`, with `resource`/`organization`/
/// `manager` rendered as the caller's own `external_id`s, never internal ids.
#[derive(Debug, Serialize)]
pub struct IntervalView {
    pub id: i64,
    pub start: Instant,
    pub end: Instant,
    pub kind: &'static str,
    pub resource: i64,
    pub organization: Option<i64>,
    pub manager: Option<i64>,
    pub comment: Option<String>,
    pub object: Option<i64>,
}

/// Resolves a batch of intervals to their wire view in as few round-trips
/// as possible, batching the internal-id -> external-id lookups.
pub async fn render_many(pool: &sqlx::PgPool, intervals: &[Interval]) -> Result<Vec<IntervalView>, ApiError> {
    let resource_ids: Vec<i64> = intervals.iter().map(|i| i.resource_id).collect();
    let org_ids: Vec<i64> = intervals.iter().filter_map(|i| i.organization_id).collect();
    let manager_ids: Vec<i64> = intervals.iter().filter_map(|i| i.manager_id).collect();

    let resources = data::resources::external_ids_by_id(pool, &resource_ids)
        .await
        .map_err(|e| db_error("resolve resource external ids", e))?;
    let orgs = data::organizations::external_ids_by_id(pool, &org_ids)
        .await
        .map_err(|e| db_error("resolve organization external ids", e))?;
    let managers = data::managers::external_ids_by_id(pool, &manager_ids)
        .await
        .map_err(|e| db_error("resolve manager external ids", e))?;

    Ok(intervals.iter().map(|i| render_one(i, &resources, &orgs, &managers)).collect())
}

fn render_one(
    interval: &Interval,
    resources: &HashMap<i64, i64>,
    orgs: &HashMap<i64, i64>,
    managers: &HashMap<i64, i64>,
) -> IntervalView {
    let organization = interval.organization_id.and_then(|id| orgs.get(&id)).copied();
    let manager = interval.manager_id.and_then(|id| managers.get(&id)).copied();
    let object = match interval.kind {
        IntervalKind::OrgReserved => organization,
        IntervalKind::ManagerReserved => manager,
        IntervalKind::Unavailable => None,
    };
    IntervalView {
        id: interval.id.expect("persisted interval has an id"),
        start: interval.start,
        end: interval.end,
        kind: interval.kind.as_str(),
        resource: resources.get(&interval.resource_id).copied().unwrap_or_default(),
        organization,
        manager,
        comment: interval.comment.clone(),
        object,
    }
}

#[derive(Debug, Deserialize)]
pub struct IntervalInput {
    pub start: Instant,
    pub end: Instant,
    pub kind: String,
    pub resource: i64,
    pub organization: Option<i64>,
    pub manager: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalPatch {
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorQuery {
    pub author_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteManyInput {
    pub ids: Vec<i64>,
}

async fn resolve_interval_input(
    pool: &sqlx::PgPool,
    app: &str,
    input: &IntervalInput,
) -> Result<Interval, ApiError> {
    let resource = data::resources::find_by_external(pool, app, input.resource)
        .await
        .map_err(|e| db_error("resolve resource", e))?
        .or_not_found(format!("resource {}", input.resource))?;

    let organization_id = match input.organization {
        Some(external_id) => Some(
            data::organizations::find_by_external(pool, app, external_id)
                .await
                .map_err(|e| db_error("resolve organization", e))?
                .or_not_found(format!("organization {external_id}"))?
                .id,
        ),
        None => None,
    };

    let manager_id = match input.manager {
        Some(external_id) => Some(
            data::managers::find_by_external(pool, app, external_id)
                .await
                .map_err(|e| db_error("resolve manager", e))?
                .or_not_found(format!("manager {external_id}"))?
                .id,
        ),
        None => None,
    };

    Ok(Interval {
        id: None,
        resource_id: resource.id,
        kind: IntervalKind::from_str_or_default(&input.kind),
        start: input.start,
        end: input.end,
        organization_id,
        manager_id,
        comment: input.comment.clone(),
    })
}

/// `POST /interval`.
pub async fn create(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Query(author): Query<AuthorQuery>,
    Json(input): Json<IntervalInput>,
) -> Result<Response, ApiError> {
    let mut interval = resolve_interval_input(&state.db_pool, &auth.app, &input).await?;

    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;
    data::resources::lock_for_update(&mut *tx, interval.resource_id)
        .await
        .map_err(|e| db_error("lock resource", e))?;

    let author_id = author
        .author_id
        .ok_or_else(|| ApiError::Authorization("author_id is required".into()))?;
    authorize_interval_actor(&mut *tx, &auth.app, author_id, &interval).await?;

    let mut sink = EventSink::new();
    validation::save_interval(&mut *tx, &mut interval, true, true, &mut sink)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    let view = render_many(&state.db_pool, std::slice::from_ref(&interval)).await?;
    Ok(ok_with_events(view.into_iter().next(), sink))
}

/// `PATCH /interval/:id`.
pub async fn update(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(author): Query<AuthorQuery>,
    Json(patch): Json<IntervalPatch>,
) -> Result<Response, ApiError> {
    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;

    let mut interval = data::intervals::find_by_id(&mut *tx, id)
        .await
        .map_err(|e| db_error("load interval", e))?
        .or_not_found(format!("interval {id}"))?;

    data::resources::lock_for_update(&mut *tx, interval.resource_id)
        .await
        .map_err(|e| db_error("lock resource", e))?;

    let author_id = author
        .author_id
        .ok_or_else(|| ApiError::Authorization("author_id is required".into()))?;
    authorize_interval_actor(&mut *tx, &auth.app, author_id, &interval).await?;

    if let Some(start) = patch.start {
        interval.start = start;
    }
    if let Some(end) = patch.end {
        interval.end = end;
    }
    if patch.comment.is_some() {
        interval.comment = patch.comment;
    }

    let mut sink = EventSink::new();
    validation::save_interval(&mut *tx, &mut interval, true, true, &mut sink)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    let view = render_many(&state.db_pool, std::slice::from_ref(&interval)).await?;
    Ok(ok_with_events(view.into_iter().next(), sink))
}

/// `DELETE /interval/:id`.
pub async fn delete(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(author): Query<AuthorQuery>,
) -> Result<Response, ApiError> {
    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;

    let interval = data::intervals::find_by_id(&mut *tx, id)
        .await
        .map_err(|e| db_error("load interval", e))?
        .or_not_found(format!("interval {id}"))?;

    data::resources::lock_for_update(&mut *tx, interval.resource_id)
        .await
        .map_err(|e| db_error("lock resource", e))?;

    let author_id = author
        .author_id
        .ok_or_else(|| ApiError::Authorization("author_id is required".into()))?;
    authorize_interval_actor(&mut *tx, &auth.app, author_id, &interval).await?;

    let mut sink = EventSink::new();
    validation::delete_interval(&mut *tx, &interval, true, &mut sink)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    Ok(ok_with_events(serde_json::json!({"deleted": id}), sink))
}

/// `DELETE /interval/delete_many` `{ids}`.
pub async fn delete_many(
    _auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<DeleteManyInput>,
) -> Result<Response, ApiError> {
    if input.ids.is_empty() {
        return Ok(ok_with_events(serde_json::json!({"deleted": []}), EventSink::new()));
    }

    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;
    let mut sink = EventSink::new();
    for id in &input.ids {
        if let Some(interval) = data::intervals::find_by_id(&mut *tx, *id)
            .await
            .map_err(|e| db_error("load interval", e))?
        {
            validation::delete_interval(&mut *tx, &interval, true, &mut sink)
                .await
                .map_err(ApiError::from)?;
        }
    }
    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    Ok(ok_with_events(serde_json::json!({"deleted": input.ids}), sink))
}

//! `POST /resource/add_many`, `GET|PUT|DELETE /resource/:id/membership`,
//! `POST /resource/:id/apply_schedule`, `GET /resource/:id/intervals`,
//! `POST /resource/:id/clear_unavailable_interval`.

use axum::extract::{Path, State};
use axum_extra::extract::Query;
use axum::response::Response;
use axum::Json;
use chrono::{Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data;
use crate::domain::algebra::WeeklyPiece;
use crate::domain::events::EventSink;
use crate::domain::model::Organization;
use crate::domain::schedule;
use crate::domain::time::Instant;
use crate::domain::validation;
use crate::state::AppState;
use crate::web::auth::ApiKeyAuth;
use crate::web::error::{db_error, ApiError, OptionNotFoundExt};
use crate::web::intervals::{render_many, AuthorQuery};
use crate::web::json::ok_with_events;

#[derive(Debug, Deserialize)]
pub struct AddManyInput {
    pub ids: Vec<i64>,
    pub organization: Option<i64>,
}

/// `POST /resource/add_many` `{ids, organization?}`.
pub async fn add_many(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<AddManyInput>,
) -> Result<Response, ApiError> {
    let organization = match input.organization {
        Some(external_id) => Some(
            data::organizations::find_by_external(&state.db_pool, &auth.app, external_id)
                .await
                .map_err(|e| db_error("find organization", e))?
                .or_not_found(format!("organization {external_id}"))?,
        ),
        None => None,
    };

    for external_id in &input.ids {
        let resource = data::resources::find_or_create(&state.db_pool, &auth.app, *external_id)
            .await
            .map_err(ApiError::from)?;
        if let Some(organization) = &organization {
            data::memberships::find_or_create(&state.db_pool, resource.id, organization.id)
                .await
                .map_err(ApiError::from)?;
        }
    }

    Ok(ok_with_events(
        serde_json::json!({"ids": input.ids}),
        EventSink::new(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MembershipQuery {
    pub organization: i64,
}

#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub resource: i64,
    pub organization: i64,
    pub schedule_extended_to: Option<Instant>,
}

async fn resolve_resource_and_organization(
    state: &AppState,
    app: &str,
    resource_external_id: i64,
    organization_external_id: i64,
) -> Result<(Organization, i64), ApiError> {
    let resource = data::resources::find_by_external(&state.db_pool, app, resource_external_id)
        .await
        .map_err(|e| db_error("find resource", e))?
        .or_not_found(format!("resource {resource_external_id}"))?;
    let organization = data::organizations::find_by_external(&state.db_pool, app, organization_external_id)
        .await
        .map_err(|e| db_error("find organization", e))?
        .or_not_found(format!("organization {organization_external_id}"))?;
    Ok((organization, resource.id))
}

/// `GET /resource/:id/membership?organization=`.
pub async fn get_membership(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Query(query): Query<MembershipQuery>,
) -> Result<Response, ApiError> {
    let (organization, resource_id) =
        resolve_resource_and_organization(&state, &auth.app, resource_external_id, query.organization).await?;

    let membership = data::memberships::find(&state.db_pool, resource_id, organization.id)
        .await
        .map_err(|e| db_error("find membership", e))?
        .or_not_found("membership")?;

    let view = MembershipView {
        resource: resource_external_id,
        organization: query.organization,
        schedule_extended_to: membership.schedule_extended_to,
    };
    Ok(ok_with_events(view, EventSink::new()))
}

/// `PUT /resource/:id/membership?organization=`: `find_or_create`.
pub async fn put_membership(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Query(query): Query<MembershipQuery>,
) -> Result<Response, ApiError> {
    let (organization, resource_id) =
        resolve_resource_and_organization(&state, &auth.app, resource_external_id, query.organization).await?;

    let membership = data::memberships::find_or_create(&state.db_pool, resource_id, organization.id)
        .await
        .map_err(ApiError::from)?;

    let view = MembershipView {
        resource: resource_external_id,
        organization: query.organization,
        schedule_extended_to: membership.schedule_extended_to,
    };
    Ok(ok_with_events(view, EventSink::new()))
}

/// `DELETE /resource/:id/membership?organization=`: truncates the
/// organization's coverage of the resource to "now" before dropping the
/// membership row, so no dangling future `OrgReserved` time survives it.
pub async fn delete_membership(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Query(query): Query<MembershipQuery>,
) -> Result<Response, ApiError> {
    let (organization, resource_id) =
        resolve_resource_and_organization(&state, &auth.app, resource_external_id, query.organization).await?;

    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;

    let mut membership = data::memberships::find(&mut *tx, resource_id, organization.id)
        .await
        .map_err(|e| db_error("find membership", e))?
        .or_not_found("membership")?;

    data::resources::lock_for_update(&mut *tx, resource_id)
        .await
        .map_err(|e| db_error("lock resource", e))?;
    schedule::strip_organization_time(&mut *tx, &mut membership)
        .await
        .map_err(ApiError::from)?;
    data::memberships::delete(&mut *tx, membership.id)
        .await
        .map_err(|e| db_error("delete membership", e))?;

    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    Ok(ok_with_events(
        serde_json::json!({"deleted": true}),
        EventSink::new(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleIntervalInput {
    pub day_of_week: i16,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct ApplyScheduleInput {
    pub organization: i64,
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub schedule_intervals: Option<Vec<ScheduleIntervalInput>>,
}

/// `POST /resource/:id/apply_schedule` `{organization, start?, end?,
/// schedule_intervals?}`: missing `end` saves `schedule_intervals`
/// as the permanent template and projects it out to the default horizon;
/// missing both `start` and `end` instead rolls the existing template
/// forward from the current watermark.
pub async fn apply_schedule(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Query(author): Query<AuthorQuery>,
    Json(input): Json<ApplyScheduleInput>,
) -> Result<Response, ApiError> {
    let (organization, resource_id) =
        resolve_resource_and_organization(&state, &auth.app, resource_external_id, input.organization).await?;

    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;

    let mut membership = data::memberships::find_or_create(&mut *tx, resource_id, organization.id)
        .await
        .map_err(ApiError::from)?;

    data::resources::lock_for_update(&mut *tx, resource_id)
        .await
        .map_err(|e| db_error("lock resource", e))?;

    let fragments: Option<Vec<WeeklyPiece>> = input.schedule_intervals.as_ref().map(|pieces| {
        pieces
            .iter()
            .map(|p| WeeklyPiece {
                day_of_week: p.day_of_week,
                start_time: p.start,
                end_time: p.end,
            })
            .collect()
    });

    let mut sink = EventSink::new();
    let horizon = Utc::now() + Duration::days(state.extendable_min_days);

    match (input.start, input.end) {
        (None, None) => {
            schedule::extend_schedule(&mut *tx, &mut membership, horizon, author.author_id, &mut sink)
                .await
                .map_err(ApiError::from)?;
        }
        (start, Some(end)) => {
            schedule::apply_schedule(
                &mut *tx,
                &membership,
                start.unwrap_or_else(Utc::now),
                end,
                fragments,
                false,
                author.author_id,
                &mut sink,
            )
            .await
            .map_err(ApiError::from)?;
        }
        (start, None) => {
            let start = start.unwrap_or_else(Utc::now);
            schedule::apply_schedule(&mut *tx, &membership, start, horizon, fragments, true, author.author_id, &mut sink)
                .await
                .map_err(ApiError::from)?;
            data::memberships::set_schedule_extended_to(&mut *tx, membership.id, horizon)
                .await
                .map_err(|e| db_error("set schedule watermark", e))?;
        }
    }

    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    Ok(ok_with_events(
        serde_json::json!({"resource": resource_external_id, "organization": input.organization}),
        sink,
    ))
}

#[derive(Debug, Deserialize)]
pub struct IntervalsQuery {
    pub start: Instant,
    pub end: Instant,
}

/// `GET /resource/:id/intervals?start=&end=`.
pub async fn intervals(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Query(query): Query<IntervalsQuery>,
) -> Result<Response, ApiError> {
    let resource = data::resources::find_by_external(&state.db_pool, &auth.app, resource_external_id)
        .await
        .map_err(|e| db_error("find resource", e))?
        .or_not_found(format!("resource {resource_external_id}"))?;

    let mut memberships = data::memberships::for_resource(&state.db_pool, resource.id)
        .await
        .map_err(|e| db_error("list resource memberships", e))?;
    let mut scratch = EventSink::new();
    for membership in &mut memberships {
        schedule::extend_schedule(&state.db_pool, membership, query.end, None, &mut scratch)
            .await
            .map_err(ApiError::from)?;
    }

    let found = data::intervals::between(&state.db_pool, resource.id, query.start, query.end)
        .await
        .map_err(|e| db_error("list resource intervals", e))?;

    let view = render_many(&state.db_pool, &found).await?;
    Ok(ok_with_events(view, EventSink::new()))
}

#[derive(Debug, Deserialize)]
pub struct ClearUnavailableInput {
    pub start: Instant,
    pub end: Instant,
}

/// `POST /resource/:id/clear_unavailable_interval` `{start,end}`.
pub async fn clear_unavailable_interval(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(resource_external_id): Path<i64>,
    Json(input): Json<ClearUnavailableInput>,
) -> Result<Response, ApiError> {
    let resource = data::resources::find_by_external(&state.db_pool, &auth.app, resource_external_id)
        .await
        .map_err(|e| db_error("find resource", e))?
        .or_not_found(format!("resource {resource_external_id}"))?;

    let mut tx = state.db_pool.begin().await.map_err(|e| db_error("begin transaction", e))?;
    data::resources::lock_for_update(&mut *tx, resource.id)
        .await
        .map_err(|e| db_error("lock resource", e))?;

    let mut sink = EventSink::new();
    validation::clear_unavailable_interval(&mut *tx, resource.id, input.start, input.end, &mut sink)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(|e| db_error("commit transaction", e))?;

    Ok(ok_with_events(
        serde_json::json!({"resource": resource_external_id}),
        sink,
    ))
}

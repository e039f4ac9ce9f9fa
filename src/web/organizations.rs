//! `POST/GET/DELETE /organization`, `GET /organization/:id/intervals`.

use axum::extract::{Path, State};
use axum_extra::extract::Query;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::data;
use crate::domain::events::EventSink;
use crate::domain::model::{Interval, IntervalKind};
use crate::domain::schedule;
use crate::domain::time::Instant;
use crate::state::AppState;
use crate::web::auth::ApiKeyAuth;
use crate::web::error::{db_error, ApiError, OptionNotFoundExt};
use crate::web::intervals::{render_many, IntervalView};
use crate::web::json::ok_with_events;

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationInput {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct OrganizationView {
    pub id: i64,
    pub manager_ids: Vec<i64>,
    pub resource_members: Vec<ResourceMemberView>,
}

#[derive(Debug, Serialize)]
pub struct ResourceMemberView {
    pub resource: i64,
    pub has_schedule: bool,
}

/// `POST /organization` `{id}`.
pub async fn create(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<CreateOrganizationInput>,
) -> Result<Response, ApiError> {
    let organization = data::organizations::create(&state.db_pool, &auth.app, input.id)
        .await
        .map_err(ApiError::from)?;

    Ok(ok_with_events(
        serde_json::json!({"id": organization.external_id}),
        crate::domain::events::EventSink::new(),
    ))
}

/// `GET /organization/:id` -> `{manager_ids, resource_members:[{resource,has_schedule}]}`.
pub async fn get(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(external_id): Path<i64>,
) -> Result<Response, ApiError> {
    let organization = data::organizations::find_by_external(&state.db_pool, &auth.app, external_id)
        .await
        .map_err(|e| db_error("find organization", e))?
        .or_not_found(format!("organization {external_id}"))?;

    let manager_internal_ids = data::organizations::manager_ids(&state.db_pool, organization.id)
        .await
        .map_err(|e| db_error("list organization managers", e))?;
    let managers = data::managers::external_ids_by_id(&state.db_pool, &manager_internal_ids)
        .await
        .map_err(|e| db_error("resolve manager external ids", e))?;
    let manager_ids: Vec<i64> = manager_internal_ids
        .iter()
        .filter_map(|id| managers.get(id).copied())
        .collect();

    let memberships = data::memberships::for_organization(&state.db_pool, organization.id)
        .await
        .map_err(|e| db_error("list organization memberships", e))?;
    let resource_internal_ids: Vec<i64> = memberships.iter().map(|m| m.resource_id).collect();
    let resources = data::resources::external_ids_by_id(&state.db_pool, &resource_internal_ids)
        .await
        .map_err(|e| db_error("resolve resource external ids", e))?;
    let resource_members = memberships
        .iter()
        .map(|m| ResourceMemberView {
            resource: resources.get(&m.resource_id).copied().unwrap_or_default(),
            has_schedule: m.schedule_extended_to.is_some(),
        })
        .collect();

    let view = OrganizationView {
        id: organization.external_id,
        manager_ids,
        resource_members,
    };
    Ok(ok_with_events(view, crate::domain::events::EventSink::new()))
}

/// `DELETE /organization/:id`.
pub async fn delete(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(external_id): Path<i64>,
) -> Result<Response, ApiError> {
    let organization = data::organizations::find_by_external(&state.db_pool, &auth.app, external_id)
        .await
        .map_err(|e| db_error("find organization", e))?
        .or_not_found(format!("organization {external_id}"))?;

    data::organizations::delete(&state.db_pool, organization.id)
        .await
        .map_err(|e| db_error("delete organization", e))?;

    Ok(ok_with_events(
        serde_json::json!({"deleted": external_id}),
        crate::domain::events::EventSink::new(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct IntervalsQuery {
    pub start: Instant,
    pub end: Instant,
    pub resource: Option<i64>,
}

/// `GET /organization/:id/intervals?start=&end=&resource=`:
/// intervals belonging to another organization are masked
/// (`comment=null,manager=null`); `Unavailable` intervals fully contained in
/// another organization's `OrgReserved` span on the same resource are
/// dropped entirely rather than masked.
pub async fn intervals(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Path(external_id): Path<i64>,
    Query(query): Query<IntervalsQuery>,
) -> Result<Response, ApiError> {
    let organization = data::organizations::find_by_external(&state.db_pool, &auth.app, external_id)
        .await
        .map_err(|e| db_error("find organization", e))?
        .or_not_found(format!("organization {external_id}"))?;

    let mut memberships = data::memberships::for_organization(&state.db_pool, organization.id)
        .await
        .map_err(|e| db_error("list organization memberships", e))?;

    let mut scratch = EventSink::new();
    for membership in &mut memberships {
        schedule::extend_schedule(&state.db_pool, membership, query.end, None, &mut scratch)
            .await
            .map_err(ApiError::from)?;
    }

    let resource_ids: Vec<i64> = match query.resource {
        Some(resource_external_id) => {
            let resource = data::resources::find_by_external(&state.db_pool, &auth.app, resource_external_id)
                .await
                .map_err(|e| db_error("find resource", e))?
                .or_not_found(format!("resource {resource_external_id}"))?;
            vec![resource.id]
        }
        None => memberships.iter().map(|m| m.resource_id).collect(),
    };

    let mut visible: Vec<Interval> = Vec::new();
    for resource_id in resource_ids {
        if !memberships.iter().any(|m| m.resource_id == resource_id) {
            continue;
        }
        let own_coverage = data::intervals::between(&state.db_pool, resource_id, query.start, query.end)
            .await
            .map_err(|e| db_error("list resource intervals", e))?;

        let other_org_coverage: Vec<&Interval> = own_coverage
            .iter()
            .filter(|i| i.kind == IntervalKind::OrgReserved && i.organization_id != Some(organization.id))
            .collect();

        for interval in own_coverage.iter() {
            let is_own = interval.organization_id == Some(organization.id);
            if interval.kind == IntervalKind::Unavailable {
                let hidden = other_org_coverage
                    .iter()
                    .any(|org_interval| org_interval.start <= interval.start && org_interval.end >= interval.end);
                if hidden {
                    continue;
                }
                visible.push(interval.clone());
                continue;
            }
            if is_own {
                visible.push(interval.clone());
            } else if interval.kind == IntervalKind::OrgReserved || interval.kind == IntervalKind::ManagerReserved {
                let mut masked = interval.clone();
                masked.comment = None;
                masked.manager_id = None;
                visible.push(masked);
            }
        }
    }
    visible.sort_by_key(|i| i.start);

    let view: Vec<IntervalView> = render_many(&state.db_pool, &visible).await?;
    Ok(ok_with_events(view, crate::domain::events::EventSink::new()))
}

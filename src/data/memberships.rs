//! Database operations for `resource_memberships` -- the (Resource,
//! Organization) edge carrying a weekly schedule template.

use sqlx::PgExecutor;

use crate::domain::error::DomainResult;
use crate::domain::model::ResourceMembership;
use crate::domain::time::Instant;

pub async fn find<'e, E>(
    executor: E,
    resource_id: i64,
    organization_id: i64,
) -> DomainResult<Option<ResourceMembership>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ResourceMembership>(
        "SELECT id, resource_id, organization_id, schedule_extended_to FROM resource_memberships \
         WHERE resource_id = $1 AND organization_id = $2",
    )
    .bind(resource_id)
    .bind(organization_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> DomainResult<Option<ResourceMembership>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ResourceMembership>(
        "SELECT id, resource_id, organization_id, schedule_extended_to FROM resource_memberships WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Insert if absent, returning the existing or newly created membership.
/// Backs `POST /resource/add_many` when an `organization` is given.
pub async fn find_or_create<'e, E>(
    executor: E,
    resource_id: i64,
    organization_id: i64,
) -> DomainResult<ResourceMembership>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ResourceMembership>(
        "INSERT INTO resource_memberships (resource_id, organization_id) VALUES ($1, $2) \
         ON CONFLICT (resource_id, organization_id) DO UPDATE SET resource_id = EXCLUDED.resource_id \
         RETURNING id, resource_id, organization_id, schedule_extended_to",
    )
    .bind(resource_id)
    .bind(organization_id)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

pub async fn delete<'e, E>(executor: E, id: i64) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM resource_memberships WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn set_schedule_extended_to<'e, E>(executor: E, id: i64, extended_to: Instant) -> DomainResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE resource_memberships SET schedule_extended_to = $1 WHERE id = $2")
        .bind(extended_to)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Every membership belonging to an organization -- backs `GET
/// /organization/:id` (`resource_members`).
pub async fn for_organization<'e, E>(executor: E, organization_id: i64) -> DomainResult<Vec<ResourceMembership>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ResourceMembership>(
        "SELECT id, resource_id, organization_id, schedule_extended_to FROM resource_memberships \
         WHERE organization_id = $1",
    )
    .bind(organization_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Every membership a resource holds, across all organizations -- backs the
/// lazy schedule-extension roll-forward on `GET /resource/:id/intervals`.
pub async fn for_resource<'e, E>(executor: E, resource_id: i64) -> DomainResult<Vec<ResourceMembership>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ResourceMembership>(
        "SELECT id, resource_id, organization_id, schedule_extended_to FROM resource_memberships \
         WHERE resource_id = $1",
    )
    .bind(resource_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Every other membership of a resource (excluding `organization_id`) --
/// used to enforce that a resource's organization-template schedules stay
/// disjoint across its memberships.
pub async fn other_memberships_of_resource<'e, E>(
    executor: E,
    resource_id: i64,
    excluding_organization_id: i64,
) -> DomainResult<Vec<ResourceMembership>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ResourceMembership>(
        "SELECT id, resource_id, organization_id, schedule_extended_to FROM resource_memberships \
         WHERE resource_id = $1 AND organization_id != $2",
    )
    .bind(resource_id)
    .bind(excluding_organization_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

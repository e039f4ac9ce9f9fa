//! Validation engine: the pre-save rule set run on every `Interval.save`
//! plus the delete and clear-unavailable operations.

use crate::data;
use crate::domain::algebra::{self, fragments_intersect_interval};
use crate::domain::error::{DomainError, DomainResult, FieldError};
use crate::domain::events::{Event, EventSink};
use crate::domain::model::{Interval, IntervalKind};
use crate::domain::time::JOIN_GAP;

/// `Interval.save(join, trim, events)`. `interval.organization_id`,
/// `.manager_id`, and `.resource_id` must already be resolved to internal
/// ids by the caller (the web layer resolves `(app, external_id)` pairs
/// before reaching the domain). Generic over anything `sqlx` can acquire a
/// connection from (`&PgPool` or `&mut Transaction`) so the whole
/// lock/validate/join/save sequence can run inside one transaction.
pub async fn save_interval<'c, A>(
    executor: A,
    interval: &mut Interval,
    join: bool,
    emit_events: bool,
    sink: &mut EventSink,
) -> DomainResult<()>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    // 1. start < end
    if interval.start >= interval.end {
        return Err(FieldError::new("end", "End date must be greater than start date.").into());
    }

    // 2. organization required unless Unavailable
    if interval.organization_id.is_none() && interval.kind != IntervalKind::Unavailable {
        return Err(FieldError::new("organization", "Organization is required.").into());
    }

    // 3. manager must belong to organization
    if let (Some(manager_id), Some(organization_id)) = (interval.manager_id, interval.organization_id) {
        if !data::organizations::is_manager_member(&mut *conn, manager_id, organization_id).await? {
            return Err(FieldError::non_field("Only managers can reserve time for organization.").into());
        }
    }

    // 4. resource must have a membership with organization
    if let Some(organization_id) = interval.organization_id {
        if data::memberships::find(&mut *conn, interval.resource_id, organization_id)
            .await?
            .is_none()
        {
            return Err(FieldError::non_field("Resource is not in specified organization.").into());
        }
    }

    // 5. Q = between(start,end).filter(resource=self.resource) \ self
    let q: Vec<Interval> = data::intervals::between(&mut *conn, interval.resource_id, interval.start, interval.end)
        .await?
        .into_iter()
        .filter(|other| other.id != interval.id)
        .collect();

    // 6. kind-specific rules
    match interval.kind {
        IntervalKind::ManagerReserved => {
            let manager_id = interval
                .manager_id
                .ok_or_else(|| FieldError::new("manager", "Manager is required."))?;
            let organization_id = interval.organization_id;

            let org_coverage: Vec<Interval> = q
                .iter()
                .filter(|o| o.kind == IntervalKind::OrgReserved && o.organization_id == organization_id)
                .cloned()
                .collect();
            if !algebra::is_continuous(&org_coverage, interval.start, interval.end) {
                return Err(FieldError::non_field("This period isn't fall within organization time.").into());
            }

            let other_manager_conflict = q
                .iter()
                .any(|o| o.kind == IntervalKind::ManagerReserved && o.manager_id != Some(manager_id));
            if other_manager_conflict {
                return Err(FieldError::non_field("This time is reserved for another manager.").into());
            }

            let same_manager: Vec<Interval> = q
                .iter()
                .filter(|o| o.kind == IntervalKind::ManagerReserved && o.manager_id == Some(manager_id))
                .cloned()
                .collect();
            if algebra::is_continuous(&same_manager, interval.start, interval.end) {
                return Err(FieldError::non_field("This time is already reserved.").into());
            }
        }
        IntervalKind::OrgReserved => {
            let organization_id = interval.organization_id;

            let same_org: Vec<Interval> = q
                .iter()
                .filter(|o| o.kind == IntervalKind::OrgReserved && o.organization_id == organization_id)
                .cloned()
                .collect();
            if algebra::is_continuous(&same_org, interval.start, interval.end) {
                return Err(FieldError::non_field("This time is already reserved for the organization.").into());
            }

            let other_org_conflict = q
                .iter()
                .any(|o| o.kind == IntervalKind::OrgReserved && o.organization_id != organization_id);
            if other_org_conflict {
                return Err(FieldError::non_field("This time falls within another organization's reservation.").into());
            }

            if let Some(organization_id) = organization_id {
                if let Some(membership) = data::memberships::find(&mut *conn, interval.resource_id, organization_id).await? {
                    let other_fragments = data::schedule_fragments::for_resource_excluding_membership(
                        &mut *conn,
                        interval.resource_id,
                        membership.id,
                    )
                    .await?;
                    if fragments_intersect_interval(&other_fragments, interval) {
                        return Err(FieldError::non_field(
                            "This time falls within another organization's schedule.",
                        )
                        .into());
                    }
                }
            }
        }
        IntervalKind::Unavailable => {}
    }

    // 7. join
    if join {
        algebra::join_into_db(&mut *conn, interval, JOIN_GAP).await?;
    }

    // 8. persist
    let saved = data::intervals::save(&mut *conn, interval).await?;
    *interval = saved;

    // 9. events
    if emit_events {
        let resource_external = data::resources::require_by_id(&mut *conn, interval.resource_id)
            .await?
            .external_id;
        let organization_external = match interval.organization_id {
            Some(id) => data::organizations::find_by_id(&mut *conn, id).await?.map(|o| o.external_id),
            None => None,
        };
        let manager_external = match interval.manager_id {
            Some(id) => data::managers::find_by_id(&mut *conn, id).await?.map(|m| m.external_id),
            None => None,
        };
        sink.push(Event::CreateInterval {
            interval_kind: interval.kind.as_str(),
            organization: organization_external,
            resource: resource_external,
            manager: manager_external,
            comment: interval.comment.clone(),
            start: interval.start,
            end: interval.end,
            duration: interval.duration().num_seconds(),
            timedelta: crate::domain::time::format_duration(interval.duration()),
        });
        if interval.kind == IntervalKind::Unavailable {
            for (manager_id, organization_id) in distinct_managers_with_org(&q) {
                let manager = data::managers::find_by_id(&mut *conn, manager_id).await?.map(|m| m.external_id);
                let organization = match organization_id {
                    Some(id) => data::organizations::find_by_id(&mut *conn, id).await?.map(|o| o.external_id),
                    None => None,
                };
                sink.push(Event::AddUnavailableInterval {
                    resource: resource_external,
                    manager,
                    organization,
                    duration: interval.duration().num_seconds(),
                    timedelta: crate::domain::time::format_duration(interval.duration()),
                    comment: interval.comment.clone(),
                });
            }
        }
    }

    Ok(())
}

/// `Interval.delete(events=true)`.
pub async fn delete_interval<'c, A>(executor: A, interval: &Interval, emit_events: bool, sink: &mut EventSink) -> DomainResult<()>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    let interval_id = interval.id.ok_or_else(|| DomainError::NotFound("interval".into()))?;

    let q = if interval.kind == IntervalKind::Unavailable {
        data::intervals::between(&mut *conn, interval.resource_id, interval.start, interval.end)
            .await?
            .into_iter()
            .filter(|other| other.id != interval.id)
            .collect()
    } else {
        Vec::new()
    };

    data::intervals::delete_one(&mut *conn, interval_id).await?;

    if emit_events {
        let resource_external = data::resources::require_by_id(&mut *conn, interval.resource_id)
            .await?
            .external_id;
        let organization_external = match interval.organization_id {
            Some(id) => data::organizations::find_by_id(&mut *conn, id).await?.map(|o| o.external_id),
            None => None,
        };
        let manager_external = match interval.manager_id {
            Some(id) => data::managers::find_by_id(&mut *conn, id).await?.map(|m| m.external_id),
            None => None,
        };
        sink.push(Event::DeleteInterval {
            interval_kind: interval.kind.as_str(),
            organization: organization_external,
            resource: resource_external,
            manager: manager_external,
            comment: interval.comment.clone(),
            start: interval.start,
            end: interval.end,
            duration: interval.duration().num_seconds(),
            timedelta: crate::domain::time::format_duration(interval.duration()),
        });
        if interval.kind == IntervalKind::Unavailable {
            for (manager_id, organization_id) in distinct_managers_with_org(&q) {
                let manager = data::managers::find_by_id(&mut *conn, manager_id).await?.map(|m| m.external_id);
                let organization = match organization_id {
                    Some(id) => data::organizations::find_by_id(&mut *conn, id).await?.map(|o| o.external_id),
                    None => None,
                };
                sink.push(Event::ClearUnavailableInterval {
                    resource: resource_external,
                    manager,
                    organization,
                    duration: interval.duration().num_seconds(),
                    timedelta: crate::domain::time::format_duration(interval.duration()),
                });
            }
        }
    }

    Ok(())
}

/// Resource-scoped clear-unavailable operation: subtracts an `Unavailable`
/// probe spanning `[start,end]` from the resource's `Unavailable` intervals.
pub async fn clear_unavailable_interval<'c, A>(
    executor: A,
    resource_id: i64,
    start: crate::domain::time::Instant,
    end: crate::domain::time::Instant,
    sink: &mut EventSink,
) -> DomainResult<()>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    let affected = data::intervals::between(&mut *conn, resource_id, start, end)
        .await?
        .into_iter()
        .filter(|i| i.kind == IntervalKind::ManagerReserved)
        .collect::<Vec<_>>();

    let probe = Interval {
        id: None,
        resource_id,
        kind: IntervalKind::Unavailable,
        start,
        end,
        organization_id: None,
        manager_id: None,
        comment: None,
    };
    algebra::subtract_from_db(&mut *conn, &probe).await?;

    let resource_external = data::resources::require_by_id(&mut *conn, resource_id).await?.external_id;
    let duration = end - start;
    for (manager_id, organization_id) in distinct_managers_with_org(&affected) {
        let manager = data::managers::find_by_id(&mut *conn, manager_id).await?.map(|m| m.external_id);
        let organization = match organization_id {
            Some(id) => data::organizations::find_by_id(&mut *conn, id).await?.map(|o| o.external_id),
            None => None,
        };
        sink.push(Event::ClearUnavailableInterval {
            resource: resource_external,
            manager,
            organization,
            duration: duration.num_seconds(),
            timedelta: crate::domain::time::format_duration(duration),
        });
    }

    Ok(())
}

/// Distinct `(manager, organization)` pairs appearing in a slice of
/// intervals, keeping the first organization encountered per manager.
fn distinct_managers_with_org(intervals: &[Interval]) -> Vec<(i64, Option<i64>)> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for interval in intervals {
        if let Some(manager_id) = interval.manager_id {
            if seen.insert(manager_id) {
                result.push((manager_id, interval.organization_id));
            }
        }
    }
    result
}

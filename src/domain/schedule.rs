//! Schedule materializer, owned conceptually by `ResourceMembership`:
//! projects a weekly template into concrete `OrgReserved` intervals and
//! rolls that projection forward over time.

use chrono::{Duration, TimeZone, Utc};

use crate::data;
use crate::domain::algebra::{self, WeeklyPiece};
use crate::domain::error::{DomainResult, FieldError};
use crate::domain::events::{Event, EventSink};
use crate::domain::model::{Interval, IntervalKind, ResourceMembership, ScheduleFragment};
use crate::domain::time::{week_day_of, Instant, JOIN_GAP};

fn fragment_to_piece(fragment: &ScheduleFragment) -> WeeklyPiece {
    WeeklyPiece {
        day_of_week: fragment.day_of_week,
        start_time: fragment.start_time,
        end_time: fragment.end_time,
    }
}

/// `apply_schedule(start, end, fragments=None, save_as_default=false)`.
/// `fragments`, when given, overrides the persisted
/// template for this call (and is optionally saved back as the new
/// default). Returns `false` when there is nothing to project (no
/// fragments, or a degenerate range).
pub async fn apply_schedule<'c, A>(
    executor: A,
    membership: &ResourceMembership,
    start: Instant,
    end: Instant,
    fragments: Option<Vec<WeeklyPiece>>,
    save_as_default: bool,
    author_id: Option<i64>,
    sink: &mut EventSink,
) -> DomainResult<bool>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    // 1-2.
    if start >= end {
        return Ok(false);
    }
    let f: Vec<WeeklyPiece> = match &fragments {
        Some(explicit) if !explicit.is_empty() => explicit.clone(),
        _ => data::schedule_fragments::for_membership(&mut *conn, membership.id)
            .await?
            .iter()
            .map(fragment_to_piece)
            .collect(),
    };
    if f.is_empty() {
        return Ok(false);
    }

    // 3b. a resource's organizations must not claim overlapping weekly slots.
    let other_memberships =
        data::memberships::other_memberships_of_resource(&mut *conn, membership.resource_id, membership.organization_id)
            .await?;
    for other in &other_memberships {
        let other_fragments = data::schedule_fragments::for_membership(&mut *conn, other.id).await?;
        for piece in &f {
            let probe = ScheduleFragment {
                id: 0,
                membership_id: membership.id,
                day_of_week: piece.day_of_week,
                start_time: piece.start_time,
                end_time: piece.end_time,
            };
            if other_fragments.iter().any(|existing| existing.intersects(&probe)) {
                return Err(FieldError::non_field(
                    "This schedule falls within another organization's schedule.",
                )
                .into());
            }
        }
    }

    // 4. clear existing OrgReserved coverage over [start,end].
    let probe = Interval {
        id: None,
        resource_id: membership.resource_id,
        kind: IntervalKind::OrgReserved,
        start,
        end,
        organization_id: Some(membership.organization_id),
        manager_id: None,
        comment: None,
    };
    algebra::subtract_from_db(&mut *conn, &probe).await?;

    // 5. dow -> fragments map.
    let mut by_dow: std::collections::HashMap<i16, Vec<&WeeklyPiece>> = std::collections::HashMap::new();
    for piece in &f {
        by_dow.entry(piece.day_of_week).or_default().push(piece);
    }

    // 6. project each day in range.
    let mut new_list: Vec<Interval> = Vec::new();
    let start_date = start.date_naive();
    let end_date = end.date_naive();
    let day_count = (end_date - start_date).num_days();

    for d in 0..=day_count {
        let date = start_date + Duration::days(d);
        let dow = week_day_of(date) as i16;
        let Some(day_fragments) = by_dow.get(&dow) else {
            continue;
        };
        for piece in day_fragments {
            let (piece_date, start_time, end_time) = if piece.start_time > piece.end_time {
                // Wraps past midnight -- the start actually belongs to the
                // previous day.
                (date - Duration::days(1), piece.start_time, piece.end_time)
            } else {
                (date, piece.start_time, piece.end_time)
            };
            let candidate_start = Utc.from_utc_datetime(&piece_date.and_time(start_time));
            let candidate_end = Utc.from_utc_datetime(&date.and_time(end_time));
            if candidate_start >= candidate_end {
                continue;
            }

            let mut candidate = Interval {
                id: None,
                resource_id: membership.resource_id,
                kind: IntervalKind::OrgReserved,
                start: candidate_start,
                end: candidate_end,
                organization_id: Some(membership.organization_id),
                manager_id: None,
                comment: None,
            };
            algebra::join_into(&mut candidate, &mut new_list, JOIN_GAP);
            new_list.push(candidate);
        }
    }

    // 7. drop slivers.
    new_list.retain(|i| i.duration() >= JOIN_GAP);
    if new_list.is_empty() {
        return Ok(true);
    }

    // 8. merge the boundary pieces with whatever already exists adjacent to them.
    new_list.sort_by_key(|i| i.start);
    let first_idx = 0;
    let last_idx = new_list.len() - 1;
    algebra::join_into_db(&mut *conn, &mut new_list[first_idx], JOIN_GAP).await?;
    if last_idx != first_idx {
        algebra::join_into_db(&mut *conn, &mut new_list[last_idx], JOIN_GAP).await?;
    }

    // 9. bulk insert.
    for interval in &new_list {
        data::intervals::insert(&mut *conn, interval).await?;
    }

    // 10. persist as default template.
    if save_as_default {
        if let Some(explicit) = fragments {
            data::schedule_fragments::replace_for_membership(&mut *conn, membership.id, &explicit).await?;
        }
    }

    let resource = data::resources::require_by_id(&mut *conn, membership.resource_id).await?;
    let organization = data::organizations::find_by_id(&mut *conn, membership.organization_id)
        .await?
        .map(|o| o.external_id)
        .unwrap_or_default();

    sink.push(Event::ApplySchedule {
        manager: author_id,
        resource: resource.external_id,
        organization,
        permanent: save_as_default,
        duration: (start, end),
    });

    Ok(true)
}

/// `extend_schedule(end)`: idempotent roll-forward of the watermark.
pub async fn extend_schedule<'c, A>(
    executor: A,
    membership: &mut ResourceMembership,
    end: Instant,
    author_id: Option<i64>,
    sink: &mut EventSink,
) -> DomainResult<bool>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    if let Some(extended_to) = membership.schedule_extended_to {
        if extended_to >= end {
            return Ok(false);
        }
    }
    let start = membership.schedule_extended_to.unwrap_or_else(Utc::now);
    let applied = apply_schedule(&mut *conn, membership, start, end, None, false, author_id, sink).await?;
    data::memberships::set_schedule_extended_to(&mut *conn, membership.id, end).await?;
    membership.schedule_extended_to = Some(end);
    Ok(applied)
}

/// `strip_organization_time()`: truncate the resource's coverage for this
/// organization at the current instant and reset the watermark.
pub async fn strip_organization_time<'c, A>(executor: A, membership: &mut ResourceMembership) -> DomainResult<()>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    let now = Utc::now();
    let covering = data::intervals::at(&mut *conn, membership.resource_id, now).await?;
    for interval in covering
        .into_iter()
        .filter(|i| i.kind == IntervalKind::OrgReserved && i.organization_id == Some(membership.organization_id))
    {
        let mut truncated = interval;
        truncated.end = now;
        data::intervals::update_bounds(&mut *conn, &truncated).await?;
    }
    data::memberships::set_schedule_extended_to(&mut *conn, membership.id, now).await?;
    membership.schedule_extended_to = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn fragment_to_piece_preserves_fields() {
        let fragment = ScheduleFragment {
            id: 1,
            membership_id: 2,
            day_of_week: 3,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        };
        let piece = fragment_to_piece(&fragment);
        assert_eq!(piece.day_of_week, 3);
        assert_eq!(piece.start_time, fragment.start_time);
        assert_eq!(piece.end_time, fragment.end_time);
    }
}

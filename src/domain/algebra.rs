//! Interval algebra -- the heart of the system.
//!
//! The classification rules below are written once, as pure functions over
//! `Vec<Interval>`, and are used identically by both modes in which the
//! system needs them:
//!
//! - **in-memory mode**: the schedule materializer builds a `Vec<Interval>`
//!   directly and calls these functions with no I/O.
//! - **persistent mode**: `crate::data::intervals` fetches the relevant
//!   window from Postgres into a `Vec<Interval>`, the *same* functions run
//!   against that vector, and the caller diffs the before/after vector to
//!   issue the matching inserts/updates/deletes. See
//!   `join_into_db`/`subtract_from_db` below.

use chrono::Duration;

use crate::data;
use crate::domain::error::DomainResult;
use crate::domain::model::{Interval, IntervalKind, ScheduleFragment};
use crate::domain::time::{Instant, JOIN_GAP};

/// `join_into`, in-memory mode.
///
/// Canonicalizes `target ∪ working_set` in place: `target` is widened to
/// cover every identity-matching member of `working_set` that overlaps or
/// touches it within `tol`, and those members are removed from
/// `working_set`. Runs to a fixed point so that chained touches (A touches
/// B touches C, but A and C don't touch directly) are picked up regardless
/// of iteration order -- required so that re-running this on an already
/// canonical set is a no-op.
///
/// Returns `true` iff anything was dropped or `target`'s bounds changed.
pub fn join_into(target: &mut Interval, working_set: &mut Vec<Interval>, tol: Duration) -> bool {
    let mut changed = false;
    loop {
        let mut progressed = false;
        let mut i = 0;
        while i < working_set.len() {
            if !working_set[i].same_identity(target) {
                i += 1;
                continue;
            }
            let o_start = working_set[i].start;
            let o_end = working_set[i].end;

            // O ⊂ self (self already covers O).
            if target.start <= o_start && target.end >= o_end {
                working_set.remove(i);
                changed = true;
                progressed = true;
                continue;
            }
            // O ⊃ self: adopt O's bounds.
            if o_start <= target.start && o_end >= target.end {
                target.start = o_start;
                target.end = o_end;
                working_set.remove(i);
                changed = true;
                progressed = true;
                continue;
            }
            // O overlaps/touches self's left.
            let touches_left = (o_start < target.start && o_end > target.start)
                || (target.start > o_end && target.start - o_end < tol);
            if touches_left {
                target.start = target.start.min(o_start);
                working_set.remove(i);
                changed = true;
                progressed = true;
                continue;
            }
            // O overlaps/touches self's right.
            let touches_right = (o_start < target.end && o_end > target.end)
                || (o_start > target.end && o_start - target.end < tol);
            if touches_right {
                target.end = target.end.max(o_end);
                working_set.remove(i);
                changed = true;
                progressed = true;
                continue;
            }
            i += 1;
        }
        if !progressed {
            break;
        }
    }
    changed
}

/// Outcome of classifying an existing interval `O` against the span being
/// subtracted. Shared by both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubtractOutcome {
    /// `O ⊆ self`: delete O entirely.
    Delete,
    /// `O` overlaps self on the left: shorten `O.end`.
    ShrinkEnd(Instant),
    /// `O` overlaps self on the right: shorten `O.start`.
    ShrinkStart(Instant),
    /// `O` strictly contains self: split into a left and a right piece.
    Split { left_end: Instant, right_start: Instant },
    /// No interaction (caller is expected to have already filtered to
    /// overlapping members; this is a defensive fallback).
    Unchanged,
}

fn classify_subtract(o_start: Instant, o_end: Instant, self_start: Instant, self_end: Instant) -> SubtractOutcome {
    if o_end <= self_start || o_start >= self_end {
        return SubtractOutcome::Unchanged;
    }
    if o_start < self_start && o_end > self_end {
        SubtractOutcome::Split {
            left_end: self_start,
            right_start: self_end,
        }
    } else if o_start < self_start {
        SubtractOutcome::ShrinkEnd(self_start)
    } else if o_end > self_end {
        SubtractOutcome::ShrinkStart(self_end)
    } else {
        SubtractOutcome::Delete
    }
}

/// `subtract_from`, in-memory mode. Removes `probe`'s span
/// from every identity-matching member of `working_set`.
///
/// Returns `true` iff any member was split, shrunk, or deleted.
pub fn subtract_from(probe: &Interval, working_set: &mut Vec<Interval>) -> bool {
    let mut changed = false;
    let mut extra = Vec::new();
    let mut i = 0;
    while i < working_set.len() {
        if !working_set[i].same_identity(probe) {
            i += 1;
            continue;
        }
        let o = working_set[i].clone();
        match classify_subtract(o.start, o.end, probe.start, probe.end) {
            SubtractOutcome::Unchanged => {
                i += 1;
            }
            SubtractOutcome::Delete => {
                working_set.remove(i);
                changed = true;
            }
            SubtractOutcome::ShrinkEnd(new_end) => {
                working_set[i].end = new_end;
                changed = true;
                i += 1;
            }
            SubtractOutcome::ShrinkStart(new_start) => {
                working_set[i].start = new_start;
                changed = true;
                i += 1;
            }
            SubtractOutcome::Split { left_end, right_start } => {
                working_set[i].end = left_end;
                // The new piece inherits O's full identity, organization
                // and manager alike (see DESIGN.md for why this matters).
                let mut right = o.clone();
                right.id = None;
                right.start = right_start;
                right.end = o.end;
                extra.push(right);
                changed = true;
                i += 1;
            }
        }
    }
    working_set.append(&mut extra);
    changed
}

/// Continuity test: do the members of `intervals` cover
/// `[start, end]` without gap?
///
/// Algorithm: fold every interval into an accumulator with `join_into` at
/// zero tolerance, then check the accumulator collapsed to a single
/// interval covering the requested span.
pub fn is_continuous(intervals: &[Interval], start: Instant, end: Instant) -> bool {
    let mut accumulator: Vec<Interval> = Vec::new();
    for interval in intervals {
        let mut candidate = interval.clone();
        join_into(&mut candidate, &mut accumulator, Duration::zero());
        accumulator.push(candidate);
    }
    match accumulator.as_slice() {
        [only] => only.start <= start && only.end >= end,
        _ => false,
    }
}

/// One day-and-time-range piece of a weekly decomposition, produced by
/// `as_weekly`. Not tied to a membership id -- the caller
/// attaches that when persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyPiece {
    pub day_of_week: i16,
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
}

/// `as_weekly(I)`: decompose an interval into one `WeeklyPiece` per
/// calendar day it spans.
pub fn as_weekly(interval: &Interval) -> Vec<WeeklyPiece> {
    use crate::domain::time::week_day_of;
    use chrono::NaiveTime;

    let start_date = interval.start.date_naive();
    let end_date = interval.end.date_naive();
    let mut pieces = Vec::new();

    let mut date = start_date;
    loop {
        let start_time = if date == start_date {
            interval.start.time()
        } else {
            NaiveTime::MIN
        };
        let end_time = if date == end_date {
            interval.end.time()
        } else {
            NaiveTime::from_hms_opt(23, 59, 59).expect("valid constant time")
        };
        pieces.push(WeeklyPiece {
            day_of_week: week_day_of(date) as i16,
            start_time,
            end_time,
        });
        if date == end_date {
            break;
        }
        date = date.succ_opt().expect("date arithmetic in bounded range");
    }
    pieces
}

/// Does a `ScheduleFragment` set intersect an `Interval`? True iff any of
/// the interval's weekly decomposition pieces intersects any fragment
/// restricted to the same day-of-week.
pub fn fragments_intersect_interval(fragments: &[ScheduleFragment], interval: &Interval) -> bool {
    let pieces = as_weekly(interval);
    fragments.iter().any(|fragment| {
        pieces.iter().any(|piece| {
            fragment.day_of_week == piece.day_of_week
                && fragment.start_time < piece.end_time
                && piece.start_time < fragment.end_time
        })
    })
}

/// Persistent-mode `join_into`: fetch the DB-resolved similar set within
/// `[target.start - tol, target.end + tol]`, widen `target` to their union,
/// and delete them.
///
/// Because the fetch window already restricts the working set to members
/// that overlap or touch `target` within `tol`, this degenerates to the
/// same outcome as running the general `join_into` against that prefetched
/// set: every member gets dropped (either absorbed or causing a widen), so
/// a simpler min/max shortcut is used directly instead of the general fixed
/// point loop.
pub async fn join_into_db<'c, A>(executor: A, target: &mut Interval, tol: Duration) -> DomainResult<bool>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    let window_start = target.start - tol;
    let window_end = target.end + tol;
    let similar = data::intervals::fetch_similar(&mut *conn, target, Some(window_start), Some(window_end)).await?;

    if similar.is_empty() {
        return Ok(false);
    }

    let min_start = similar.iter().map(|i| i.start).min().unwrap();
    let max_end = similar.iter().map(|i| i.end).max().unwrap();
    target.start = target.start.min(min_start);
    target.end = target.end.max(max_end);

    let ids: Vec<i64> = similar.iter().filter_map(|i| i.id).collect();
    data::intervals::delete_many(&mut *conn, &ids).await?;
    Ok(true)
}

/// Persistent-mode `subtract_from`: fetch the DB-resolved similar set
/// overlapping `probe`'s span, run the same classification as the
/// in-memory mode, and translate the resulting diff into deletes, updates,
/// and inserts.
pub async fn subtract_from_db<'c, A>(executor: A, probe: &Interval) -> DomainResult<bool>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    let similar = data::intervals::fetch_similar(&mut *conn, probe, Some(probe.start), Some(probe.end)).await?;
    if similar.is_empty() {
        return Ok(false);
    }

    let mut changed = false;
    for o in similar {
        match classify_subtract(o.start, o.end, probe.start, probe.end) {
            SubtractOutcome::Unchanged => {}
            SubtractOutcome::Delete => {
                if let Some(id) = o.id {
                    data::intervals::delete_many(&mut *conn, &[id]).await?;
                }
                changed = true;
            }
            SubtractOutcome::ShrinkEnd(new_end) => {
                let mut updated = o.clone();
                updated.end = new_end;
                data::intervals::update_bounds(&mut *conn, &updated).await?;
                changed = true;
            }
            SubtractOutcome::ShrinkStart(new_start) => {
                let mut updated = o.clone();
                updated.start = new_start;
                data::intervals::update_bounds(&mut *conn, &updated).await?;
                changed = true;
            }
            SubtractOutcome::Split { left_end, right_start } => {
                let mut left = o.clone();
                left.end = left_end;
                data::intervals::update_bounds(&mut *conn, &left).await?;

                let mut right = o.clone();
                right.id = None;
                right.start = right_start;
                data::intervals::insert(&mut *conn, &right).await?;
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// `IntervalKind` values relevant to organization-continuity checks.
pub fn org_and_manager_kinds() -> [IntervalKind; 2] {
    [IntervalKind::OrgReserved, IntervalKind::ManagerReserved]
}

/// The default join tolerance used throughout the core.
pub fn default_tolerance() -> Duration {
    JOIN_GAP
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dt(hour: u32, minute: u32) -> Instant {
        Utc.with_ymd_and_hms(2024, 1, 8, hour, minute, 0).unwrap()
    }

    fn interval(start: Instant, end: Instant) -> Interval {
        Interval {
            id: None,
            resource_id: 1,
            kind: IntervalKind::OrgReserved,
            start,
            end,
            organization_id: Some(1),
            manager_id: None,
            comment: None,
        }
    }

    /// Join overlap: A=[10:00,11:00], B=[10:55,12:00], save
    /// C=[11:30,11:45] -> single [10:00,12:00].
    #[test]
    fn s1_join_overlap() {
        let a = interval(dt(10, 0), dt(11, 0));
        let b = interval(dt(10, 55), dt(12, 0));
        let mut working_set = vec![a, b];

        let mut c = interval(dt(11, 30), dt(11, 45));
        let changed = join_into(&mut c, &mut working_set, JOIN_GAP);

        assert!(changed);
        assert!(working_set.is_empty());
        assert_eq!(c.start, dt(10, 0));
        assert_eq!(c.end, dt(12, 0));
    }

    #[test]
    fn join_gap_within_tolerance_merges() {
        let a = interval(dt(9, 0), dt(10, 0));
        let mut working_set = vec![a];
        let mut b = interval(dt(10, 3), dt(11, 0)); // 3 minute gap < JOIN_GAP
        let changed = join_into(&mut b, &mut working_set, JOIN_GAP);
        assert!(changed);
        assert!(working_set.is_empty());
        assert_eq!(b.start, dt(9, 0));
        assert_eq!(b.end, dt(11, 0));
    }

    #[test]
    fn join_gap_beyond_tolerance_does_not_merge() {
        let a = interval(dt(9, 0), dt(10, 0));
        let mut working_set = vec![a];
        let mut b = interval(dt(10, 10), dt(11, 0)); // 10 minute gap > JOIN_GAP
        let changed = join_into(&mut b, &mut working_set, JOIN_GAP);
        assert!(!changed);
        assert_eq!(working_set.len(), 1);
    }

    #[test]
    fn join_different_identity_is_ignored() {
        let mut other = interval(dt(9, 0), dt(10, 0));
        other.organization_id = Some(2);
        let mut working_set = vec![other];
        let mut target = interval(dt(9, 30), dt(10, 30));
        let changed = join_into(&mut target, &mut working_set, JOIN_GAP);
        assert!(!changed);
        assert_eq!(working_set.len(), 1);
    }

    /// Re-running join_into on an already-canonical set makes no change.
    #[test]
    fn join_is_idempotent() {
        let a = interval(dt(9, 0), dt(17, 0));
        let mut working_set: Vec<Interval> = vec![];
        let mut merged = a;
        assert!(!join_into(&mut merged, &mut working_set, JOIN_GAP));
        working_set.push(merged.clone());

        // Re-joining an identical copy should fully absorb with no residue.
        let mut probe = merged.clone();
        let changed = join_into(&mut probe, &mut working_set, JOIN_GAP);
        assert!(changed);
        assert!(working_set.is_empty());
        assert_eq!(probe, merged);
    }

    /// Subtract split then re-merge: A=[09:00,17:00] OrgReserved.
    /// Unavailable doesn't interact with OrgReserved identity. A matching
    /// OrgReserved O'=[10:00,16:00] is fully absorbed (idempotent).
    #[test]
    fn s2_subtract_then_rejoin_is_idempotent() {
        let a = interval(dt(9, 0), dt(17, 0));
        let mut working_set = vec![a.clone()];

        let mut o_prime = interval(dt(10, 0), dt(16, 0));
        let changed = join_into(&mut o_prime, &mut working_set, JOIN_GAP);
        assert!(changed);
        assert!(working_set.is_empty());
        assert_eq!(o_prime.start, dt(9, 0));
        assert_eq!(o_prime.end, dt(17, 0));
    }

    #[test]
    fn subtract_splits_interval_in_two() {
        let a = interval(dt(9, 0), dt(17, 0));
        let mut working_set = vec![a];
        let probe = interval(dt(12, 0), dt(13, 0));
        let changed = subtract_from(&probe, &mut working_set);

        assert!(changed);
        assert_eq!(working_set.len(), 2);
        let mut bounds: Vec<(Instant, Instant)> =
            working_set.iter().map(|i| (i.start, i.end)).collect();
        bounds.sort();
        assert_eq!(bounds, vec![(dt(9, 0), dt(12, 0)), (dt(13, 0), dt(17, 0))]);
    }

    #[test]
    fn subtract_shrinks_left_overlap() {
        let a = interval(dt(9, 0), dt(12, 0));
        let mut working_set = vec![a];
        let probe = interval(dt(11, 0), dt(13, 0));
        let changed = subtract_from(&probe, &mut working_set);
        assert!(changed);
        assert_eq!(working_set.len(), 1);
        assert_eq!(working_set[0].start, dt(9, 0));
        assert_eq!(working_set[0].end, dt(11, 0));
    }

    #[test]
    fn subtract_shrinks_right_overlap() {
        let a = interval(dt(11, 0), dt(15, 0));
        let mut working_set = vec![a];
        let probe = interval(dt(9, 0), dt(12, 0));
        let changed = subtract_from(&probe, &mut working_set);
        assert!(changed);
        assert_eq!(working_set.len(), 1);
        assert_eq!(working_set[0].start, dt(12, 0));
        assert_eq!(working_set[0].end, dt(15, 0));
    }

    #[test]
    fn subtract_deletes_fully_covered_interval() {
        let a = interval(dt(10, 0), dt(11, 0));
        let mut working_set = vec![a];
        let probe = interval(dt(9, 0), dt(12, 0));
        let changed = subtract_from(&probe, &mut working_set);
        assert!(changed);
        assert!(working_set.is_empty());
    }

    /// After subtracting I's span, no remaining member overlaps it.
    #[test]
    fn subtract_cancellation_property() {
        let a = interval(dt(8, 0), dt(20, 0));
        let mut working_set = vec![a];
        let probe = interval(dt(11, 0), dt(14, 0));
        subtract_from(&probe, &mut working_set);
        for remaining in &working_set {
            assert!(remaining.end <= probe.start || remaining.start >= probe.end);
        }
    }

    #[test]
    fn split_piece_inherits_organization_not_manager() {
        let mut a = interval(dt(9, 0), dt(17, 0));
        a.organization_id = Some(42);
        a.manager_id = Some(7);
        let mut working_set = vec![a];
        let mut probe = interval(dt(12, 0), dt(13, 0));
        probe.organization_id = Some(42);
        probe.manager_id = Some(7);
        subtract_from(&probe, &mut working_set);

        assert_eq!(working_set.len(), 2);
        for piece in &working_set {
            assert_eq!(piece.organization_id, Some(42));
            assert_eq!(piece.manager_id, Some(7));
        }
    }

    #[test]
    fn continuity_detects_gap() {
        let morning = interval(dt(9, 0), dt(12, 0));
        let afternoon = interval(dt(13, 0), dt(17, 0));
        assert!(!is_continuous(&[morning, afternoon], dt(9, 0), dt(17, 0)));
    }

    #[test]
    fn continuity_fails_across_partial_overlap_with_gap() {
        let morning = interval(dt(9, 0), dt(12, 0));
        let afternoon = interval(dt(13, 0), dt(17, 0));
        assert!(!is_continuous(&[morning, afternoon], dt(11, 0), dt(14, 0)));
    }

    #[test]
    fn continuity_detects_full_coverage() {
        let morning = interval(dt(9, 0), dt(12, 0));
        let afternoon = interval(dt(12, 0), dt(17, 0));
        assert!(is_continuous(&[morning, afternoon], dt(9, 0), dt(17, 0)));
    }

    #[test]
    fn as_weekly_single_day() {
        let i = interval(dt(9, 0), dt(17, 0));
        let pieces = as_weekly(&i);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].day_of_week, 1); // 2024-01-08 is a Monday
        assert_eq!(pieces[0].start_time, i.start.time());
        assert_eq!(pieces[0].end_time, i.end.time());
    }

    #[test]
    fn as_weekly_spans_multiple_days() {
        use chrono::{NaiveTime, TimeZone};
        let start = Utc.with_ymd_and_hms(2024, 1, 8, 22, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 9, 2, 0, 0).unwrap();
        let i = interval(start, end);
        let pieces = as_weekly(&i);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].start_time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(pieces[0].end_time, NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        assert_eq!(pieces[1].start_time, NaiveTime::MIN);
        assert_eq!(pieces[1].end_time, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
    }
}

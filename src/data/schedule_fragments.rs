//! Database operations for `schedule_fragments` -- rows of a membership's
//! weekly template.

use sqlx::PgExecutor;

use crate::domain::algebra::WeeklyPiece;
use crate::domain::error::DomainResult;
use crate::domain::model::ScheduleFragment;

pub async fn for_membership<'e, E>(executor: E, membership_id: i64) -> DomainResult<Vec<ScheduleFragment>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ScheduleFragment>(
        "SELECT id, membership_id, day_of_week, start_time, end_time FROM schedule_fragments \
         WHERE membership_id = $1",
    )
    .bind(membership_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Fragments belonging to every other membership of the same resource --
/// the set that a new fragment (or a saved OrgReserved interval) must not
/// intersect, per invariant 7.
pub async fn for_resource_excluding_membership<'e, E>(
    executor: E,
    resource_id: i64,
    excluding_membership_id: i64,
) -> DomainResult<Vec<ScheduleFragment>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ScheduleFragment>(
        "SELECT f.id, f.membership_id, f.day_of_week, f.start_time, f.end_time \
         FROM schedule_fragments f \
         JOIN resource_memberships m ON m.id = f.membership_id \
         WHERE m.resource_id = $1 AND f.membership_id != $2",
    )
    .bind(resource_id)
    .bind(excluding_membership_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Replace a membership's entire template in one shot -- `save_as_default`
/// in `apply_schedule`.
pub async fn replace_for_membership<'c, A>(
    executor: A,
    membership_id: i64,
    pieces: &[WeeklyPiece],
) -> DomainResult<()>
where
    A: sqlx::Acquire<'c, Database = sqlx::Postgres> + Send,
{
    let mut conn = executor.acquire().await?;

    sqlx::query("DELETE FROM schedule_fragments WHERE membership_id = $1")
        .bind(membership_id)
        .execute(&mut *conn)
        .await?;

    for piece in pieces {
        sqlx::query(
            "INSERT INTO schedule_fragments (membership_id, day_of_week, start_time, end_time) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(membership_id)
        .bind(piece.day_of_week)
        .bind(piece.start_time)
        .bind(piece.end_time)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

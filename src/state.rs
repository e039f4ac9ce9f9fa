//! Application state shared across every request.

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    /// Default look-ahead horizon for schedule materialization when a
    /// caller doesn't specify an explicit end date (`EXTENDABLE_MIN`).
    pub extendable_min_days: i64,
}

impl AppState {
    pub fn new(db_pool: PgPool, extendable_min_days: i64) -> Self {
        Self {
            db_pool,
            extendable_min_days,
        }
    }
}

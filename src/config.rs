//! Process configuration, loaded once from the environment via `figment`.

use serde::Deserialize;

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_extendable_min_days() -> i64 {
    crate::domain::time::EXTENDABLE_MIN_DAYS
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds to wait for in-flight requests to drain before force-closing
    /// the listener on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
    /// Overrides the default look-ahead horizon `extend_schedule` projects
    /// to when no explicit `end` is given.
    #[serde(default = "default_extendable_min_days")]
    pub extendable_min_days: i64,
}

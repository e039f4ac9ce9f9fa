//! Library crate backing the `rcalendar` binary; exposed so integration
//! tests under `tests/` can exercise the domain and data layers directly
//! against a `#[sqlx::test]`-provisioned database.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod logging;
pub mod state;
pub mod web;

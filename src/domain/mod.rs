//! The interval-algebra core: temporal primitives, the entity model, the
//! algebra itself, validation, schedule materialization, and the
//! request-scoped event sink. Framework-agnostic -- nothing here imports
//! `axum`.

pub mod algebra;
pub mod error;
pub mod events;
pub mod model;
pub mod schedule;
pub mod time;
pub mod validation;

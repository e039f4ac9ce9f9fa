//! Entity model: the row shapes shared by the in-memory algebra and the
//! Postgres repository.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::domain::time::Instant;

/// `(app, external_id)` identifies every tenant-scoped entity. `external_id`
/// is the caller's own stable id for that entity, as used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant<'a> {
    pub app: &'a str,
    pub external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Organization {
    pub id: i64,
    pub app: String,
    pub external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Manager {
    pub id: i64,
    pub app: String,
    pub external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Resource {
    pub id: i64,
    pub app: String,
    pub external_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ResourceMembership {
    pub id: i64,
    pub resource_id: i64,
    pub organization_id: i64,
    pub schedule_extended_to: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ScheduleFragment {
    pub id: i64,
    pub membership_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleFragment {
    /// Two fragments intersect iff same day-of-week and their time ranges
    /// strictly overlap (open endpoints).
    pub fn intersects(&self, other: &ScheduleFragment) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

/// `kind ∈ {OrgReserved=0, ManagerReserved=10, Unavailable=100}`. See
/// DESIGN.md for why there is no separate `ScheduledUnavailable` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    #[serde(rename = "organization")]
    OrgReserved,
    #[serde(rename = "manager")]
    ManagerReserved,
    Unavailable,
}

impl IntervalKind {
    pub fn as_i16(self) -> i16 {
        match self {
            IntervalKind::OrgReserved => 0,
            IntervalKind::ManagerReserved => 10,
            IntervalKind::Unavailable => 100,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(IntervalKind::OrgReserved),
            10 => Some(IntervalKind::ManagerReserved),
            100 => Some(IntervalKind::Unavailable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntervalKind::OrgReserved => "organization",
            IntervalKind::ManagerReserved => "manager",
            IntervalKind::Unavailable => "unavailable",
        }
    }

    /// Parses a wire `kind` string, defaulting to `OrgReserved` for
    /// unknown values.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "manager" => IntervalKind::ManagerReserved,
            "unavailable" => IntervalKind::Unavailable,
            _ => IntervalKind::OrgReserved,
        }
    }
}

/// The core unit of the algebra: `(resource, kind, start, end, organization?, manager?, comment?)`.
///
/// `id = None` denotes an interval not yet persisted (e.g. a probe built
/// by the validation engine, or a fresh piece produced by `subtract_from`).
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub id: Option<i64>,
    pub resource_id: i64,
    pub kind: IntervalKind,
    pub start: Instant,
    pub end: Instant,
    pub organization_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub comment: Option<String>,
}

impl Interval {
    /// `(resource, kind, organization, manager)` identity, with `NULL ==
    /// NULL` equality on the two nullable fields.
    pub fn identity(&self) -> (i64, IntervalKind, Option<i64>, Option<i64>) {
        (self.resource_id, self.kind, self.organization_id, self.manager_id)
    }

    pub fn same_identity(&self, other: &Interval) -> bool {
        self.identity() == other.identity()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub key: uuid::Uuid,
    pub app: String,
    pub is_active: bool,
}

//! Event sink.
//!
//! Deliberately request-scoped: an `EventSink` is built fresh inside each
//! handler and threaded through the call chain as `&mut EventSink`. It is
//! never stored in `AppState` or a `static` -- see DESIGN.md for why that
//! matters.

use serde::Serialize;

use crate::domain::time::Instant;

/// One domain occurrence worth reporting back to the caller. Variants
/// mirror the mutations exposed over HTTP; every field names the caller's
/// own `external_id`, never an internal row id.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    CreateInterval {
        interval_kind: &'static str,
        organization: Option<i64>,
        resource: i64,
        manager: Option<i64>,
        comment: Option<String>,
        start: Instant,
        end: Instant,
        duration: i64,
        timedelta: String,
    },
    DeleteInterval {
        interval_kind: &'static str,
        organization: Option<i64>,
        resource: i64,
        manager: Option<i64>,
        comment: Option<String>,
        start: Instant,
        end: Instant,
        duration: i64,
        timedelta: String,
    },
    AddUnavailableInterval {
        resource: i64,
        manager: Option<i64>,
        organization: Option<i64>,
        duration: i64,
        timedelta: String,
        comment: Option<String>,
    },
    ClearUnavailableInterval {
        resource: i64,
        manager: Option<i64>,
        organization: Option<i64>,
        duration: i64,
        timedelta: String,
    },
    ApplySchedule {
        manager: Option<i64>,
        resource: i64,
        organization: i64,
        permanent: bool,
        duration: (Instant, Instant),
    },
}

/// A plain, request-scoped list of [`Event`]s.
#[derive(Debug, Default)]
pub struct EventSink {
    events: Vec<Event>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_accumulates_in_order() {
        use chrono::{TimeZone, Utc};
        let start = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();
        let mut sink = EventSink::new();
        sink.push(Event::CreateInterval {
            interval_kind: "organization",
            organization: Some(1),
            resource: 2,
            manager: None,
            comment: None,
            start,
            end,
            duration: 3600,
            timedelta: "1:00:00".into(),
        });
        sink.push(Event::DeleteInterval {
            interval_kind: "organization",
            organization: Some(1),
            resource: 2,
            manager: None,
            comment: None,
            start,
            end,
            duration: 3600,
            timedelta: "1:00:00".into(),
        });
        assert_eq!(sink.as_slice().len(), 2);
    }

    #[test]
    fn event_tags_are_kebab_case() {
        let value = serde_json::to_value(Event::ClearUnavailableInterval {
            resource: 1,
            manager: Some(2),
            organization: Some(3),
            duration: 3600,
            timedelta: "1:00:00".into(),
        })
        .unwrap();
        assert_eq!(value["kind"], "clear-unavailable-interval");
    }
}

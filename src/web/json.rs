//! Response-envelope helper: splices the request-scoped event log into a
//! JSON response body when the sink collected anything, wrapping a plain
//! `Json<T>` response with one extra concern applied uniformly at the edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::events::EventSink;

/// Serializes `body` and, if `sink` collected any events, adds an `events`
/// array alongside it. If `body` doesn't serialize to a JSON object the
/// events are nested under `data` instead so nothing is silently dropped.
pub fn with_events<T: Serialize>(status: StatusCode, body: T, sink: EventSink) -> Response {
    let events = sink.into_events();
    let payload = serde_json::to_value(body).unwrap_or(Value::Null);

    if events.is_empty() {
        return (status, Json(payload)).into_response();
    }

    let envelope = match payload {
        Value::Object(mut map) => {
            map.insert("events".to_string(), json!(events));
            Value::Object(map)
        }
        other => json!({ "data": other, "events": events }),
    };
    (status, Json(envelope)).into_response()
}

/// Shorthand for the common `200 OK` case.
pub fn ok_with_events<T: Serialize>(body: T, sink: EventSink) -> Response {
    with_events(StatusCode::OK, body, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::Event;

    #[test]
    fn empty_sink_leaves_body_untouched() {
        let sink = EventSink::new();
        let _ = ok_with_events(json!({"id": 1}), sink);
    }

    #[test]
    fn nonempty_sink_adds_events_array() {
        let mut sink = EventSink::new();
        sink.push(Event::ClearUnavailableInterval {
            resource: 1,
            manager: None,
            organization: None,
            duration: 0,
            timedelta: "0:00:00".into(),
        });
        let _ = ok_with_events(json!({"id": 1}), sink);
    }
}

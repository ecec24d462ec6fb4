use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Route, Source};

/// Fields that may carry reply text, in order of preference.
const TEXT_FIELDS: [&str; 5] = ["token", "content", "delta", "answer", "message"];

/// One decoded `data:` payload from the chat event stream.
///
/// The service does not publish a schema for stream events, so the payload is
/// kept as JSON and the fields the session cares about are read on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamEvent(pub Value);

impl StreamEvent {
    /// Wrap an already decoded payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw payload.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The event's `type` field, if any.
    pub fn event_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    /// The text this event contributes to the reply.
    pub fn text(&self) -> Option<&str> {
        if self.is_error() {
            return None;
        }
        TEXT_FIELDS
            .iter()
            .find_map(|field| self.get(field).and_then(Value::as_str))
    }

    /// Route tag reported by this event.
    pub fn route(&self) -> Option<Route> {
        self.get("route")
            .and_then(Value::as_str)
            .or_else(|| {
                self.get("metadata")
                    .and_then(|metadata| metadata.get("route"))
                    .and_then(Value::as_str)
            })
            .map(Route::from)
    }

    /// Session id reported by this event.
    pub fn session_id(&self) -> Option<&str> {
        self.get("session_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Sources reported by this event; entries that do not decode are dropped.
    pub fn sources(&self) -> Option<Vec<Source>> {
        let sources = self
            .get("sources")
            .and_then(Value::as_array)
            .or_else(|| {
                self.get("metadata")
                    .and_then(|metadata| metadata.get("sources"))
                    .and_then(Value::as_array)
            })?;
        Some(
            sources
                .iter()
                .filter_map(|source| serde_json::from_value(source.clone()).ok())
                .collect(),
        )
    }

    /// True for `type: "error"` events, which replace the reply with a failure.
    pub fn is_error(&self) -> bool {
        self.event_type() == Some("error")
    }

    /// The failure text of an error event, when the service sent one.
    pub fn error_text(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        ["content", "message", "detail"]
            .iter()
            .find_map(|field| self.get(field).and_then(Value::as_str))
            .filter(|text| !text.trim().is_empty())
    }
}

impl From<Value> for StreamEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_event() {
        let event = StreamEvent::new(json!({"token": "a"}));
        assert_eq!(event.text(), Some("a"));
        assert_eq!(event.route(), None);
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn text_field_precedence() {
        let event = StreamEvent::new(json!({"answer": "full", "content": "part"}));
        assert_eq!(event.text(), Some("part"));
    }

    #[test]
    fn metadata_event() {
        let event = StreamEvent::new(json!({
            "type": "metadata",
            "session_id": "s-9",
            "metadata": {"route": "kb-query"},
            "sources": [{"title": "鸡汤"}, 42]
        }));
        assert_eq!(event.event_type(), Some("metadata"));
        assert_eq!(event.session_id(), Some("s-9"));
        assert_eq!(event.route().unwrap().display_name(), "知识库查询");
        let sources = event.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "鸡汤");
        assert_eq!(event.text(), None);
    }

    #[test]
    fn done_event_carries_sources_in_metadata() {
        let event = StreamEvent::new(json!({
            "type": "done",
            "content": null,
            "metadata": {"sources": [{"title": "红烧肉", "score": 0.91}]},
            "session_id": "s-9",
            "route": null
        }));
        assert_eq!(event.text(), None);
        assert_eq!(event.route(), None);
        let sources = event.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "红烧肉");
    }

    #[test]
    fn error_event_is_not_reply_text() {
        let event = StreamEvent::new(json!({
            "type": "error",
            "content": "处理请求时出错: boom",
            "metadata": null,
            "session_id": "s-9",
            "route": null
        }));
        assert!(event.is_error());
        assert_eq!(event.text(), None);
        assert_eq!(event.error_text(), Some("处理请求时出错: boom"));

        let bare = StreamEvent::new(json!({"type": "error", "content": null}));
        assert!(bare.is_error());
        assert_eq!(bare.error_text(), None);

        let message = StreamEvent::new(json!({"type": "message", "content": "红烧肉 "}));
        assert!(!message.is_error());
        assert_eq!(message.error_text(), None);
        assert_eq!(message.text(), Some("红烧肉 "));
    }

    #[test]
    fn transparent_serde() {
        let event: StreamEvent = serde_json::from_str(r#"{"token":"b"}"#).unwrap();
        assert_eq!(event.value(), &json!({"token": "b"}));
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"token":"b"}"#);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Route, Source};

/// Body of a successful blocking chat response.
///
/// Two generations of the service exist: one answers in `answer` and nests
/// the route under `metadata`, the other answers in `message` with a
/// top-level `route`.  Both shapes deserialize into this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Answer text (current contract).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub answer: Option<String>,

    /// Answer text (alternate contract).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,

    /// Session the answer belongs to; replaces the client's id when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<String>,

    /// Top-level route tag.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route: Option<String>,

    /// Response classification such as `knowledge` or `chat`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,

    /// Free-form metadata; `metadata.route` takes precedence over `route`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Map<String, Value>>,

    /// Reference documents.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sources: Option<Vec<Source>>,
}

impl ChatResponse {
    /// The answer text, preferring `answer` over `message`.
    pub fn text(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .or(self.message.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// The route that produced the answer.
    pub fn route(&self) -> Option<Route> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("route"))
            .and_then(Value::as_str)
            .or(self.route.as_deref())
            .map(Route::from)
    }
}

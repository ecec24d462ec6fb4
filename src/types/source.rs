use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A reference document cited by an answer.
///
/// Only the title is interpreted; whatever else the service attaches (scores,
/// ids, snippets) is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Title of the document.
    #[serde(default)]
    pub title: String,

    /// Every other field the service sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Source {
    /// Create a source with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            extra: Map::new(),
        }
    }

    /// Look up an extra field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Number of hits requested when the caller does not choose.
pub const DEFAULT_TOP_K: u32 = 5;

/// Largest number of hits the knowledge service will return.
pub const MAX_TOP_K: u32 = 20;

/// A similarity search against the recipe knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSearch {
    pub query: String,
    pub top_k: u32,
}

impl KnowledgeSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Reject searches the service would refuse.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation(
                "search query must not be blank",
                Some("query".to_string()),
            ));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(Error::validation(
                format!("top_k must be between 1 and {}, got {}", MAX_TOP_K, self.top_k),
                Some("top_k".to_string()),
            ));
        }
        Ok(())
    }
}

/// Hits returned by a knowledge search.
///
/// Each hit is kept as the service sent it; recipe payloads vary between
/// deployments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,

    #[serde(default)]
    pub count: usize,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// A one-line label per hit: the recipe name if present, else its id.
    pub fn labels(&self) -> Vec<String> {
        self.results
            .iter()
            .enumerate()
            .map(|(idx, hit)| {
                ["name", "title", "id"]
                    .iter()
                    .find_map(|key| hit.get(*key).and_then(Value::as_str))
                    .map(String::from)
                    .unwrap_or_else(|| format!("result {}", idx + 1))
            })
            .collect()
    }
}

/// Check that `recipe` is an object with a non-blank `name`.
pub fn validate_recipe(recipe: &Value) -> Result<()> {
    let name = recipe
        .as_object()
        .ok_or_else(|| Error::validation("recipe must be a JSON object", None))?
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if name.trim().is_empty() {
        return Err(Error::validation(
            "recipe needs a name",
            Some("name".to_string()),
        ));
    }
    Ok(())
}

use serde::{Deserialize, Serialize};

/// Embedding dimension shown when the service does not report one.
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

/// Embedding model shown when the service does not report one.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Size and configuration of the recipe knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Number of indexed documents.
    #[serde(default)]
    pub total_documents: u64,

    /// Number of indexed recipes.
    #[serde(default)]
    pub total_recipes: u64,

    /// Vector dimension of the embeddings.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding_dimension: Option<u32>,

    /// Name of the embedding model.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding_model: Option<String>,

    /// Reranker configuration, when one is deployed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reranker_model: Option<RerankerModel>,

    /// Name of the vector collection.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub collection_name: Option<String>,
}

impl KnowledgeStats {
    /// The embedding dimension, falling back to the documented default.
    pub fn embedding_dimension_or_default(&self) -> u32 {
        self.embedding_dimension
            .unwrap_or(DEFAULT_EMBEDDING_DIMENSION)
    }

    /// The embedding model, falling back to the documented default.
    pub fn embedding_model_or_default(&self) -> &str {
        self.embedding_model
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDING_MODEL)
    }
}

/// Reranker deployment details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankerModel {
    /// Provider name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub provider: Option<String>,

    /// Whether the reranker is reachable.
    #[serde(default)]
    pub available: bool,
}

// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod knowledge_search;
pub mod knowledge_stats;
pub mod message;
pub mod route;
pub mod source;
pub mod stream_event;
pub mod upload;

// Re-exports
pub use chat_request::{ChatRequest, DEFAULT_USER_ID, StreamParams};
pub use chat_response::ChatResponse;
pub use knowledge_search::{
    DEFAULT_TOP_K, KnowledgeSearch, MAX_TOP_K, SearchResults, validate_recipe,
};
pub use knowledge_stats::{
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, KnowledgeStats, RerankerModel,
};
pub use message::{ChatMessage, MessageRole, NO_REPLY_TEXT, SEND_FAILURE_TEXT};
pub use route::{KnownRoute, Route};
pub use source::Source;
pub use stream_event::StreamEvent;
pub use upload::{Attachment, UploadResponse};

//! The Assistant API seam.
//!
//! [`ChatSession`](crate::ChatSession) talks to the assistant only through
//! [`ChatApi`].  [`GustoBot`](crate::GustoBot) implements it over HTTP; tests
//! substitute scripted implementations.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::stream::{ChatStream, StreamCancel};
use crate::types::{
    Attachment, ChatRequest, ChatResponse, KnowledgeSearch, KnowledgeStats, SearchResults,
    StreamParams, UploadResponse,
};

/// Operations offered by the assistant service.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Send one message and wait for the complete answer.
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Open an event stream for one message.
    ///
    /// The returned stream stops when `cancel` fires.
    async fn stream_message(
        &self,
        params: &StreamParams,
        cancel: StreamCancel,
    ) -> Result<ChatStream>;

    /// Fetch the stored history of a conversation.
    async fn history(&self, session_id: &str) -> Result<Value>;

    /// Delete a conversation on the service.
    async fn clear_session(&self, session_id: &str) -> Result<Value>;

    /// Fetch the catalog of routes the service can dispatch to.
    async fn routes(&self) -> Result<Value>;

    /// Upload a document.
    async fn upload_file(&self, attachment: Attachment) -> Result<UploadResponse>;

    /// Upload an image.
    async fn upload_image(&self, attachment: Attachment) -> Result<UploadResponse>;

    /// Fetch knowledge base statistics.
    async fn knowledge_stats(&self) -> Result<KnowledgeStats>;

    /// Search the knowledge base for recipes similar to a query.
    async fn search_knowledge(&self, search: &KnowledgeSearch) -> Result<SearchResults>;

    /// Add one recipe to the knowledge base.
    ///
    /// The recipe must carry a `name`; the service assigns an id when absent.
    async fn add_recipe(&self, recipe: &Value) -> Result<Value>;

    /// Fetch the health of the chat service.
    async fn system_status(&self) -> Result<Value>;
}

#[async_trait::async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).send_message(request).await
    }

    async fn stream_message(
        &self,
        params: &StreamParams,
        cancel: StreamCancel,
    ) -> Result<ChatStream> {
        (**self).stream_message(params, cancel).await
    }

    async fn history(&self, session_id: &str) -> Result<Value> {
        (**self).history(session_id).await
    }

    async fn clear_session(&self, session_id: &str) -> Result<Value> {
        (**self).clear_session(session_id).await
    }

    async fn routes(&self) -> Result<Value> {
        (**self).routes().await
    }

    async fn upload_file(&self, attachment: Attachment) -> Result<UploadResponse> {
        (**self).upload_file(attachment).await
    }

    async fn upload_image(&self, attachment: Attachment) -> Result<UploadResponse> {
        (**self).upload_image(attachment).await
    }

    async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        (**self).knowledge_stats().await
    }

    async fn search_knowledge(&self, search: &KnowledgeSearch) -> Result<SearchResults> {
        (**self).search_knowledge(search).await
    }

    async fn add_recipe(&self, recipe: &Value) -> Result<Value> {
        (**self).add_recipe(recipe).await
    }

    async fn system_status(&self) -> Result<Value> {
        (**self).system_status().await
    }
}

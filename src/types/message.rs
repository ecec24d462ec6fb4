use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Route, Source};

/// Text shown when the service answers without any content.
pub const NO_REPLY_TEXT: &str = "抱歉，我没有收到回复。";

/// Text shown when an exchange fails and the service gave no detail.
pub const SEND_FAILURE_TEXT: &str = "抱歉，服务暂时不可用。请检查后端服务是否正常运行，或稍后再试。";

/// Who wrote a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person chatting.
    User,
    /// The assistant service.
    Assistant,
}

/// One turn in a conversation.
///
/// Content may contain Markdown; it is displayed, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: MessageRole,

    /// Message text.
    pub content: String,

    /// When the message was created.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,

    /// Backend handler that produced the reply.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route: Option<Route>,

    /// Reference documents behind the reply, in server order.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sources: Option<Vec<Source>>,

    /// True when this message stands in for a failed exchange.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub error: bool,
}

impl ChatMessage {
    /// A message typed by the user, stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// A reply from the assistant, stamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// The synthetic reply appended when an exchange fails.
    pub fn failure(content: impl Into<String>) -> Self {
        let mut message = Self::assistant(content);
        message.error = true;
        message
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: crate::utils::time::now(),
            route: None,
            sources: None,
            error: false,
        }
    }

    /// Attach a route.
    pub fn with_route(mut self, route: Option<Route>) -> Self {
        self.route = route;
        self
    }

    /// Attach sources; an empty list is treated as none.
    pub fn with_sources(mut self, sources: Option<Vec<Source>>) -> Self {
        self.sources = sources.filter(|s| !s.is_empty());
        self
    }

    /// True for messages the user wrote.
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

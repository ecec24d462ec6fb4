use serde::{Deserialize, Serialize};

/// User id sent when the caller does not provide one.
pub const DEFAULT_USER_ID: &str = "web_user";

/// Body of a blocking chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,

    /// Conversation to continue; the service starts a new one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Identifies the calling front end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatRequest {
    /// Create a request for a new conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            user_id: None,
        }
    }

    /// Continue the given conversation.
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Query parameters of a streaming chat request.
///
/// The streaming endpoint is a plain GET, so everything travels in the query
/// string.  Absent values are sent as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamParams {
    /// The user's message.
    pub message: String,
    /// Conversation to continue.
    pub session_id: Option<String>,
    /// Identifies the calling front end; defaults to [`DEFAULT_USER_ID`].
    pub user_id: Option<String>,
    /// Server-side path of a previously uploaded file.
    pub file_path: Option<String>,
    /// Server-side path of a previously uploaded image.
    pub image_path: Option<String>,
}

impl StreamParams {
    /// Create parameters for a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Continue the given conversation.
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Refer to an uploaded file.
    pub fn with_file_path(mut self, file_path: Option<String>) -> Self {
        self.file_path = file_path;
        self
    }

    /// Refer to an uploaded image.
    pub fn with_image_path(mut self, image_path: Option<String>) -> Self {
        self.image_path = image_path;
        self
    }

    /// The query pairs in the order the service documents them.
    pub fn query_pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("message", self.message.as_str()),
            ("session_id", self.session_id.as_deref().unwrap_or("")),
            (
                "user_id",
                self.user_id.as_deref().unwrap_or(DEFAULT_USER_ID),
            ),
            ("file_path", self.file_path.as_deref().unwrap_or("")),
            ("image_path", self.image_path.as_deref().unwrap_or("")),
        ]
    }
}

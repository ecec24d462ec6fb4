//! Error types for the GustoBot client.
//!
//! Every failure at the network boundary is converted into an [`Error`].  The
//! session layer absorbs these into visible chat messages; the lower-level
//! [`GustoBot`](crate::GustoBot) client returns them to the caller.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The exchange with the assistant service that an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Blocking chat request.
    SendMessage,
    /// Streaming chat request.
    StreamMessage,
    /// Conversation history lookup.
    History,
    /// Remote session deletion.
    ClearSession,
    /// Route catalog lookup.
    Routes,
    /// Multipart file upload.
    UploadFile,
    /// Multipart image upload.
    UploadImage,
    /// Knowledge base statistics.
    KnowledgeStats,
    /// Knowledge base similarity search.
    SearchKnowledge,
    /// Recipe ingestion into the knowledge base.
    AddRecipe,
    /// Service health lookup.
    SystemStatus,
}

impl Operation {
    /// The fixed, user-facing text shown when this exchange fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::SendMessage => "发送消息失败",
            Operation::StreamMessage => "流式请求失败",
            Operation::History => "获取历史记录失败",
            Operation::ClearSession => "清空会话失败",
            Operation::Routes => "获取路由信息失败",
            Operation::UploadFile => "文件上传失败",
            Operation::UploadImage => "图片上传失败",
            Operation::KnowledgeStats => "获取统计信息失败",
            Operation::SearchKnowledge => "知识检索失败",
            Operation::AddRecipe => "添加菜谱失败",
            Operation::SystemStatus => "获取系统状态失败",
        }
    }

    /// A stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::SendMessage => "send_message",
            Operation::StreamMessage => "stream_message",
            Operation::History => "history",
            Operation::ClearSession => "clear_session",
            Operation::Routes => "routes",
            Operation::UploadFile => "upload_file",
            Operation::UploadImage => "upload_image",
            Operation::KnowledgeStats => "knowledge_stats",
            Operation::SearchKnowledge => "search_knowledge",
            Operation::AddRecipe => "add_recipe",
            Operation::SystemStatus => "system_status",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The main error type for the GustoBot client.
#[derive(Clone, Debug)]
pub enum Error {
    /// The service answered with a non-success HTTP status.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// The `detail` field of the response body, when the service sent one.
        detail: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// The request did not complete within its time limit.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The service could not be reached.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Invalid input rejected before any request was made.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// The event stream failed after it was opened.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// An auxiliary exchange failed.
    Exchange {
        /// The exchange that failed.
        operation: Operation,
        /// Fixed user-facing message for the exchange.
        message: String,
        /// What actually went wrong.
        source: Arc<Error>,
    },

    /// Unknown error.
    Unknown {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        detail: Option<String>,
        message: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            detail,
            message: message.into(),
            request_id,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Wraps `source` as a failure of `operation`, attaching the operation's fixed message.
    pub fn exchange(operation: Operation, source: Error) -> Self {
        Error::Exchange {
            operation,
            message: operation.failure_message().to_string(),
            source: Arc::new(source),
        }
    }

    /// Creates a new unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
        }
    }

    /// Returns true if the service answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Exchange { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        match self {
            Error::Connection { .. } => true,
            Error::Exchange { source, .. } => source.is_connection(),
            _ => false,
        }
    }

    /// Returns true if the service answered with a 5xx status.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), Some(500..=599))
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Validation { .. } => true,
            Error::Exchange { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// Returns true if this error describes a single undecodable stream line.
    ///
    /// Such errors are skipped by [`ChatStream`](crate::ChatStream); every
    /// other stream error ends the stream.
    pub fn is_malformed_chunk(&self) -> bool {
        matches!(self, Error::Serialization { .. } | Error::Encoding { .. })
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 429 | 500..=599)
            }
            Error::Timeout { .. } => true,
            Error::Connection { .. } => true,
            Error::Exchange { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the operation of an [`Error::Exchange`].
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Exchange { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Returns the server-provided detail message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { detail, .. } => detail.as_deref(),
            Error::Exchange { source, .. } => source.detail(),
            _ => None,
        }
    }

    /// Returns the request ID associated with this error, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api { request_id, .. } => request_id.as_deref(),
            Error::Exchange { source, .. } => source.request_id(),
            _ => None,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::Exchange { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                message,
                request_id,
                ..
            } => {
                if let Some(request_id) = request_id {
                    write!(
                        f,
                        "API error {status_code}: {message} (Request ID: {request_id})"
                    )
                } else {
                    write!(f, "API error {status_code}: {message}")
                }
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
            Error::Exchange { message, .. } => {
                write!(f, "{message}")
            }
            Error::Unknown { message } => {
                write!(f, "Unknown error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Exchange { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for GustoBot operations.
pub type Result<T> = std::result::Result<T, Error>;

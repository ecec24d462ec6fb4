//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::store::FileStore;
use crate::types::DEFAULT_USER_ID;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the gustobot-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the assistant service.
    #[arrrg(optional, "Service base URL (default: $GUSTOBOT_API_URL or http://localhost:8000)", "URL")]
    pub base_url: Option<String>,

    /// Base URL of the knowledge base endpoints.
    #[arrrg(optional, "Knowledge base URL (default: $GUSTOBOT_KNOWLEDGE_URL or <base>/api/v1)", "URL")]
    pub knowledge_url: Option<String>,

    /// User id sent with every request.
    #[arrrg(optional, "User id sent with each message (default: web_user)", "ID")]
    pub user_id: Option<String>,

    /// Where the session id is persisted.
    #[arrrg(optional, "State file for the session id", "PATH")]
    pub state_file: Option<String>,

    /// Per-request timeout for ordinary calls.
    #[arrrg(optional, "Request timeout in seconds (default: 30)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Stream replies instead of waiting for them.
    #[arrrg(flag, "Stream replies as they are generated")]
    pub stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Service base URL; `None` defers to the environment.
    pub base_url: Option<String>,

    /// Knowledge base URL; `None` defers to the environment.
    pub knowledge_url: Option<String>,

    /// User id sent with every request.
    pub user_id: String,

    /// State file for the session id; `None` keeps it in memory only.
    pub state_file: Option<PathBuf>,

    /// Per-request timeout for ordinary calls.
    pub timeout: Duration,

    /// Whether replies are streamed.
    pub stream: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - URLs: from the environment, else localhost
    /// - User id: web_user
    /// - State file: the platform state directory
    /// - Timeout: 30 seconds
    /// - Streaming: disabled
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: None,
            knowledge_url: None,
            user_id: DEFAULT_USER_ID.to_string(),
            state_file: FileStore::default_path(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream: false,
            use_color: true,
        }
    }

    /// Sets the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the knowledge base URL.
    pub fn with_knowledge_url(mut self, knowledge_url: impl Into<String>) -> Self {
        self.knowledge_url = Some(knowledge_url.into());
        self
    }

    /// Sets the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the state file.
    pub fn with_state_file(mut self, path: Option<PathBuf>) -> Self {
        self.state_file = path;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            base_url: args.base_url,
            knowledge_url: args.knowledge_url,
            user_id: args
                .user_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or(defaults.user_id),
            state_file: args.state_file.map(PathBuf::from).or(defaults.state_file),
            timeout: args
                .timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            stream: args.stream,
            use_color: !args.no_color,
        }
    }
}

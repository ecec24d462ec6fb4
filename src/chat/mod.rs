//! Chat application module for interactive conversations with GustoBot.
//!
//! This module provides the pieces of the terminal chat front end built on
//! top of the gustobot client library:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing

mod commands;
mod config;

pub use crate::boundary::ErrorBoundary;
pub use crate::render::{PlainTextRenderer, Renderer, format_search_results, format_stats};
pub use crate::session::{ChatSession, ExchangeState, SendOutcome};
pub use commands::{ChatCommand, QUICK_QUESTIONS, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};

/// Greeting shown when the chat starts.
pub const WELCOME_TEXT: &str = "您好！我是GustoBot，您的智能菜谱助手。🍳\n\n您可以问我：\n- 如何制作某道菜\n- 推荐菜谱\n- 烹饪技巧\n- 食材搭配\n\n试试 /quick 查看快速问题，或者直接输入您的问题！";

/// Shown after the transcript is cleared.
pub const CLEARED_TEXT: &str = "对话已清空。有什么新问题吗？";

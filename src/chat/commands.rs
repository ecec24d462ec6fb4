//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the assistant.

/// Suggested first questions, offered by `/quick`.
pub const QUICK_QUESTIONS: [&str; 4] = [
    "怎么做红烧肉？",
    "推荐几道家常菜",
    "如何炖鸡汤？",
    "有什么快手菜推荐？",
];

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the assistant.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the local transcript, keeping the session id.
    Clear,

    /// Start a new conversation, forgetting the session id.
    New,

    /// Delete the conversation on the service and start over.
    Delete,

    /// Fetch the conversation history from the service.
    History,

    /// Fetch the route catalog.
    Routes,

    /// Show knowledge base statistics.
    Stats,

    /// Show the current session id and transcript size.
    Session,

    /// Show the health of the service.
    Status,

    /// Search the knowledge base.
    Search(String),

    /// Add the recipe in a JSON file to the knowledge base.
    Recipe(String),

    /// Turn streaming on or off.
    Stream(bool),

    /// Upload a document for the next message.
    Upload(String),

    /// Upload an image for the next message.
    Image(String),

    /// List the quick questions, or send one by number (1-based).
    Quick(Option<usize>),

    /// Save the transcript to a file.
    SaveTranscript(String),

    /// Load a transcript from a file.
    LoadTranscript(String),

    /// Re-arm the display after a rendering fault.
    Reset,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use gustobot::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/upload menu.pdf").is_some());
/// assert!(parse_command("红烧肉怎么做？").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "new" => ChatCommand::New,
        "delete" => ChatCommand::Delete,
        "history" => ChatCommand::History,
        "routes" => ChatCommand::Routes,
        "stats" => ChatCommand::Stats,
        "session" => ChatCommand::Session,
        "status" => ChatCommand::Status,
        "reset" => ChatCommand::Reset,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stream" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Stream(value),
            None => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        },
        "upload" => require_path(argument, ChatCommand::Upload, "/upload"),
        "image" => require_path(argument, ChatCommand::Image, "/image"),
        "save" => require_path(argument, ChatCommand::SaveTranscript, "/save"),
        "load" => require_path(argument, ChatCommand::LoadTranscript, "/load"),
        "recipe" => require_path(argument, ChatCommand::Recipe, "/recipe"),
        "search" => match argument {
            Some(query) => ChatCommand::Search(query.to_string()),
            None => ChatCommand::Invalid("/search requires a query".to_string()),
        },
        "quick" => match argument {
            None => ChatCommand::Quick(None),
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) if (1..=QUICK_QUESTIONS.len()).contains(&n) => ChatCommand::Quick(Some(n)),
                _ => ChatCommand::Invalid(format!(
                    "/quick expects a number from 1 to {}",
                    QUICK_QUESTIONS.len()
                )),
            },
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn require_path<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(String) -> ChatCommand,
{
    match argument {
        Some(arg) => constructor(arg.to_string()),
        None => ChatCommand::Invalid(format!("{} requires a file path", name)),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear the transcript (keeps the session)
  /new                   Start a new conversation
  /delete                Delete the conversation on the server and start over
  /history               Show the server-side history of this conversation
  /routes                Show the routes the assistant can use
  /stats                 Show knowledge base statistics
  /session               Show the current session
  /status                Show the health of the service
  /search <query>        Search the recipe knowledge base
  /recipe <file>         Add the recipe in a JSON file to the knowledge base
  /stream on|off         Stream replies as they are generated
  /upload <file>         Upload a document for the next message
  /image <file>          Upload an image for the next message
  /quick [n]             List quick questions, or ask question n
  /save <file>           Save the transcript
  /load <file>           Load a transcript
  /reset                 Restore the display after an error
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/delete"), Some(ChatCommand::Delete));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/routes"), Some(ChatCommand::Routes));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/session"), Some(ChatCommand::Session));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Status));
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Reset));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn parse_stream_toggle() {
        assert_eq!(parse_command("/stream on"), Some(ChatCommand::Stream(true)));
        assert_eq!(parse_command("/stream OFF"), Some(ChatCommand::Stream(false)));
        assert!(matches!(
            parse_command("/stream maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
        assert!(matches!(
            parse_command("/stream"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_paths() {
        assert_eq!(
            parse_command("/upload  recipes/红烧肉.pdf "),
            Some(ChatCommand::Upload("recipes/红烧肉.pdf".to_string()))
        );
        assert_eq!(
            parse_command("/image dish.png"),
            Some(ChatCommand::Image("dish.png".to_string()))
        );
        assert_eq!(
            parse_command("/save my chat.json"),
            Some(ChatCommand::SaveTranscript("my chat.json".to_string()))
        );
        assert_eq!(
            parse_command("/load chat.json"),
            Some(ChatCommand::LoadTranscript("chat.json".to_string()))
        );
        assert_eq!(
            parse_command("/upload"),
            Some(ChatCommand::Invalid(
                "/upload requires a file path".to_string()
            ))
        );
    }

    #[test]
    fn parse_knowledge_commands() {
        assert_eq!(
            parse_command("/search 红烧肉 做法"),
            Some(ChatCommand::Search("红烧肉 做法".to_string()))
        );
        assert_eq!(
            parse_command("/search"),
            Some(ChatCommand::Invalid("/search requires a query".to_string()))
        );
        assert_eq!(
            parse_command("/recipe tomato_egg.json"),
            Some(ChatCommand::Recipe("tomato_egg.json".to_string()))
        );
    }

    #[test]
    fn parse_quick() {
        assert_eq!(parse_command("/quick"), Some(ChatCommand::Quick(None)));
        assert_eq!(parse_command("/quick 2"), Some(ChatCommand::Quick(Some(2))));
        assert!(matches!(
            parse_command("/quick 0"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/quick 5"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gpt"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("推荐一道菜"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in [
            "/clear", "/new", "/history", "/routes", "/stats", "/session", "/stream", "/upload",
            "/image", "/status", "/search", "/recipe", "/save", "/load", "/reset", "/help", "/quit",
        ] {
            assert!(help.contains(command), "{command} missing from help");
        }
    }
}

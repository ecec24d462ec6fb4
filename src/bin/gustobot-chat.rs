//! Interactive chat application for the GustoBot recipe assistant.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a service on localhost:8000
//! gustobot-chat
//!
//! # Point at another deployment and stream replies
//! gustobot-chat --base-url http://gusto.internal:8000 --stream
//!
//! # Disable colors (useful for piping output)
//! gustobot-chat --no-color
//! ```
//!
//! Set `RUST_LOG=gustobot=debug` to see request logs on stderr.  Ctrl+C
//! interrupts a streamed reply; `/help` lists the slash commands.

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use gustobot::chat::{
    CLEARED_TEXT, ChatArgs, ChatCommand, ChatConfig, ChatSession, ErrorBoundary,
    PlainTextRenderer, QUICK_QUESTIONS, Renderer, SendOutcome, WELCOME_TEXT,
    format_search_results, format_stats, help_text, parse_command,
};
use gustobot::{
    Attachment, ChatMessage, FileStore, GustoBot, KnowledgeSearch, MemoryStore, SessionStore,
    StreamCancel,
};

type Session = ChatSession<GustoBot, Arc<dyn SessionStore>>;

/// The stream Ctrl+C should stop, if one is running.
type ActiveStream = Arc<Mutex<Option<StreamCancel>>>;

struct Repl {
    session: Session,
    renderer: PlainTextRenderer,
    boundary: ErrorBoundary,
    config: ChatConfig,
    active: ActiveStream,
}

/// Main entry point for the gustobot-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("gustobot-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let client = GustoBot::with_options(
        config.base_url.clone(),
        config.knowledge_url.clone(),
        Some(config.timeout),
    )?;
    let store: Arc<dyn SessionStore> = match &config.state_file {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(base_url = %client.base_url(), "starting chat");
    let session = ChatSession::new(client, store).with_user_id(config.user_id.clone());

    let active: ActiveStream = Arc::new(Mutex::new(None));
    let handler_active = Arc::clone(&active);
    ctrlc::set_handler(move || {
        if let Ok(active) = handler_active.lock() {
            if let Some(cancel) = active.as_ref() {
                cancel.cancel();
            }
        }
    })?;

    let mut repl = Repl {
        session,
        renderer: PlainTextRenderer::with_color(config.use_color),
        boundary: ErrorBoundary::new(),
        config,
        active,
    };
    let mut rl = DefaultEditor::new()?;

    repl.show(|r| r.print_message(&ChatMessage::assistant(WELCOME_TEXT)));
    repl.show(|r| r.print_info("Type /help for commands, /quit to exit\n"));

    loop {
        match rl.readline("我: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match parse_command(line) {
                    Some(ChatCommand::Quit) => {
                        println!("再见！");
                        break;
                    }
                    Some(command) => repl.run_command(command).await,
                    None => repl.send(line).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\n再见！");
                break;
            }
            Err(err) => {
                repl.show(|r| r.print_error(&format!("Input error: {}", err)));
                break;
            }
        }
    }

    Ok(())
}

impl Repl {
    /// Render through the error boundary, announcing the fallback when it trips.
    fn show<F>(&mut self, view: F)
    where
        F: FnOnce(&mut PlainTextRenderer) -> gustobot::Result<()>,
    {
        show(&mut self.boundary, &mut self.renderer, view);
    }

    async fn send(&mut self, text: &str) {
        if self.config.stream {
            self.send_streaming(text).await;
            return;
        }
        if self.session.send_message(text).await == SendOutcome::Ignored {
            return;
        }
        if let Some(reply) = self.session.messages().last() {
            show(&mut self.boundary, &mut self.renderer, |r| r.print_message(reply));
        }
    }

    async fn send_streaming(&mut self, text: &str) {
        let cancel = StreamCancel::new();
        self.set_active(Some(cancel.clone()));
        self.show(|r| r.start_response());

        let Repl {
            session,
            renderer,
            boundary,
            ..
        } = &mut *self;
        let outcome = session
            .send_stream_message(text, &cancel, |event| {
                if let Some(chunk) = event.text() {
                    show(boundary, renderer, |r| r.print_text(chunk));
                }
            })
            .await;
        self.set_active(None);

        if cancel.is_cancelled() {
            self.show(|r| r.print_interrupted());
        }
        if outcome == SendOutcome::Ignored {
            return;
        }
        if let Some(reply) = self.session.messages().last() {
            show(&mut self.boundary, &mut self.renderer, |r| r.finish_response(reply));
        }
    }

    fn set_active(&self, cancel: Option<StreamCancel>) {
        if let Ok(mut active) = self.active.lock() {
            *active = cancel;
        }
    }

    async fn run_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::Clear => {
                self.session.clear();
                self.show(|r| r.print_message(&ChatMessage::assistant(CLEARED_TEXT)));
            }
            ChatCommand::New => match self.session.new_conversation() {
                Ok(()) => self.show(|r| r.print_info("Started a new conversation.")),
                Err(err) => {
                    self.show(|r| r.print_error(&format!("Failed to forget session: {}", err)))
                }
            },
            ChatCommand::Delete => match self.session.clear_history().await {
                Ok(()) => self.show(|r| r.print_message(&ChatMessage::assistant(CLEARED_TEXT))),
                Err(err) => self.show(|r| r.print_error(&err.to_string())),
            },
            ChatCommand::History => match self.session.history().await {
                Ok(history) => self.show_json(&history),
                Err(err) => self.show(|r| r.print_error(&err.to_string())),
            },
            ChatCommand::Routes => match self.session.routes().await {
                Ok(routes) => self.show_json(&routes),
                Err(err) => self.show(|r| r.print_error(&err.to_string())),
            },
            ChatCommand::Stats => match self.session.knowledge_stats().await {
                Ok(stats) => {
                    let text = format_stats(&stats);
                    self.show(|r| r.print_info(&text));
                }
                Err(err) => self.show(|r| r.print_error(&err.to_string())),
            },
            ChatCommand::Status => match self.session.system_status().await {
                Ok(status) => self.show_json(&status),
                Err(err) => self.show(|r| r.print_error(&err.to_string())),
            },
            ChatCommand::Search(query) => {
                match self.session.search_knowledge(&KnowledgeSearch::new(query)).await {
                    Ok(results) => {
                        let text = format_search_results(&results);
                        self.show(|r| r.print_info(&text));
                    }
                    Err(err) => self.show(|r| r.print_error(&err.to_string())),
                }
            }
            ChatCommand::Recipe(path) => self.add_recipe(&path).await,
            ChatCommand::Session => {
                let mut lines = vec![
                    format!(
                        "Session: {}",
                        self.session.session_id().unwrap_or("(not yet assigned)")
                    ),
                    format!("User: {}", self.session.user_id()),
                    format!("Messages: {}", self.session.message_count()),
                ];
                if let Some(path) = self.session.pending_file_path() {
                    lines.push(format!("Pending file: {}", path));
                }
                if let Some(path) = self.session.pending_image_path() {
                    lines.push(format!("Pending image: {}", path));
                }
                let text = lines.join("\n");
                self.show(|r| r.print_info(&text));
            }
            ChatCommand::Stream(on) => {
                self.config.stream = on;
                let text = if on {
                    "Streaming enabled."
                } else {
                    "Streaming disabled."
                };
                self.show(|r| r.print_info(text));
            }
            ChatCommand::Upload(path) => self.upload(&path, false).await,
            ChatCommand::Image(path) => self.upload(&path, true).await,
            ChatCommand::Quick(None) => {
                let text = QUICK_QUESTIONS
                    .iter()
                    .enumerate()
                    .map(|(i, q)| format!("  {}. {}", i + 1, q))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.show(|r| r.print_info(&text));
            }
            ChatCommand::Quick(Some(n)) => {
                if let Some(question) = QUICK_QUESTIONS.get(n - 1) {
                    self.show(|r| r.print_info(&format!("我: {}", question)));
                    self.send(question).await;
                }
            }
            ChatCommand::SaveTranscript(path) => match self.session.save_transcript_to(&path) {
                Ok(()) => self.show(|r| r.print_info(&format!("Transcript saved to {}", path))),
                Err(err) => {
                    self.show(|r| r.print_error(&format!("Failed to save transcript: {}", err)))
                }
            },
            ChatCommand::LoadTranscript(path) => {
                match self.session.load_transcript_from(&path) {
                    Ok(()) => {
                        self.show(|r| r.print_info(&format!("Transcript loaded from {}", path)));
                        let messages = self.session.messages().to_vec();
                        for message in &messages {
                            self.show(|r| r.print_message(message));
                        }
                    }
                    Err(err) => self
                        .show(|r| r.print_error(&format!("Failed to load transcript: {}", err))),
                }
            }
            ChatCommand::Reset => {
                if let Some(fault) = self.boundary.fault() {
                    tracing::info!(fault, "display reset");
                }
                self.boundary.reset();
                self.show(|r| r.print_info("Display restored."));
            }
            ChatCommand::ShowConfig => {
                let api = self.session.api();
                let text = format!(
                    "Current Configuration:\n  Base URL: {}\n  Knowledge URL: {}\n  Timeout: {}s\n  Streaming: {}\n  State file: {}",
                    api.base_url(),
                    api.knowledge_url(),
                    api.timeout().as_secs(),
                    if self.config.stream { "on" } else { "off" },
                    self.config
                        .state_file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(memory only)".to_string()),
                );
                self.show(|r| r.print_info(&text));
            }
            ChatCommand::Help => {
                let text = help_text()
                    .lines()
                    .map(|line| format!("    {}", line))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.show(|r| r.print_info(&text));
            }
            ChatCommand::Invalid(message) => self.show(|r| r.print_error(&message)),
            ChatCommand::Quit => {}
        }
    }

    async fn upload(&mut self, path: &str, image: bool) {
        let attachment = match Attachment::from_path(path).await {
            Ok(attachment) => attachment,
            Err(err) => {
                self.show(|r| r.print_error(&err.to_string()));
                return;
            }
        };
        if image && !attachment.is_image() {
            let text = format!(
                "{} is {}, not an image; use /upload for documents",
                path, attachment.mime_type
            );
            self.show(|r| r.print_error(&text));
            return;
        }
        let result = if image {
            self.session.upload_image(attachment).await
        } else {
            self.session.upload_file(attachment).await
        };
        match result {
            Ok(response) => {
                let mut text = response
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Uploaded {}", path));
                if response.stored_path().is_some() {
                    text.push_str("\nIt will be sent with your next message.");
                    if !self.config.stream {
                        text.push_str(" Attachments need streaming; use /stream on.");
                    }
                }
                self.show(|r| r.print_info(&text));
            }
            Err(err) => self.show(|r| r.print_error(&err.to_string())),
        }
    }

    async fn add_recipe(&mut self, path: &str) {
        let recipe = match tokio::fs::read(path)
            .await
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|e| e.to_string())
            }) {
            Ok(recipe) => recipe,
            Err(err) => {
                self.show(|r| r.print_error(&format!("Failed to read {}: {}", path, err)));
                return;
            }
        };
        match self.session.add_recipe(&recipe).await {
            Ok(added) => self.show_json(&added),
            Err(err) => self.show(|r| r.print_error(&err.to_string())),
        }
    }

    fn show_json(&mut self, value: &serde_json::Value) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.show(|r| r.print_info(&text));
    }
}

fn show<F>(boundary: &mut ErrorBoundary, renderer: &mut PlainTextRenderer, view: F)
where
    F: FnOnce(&mut PlainTextRenderer) -> gustobot::Result<()>,
{
    let was_faulted = boundary.has_error();
    if boundary.render(|| view(renderer)).is_none() && !was_faulted {
        if let Some(fallback) = boundary.fallback() {
            eprintln!("{fallback} (/reset to restore the display)");
        }
    }
}

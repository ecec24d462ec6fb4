//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows for
//! different output styles.  The default implementation writes plain text
//! with optional ANSI styling for route badges, sources and failures.

use std::io::{self, Stdout, Write};

use crate::error::Result;
use crate::types::{ChatMessage, KnowledgeStats, MessageRole, Route, SearchResults, Source};

/// ANSI escape code for dim text (used for sources and timestamps).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for route badges).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for failed exchanges).
const ANSI_RED: &str = "\x1b[31m";

const USER_LABEL: &str = "我";
const ASSISTANT_LABEL: &str = "GustoBot";
const SOURCES_LABEL: &str = "参考来源";

/// Trait for rendering chat output.
///
/// Methods return errors from the underlying writer so callers can wrap
/// rendering in an [`ErrorBoundary`](crate::ErrorBoundary).
pub trait Renderer: Send {
    /// Print a complete message from the transcript.
    fn print_message(&mut self, message: &ChatMessage) -> Result<()>;

    /// Called before the first chunk of a streamed reply.
    fn start_response(&mut self) -> Result<()>;

    /// Print a chunk of streamed reply text.
    fn print_text(&mut self, text: &str) -> Result<()>;

    /// Called when a streamed reply is complete.
    ///
    /// `message` is the reply as recorded in the transcript; its route and
    /// sources are shown here.  A failed reply is printed in full because
    /// none of its text was streamed.
    fn finish_response(&mut self, message: &ChatMessage) -> Result<()>;

    /// Called when the user interrupts a streamed reply.
    fn print_interrupted(&mut self) -> Result<()>;

    /// Print an error message.
    fn print_error(&mut self, error: &str) -> Result<()>;

    /// Print an informational message.
    fn print_info(&mut self, info: &str) -> Result<()>;
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn style(&self, code: &'static str) -> &'static str {
        if self.use_color { code } else { "" }
    }

    fn label(&mut self, role: MessageRole, failed: bool) -> Result<()> {
        let (name, color) = match role {
            MessageRole::User => (USER_LABEL, ANSI_BOLD),
            MessageRole::Assistant if failed => (ASSISTANT_LABEL, ANSI_RED),
            MessageRole::Assistant => (ASSISTANT_LABEL, ANSI_GREEN),
        };
        let (start, reset) = (self.style(color), self.style(ANSI_RESET));
        write!(self.out, "{start}{name}{reset}: ")?;
        Ok(())
    }

    fn route_badge(&mut self, route: Option<&Route>) -> Result<()> {
        if let Some(route) = route {
            let (start, reset) = (self.style(ANSI_CYAN), self.style(ANSI_RESET));
            writeln!(self.out, "{start}[{}]{reset}", route.display_name())?;
        }
        Ok(())
    }

    fn sources(&mut self, sources: Option<&[Source]>) -> Result<()> {
        let Some(sources) = sources.filter(|sources| !sources.is_empty()) else {
            return Ok(());
        };
        let (start, reset) = (self.style(ANSI_DIM), self.style(ANSI_RESET));
        writeln!(self.out, "{start}{SOURCES_LABEL}:")?;
        for (index, source) in sources.iter().enumerate() {
            writeln!(self.out, "  {}. {}", index + 1, source_title(source))?;
        }
        write!(self.out, "{reset}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &ChatMessage) -> Result<()> {
        self.label(message.role, message.error)?;
        if message.error {
            let (start, reset) = (self.style(ANSI_RED), self.style(ANSI_RESET));
            writeln!(self.out, "{start}{}{reset}", message.content)?;
        } else {
            writeln!(self.out, "{}", message.content)?;
        }
        self.route_badge(message.route.as_ref())?;
        self.sources(message.sources.as_deref())?;
        self.flush()
    }

    fn start_response(&mut self) -> Result<()> {
        self.label(MessageRole::Assistant, false)?;
        self.flush()
    }

    fn print_text(&mut self, text: &str) -> Result<()> {
        write!(self.out, "{text}")?;
        self.flush()
    }

    fn finish_response(&mut self, message: &ChatMessage) -> Result<()> {
        if message.error {
            writeln!(self.out)?;
            return self.print_message(message);
        }
        writeln!(self.out)?;
        self.route_badge(message.route.as_ref())?;
        self.sources(message.sources.as_deref())?;
        self.flush()
    }

    fn print_interrupted(&mut self) -> Result<()> {
        writeln!(self.out, "\n[interrupted]")?;
        self.flush()
    }

    fn print_error(&mut self, error: &str) -> Result<()> {
        let (start, reset) = (self.style(ANSI_RED), self.style(ANSI_RESET));
        writeln!(self.out, "{start}Error: {error}{reset}")?;
        self.flush()
    }

    fn print_info(&mut self, info: &str) -> Result<()> {
        writeln!(self.out, "{info}")?;
        self.flush()
    }
}

fn source_title(source: &Source) -> &str {
    if source.title.is_empty() {
        "(untitled)"
    } else {
        &source.title
    }
}

/// Formats knowledge base statistics, filling documented defaults.
pub fn format_stats(stats: &KnowledgeStats) -> String {
    let mut lines = vec![
        format!("文档总数: {}", stats.total_documents),
        format!("菜谱总数: {}", stats.total_recipes),
        format!("向量维度: {}", stats.embedding_dimension_or_default()),
        format!("向量模型: {}", stats.embedding_model_or_default()),
    ];
    if let Some(reranker) = &stats.reranker_model {
        let status = if reranker.available { "可用" } else { "不可用" };
        let provider = reranker.provider.as_deref().unwrap_or("unknown");
        lines.push(format!("重排模型: {provider} ({status})"));
    }
    if let Some(collection) = &stats.collection_name {
        lines.push(format!("集合名称: {collection}"));
    }
    lines.join("\n")
}

/// Formats knowledge search hits as a numbered list.
pub fn format_search_results(results: &SearchResults) -> String {
    if results.is_empty() {
        return "没有找到相关菜谱".to_string();
    }
    let mut lines = vec![format!("找到 {} 条结果:", results.count.max(results.results.len()))];
    for (idx, label) in results.labels().iter().enumerate() {
        lines.push(format!("  {}. {}", idx + 1, label));
    }
    lines.join("\n")
}

//! Core chat session management.
//!
//! [`ChatSession`] owns the transcript of one conversation and mediates every
//! exchange with the assistant.  Sends never fail from the caller's point of
//! view: a failed exchange is absorbed into the transcript as an assistant
//! message flagged with `error`.  Auxiliary exchanges (history, routes,
//! uploads, statistics) return [`Error::Exchange`] so each can be reported and
//! retried on its own.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_reader, to_writer_pretty};

use crate::api::ChatApi;
use crate::client::GustoBot;
use crate::error::{Error, Operation, Result};
use crate::observability::{
    SESSION_EXCHANGE_DURATION, SESSION_EXCHANGES, SESSION_FALLBACKS, SESSION_IGNORED,
};
use crate::store::{FileStore, SESSION_ID_KEY, SessionStore};
use crate::stream::StreamCancel;
use crate::types::{
    Attachment, ChatMessage, ChatRequest, DEFAULT_USER_ID, KnowledgeSearch, KnowledgeStats,
    NO_REPLY_TEXT, Route, SEND_FAILURE_TEXT, SearchResults, Source, StreamEvent, StreamParams,
    UploadResponse,
};

/// Where the session is in its current exchange.
///
/// A session starts `Idle`, enters `Sending` when a non-empty message is
/// sent, and settles in exactly one of the two settled states.  Settled
/// sessions accept input again; clearing the conversation returns to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeState {
    #[default]
    Idle,
    Sending,
    SettledSuccess,
    SettledError,
}

impl ExchangeState {
    /// True when a new message may be sent.
    pub fn accepts_input(&self) -> bool {
        !matches!(self, ExchangeState::Sending)
    }
}

/// What a send did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The input was blank; nothing was appended and nothing was sent.
    Ignored,
    /// The assistant answered.
    Answered,
    /// The exchange failed and a fallback message was appended.
    Failed,
}

/// One conversation with the assistant.
pub struct ChatSession<A: ChatApi = GustoBot, S: SessionStore = FileStore> {
    api: A,
    store: S,
    user_id: String,
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
    state: ExchangeState,
    last_outcome: Option<SendOutcome>,
    pending_file_path: Option<String>,
    pending_image_path: Option<String>,
}

impl<A: ChatApi, S: SessionStore> ChatSession<A, S> {
    /// Creates a session, restoring the persisted session id from `store`.
    pub fn new(api: A, store: S) -> Self {
        let session_id = store.get(SESSION_ID_KEY).filter(|id| !id.is_empty());
        if let Some(id) = &session_id {
            tracing::debug!(session_id = %id, "restored session id");
        }
        Self {
            api,
            store,
            user_id: DEFAULT_USER_ID.to_string(),
            session_id,
            messages: Vec::new(),
            state: ExchangeState::Idle,
            last_outcome: None,
            pending_file_path: None,
            pending_image_path: None,
        }
    }

    /// Sets the user id sent with every request.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// The API this session talks to.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The user id sent with every request.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The server-assigned session id, if one has been received.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The transcript, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// True when a new message may be sent.
    pub fn can_send(&self) -> bool {
        self.state.accepts_input()
    }

    /// The outcome of the most recent non-blank send.
    pub fn last_outcome(&self) -> Option<SendOutcome> {
        self.last_outcome
    }

    /// The stored path of the last uploaded document not yet sent.
    pub fn pending_file_path(&self) -> Option<&str> {
        self.pending_file_path.as_deref()
    }

    /// The stored path of the last uploaded image not yet sent.
    pub fn pending_image_path(&self) -> Option<&str> {
        self.pending_image_path.as_deref()
    }

    /// Appends a message to the transcript.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Clears the conversation history.
    ///
    /// The session id is kept, so the next message continues the same
    /// conversation on the service.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.state = ExchangeState::Idle;
    }

    /// Starts over: clears the transcript and forgets the session id.
    pub fn new_conversation(&mut self) -> Result<()> {
        self.clear();
        self.last_outcome = None;
        self.pending_file_path = None;
        self.pending_image_path = None;
        self.forget_session_id()
    }

    /// Sends a message and waits for the complete answer.
    ///
    /// Blank input is ignored.  Otherwise the user message is appended
    /// immediately and exactly one assistant message follows, either the
    /// answer or a fallback flagged with `error`.
    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let Some(text) = self.admit(text) else {
            return SendOutcome::Ignored;
        };
        let start = Instant::now();

        let request = ChatRequest::new(text.as_str())
            .with_session_id(self.session_id.clone())
            .with_user_id(self.user_id.as_str());

        let outcome = match self.api.send_message(&request).await {
            Ok(response) => {
                if let Some(id) = response.session_id.as_deref() {
                    self.adopt_session_id(id);
                }
                let content = response.text().unwrap_or(NO_REPLY_TEXT).to_string();
                let reply = ChatMessage::assistant(content)
                    .with_route(response.route())
                    .with_sources(response.sources.clone());
                self.settle_success(reply)
            }
            Err(err) => self.settle_failure(Operation::SendMessage, err),
        };
        SESSION_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
        outcome
    }

    /// Sends a message and streams the answer.
    ///
    /// `on_chunk` sees every decoded event in order.  Cancelling `cancel`
    /// stops reading; whatever text arrived so far becomes the reply.  An
    /// `error` event ends the exchange as a failure carrying its text.  Any
    /// pending upload paths are sent with this message and then cleared.
    pub async fn send_stream_message<F>(
        &mut self,
        text: &str,
        cancel: &StreamCancel,
        mut on_chunk: F,
    ) -> SendOutcome
    where
        F: FnMut(&StreamEvent),
    {
        let Some(text) = self.admit(text) else {
            return SendOutcome::Ignored;
        };
        let start = Instant::now();

        let params = StreamParams::new(text.as_str())
            .with_session_id(self.session_id.clone())
            .with_user_id(self.user_id.as_str())
            .with_file_path(self.pending_file_path.take())
            .with_image_path(self.pending_image_path.take());

        let mut stream = match self.api.stream_message(&params, cancel.clone()).await {
            Ok(stream) => stream,
            Err(err) => {
                SESSION_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
                return self.settle_failure(Operation::StreamMessage, err);
            }
        };

        let mut reply = PendingReply::default();
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let Some(id) = reply.absorb(&event) {
                        self.adopt_session_id(&id);
                    }
                    on_chunk(&event);
                    if event.is_error() {
                        SESSION_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
                        let content = event.error_text().unwrap_or(SEND_FAILURE_TEXT).to_string();
                        let err = Error::streaming(
                            format!("service reported an error: {}", content),
                            None,
                        );
                        return self.settle_failure_with(Operation::StreamMessage, err, content);
                    }
                }
                Err(err) => {
                    SESSION_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
                    return self.settle_failure(Operation::StreamMessage, err);
                }
            }
        }
        if cancel.is_cancelled() {
            tracing::debug!(chars = reply.text.chars().count(), "stream cancelled by caller");
        }

        SESSION_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
        self.settle_success(reply.into_message())
    }

    /// Deletes the conversation on the service, then resets locally.
    ///
    /// The local transcript and persisted id are dropped even when the remote
    /// call fails; that failure is still returned.
    pub async fn clear_history(&mut self) -> Result<()> {
        let remote = match self.session_id.clone() {
            Some(id) => self
                .api
                .clear_session(&id)
                .await
                .map(|_| ())
                .map_err(|err| Error::exchange(Operation::ClearSession, err)),
            None => Ok(()),
        };
        let local = self.new_conversation();
        if let Err(err) = &remote {
            tracing::warn!(error = %err, "remote session was not cleared");
        }
        remote.and(local)
    }

    /// Fetches this conversation's history as stored by the service.
    pub async fn history(&self) -> Result<Value> {
        let Some(id) = self.session_id.as_deref() else {
            return Err(Error::exchange(
                Operation::History,
                Error::validation("no session id yet", Some("session_id".to_string())),
            ));
        };
        self.api
            .history(id)
            .await
            .map_err(|err| Error::exchange(Operation::History, err))
    }

    /// Fetches the catalog of routes the service dispatches to.
    pub async fn routes(&self) -> Result<Value> {
        self.api
            .routes()
            .await
            .map_err(|err| Error::exchange(Operation::Routes, err))
    }

    /// Fetches knowledge base statistics.
    pub async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        self.api
            .knowledge_stats()
            .await
            .map_err(|err| Error::exchange(Operation::KnowledgeStats, err))
    }

    /// Searches the knowledge base; the transcript is left untouched.
    pub async fn search_knowledge(&self, search: &KnowledgeSearch) -> Result<SearchResults> {
        self.api
            .search_knowledge(search)
            .await
            .map_err(|err| Error::exchange(Operation::SearchKnowledge, err))
    }

    /// Adds a recipe to the knowledge base.
    pub async fn add_recipe(&self, recipe: &Value) -> Result<Value> {
        self.api
            .add_recipe(recipe)
            .await
            .map_err(|err| Error::exchange(Operation::AddRecipe, err))
    }

    pub async fn system_status(&self) -> Result<Value> {
        self.api
            .system_status()
            .await
            .map_err(|err| Error::exchange(Operation::SystemStatus, err))
    }

    /// Uploads a document; its stored path rides along with the next streamed message.
    pub async fn upload_file(&mut self, attachment: Attachment) -> Result<UploadResponse> {
        let response = self
            .api
            .upload_file(attachment)
            .await
            .map_err(|err| Error::exchange(Operation::UploadFile, err))?;
        if let Some(path) = response.stored_path() {
            self.pending_file_path = Some(path.to_string());
        }
        Ok(response)
    }

    /// Uploads an image; its stored path rides along with the next streamed message.
    pub async fn upload_image(&mut self, attachment: Attachment) -> Result<UploadResponse> {
        let response = self
            .api
            .upload_image(attachment)
            .await
            .map_err(|err| Error::exchange(Operation::UploadImage, err))?;
        if let Some(path) = response.stored_path() {
            self.pending_image_path = Some(path.to_string());
        }
        Ok(response)
    }

    /// Saves the transcript to the specified path.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(self.session_id.clone(), &self.messages);
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Loads a transcript from disk, replacing the current conversation.
    ///
    /// A session id recorded in the file is adopted and persisted.
    pub fn load_transcript_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(Error::validation(
                format!("unsupported transcript version {}", transcript.version),
                Some("version".to_string()),
            ));
        }
        self.messages = transcript.messages;
        self.state = ExchangeState::Idle;
        if let Some(id) = transcript.session_id.as_deref() {
            self.adopt_session_id(id);
        }
        Ok(())
    }

    /// Trims `text`, appends it as a user message and enters `Sending`.
    fn admit(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            SESSION_IGNORED.click();
            return None;
        }
        if self.state == ExchangeState::Sending {
            // The previous exchange was dropped before it settled.
            tracing::warn!("previous exchange was abandoned");
            self.messages.push(ChatMessage::failure(SEND_FAILURE_TEXT));
            self.state = ExchangeState::SettledError;
        }
        SESSION_EXCHANGES.click();
        self.messages.push(ChatMessage::user(text));
        self.state = ExchangeState::Sending;
        Some(text.to_string())
    }

    fn settle_success(&mut self, reply: ChatMessage) -> SendOutcome {
        self.messages.push(reply);
        self.state = ExchangeState::SettledSuccess;
        self.last_outcome = Some(SendOutcome::Answered);
        SendOutcome::Answered
    }

    fn settle_failure(&mut self, operation: Operation, err: Error) -> SendOutcome {
        let content = err.detail().unwrap_or(SEND_FAILURE_TEXT).to_string();
        self.settle_failure_with(operation, err, content)
    }

    fn settle_failure_with(
        &mut self,
        operation: Operation,
        err: Error,
        content: String,
    ) -> SendOutcome {
        SESSION_FALLBACKS.click();
        let err = Error::exchange(operation, err);
        tracing::warn!(operation = operation.name(), error = ?err, "exchange failed");
        self.messages.push(ChatMessage::failure(content));
        self.state = ExchangeState::SettledError;
        self.last_outcome = Some(SendOutcome::Failed);
        SendOutcome::Failed
    }

    fn adopt_session_id(&mut self, id: &str) {
        if id.is_empty() || self.session_id.as_deref() == Some(id) {
            return;
        }
        tracing::debug!(session_id = %id, "adopting session id");
        self.session_id = Some(id.to_string());
        if let Err(err) = self.store.set(SESSION_ID_KEY, id) {
            tracing::warn!(error = %err, "failed to persist session id");
        }
    }

    fn forget_session_id(&mut self) -> Result<()> {
        self.session_id = None;
        self.store.remove(SESSION_ID_KEY)
    }
}

/// The reply being assembled from stream events.
#[derive(Default)]
struct PendingReply {
    text: String,
    route: Option<Route>,
    sources: Option<Vec<Source>>,
}

impl PendingReply {
    /// Folds `event` in, returning a session id the event announced.
    fn absorb(&mut self, event: &StreamEvent) -> Option<String> {
        if let Some(text) = event.text() {
            self.text.push_str(text);
        }
        if let Some(route) = event.route() {
            self.route = Some(route);
        }
        if let Some(sources) = event.sources() {
            self.sources = Some(sources);
        }
        event.session_id().map(String::from)
    }

    fn into_message(self) -> ChatMessage {
        let content = if self.text.is_empty() {
            NO_REPLY_TEXT.to_string()
        } else {
            self.text
        };
        ChatMessage::assistant(content)
            .with_route(self.route)
            .with_sources(self.sources)
    }
}

const TRANSCRIPT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
}

impl TranscriptFile {
    fn new(session_id: Option<String>, messages: &[ChatMessage]) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            session_id,
            messages: messages.to_vec(),
        }
    }
}

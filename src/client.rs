use std::env;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::ChatApi;
use crate::error::{Error, Operation, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UPLOAD_BYTES,
    CLIENT_UPLOADS, STREAM_OPENED,
};
use crate::sse::process_sse;
use crate::stream::{ChatStream, StreamCancel};
use crate::types::{
    Attachment, ChatRequest, ChatResponse, KnowledgeSearch, KnowledgeStats, SearchResults,
    StreamParams, UploadResponse, validate_recipe,
};

/// Environment variable naming the service base URL.
pub const API_URL_ENV: &str = "GUSTOBOT_API_URL";
/// Environment variable naming the knowledge base URL.
pub const KNOWLEDGE_URL_ENV: &str = "GUSTOBOT_KNOWLEDGE_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000/";
const KNOWLEDGE_PREFIX: &str = "api/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the GustoBot assistant service.
#[derive(Debug, Clone)]
pub struct GustoBot {
    client: ReqwestClient,
    base_url: Url,
    knowledge_url: Url,
    timeout: Duration,
    upload_timeout: Duration,
}

impl GustoBot {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the GUSTOBOT_API_URL
    /// environment variable; it defaults to a service on localhost.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// The knowledge base URL falls back to GUSTOBOT_KNOWLEDGE_URL and then to
    /// `{base}/api/v1/`.
    pub fn with_options(
        base_url: Option<String>,
        knowledge_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var(API_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let base_url = parse_base_url(&base_url)?;
        let knowledge_url = match knowledge_url.or_else(|| env::var(KNOWLEDGE_URL_ENV).ok()) {
            Some(url) => parse_base_url(&url)?,
            None => base_url.join(KNOWLEDGE_PREFIX)?,
        };

        // Timeouts are applied per request; the event stream must not have one.
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            knowledge_url,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        })
    }

    /// Override the timeout applied to uploads.
    pub fn with_upload_timeout(mut self, upload_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }

    /// The service base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The knowledge base URL, always ending in `/`.
    pub fn knowledge_url(&self) -> &Url {
        &self.knowledge_url
    }

    /// The timeout applied to ordinary requests.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The timeout applied to uploads.
    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        endpoint_at(&self.base_url, segments)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Send `request` and reject non-2xx responses.
    async fn execute(
        &self,
        operation: Operation,
        request: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        tracing::debug!(operation = operation.name(), "sending request");
        let request = match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };

        let start = Instant::now();
        let result = request.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                CLIENT_REQUEST_ERRORS.click();
                let err = transport_error(e, timeout);
                tracing::debug!(operation = operation.name(), error = %err, "request failed");
                return Err(err);
            }
        };

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::debug!(operation = operation.name(), error = %err, "request rejected");
            return Err(err);
        }

        tracing::debug!(
            operation = operation.name(),
            status = response.status().as_u16(),
            "request finished"
        );
        Ok(response)
    }

    /// Process API response errors and convert to our Error type.
    ///
    /// The service reports failures as `{"detail": ...}`; a string detail is
    /// kept verbatim and any other JSON detail is kept in its serialized form.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<Value>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.detail)
            .map(|detail| match detail {
                Value::String(detail) => detail,
                other => other.to_string(),
            })
            .filter(|detail| !detail.trim().is_empty());

        let message = match &detail {
            Some(detail) => detail.clone(),
            None => status
                .canonical_reason()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status_code)),
        };

        Error::api(status_code, detail, message, request_id)
    }

    async fn read_body(&self, response: Response, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        Ok(bytes.to_vec())
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let body = self.read_body(response, timeout).await?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Like `read_json`, but an empty body reads as `null`.
    async fn read_value(&self, response: Response, timeout: Option<Duration>) -> Result<Value> {
        let body = self.read_body(response, timeout).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    async fn get_value(&self, operation: Operation, url: Url) -> Result<Value> {
        let request = self
            .client
            .get(url)
            .headers(Self::default_headers());
        let response = self.execute(operation, request, Some(self.timeout)).await?;
        self.read_value(response, Some(self.timeout)).await
    }

    async fn post_value<B: serde::Serialize + ?Sized>(
        &self,
        operation: Operation,
        url: Url,
        body: &B,
    ) -> Result<Response> {
        let request = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(body);
        self.execute(operation, request, Some(self.timeout)).await
    }

    async fn upload(
        &self,
        operation: Operation,
        url: Url,
        field: &'static str,
        attachment: Attachment,
    ) -> Result<UploadResponse> {
        CLIENT_UPLOADS.click();
        CLIENT_UPLOAD_BYTES.count(attachment.bytes.len() as u64);
        tracing::debug!(
            file_name = %attachment.file_name,
            mime_type = %attachment.mime_type,
            bytes = attachment.bytes.len(),
            "uploading attachment"
        );

        let part = Part::bytes(attachment.bytes)
            .file_name(attachment.file_name)
            .mime_str(&attachment.mime_type)
            .map_err(|e| {
                Error::validation(
                    format!("Invalid MIME type `{}`: {}", attachment.mime_type, e),
                    Some("mime_type".to_string()),
                )
            })?;
        let form = Form::new().part(field, part);

        let request = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .multipart(form);
        let timeout = Some(self.upload_timeout);
        let response = self.execute(operation, request, timeout).await?;
        let value = self.read_value(response, timeout).await?;
        if value.is_null() {
            return Ok(UploadResponse::default());
        }
        serde_json::from_value(value).map_err(|e| {
            Error::serialization(
                format!("Failed to parse upload response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait::async_trait]
impl ChatApi for GustoBot {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.endpoint(&["api", "v1", "chat", "chat"])?;
        let request = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(request);
        let response = self
            .execute(Operation::SendMessage, request, Some(self.timeout))
            .await?;
        self.read_json(response, Some(self.timeout)).await
    }

    async fn stream_message(
        &self,
        params: &StreamParams,
        cancel: StreamCancel,
    ) -> Result<ChatStream> {
        let mut url = self.endpoint(&["api", "v1", "chat", "chat", "stream"])?;
        url.query_pairs_mut().extend_pairs(params.query_pairs());

        let mut headers = Self::default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let request = self.client.get(url).headers(headers);
        let response = self
            .execute(Operation::StreamMessage, request, None)
            .await?;
        STREAM_OPENED.click();

        let events = process_sse(response.bytes_stream());
        Ok(ChatStream::new(events, cancel))
    }

    async fn history(&self, session_id: &str) -> Result<Value> {
        let url = self.endpoint(&["api", "v1", "chat", "history", session_id])?;
        self.get_value(Operation::History, url).await
    }

    async fn clear_session(&self, session_id: &str) -> Result<Value> {
        let url = self.endpoint(&["api", "v1", "chat", "session", session_id])?;
        let request = self
            .client
            .delete(url)
            .headers(Self::default_headers());
        let response = self
            .execute(Operation::ClearSession, request, Some(self.timeout))
            .await?;
        self.read_value(response, Some(self.timeout)).await
    }

    async fn routes(&self) -> Result<Value> {
        let url = self.endpoint(&["api", "v1", "chat", "routes"])?;
        self.get_value(Operation::Routes, url).await
    }

    async fn upload_file(&self, attachment: Attachment) -> Result<UploadResponse> {
        let url = self.endpoint(&["api", "v1", "upload", "upload", "file"])?;
        self.upload(Operation::UploadFile, url, "file", attachment)
            .await
    }

    async fn upload_image(&self, attachment: Attachment) -> Result<UploadResponse> {
        let url = self.endpoint(&["api", "v1", "upload", "upload", "image"])?;
        self.upload(Operation::UploadImage, url, "image", attachment)
            .await
    }

    async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        let url = endpoint_at(&self.knowledge_url, &["knowledge", "stats"])?;
        let request = self
            .client
            .get(url)
            .headers(Self::default_headers());
        let response = self
            .execute(Operation::KnowledgeStats, request, Some(self.timeout))
            .await?;
        self.read_json(response, Some(self.timeout)).await
    }

    async fn search_knowledge(&self, search: &KnowledgeSearch) -> Result<SearchResults> {
        search.validate()?;
        let url = endpoint_at(&self.knowledge_url, &["knowledge", "search"])?;
        let response = self
            .post_value(Operation::SearchKnowledge, url, search)
            .await?;
        self.read_json(response, Some(self.timeout)).await
    }

    async fn add_recipe(&self, recipe: &Value) -> Result<Value> {
        validate_recipe(recipe)?;
        let url = endpoint_at(&self.knowledge_url, &["knowledge", "recipes"])?;
        let response = self.post_value(Operation::AddRecipe, url, recipe).await?;
        self.read_value(response, Some(self.timeout)).await
    }

    async fn system_status(&self) -> Result<Value> {
        let url = self.endpoint(&["api", "v1", "chat", "status"])?;
        self.get_value(Operation::SystemStatus, url).await
    }
}

/// Map a reqwest failure onto the error taxonomy.
fn transport_error(e: reqwest::Error, timeout: Option<Duration>) -> Error {
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {}", e),
            timeout.map(|t| t.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(format!("{} cannot be a base URL", raw), None));
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base`.
fn endpoint_at(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::url(format!("{} cannot be a base URL", base), None))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

//! Transport layer for the generation backend.
//!
//! [`GenerationBackend`] is the seam between the orchestration logic and
//! the wire: it moves raw JSON bodies and leaves all interpretation to
//! the submission client, the poller and the result fetcher.
//! [`HttpBackend`] implements it over HTTP using [`reqwest`].

use async_trait::async_trait;
use reqwest::Url;
use scei_core::generation::SubmitRequest;
use scei_core::types::GenerationKind;
use serde_json::Value;

use crate::config::ClientConfig;

/// Status code and decoded JSON body of a backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` when the response had no body.
    pub body: Value,
}

/// Errors from the backend transport layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot carry path segments.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// The three per-kind, per-subject endpoints a generation job uses.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Ask the backend to start a generation job.
    async fn submit(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        request: &SubmitRequest,
    ) -> Result<ApiResponse, ApiError>;

    /// Fetch the current status body of a job.
    async fn status(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        job_id: &str,
    ) -> Result<Value, ApiError>;

    /// Fetch the generated content body of a completed job.
    async fn content(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        job_id: &str,
    ) -> Result<Value, ApiError>;
}

/// HTTP client for the SCEI REST backend.
///
/// Endpoints, where `{segment}` is `study-guide` or `presentation`:
///
/// | Operation | Request |
/// |-----------|---------|
/// | submit    | `POST {base}/units/{subject}/{segment}/generate` |
/// | status    | `GET {base}/units/{subject}/{segment}/status/{job_id}` |
/// | content   | `GET {base}/units/{subject}/{segment}/content?job_id={job_id}` |
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend client for `api_url`, e.g. `http://host:8000/api`.
    pub fn new(api_url: &str) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a backend client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(api_url).map_err(|e| ApiError::InvalidUrl(format!("{api_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(api_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Build a client from [`ClientConfig`], applying its request timeout
    /// and bearer token.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let backend = Self::with_client(client, &config.api_url)?;
        Ok(match &config.api_token {
            Some(token) => backend.with_token(token.clone()),
            None => backend,
        })
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Build `{base}/units/{subject}/{segment}/{tail...}` with each segment
    /// percent-encoded.
    pub fn endpoint(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        tail: &[&str],
    ) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("units")
            .push(subject_id)
            .push(kind.path_segment())
            .extend(tail);
        Ok(url)
    }

    // ---- private helpers ----

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Decode a successful response body. An empty body decodes to
    /// `Value::Null`.
    async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn submit(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        request: &SubmitRequest,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint(kind, subject_id, &["generate"])?;
        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let body = Self::read_json(response).await?;
        Ok(ApiResponse { status, body })
    }

    async fn status(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        job_id: &str,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(kind, subject_id, &["status", job_id])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_json(Self::ensure_success(response).await?).await
    }

    async fn content(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        job_id: &str,
    ) -> Result<Value, ApiError> {
        let mut url = self.endpoint(kind, subject_id, &["content"])?;
        url.query_pairs_mut().append_pair("job_id", job_id);
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_json(Self::ensure_success(response).await?).await
    }
}

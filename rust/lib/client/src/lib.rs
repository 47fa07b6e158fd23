//! HTTP client for the brokerage backend.
//!
//! Requests go through the [`HttpClient`] trait so the session and form
//! logic can run against any transport. [`RestClient`] is the `reqwest`
//! implementation; authentication is handled by a pluggable [`TokenSource`].
//!
//! A non-2xx status is not an error at this layer: callers get the status
//! code and body back and decide (e.g. `409` on application submission).
//! Only transport and decoding failures are [`ApiError`]s.
//!
//! # Usage
//!
//! ```ignore
//! use broker_client::{ApiRequest, HttpClient, RestClient, StaticToken};
//!
//! let client = RestClient::new("http://localhost:8002/api/v1", Arc::new(StaticToken::new("T1")))?;
//! let resp = client.request(ApiRequest::get("/buildings-for-application")).await?;
//! let env = resp.envelope::<Vec<serde_json::Value>>()?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ── Error ───────────────────────────────────────────────────────────

/// Client-side API error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout, TLS error.
    #[error("network: {0}")]
    Network(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),

    /// A local file to upload could not be read.
    #[error("io: {0}")]
    Io(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every authenticated request.
///
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication: anonymous requests.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Static bearer token (already obtained externally).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

// ── Request / response ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A local file sent as one multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub path: PathBuf,
}

/// A request relative to the client's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    /// Sent as `multipart/form-data` instead of a JSON body.
    pub file: Option<FilePart>,
    /// Attach the bearer token when the token source has one.
    pub auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            file: None,
            auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// `POST` a file under form field `field`.
    pub fn upload(path: impl Into<String>, field: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        let mut req = Self::new(Method::Post, path);
        req.file = Some(FilePart {
            field: field.into(),
            path: file.into(),
        });
        req
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without an Authorization header.
    pub fn anonymous(mut self) -> Self {
        self.auth = false;
        self
    }
}

/// Raw response: HTTP status plus the decoded body.
///
/// An empty body decodes to `Null`; a non-JSON body is kept as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub data: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status_code: u16, data: serde_json::Value) -> Self {
        Self { status_code, data }
    }

    /// Decode the body as the backend's `{code, message, data}` envelope.
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<Envelope<T>, ApiError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| ApiError::Decode(format!("envelope: {}", e)))
    }

    /// Server-provided message, if the body carries one.
    pub fn message(&self) -> Option<String> {
        self.data
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .or_else(|| self.data.as_str().filter(|s| !s.is_empty()).map(|s| s.to_string()))
    }
}

/// Business envelope wrapping every backend payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Business code for success.
pub const CODE_OK: i64 = 200;

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

// ── HttpClient ──────────────────────────────────────────────────────

/// Request/response transport.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync + 'static {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// `reqwest`-backed client rooted at a base URL.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`RestClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RestConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002/api/v1".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RestClient {
    pub fn from_config(config: &RestConfig, token_source: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        Self::with_timeout(config.base_url.clone(), token_source, config.timeout)
    }

    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, token_source, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a request with auth header.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for RestClient {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url(&req.path);
        let mut builder = match req.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        if let Some(file) = &req.file {
            builder = builder.multipart(multipart_form(file).await?);
        } else if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        if req.auth {
            builder = self.authed(builder).await?;
        }

        let resp = builder.send().await?;
        let status_code = resp.status().as_u16();
        let text = resp.text().await?;
        tracing::debug!("{:?} {} -> {}", req.method, req.path, status_code);

        let data = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };
        Ok(ApiResponse { status_code, data })
    }
}

async fn multipart_form(file: &FilePart) -> Result<reqwest::multipart::Form, ApiError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| ApiError::Io(format!("{}: {}", file.path.display(), e)))?;
    let name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.field.clone());
    let part = reqwest::multipart::Part::bytes(bytes).file_name(name);
    Ok(reqwest::multipart::Form::new().part(file.field.clone(), part))
}

//! # Remote API
//!
//! The store server's REST surface as seen by the sync engine.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET  /api/products     ─┐                                             │
//! │  GET  /api/categories    ├─► JSON array, anything else is malformed    │
//! │  GET  /api/customers    ─┘                                             │
//! │                                                                         │
//! │  POST /api/sales        ──► body = queued payload                      │
//! │                             header X-CSRFToken                          │
//! │                             non-2xx = failure for that operation        │
//! │                                                                         │
//! │  GET  <probe_path>      ──► any HTTP answer means reachable            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Redirects are not followed: a session that expired answers with a redirect
//! to the login page, which must count as a failure rather than a 200.

use async_trait::async_trait;
use reqwest::{header, redirect, Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use norko_core::ReferenceCollection;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Endpoint receiving queued sales.
pub const SALES_ENDPOINT: &str = "/api/sales";

/// Header carrying the CSRF token on mutations.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Longest server body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Calls the sync engine makes against the server.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetches a full reference snapshot.
    async fn fetch_collection(&self, collection: ReferenceCollection) -> SyncResult<Vec<Value>>;

    /// Submits a `create_sale` payload; returns the server's answer.
    async fn submit_sale(&self, payload: &Value) -> SyncResult<Value>;

    /// Succeeds when the server answers at all.
    async fn probe(&self) -> SyncResult<()>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed [`RemoteApi`].
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: Url,
    csrf_token: Option<String>,
    session_cookie: Option<String>,
    probe_path: String,
}

impl HttpRemoteApi {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpRemoteApi {
            client,
            base_url,
            csrf_token: None,
            session_cookie: None,
            probe_path: "/".to_string(),
        })
    }

    /// Builds a client from the `[server]` and `[connectivity]` sections.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let mut api = Self::new(&config.server.base_url, config.request_timeout())?
            .with_probe_path(&config.connectivity.probe_path);
        api.csrf_token = config.server.csrf_token.clone();
        api.session_cookie = config.server.session_cookie.clone();
        Ok(api)
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    /// Resolves an absolute endpoint path against the base URL, keeping any
    /// path prefix the base URL has.
    fn url(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session_cookie {
            Some(ref cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }

    /// Maps a non-2xx response to [`SyncError::ServerRejected`], otherwise
    /// returns the body text.
    async fn read_success(response: Response) -> SyncResult<String> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::ServerRejected {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_collection(&self, collection: ReferenceCollection) -> SyncResult<Vec<Value>> {
        let url = self.url(collection.endpoint())?;
        debug!(collection = %collection, %url, "Fetching reference collection");

        let response = self
            .with_session(self.client.get(url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let body = Self::read_success(response).await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("{}: {}", collection, e)))?;

        match value {
            Value::Array(items) => Ok(items),
            other => Err(SyncError::MalformedResponse(format!(
                "{}: expected a JSON array, got {}",
                collection,
                json_kind(&other)
            ))),
        }
    }

    async fn submit_sale(&self, payload: &Value) -> SyncResult<Value> {
        let url = self.url(SALES_ENDPOINT)?;
        debug!(%url, "Submitting sale");

        let response = self
            .with_session(self.client.post(url))
            .header(CSRF_HEADER, self.csrf_token.as_deref().unwrap_or(""))
            .json(payload)
            .send()
            .await?;

        let body = Self::read_success(response).await?;
        let answer: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if answer.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(SyncError::ServerRejected {
                status: 200,
                body: truncate(&body),
            });
        }

        Ok(answer)
    }

    async fn probe(&self) -> SyncResult<()> {
        let url = self.url(&self.probe_path)?;
        let response = self.with_session(self.client.head(url)).send().await?;
        debug!(status = %response.status(), "Probe answered");
        Ok(())
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

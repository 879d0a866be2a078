//! Users API client (reqwest-based).
//!
//! Provides a `UsersClient` for the lookup, deactivate, delete and create
//! operations. Every call returns the raw status, the rate-limit reset header
//! and the body; interpreting them is left to the caller.

use crate::auth::{ApiAuth, ApiCredentials};
use crate::error::{ClientError, ClientResult};
use crate::models::{ErrorDetails, NewUser};
use crate::retry::TransportRetry;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Header carrying the epoch second at which the current rate-limit window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "X-Rate-Limit-Reset";

/// Settings needed to build a [`UsersClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://example.okta.com/api/v1`.
    pub base_url: String,
    pub credentials: ApiCredentials,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: TransportRetry,
}

/// Outcome of a request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `X-Rate-Limit-Reset` header, if present and numeric.
    pub rate_limit_reset: Option<i64>,
    pub body: String,
}

impl ApiResponse {
    /// Whether the call succeeded. The API answers 200 on every success path
    /// the loader relies on.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
    }

    /// Error code and cause for this response, see [`ErrorDetails::from_body`].
    #[must_use]
    pub fn error_details(&self, fallback_cause: &str) -> ErrorDetails {
        ErrorDetails::from_body(&self.body, self.status, fallback_cause)
    }

    async fn read(response: reqwest::Response) -> ClientResult<Self> {
        let status = response.status().as_u16();
        let rate_limit_reset = response
            .headers()
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());
        let body = response.text().await?;
        Ok(Self {
            status,
            rate_limit_reset,
            body,
        })
    }
}

/// HTTP client for the users endpoints of the identity API.
///
/// Each worker owns its own instance; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct UsersClient {
    base_url: Url,
    auth: ApiAuth,
    http_client: Client,
    retry: TransportRetry,
}

impl UsersClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("bulkload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Self::with_http_client(
            &config.base_url,
            ApiAuth::new(config.credentials),
            http_client,
            config.retry,
        )
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    pub fn with_http_client(
        base_url: &str,
        auth: ApiAuth,
        http_client: Client,
        retry: TransportRetry,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("Invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "Base URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            auth,
            http_client,
            retry,
        })
    }

    // ── User Operations ───────────────────────────────────────────────

    /// Look up a user by id or login (GET /users/:id).
    pub async fn get_user(&self, id: &str) -> ClientResult<ApiResponse> {
        let url = self.url(&["users", id]);
        self.send("get_user", Method::GET, url, None).await
    }

    /// Deactivate a user (POST /users/:id/deactivate).
    pub async fn deactivate_user(&self, id: &str) -> ClientResult<ApiResponse> {
        let url = self.url(&["users", id, "deactivate"]);
        self.send("deactivate_user", Method::POST, url, None).await
    }

    /// Delete a user (DELETE /users/:id).
    pub async fn delete_user(&self, id: &str) -> ClientResult<ApiResponse> {
        let url = self.url(&["users", id]);
        self.send("delete_user", Method::DELETE, url, None).await
    }

    /// Create a user (POST /users?activate=…).
    pub async fn create_user(&self, user: &NewUser, activate: bool) -> ClientResult<ApiResponse> {
        let mut url = self.url(&["users"]);
        url.query_pairs_mut()
            .append_pair("activate", if activate { "true" } else { "false" });
        let body = serde_json::to_vec(user)?;
        self.send("create_user", Method::POST, url, Some(body)).await
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> ClientResult<ApiResponse> {
        debug!(operation, %method, %url, "Sending request");
        self.retry
            .execute(operation, || {
                let mut builder = self
                    .http_client
                    .request(method.clone(), url.clone())
                    .header(ACCEPT, "application/json");
                if let Some(bytes) = &body {
                    builder = builder
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(bytes.clone());
                }
                let builder = self.auth.apply(builder);
                async move {
                    let response = builder.send().await?;
                    ApiResponse::read(response).await
                }
            })
            .await
    }
}

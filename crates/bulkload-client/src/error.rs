//! Error types for the identity API client.

use thiserror::Error;

/// Result type alias using `ClientError`.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by the client itself.
///
/// Non-2xx responses are not errors at this layer; see
/// [`crate::client::ApiResponse`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Client could not be built from the supplied configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The stored credential hash could not be split into its components.
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),

    /// Payload serialization failed.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection retries were exhausted.
    #[error("Maximum retries exceeded after {attempts} attempt(s): {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

impl ClientError {
    /// Whether this error is a connection failure that may be retried
    /// without risk of the request having reached the server.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }
}

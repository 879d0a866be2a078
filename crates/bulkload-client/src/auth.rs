//! API authentication: SSWS API token or Bearer token.

use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;

/// Credentials for the remote identity API.
///
/// The [`Debug`] impl redacts the token to prevent accidental credential
/// exposure in log output.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiCredentials {
    /// API token sent as `Authorization: SSWS <token>`.
    Ssws { token: String },

    /// Access token sent as `Authorization: Bearer <token>`.
    Bearer { token: String },
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ssws { .. } => f
                .debug_struct("Ssws")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl ApiCredentials {
    /// Value of the `Authorization` header for these credentials.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Ssws { token } => format!("SSWS {token}"),
            Self::Bearer { token } => format!("Bearer {token}"),
        }
    }
}

/// Authentication handler applied to every outgoing request.
#[derive(Debug, Clone)]
pub struct ApiAuth {
    credentials: ApiCredentials,
}

impl ApiAuth {
    #[must_use]
    pub fn new(credentials: ApiCredentials) -> Self {
        Self { credentials }
    }

    /// Apply authentication to a request builder.
    #[must_use]
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, self.credentials.header_value())
    }
}

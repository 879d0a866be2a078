//! Request and response payloads for the identity API.

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hash algorithm name the API expects for bcrypt credentials.
pub const BCRYPT_ALGORITHM: &str = "BCRYPT";

/// Length of the encoded salt in a bcrypt hash string.
const BCRYPT_SALT_LEN: usize = 22;

/// A pre-hashed password, split into the components the API imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHash {
    pub algorithm: String,
    pub work_factor: u32,
    pub salt: String,
    pub value: String,
}

impl PasswordHash {
    /// Split a modular-crypt bcrypt string (`$2a$10$<salt><value>`).
    ///
    /// The first 22 characters after the cost are the salt, the remainder is
    /// the hash value.
    pub fn from_bcrypt(hash: &str) -> ClientResult<Self> {
        let parts: Vec<&str> = hash.trim().split('$').collect();
        let (cost, salt_and_value) = match parts.as_slice() {
            ["", _version, cost, rest] => (*cost, *rest),
            _ => {
                return Err(ClientError::InvalidHash(format!(
                    "expected $<version>$<cost>$<salt+hash>, got {} segment(s)",
                    parts.len()
                )))
            }
        };

        let work_factor = cost.parse::<u32>().map_err(|e| {
            ClientError::InvalidHash(format!("work factor '{cost}' is not a number: {e}"))
        })?;

        if !salt_and_value.is_ascii() || salt_and_value.len() <= BCRYPT_SALT_LEN {
            return Err(ClientError::InvalidHash(format!(
                "salt and value must be more than {BCRYPT_SALT_LEN} ASCII characters"
            )));
        }
        let (salt, value) = salt_and_value.split_at(BCRYPT_SALT_LEN);

        Ok(Self {
            algorithm: BCRYPT_ALGORITHM.to_string(),
            work_factor,
            salt: salt.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCredential {
    pub hash: PasswordHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub password: PasswordCredential,
}

/// Payload for `POST /users?activate=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub profile: Map<String, Value>,
    pub credentials: UserCredentials,
}

impl NewUser {
    /// Start a payload whose profile `login` is set to `login`.
    #[must_use]
    pub fn new(login: &str, hash: PasswordHash) -> Self {
        let mut profile = Map::new();
        profile.insert("login".to_string(), Value::String(login.to_string()));
        Self {
            profile,
            credentials: UserCredentials {
                password: PasswordCredential { hash },
            },
        }
    }

    /// Add a string profile attribute.
    #[must_use]
    pub fn with_profile_field(mut self, name: &str, value: &str) -> Self {
        self.profile
            .insert(name.to_string(), Value::String(value.to_string()));
        self
    }
}

/// Error body returned by the API on rejected requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error_code: String,
    error_causes: Vec<ApiErrorCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorCause {
    error_summary: String,
}

/// Error code and cause recorded alongside a failed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub code: String,
    pub cause: String,
}

impl ErrorDetails {
    /// Details for a failure that carries no usable error body.
    #[must_use]
    pub fn synthetic(status: u16, cause: impl Into<String>) -> Self {
        Self {
            code: format!("HTTP Response code : {status}"),
            cause: cause.into(),
        }
    }

    /// Extract `errorCode` and `errorCauses[0].errorSummary` from a response
    /// body, falling back to [`ErrorDetails::synthetic`] when the body is
    /// absent, not JSON, or lacks either field.
    #[must_use]
    pub fn from_body(body: &str, status: u16, fallback_cause: &str) -> Self {
        serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| {
                let summary = parsed.error_causes.into_iter().next()?.error_summary;
                Some(Self {
                    code: parsed.error_code,
                    cause: summary,
                })
            })
            .unwrap_or_else(|| Self::synthetic(status, fallback_cause))
    }
}

//! Loader configuration read from a YAML file.
//!
//! Loading is fail-fast: a missing file, malformed YAML or an invalid value
//! is a [`CliError::Config`] and the process exits before any record is read.

use crate::error::{CliError, CliResult};
use bulkload_client::{ApiCredentials, ClientConfig, TransportRetry};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api_token` from the file.
pub const API_TOKEN_ENV: &str = "BULKLOAD_API_TOKEN";

/// Columns appended to every failure row after the source columns.
pub const ERROR_CODE_COLUMN: &str = "errorCode";
pub const ERROR_CAUSE_COLUMN: &str = "errorCause";

/// Authorization scheme for the API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Ssws,
    Bearer,
}

/// Bulk loader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tenant host, e.g. `example.okta.com`. Ignored when `base_url` is set.
    #[serde(default)]
    pub org: Option<String>,

    /// Full API root; defaults to `https://{org}/api/v1`.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub auth_scheme: AuthScheme,

    /// Source columns, in output order. Accepts a YAML list or a
    /// comma-separated string.
    #[serde(deserialize_with = "string_or_list")]
    pub csv_header_row: Vec<String>,

    #[serde(default = "default_login_field")]
    pub login_field: String,

    #[serde(default = "default_profile_fields", deserialize_with = "string_or_list")]
    pub profile_fields: Vec<String>,

    #[serde(default = "default_password_field")]
    pub password_field: String,

    #[serde(default = "default_num_consumers")]
    pub num_consumers: usize,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Identifiers that must never be replaced.
    #[serde(default)]
    pub safe_list: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reconnect attempts after a connection failure.
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,

    /// Seconds added to the rate-limit reset wait.
    #[serde(default = "default_rate_limit_pad_secs")]
    pub rate_limit_pad_secs: u64,

    /// Cap on lookup retries while rate limited. Unset retries until the
    /// limit clears.
    #[serde(default)]
    pub lookup_rate_limit_retries: Option<u32>,

    /// Number of DELETE calls issued after deactivating an existing user.
    #[serde(default = "default_delete_passes")]
    pub delete_passes: u8,

    /// Pause between starting the feeder and starting the workers.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Directory for the reject/replay files; defaults to the input's directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_login_field() -> String {
    "email".to_string()
}

fn default_profile_fields() -> Vec<String> {
    ["firstName", "lastName", "email", "userId", "userUrn"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_password_field() -> String {
    "passwordBcrypt".to_string()
}

fn default_num_consumers() -> usize {
    1
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_transport_retries() -> u32 {
    3
}

fn default_rate_limit_pad_secs() -> u64 {
    5
}

fn default_delete_passes() -> u8 {
    2
}

fn default_startup_delay_ms() -> u64 {
    500
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::List(list) => list,
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

impl Config {
    /// Load, apply environment overrides, and validate.
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Cannot read configuration '{}': {e}", path.display()))
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse without validation.
    pub fn from_yaml_str(content: &str) -> CliResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.api_token = Some(token);
            }
        }
    }

    /// Check that the configuration can drive a run.
    pub fn validate(&self) -> CliResult<()> {
        if self.base_url.is_none() && self.org.as_deref().map_or(true, |o| o.trim().is_empty()) {
            return Err(CliError::Config("either 'org' or 'base_url' must be set".into()));
        }
        if self.api_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(CliError::Config(format!(
                "'api_token' must be set in the file or via {API_TOKEN_ENV}"
            )));
        }
        if self.csv_header_row.is_empty() {
            return Err(CliError::Config("'csv_header_row' must list at least one column".into()));
        }
        if self.num_consumers == 0 {
            return Err(CliError::Config("'num_consumers' must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(CliError::Config("'buffer_size' must be at least 1".into()));
        }

        let required = std::iter::once(&self.login_field)
            .chain(std::iter::once(&self.password_field))
            .chain(self.profile_fields.iter());
        for column in required {
            if !self.csv_header_row.contains(column) {
                return Err(CliError::Config(format!(
                    "column '{column}' is used for the new account but missing from 'csv_header_row'"
                )));
            }
        }
        Ok(())
    }

    /// API root URL.
    pub fn api_base_url(&self) -> String {
        match (&self.base_url, &self.org) {
            (Some(base), _) => base.clone(),
            (None, Some(org)) => format!("https://{}/api/v1", org.trim()),
            (None, None) => String::new(),
        }
    }

    /// Input columns every record must carry to build a new account.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.login_field.clone(), self.password_field.clone()];
        for field in &self.profile_fields {
            if !columns.contains(field) {
                columns.push(field.clone());
            }
        }
        columns
    }

    /// Settings for each worker's HTTP client.
    pub fn client_config(&self) -> ClientConfig {
        let token = self.api_token.clone().unwrap_or_default();
        let credentials = match self.auth_scheme {
            AuthScheme::Ssws => ApiCredentials::Ssws { token },
            AuthScheme::Bearer => ApiCredentials::Bearer { token },
        };
        ClientConfig {
            base_url: self.api_base_url(),
            credentials,
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry: TransportRetry::new(self.transport_retries),
        }
    }
}

/// Locations of the two failure files for an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub reject: PathBuf,
    pub replay: PathBuf,
}

impl OutputPaths {
    /// `users.csv` → `users_reject.csv`, `users_replay.csv`, placed in
    /// `output_dir` when given, otherwise beside the input.
    pub fn derive(input: &Path, output_dir: Option<&Path>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bulkload".to_string());
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self {
            reject: dir.join(format!("{stem}_reject.csv")),
            replay: dir.join(format!("{stem}_replay.csv")),
        }
    }
}

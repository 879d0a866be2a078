//! CLI error types and exit codes

use crate::records::SourceError;
use crate::sink::SinkError;
use bulkload_client::ClientError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Run completed (per-record failures are reported in the output files)
/// - 1: Configuration or startup error
/// - 2: Command-line usage error (reported by clap)
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("API client error: {0}")]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::Input(_)
            | CliError::Output(_)
            | CliError::Client(_)
            | CliError::Io(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => {
                Some("Run as: bulkload <config.yaml> <users.csv>, and set api_token or BULKLOAD_API_TOKEN.")
            }
            CliError::Input(_) => {
                Some("Check that the CSV header contains the login, password and profile columns.")
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(e: serde_yaml::Error) -> Self {
        CliError::Config(format!("YAML error: {}", e))
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Input(e.to_string())
    }
}

impl From<SinkError> for CliError {
    fn from(e: SinkError) -> Self {
        CliError::Output(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        assert_eq!(CliError::Config("missing".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_yaml_error_maps_to_config() {
        let yaml_err = serde_yaml::from_str::<u32>("not: [a number").unwrap_err();
        let err: CliError = yaml_err.into();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_error_display_client() {
        let err = CliError::from(ClientError::InvalidConfig("bad url".to_string()));
        assert!(err.to_string().contains("bad url"));
    }

    #[test]
    fn test_source_error_maps_to_input() {
        let err = CliError::from(SourceError::MissingColumns(vec!["email".into()]));
        assert!(matches!(err, CliError::Input(_)));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_suggestion_only_for_actionable_errors() {
        assert!(CliError::Config("x".into()).suggestion().is_some());
        assert!(CliError::Io("x".into()).suggestion().is_none());
    }
}

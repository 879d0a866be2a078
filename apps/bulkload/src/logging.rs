//! Logging setup using tracing.
//!
//! Human-readable compact output by default; flattened JSON events with
//! `--json-logs` for log aggregation. Everything goes to stderr so stdout
//! carries only the run summary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when neither `RUST_LOG` nor `--log-filter` is given.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `filter`. Calling this twice is a no-op
/// for the second call.
pub fn init_logging(filter: &str, json: bool) {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log filter '{filter}': {e}; falling back to '{DEFAULT_FILTER}'");
            EnvFilter::new(DEFAULT_FILTER)
        });

    let registry = tracing_subscriber::registry().with(filter_layer);

    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(filter = %filter, json, "Logging initialized");
    }
}

/// Initialize logging for tests (with simpler output).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_init_logging_after_test_logging_is_noop() {
        init_test_logging();
        init_logging("not a [valid filter", true);
    }
}

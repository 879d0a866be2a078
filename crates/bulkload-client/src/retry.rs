//! Bounded retry for connection-level failures.
//!
//! Only errors where the request never reached the server are retried.
//! Everything else, including every HTTP status, is returned to the caller on
//! the first attempt.

use crate::error::{ClientError, ClientResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for transport failures.
#[derive(Debug, Clone)]
pub struct TransportRetry {
    /// Maximum number of retry attempts after the first (0 = no retries).
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl TransportRetry {
    /// Create a policy with the given retry count and default delays.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Whether the error should be retried at the given attempt number.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ClientError) -> bool {
        attempt < self.max_retries && error.is_connect()
    }

    /// Delay before the retry following `attempt`:
    /// `min(base_delay_ms * 2^attempt, max_delay_ms)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    /// Execute an async operation with retry.
    ///
    /// The closure is called until it succeeds, fails with a non-connection
    /// error, or the retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ClientResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Request succeeded after reconnecting"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if attempt > 0 && error.is_connect() {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "Connection retries exhausted"
                            );
                            return Err(ClientError::MaxRetriesExceeded {
                                attempts: attempt + 1,
                                message: error.to_string(),
                            });
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after connection failure"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

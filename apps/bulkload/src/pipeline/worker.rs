//! Worker: drives the account-replacement protocol for each record.
//!
//! ```text
//! START ─(safe-listed)─> SKIPPED
//!   │
//!   v
//! CHECK_EXISTING ─200─> DEACTIVATE_AND_DELETE ─┐
//!   │  └─429─> sleep, retry lookup             │
//!   v                                          v
//! CREATE ─200─> SUCCESS
//!   ├─429─> replay file, sleep (no retry)
//!   └─other/transport─> reject file
//! ```

use super::backoff::{now_epoch_secs, rate_limit_backoff};
use super::channel::RecordReceiver;
use crate::config::Config;
use crate::context::RunContext;
use crate::records::{Record, RecordError};
use crate::sink::{FailureClass, FailureRecord, SinkError};
use bulkload_client::{ClientError, ErrorDetails, NewUser, PasswordHash, UsersClient};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Per-record behaviour shared by all workers.
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    /// Column holding the login; also the lookup key and safe-list key.
    pub login_field: String,
    /// Columns copied into the new account's profile.
    pub profile_fields: Vec<String>,
    /// Column holding the bcrypt hash.
    pub password_field: String,
    pub rate_limit_pad: Duration,
    /// `None` retries a rate-limited lookup until it succeeds.
    pub lookup_rate_limit_retries: Option<u32>,
    pub delete_passes: u8,
}

impl WorkerPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login_field: config.login_field.clone(),
            profile_fields: config.profile_fields.clone(),
            password_field: config.password_field.clone(),
            rate_limit_pad: Duration::from_secs(config.rate_limit_pad_secs),
            lookup_rate_limit_retries: config.lookup_rate_limit_retries,
            delete_passes: config.delete_passes,
        }
    }
}

/// Terminal outcome of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Safe-listed; no remote call made.
    Skipped,
    Created,
    /// Written to the reject file.
    Rejected,
    /// Written to the replay file.
    Deferred,
}

/// Why a new-account payload could not be built.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("column '{0}' is empty")]
    EmptyValue(String),

    #[error(transparent)]
    Hash(#[from] ClientError),
}

enum Lookup {
    Proceed,
    RateLimitExhausted(ErrorDetails),
}

/// One consumer of the record channel with its own HTTP client.
pub struct Worker {
    id: usize,
    client: UsersClient,
    policy: Arc<WorkerPolicy>,
    context: Arc<RunContext>,
}

impl Worker {
    pub fn new(
        id: usize,
        client: UsersClient,
        policy: Arc<WorkerPolicy>,
        context: Arc<RunContext>,
    ) -> Self {
        Self {
            id,
            client,
            policy,
            context,
        }
    }

    /// Process records until the channel is closed and drained.
    ///
    /// Returns the number of records processed. A failure-file error stops
    /// this worker only; the record in hand is lost and not counted.
    pub async fn run(self, rx: RecordReceiver) -> Result<u64, SinkError> {
        let mut processed = 0u64;
        while let Some(record) = rx.recv().await {
            let position = record.position();
            match self.process(record).await {
                Ok(outcome) => {
                    processed += 1;
                    debug!(worker = self.id, position, ?outcome, "Record finished");
                }
                Err(e) => {
                    error!(
                        worker = self.id,
                        position,
                        error = %e,
                        "Cannot record failure; worker stopping"
                    );
                    return Err(e);
                }
            }
            self.context.report_progress();
        }
        debug!(worker = self.id, processed, "Channel drained; worker exiting");
        Ok(processed)
    }

    /// Run the replacement protocol for a single record.
    pub async fn process(&self, record: Record) -> Result<RecordOutcome, SinkError> {
        let login = match self.login(&record).map(str::to_string) {
            Ok(login) => login,
            Err(e) => return self.reject(record, ErrorDetails::synthetic(400, e.to_string())),
        };

        if self.context.safe_list.contains(&login) {
            info!(worker = self.id, position = record.position(), %login, "Safe-listed; skipping");
            self.context.counters.record_skipped();
            return Ok(RecordOutcome::Skipped);
        }

        // Built before any remote call: an existing account is only removed
        // when its replacement can be submitted.
        let user = match self.build_user(&record, &login) {
            Ok(user) => user,
            Err(e) => return self.reject(record, ErrorDetails::synthetic(400, e.to_string())),
        };

        if let Lookup::RateLimitExhausted(details) = self.check_existing(&record, &login).await {
            return self.reject(record, details);
        }

        self.create(record, &login, &user).await
    }

    fn login<'r>(&self, record: &'r Record) -> Result<&'r str, PayloadError> {
        let login = record.require(&self.policy.login_field)?.trim();
        if login.is_empty() {
            return Err(PayloadError::EmptyValue(self.policy.login_field.clone()));
        }
        Ok(login)
    }

    // ── CHECK_EXISTING ────────────────────────────────────────────────

    async fn check_existing(&self, record: &Record, login: &str) -> Lookup {
        let position = record.position();
        let mut rate_limited = 0u32;

        loop {
            let response = match self.client.get_user(login).await {
                Ok(response) => response,
                Err(e) => {
                    // Provisional reject: creation still goes ahead.
                    self.context.counters.record_lookup_failure();
                    warn!(
                        worker = self.id,
                        position,
                        %login,
                        code = 400,
                        error = %e,
                        "Lookup failed; attempting creation anyway"
                    );
                    return Lookup::Proceed;
                }
            };

            if response.is_ok() {
                self.remove_existing(position, login).await;
                return Lookup::Proceed;
            }

            if !response.is_rate_limited() {
                debug!(worker = self.id, position, %login, status = response.status, "No existing account");
                return Lookup::Proceed;
            }

            let details = response.error_details("");
            if let Some(max) = self.policy.lookup_rate_limit_retries {
                if rate_limited >= max {
                    warn!(
                        worker = self.id,
                        position,
                        %login,
                        attempts = rate_limited + 1,
                        "Lookup still rate limited; giving up on record"
                    );
                    return Lookup::RateLimitExhausted(details);
                }
            }
            rate_limited += 1;
            self.context.counters.record_lookup_failure();

            let wait = rate_limit_backoff(
                response.rate_limit_reset,
                now_epoch_secs(),
                self.policy.rate_limit_pad,
            );
            warn!(
                worker = self.id,
                position,
                %login,
                status = response.status,
                code = %details.code,
                backoff_secs = wait.as_secs_f64(),
                "Lookup rate limited; backing off before retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }

    // ── DEACTIVATE_AND_DELETE ─────────────────────────────────────────

    /// Best effort: failures are logged and never change the outcome.
    async fn remove_existing(&self, position: u64, login: &str) {
        debug!(worker = self.id, position, %login, "Existing account found; removing");

        match self.client.deactivate_user(login).await {
            Ok(r) if is_success(r.status) => {}
            Ok(r) => warn!(worker = self.id, position, %login, status = r.status, "Deactivate refused"),
            Err(e) => warn!(worker = self.id, position, %login, error = %e, "Deactivate failed"),
        }

        for pass in 1..=self.policy.delete_passes {
            match self.client.delete_user(login).await {
                Ok(r) if is_success(r.status) => {}
                // A repeat delete of an already removed account is expected to miss.
                Ok(r) if pass > 1 => {
                    debug!(worker = self.id, position, %login, pass, status = r.status, "Repeat delete ignored");
                }
                Ok(r) => warn!(worker = self.id, position, %login, pass, status = r.status, "Delete refused"),
                Err(e) => warn!(worker = self.id, position, %login, pass, error = %e, "Delete failed"),
            }
        }
    }

    // ── CREATE ────────────────────────────────────────────────────────

    async fn create(
        &self,
        record: Record,
        login: &str,
        user: &NewUser,
    ) -> Result<RecordOutcome, SinkError> {
        let response = match self.client.create_user(user, true).await {
            Ok(response) => response,
            Err(e) => return self.reject(record, ErrorDetails::synthetic(400, e.to_string())),
        };

        if response.is_ok() {
            self.context.counters.record_success();
            debug!(worker = self.id, position = record.position(), %login, "Account created");
            return Ok(RecordOutcome::Created);
        }

        let details = response.error_details("");
        if !response.is_rate_limited() {
            return self.reject(record, details);
        }

        let wait = rate_limit_backoff(
            response.rate_limit_reset,
            now_epoch_secs(),
            self.policy.rate_limit_pad,
        );
        warn!(
            worker = self.id,
            position = record.position(),
            %login,
            code = %details.code,
            backoff_secs = wait.as_secs_f64(),
            "Create rate limited; record deferred to replay file"
        );
        self.context
            .sinks
            .record(&FailureRecord::new(record, details), FailureClass::RateLimitReplay)?;
        tokio::time::sleep(wait).await;
        Ok(RecordOutcome::Deferred)
    }

    fn build_user(&self, record: &Record, login: &str) -> Result<NewUser, PayloadError> {
        let hash = record.require(&self.policy.password_field)?;
        let mut user = NewUser::new(login, PasswordHash::from_bcrypt(hash.trim())?);
        for field in &self.policy.profile_fields {
            user = user.with_profile_field(field, record.require(field)?);
        }
        Ok(user)
    }

    fn reject(&self, record: Record, details: ErrorDetails) -> Result<RecordOutcome, SinkError> {
        warn!(
            worker = self.id,
            position = record.position(),
            code = %details.code,
            cause = %details.cause,
            "Record rejected"
        );
        self.context
            .sinks
            .record(&FailureRecord::new(record, details), FailureClass::PermanentReject)?;
        Ok(RecordOutcome::Rejected)
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Counters;
    use crate::pipeline::progress::RunProgress;
    use crate::records::Header;
    use crate::safelist::SafeList;
    use crate::sink::{FailureSink, FailureSinks};
    use bulkload_client::{ApiAuth, ApiCredentials, TransportRetry};

    const HASH: &str = "$2a$10$rwh3vH166HCH/NT9XV5FYuqaMqvAPULkbiQzkTCWo5XDcvzpk8Tna";

    fn policy() -> WorkerPolicy {
        WorkerPolicy {
            login_field: "email".into(),
            profile_fields: vec!["firstName".into(), "email".into()],
            password_field: "passwordBcrypt".into(),
            rate_limit_pad: Duration::from_millis(10),
            lookup_rate_limit_retries: None,
            delete_passes: 2,
        }
    }

    fn worker(safe_list: SafeList) -> (Worker, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let columns = vec!["email".to_string(), "firstName".to_string()];
        let sinks = FailureSinks::new(
            FailureSink::from_writer(Box::new(std::io::sink()), FailureClass::PermanentReject, &columns)
                .unwrap(),
            FailureSink::from_writer(Box::new(std::io::sink()), FailureClass::RateLimitReplay, &columns)
                .unwrap(),
            Arc::clone(&counters),
        );
        let context = Arc::new(RunContext::new(
            Arc::clone(&counters),
            sinks,
            safe_list,
            RunProgress::hidden(),
        ));
        // Nothing listens on port 1; tests below never reach the network.
        let client = UsersClient::with_http_client(
            "http://127.0.0.1:1/api/v1",
            ApiAuth::new(ApiCredentials::Ssws { token: "t".into() }),
            reqwest::Client::new(),
            TransportRetry::new(0),
        )
        .unwrap();
        (Worker::new(0, client, Arc::new(policy()), context), counters)
    }

    fn record(email: &str, hash: &str) -> Record {
        let header = Arc::new(Header::new(["email", "firstName", "passwordBcrypt"]));
        Record::new(1, header, vec![email.into(), "Ada".into(), hash.into()]).unwrap()
    }

    #[test]
    fn test_policy_from_config_defaults() {
        let config = Config::from_yaml_str(
            "org: example.okta.com\napi_token: t\ncsv_header_row: email,passwordBcrypt\n",
        )
        .unwrap();
        let policy = WorkerPolicy::from_config(&config);
        assert_eq!(policy.login_field, "email");
        assert_eq!(policy.rate_limit_pad, Duration::from_secs(5));
        assert_eq!(policy.delete_passes, 2);
        assert!(policy.lookup_rate_limit_retries.is_none());
    }

    #[test]
    fn test_build_user_payload() {
        let (worker, _) = worker(SafeList::default());
        let user = worker
            .build_user(&record("ada@example.com", HASH), "ada@example.com")
            .unwrap();
        assert_eq!(user.profile["login"], "ada@example.com");
        assert_eq!(user.profile["firstName"], "Ada");
        assert_eq!(user.credentials.password.hash.work_factor, 10);
    }

    #[test]
    fn test_build_user_rejects_bad_hash() {
        let (worker, _) = worker(SafeList::default());
        let err = worker
            .build_user(&record("ada@example.com", "plaintext"), "ada@example.com")
            .unwrap_err();
        assert!(matches!(err, PayloadError::Hash(ClientError::InvalidHash(_))));
    }

    #[tokio::test]
    async fn test_safe_listed_record_is_skipped() {
        let (worker, counters) = worker(SafeList::new(["ADA@example.com"]));
        let outcome = worker.process(record("ada@example.com", HASH)).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Skipped);
        let counts = counters.snapshot();
        assert_eq!((counts.success, counts.error, counts.skipped), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_empty_login_is_rejected_without_calls() {
        let (worker, counters) = worker(SafeList::default());
        let outcome = worker.process(record("  ", HASH)).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Rejected);
        assert_eq!(counters.snapshot().error, 1);
        assert_eq!(
            worker.context.sinks.sink(FailureClass::PermanentReject).rows(),
            1
        );
    }

    #[test]
    fn test_is_success() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(404));
    }
}

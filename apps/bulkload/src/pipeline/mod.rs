//! Migration pipeline: source → feeder → bounded channel → worker pool.
//!
//! [`run_migration`] wires the pieces together, waits for the feeder and
//! every worker, closes the failure files and returns a [`RunSummary`].

pub mod backoff;
pub mod channel;
pub mod feeder;
pub mod progress;
pub mod worker;

use crate::config::{Config, OutputPaths};
use crate::context::{Counters, RunContext};
use crate::error::CliResult;
use crate::records::CsvRecordSource;
use crate::safelist::SafeList;
use crate::sink::FailureSinks;
use bulkload_client::UsersClient;
use channel::record_channel;
use feeder::{feed, FeedReport};
use progress::RunProgress;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use worker::{Worker, WorkerPolicy};

use tracing::{error, info, warn};

/// Totals reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub success: u64,
    pub error: u64,
    pub skipped: u64,
    /// Records the feeder handed to the workers.
    pub fed: u64,
    /// Records the workers took off the channel.
    pub delivered: u64,
    /// Lookups that were rate limited or failed without ending the record.
    pub lookup_failures: u64,
    /// Set when the input could not be read to the end.
    pub source_error: Option<String>,
    /// Workers that stopped early because a failure file could not be written.
    pub lost_workers: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Records that reached a terminal outcome.
    pub fn processed(&self) -> u64 {
        self.success + self.error + self.skipped
    }

    pub fn log(&self) {
        info!(
            success = self.success,
            error = self.error,
            skipped = self.skipped,
            fed = self.fed,
            delivered = self.delivered,
            lookup_failures = self.lookup_failures,
            lost_workers = self.lost_workers,
            elapsed_secs = self.elapsed.as_secs_f64(),
            "Migration finished"
        );
        if let Some(e) = &self.source_error {
            warn!(error = %e, "Input was not read to the end");
        }
        if self.delivered < self.fed {
            warn!(
                undelivered = self.fed - self.delivered,
                "Some fed records were never taken by a worker"
            );
        }
        if self.processed() < self.fed {
            warn!(
                unaccounted = self.fed - self.processed(),
                "Some fed records have no recorded outcome"
            );
        }
    }

    pub fn print(&self) {
        println!("Successfully added {} user(s)", self.success);
        println!("Error in processing {} user(s)", self.error);
        if self.skipped > 0 {
            println!("Skipped {} safe-listed user(s)", self.skipped);
        }
        if self.lookup_failures > 0 {
            println!(
                "Lookup rate limited or failed {} time(s), see the log",
                self.lookup_failures
            );
        }
        println!("Total time taken = {} seconds", self.elapsed.as_secs());
    }
}

/// Run a full migration of `input` with `config`.
///
/// Returns an error only for startup failures (unreadable input, failure
/// files that cannot be created, an unusable API URL). Per-record failures
/// end up in the failure files and the summary.
pub async fn run_migration(config: &Config, input: &Path, show_progress: bool) -> CliResult<RunSummary> {
    let started = Instant::now();
    let paths = OutputPaths::derive(input, config.output_dir.as_deref());

    let source = CsvRecordSource::open(input, &config.required_columns())?;

    let clients = (0..config.num_consumers)
        .map(|_| UsersClient::new(config.client_config()))
        .collect::<Result<Vec<_>, _>>()?;

    let counters = Arc::new(Counters::default());
    let sinks = FailureSinks::create(
        &paths.reject,
        &paths.replay,
        &config.csv_header_row,
        Arc::clone(&counters),
    )?;
    let context = Arc::new(RunContext::new(
        Arc::clone(&counters),
        sinks,
        SafeList::new(&config.safe_list),
        RunProgress::new(show_progress),
    ));
    let policy = Arc::new(WorkerPolicy::from_config(config));

    info!(
        input = %input.display(),
        columns = source.header().len(),
        api = %config.api_base_url(),
        workers = config.num_consumers,
        buffer = config.buffer_size,
        reject_file = %paths.reject.display(),
        replay_file = %paths.replay.display(),
        "Starting migration"
    );

    let (tx, rx) = record_channel(config.buffer_size);
    let channel_stats = rx.stats();
    let feeder = tokio::task::spawn_blocking(move || feed(source, tx));

    // Give the feeder a head start so workers don't all park on an empty buffer.
    tokio::time::sleep(Duration::from_millis(config.startup_delay_ms)).await;

    let workers: Vec<_> = clients
        .into_iter()
        .enumerate()
        .map(|(id, client)| {
            let worker = Worker::new(id, client, Arc::clone(&policy), Arc::clone(&context));
            tokio::spawn(worker.run(rx.clone()))
        })
        .collect();
    // Only workers hold the receiver now, so the feeder notices if all of them stop.
    drop(rx);

    let report = match feeder.await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Feeder task failed");
            FeedReport {
                source_error: Some(format!("feeder task failed: {e}")),
                ..FeedReport::default()
            }
        }
    };

    let mut lost_workers = 0;
    for (id, handle) in workers.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(processed)) => info!(worker = id, processed, "Worker finished"),
            Ok(Err(e)) => {
                lost_workers += 1;
                warn!(worker = id, error = %e, "Worker stopped early");
            }
            Err(e) => {
                lost_workers += 1;
                error!(worker = id, error = %e, "Worker task failed");
            }
        }
    }

    context.progress.finish_and_clear();
    if let Err(e) = context.sinks.close() {
        error!(error = %e, "Failed to close failure files");
    }

    let counts = counters.snapshot();
    let mut source_error = report.source_error;
    if report.workers_gone && source_error.is_none() {
        source_error = Some("all workers stopped before the input was exhausted".to_string());
    }

    Ok(RunSummary {
        success: counts.success,
        error: counts.error,
        skipped: counts.skipped,
        fed: report.fed,
        delivered: channel_stats.received(),
        lookup_failures: counts.lookup_failures,
        source_error,
        lost_workers,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            success: 5,
            error: 2,
            skipped: 1,
            fed: 8,
            delivered: 8,
            lookup_failures: 0,
            source_error: None,
            lost_workers: 0,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_processed_sums_outcomes() {
        assert_eq!(summary().processed(), 8);
    }

    #[test]
    fn test_log_and_print_do_not_panic() {
        crate::logging::init_test_logging();
        let mut s = summary();
        s.source_error = Some("row 9 unreadable".into());
        s.lookup_failures = 3;
        s.delivered = 7;
        s.log();
        s.print();
    }
}

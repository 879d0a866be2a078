//! Run-wide shared state handed to every worker.

use crate::pipeline::progress::RunProgress;
use crate::safelist::SafeList;
use crate::sink::{FailureClass, FailureSinks};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Terminal-outcome tallies. Each record moves exactly one of `success`,
/// `error` or `skipped` once. `lookup_failures` counts rate-limited or failed
/// lookups that did not end the record's processing.
#[derive(Debug, Default)]
pub struct Counters {
    success: AtomicU64,
    error: AtomicU64,
    skipped: AtomicU64,
    lookup_failures: AtomicU64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub success: u64,
    pub error: u64,
    pub skipped: u64,
    pub lookup_failures: u64,
}

impl Counters {
    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.success.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
        }
    }
}

/// Everything workers share: counters, sinks, safe-list and progress display.
#[derive(Debug)]
pub struct RunContext {
    pub counters: Arc<Counters>,
    pub sinks: FailureSinks,
    pub safe_list: SafeList,
    pub progress: RunProgress,
}

impl RunContext {
    pub fn new(
        counters: Arc<Counters>,
        sinks: FailureSinks,
        safe_list: SafeList,
        progress: RunProgress,
    ) -> Self {
        Self {
            counters,
            sinks,
            safe_list,
            progress,
        }
    }

    /// Refresh the progress line from the current tallies.
    pub fn report_progress(&self) {
        self.progress.update(
            self.counters.snapshot(),
            self.sinks.sink(FailureClass::PermanentReject).rows(),
            self.sinks.sink(FailureClass::RateLimitReplay).rows(),
        );
    }
}

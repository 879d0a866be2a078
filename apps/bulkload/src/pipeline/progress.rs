//! Progress spinner for a running migration.

use crate::context::CounterSnapshot;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::IsTerminal;
use std::time::Duration;

/// Live `created/rejected/replayed/skipped` line on stderr.
#[derive(Clone)]
pub struct RunProgress {
    bar: ProgressBar,
}

impl fmt::Debug for RunProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunProgress")
            .field("hidden", &self.bar.is_hidden())
            .finish()
    }
}

impl RunProgress {
    /// A spinner when `enabled` and stderr is a terminal, otherwise hidden.
    pub fn new(enabled: bool) -> Self {
        if !enabled || !std::io::stderr().is_terminal() {
            return Self::hidden();
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message("starting");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, counts: CounterSnapshot, rejected: u64, replayed: u64) {
        self.bar.set_message(format!(
            "created {} | rejected {} | replayed {} | skipped {}",
            counts.success, rejected, replayed, counts.skipped
        ));
    }

    /// Finish and clear the spinner
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_accepts_updates() {
        let progress = RunProgress::new(false);
        progress.update(
            CounterSnapshot {
                success: 1,
                error: 2,
                ..CounterSnapshot::default()
            },
            1,
            1,
        );
        progress.finish_and_clear();
    }
}

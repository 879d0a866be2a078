//! Feeder: drains the record source into the bounded channel.

use super::channel::RecordSender;
use crate::records::{Record, SourceError};
use tracing::{debug, warn};

/// What the feeder managed to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Records handed to the channel.
    pub fed: u64,
    /// Set when the source failed before it was exhausted. Records after the
    /// failure point were never read.
    pub source_error: Option<String>,
    /// Set when every worker was gone before the source was exhausted.
    pub workers_gone: bool,
}

/// Push every record into `tx` in source order, then close the stream.
///
/// Blocks the calling thread while the channel is full; run it on a
/// blocking thread. The stream is closed on every exit path, so workers
/// always drain what was buffered and stop.
pub fn feed<I>(source: I, tx: RecordSender) -> FeedReport
where
    I: IntoIterator<Item = Result<Record, SourceError>>,
{
    let mut report = FeedReport::default();

    for item in source {
        let record = match item {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    fed = report.fed,
                    error = %e,
                    "Record source failed; remaining input will not be processed"
                );
                report.source_error = Some(e.to_string());
                break;
            }
        };

        if let Err(closed) = tx.blocking_send(record) {
            warn!(
                fed = report.fed,
                position = closed.0.position(),
                "All workers have stopped; remaining input will not be processed"
            );
            report.workers_gone = true;
            break;
        }
        report.fed += 1;
    }

    tx.close();
    debug!(fed = report.fed, "Feeder finished");
    report
}

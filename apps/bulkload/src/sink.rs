//! Failure sinks: the reject and replay CSV files.
//!
//! Each sink serializes its own writes behind a mutex and flushes after every
//! row, so a crash loses at most the row being written. The two sinks have
//! independent locks.

use crate::config::{ERROR_CAUSE_COLUMN, ERROR_CODE_COLUMN};
use crate::context::Counters;
use crate::records::Record;
use bulkload_client::ErrorDetails;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot create {class} file '{path}': {message}")]
    Create {
        class: FailureClass,
        path: PathBuf,
        message: String,
    },

    #[error("write to {class} file failed: {message}")]
    Write { class: FailureClass, message: String },

    #[error("{0} file is already closed")]
    Closed(FailureClass),

    #[error("{0} file lock poisoned by a panicking writer")]
    Poisoned(FailureClass),
}

/// Disjoint outcome classes of a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The API refused the record; retrying as-is will not help.
    PermanentReject,
    /// The API was rate limiting; the record can be fed to a later run.
    RateLimitReplay,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::PermanentReject => write!(f, "reject"),
            FailureClass::RateLimitReplay => write!(f, "replay"),
        }
    }
}

/// A record together with the error that ended its processing.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub record: Record,
    pub details: ErrorDetails,
}

impl FailureRecord {
    pub fn new(record: Record, details: ErrorDetails) -> Self {
        Self { record, details }
    }

    /// Values for `source_columns` followed by the error code and cause.
    /// Columns the record lacks are written empty.
    pub fn to_row(&self, source_columns: &[String]) -> Vec<String> {
        source_columns
            .iter()
            .map(|c| self.record.get(c).unwrap_or_default().to_string())
            .chain([self.details.code.clone(), self.details.cause.clone()])
            .collect()
    }
}

type BoxedWriter = csv::Writer<Box<dyn Write + Send>>;

/// One append-only, fully quoted CSV output.
pub struct FailureSink {
    class: FailureClass,
    source_columns: Vec<String>,
    writer: Mutex<Option<BoxedWriter>>,
    rows: AtomicU64,
}

impl fmt::Debug for FailureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureSink")
            .field("class", &self.class)
            .field("rows", &self.rows())
            .finish_non_exhaustive()
    }
}

impl FailureSink {
    /// Create (truncating) the file at `path` and write the header row.
    pub fn create(
        path: &Path,
        class: FailureClass,
        source_columns: &[String],
    ) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(|e| SinkError::Create {
            class,
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_writer(Box::new(file), class, source_columns)
    }

    pub fn from_writer(
        writer: Box<dyn Write + Send>,
        class: FailureClass,
        source_columns: &[String],
    ) -> Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(writer);

        let header = source_columns
            .iter()
            .map(String::as_str)
            .chain([ERROR_CODE_COLUMN, ERROR_CAUSE_COLUMN]);
        write_row(&mut writer, class, header)?;

        Ok(Self {
            class,
            source_columns: source_columns.to_vec(),
            writer: Mutex::new(Some(writer)),
            rows: AtomicU64::new(0),
        })
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    /// Append one row and flush.
    pub fn write(&self, failure: &FailureRecord) -> Result<(), SinkError> {
        let row = failure.to_row(&self.source_columns);
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::Poisoned(self.class))?;
        let writer = guard.as_mut().ok_or(SinkError::Closed(self.class))?;
        write_row(writer, self.class, row.iter().map(String::as_str))?;
        self.rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush and release the underlying file. Later writes fail with
    /// [`SinkError::Closed`]; closing twice is a no-op.
    pub fn close(&self) -> Result<(), SinkError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::Poisoned(self.class))?;
        if let Some(mut writer) = guard.take() {
            writer.flush().map_err(|e| SinkError::Write {
                class: self.class,
                message: e.to_string(),
            })?;
            debug!(class = %self.class, rows = self.rows(), "Closed failure file");
        }
        Ok(())
    }
}

fn write_row<'a>(
    writer: &mut BoxedWriter,
    class: FailureClass,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<(), SinkError> {
    let to_err = |message: String| SinkError::Write { class, message };
    writer
        .write_record(fields)
        .map_err(|e| to_err(e.to_string()))?;
    writer.flush().map_err(|e| to_err(e.to_string()))
}

/// The reject and replay sinks plus the shared error counter.
#[derive(Debug)]
pub struct FailureSinks {
    reject: FailureSink,
    replay: FailureSink,
    counters: Arc<Counters>,
}

impl FailureSinks {
    pub fn new(reject: FailureSink, replay: FailureSink, counters: Arc<Counters>) -> Self {
        Self {
            reject,
            replay,
            counters,
        }
    }

    /// Open both files, writing their header rows.
    pub fn create(
        reject_path: &Path,
        replay_path: &Path,
        source_columns: &[String],
        counters: Arc<Counters>,
    ) -> Result<Self, SinkError> {
        Ok(Self::new(
            FailureSink::create(reject_path, FailureClass::PermanentReject, source_columns)?,
            FailureSink::create(replay_path, FailureClass::RateLimitReplay, source_columns)?,
            counters,
        ))
    }

    pub fn sink(&self, class: FailureClass) -> &FailureSink {
        match class {
            FailureClass::PermanentReject => &self.reject,
            FailureClass::RateLimitReplay => &self.replay,
        }
    }

    /// Write `failure` to the sink for `class` and count one error.
    ///
    /// The error counter moves only once the row is durable.
    pub fn record(&self, failure: &FailureRecord, class: FailureClass) -> Result<(), SinkError> {
        self.sink(class).write(failure)?;
        self.counters.record_error();
        Ok(())
    }

    /// Close both sinks, reporting the first failure after attempting both.
    pub fn close(&self) -> Result<(), SinkError> {
        let reject = self.reject.close();
        let replay = self.replay.close();
        reject.and(replay)
    }
}

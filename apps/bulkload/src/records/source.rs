//! CSV-backed record source.

use super::record::{Header, Record, RecordError};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open '{path}': {message}")]
    Open { path: String, message: String },

    #[error("input header is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("read failed after row {position}: {message}")]
    Read { position: u64, message: String },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Streams [`Record`]s from a CSV input whose first row is the header.
pub struct CsvRecordSource<R: Read> {
    header: Arc<Header>,
    rows: csv::StringRecordsIntoIter<R>,
    position: u64,
}

impl CsvRecordSource<File> {
    /// Open a file and check that every `required_columns` entry is in its header.
    pub fn open(path: &Path, required_columns: &[String]) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_reader(file, required_columns)
    }
}

impl<R: Read> CsvRecordSource<R> {
    pub fn from_reader(reader: R, required_columns: &[String]) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = reader.headers().map_err(|e| SourceError::Read {
            position: 0,
            message: e.to_string(),
        })?;
        let header = Header::new(header.iter().map(|h| h.trim().to_string()));

        let missing: Vec<String> = required_columns
            .iter()
            .filter(|c| !header.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::MissingColumns(missing));
        }

        Ok(Self {
            header: Arc::new(header),
            rows: reader.into_records(),
            position: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl<R: Read> Iterator for CsvRecordSource<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                return Some(Err(SourceError::Read {
                    position: self.position,
                    message: e.to_string(),
                }))
            }
        };
        self.position += 1;
        let values = row.iter().map(str::to_string).collect();
        Some(Record::new(self.position, Arc::clone(&self.header), values).map_err(SourceError::from))
    }
}

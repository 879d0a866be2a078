//! Typed input row over a fixed, shared header.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or reading a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("row {position} has {found} field(s), header declares {expected}")]
    WidthMismatch {
        position: u64,
        expected: usize,
        found: usize,
    },

    #[error("column '{0}' is not present")]
    MissingColumn(String),
}

/// Ordered column names shared by every record of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }
}

/// One input row. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    position: u64,
    header: Arc<Header>,
    values: Vec<String>,
}

impl Record {
    /// Build a record; the value count must match the header width.
    pub fn new(position: u64, header: Arc<Header>, values: Vec<String>) -> Result<Self, RecordError> {
        if values.len() != header.len() {
            return Err(RecordError::WidthMismatch {
                position,
                expected: header.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            position,
            header,
            values,
        })
    }

    /// 1-based data row number in the source. Diagnostics only.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .index_of(column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn require(&self, column: &str) -> Result<&str, RecordError> {
        self.get(column)
            .ok_or_else(|| RecordError::MissingColumn(column.to_string()))
    }

    /// `(column, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

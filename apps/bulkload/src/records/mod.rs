//! Input records and the CSV source that produces them.

mod record;
mod source;

pub use record::{Header, Record, RecordError};
pub use source::{CsvRecordSource, SourceError};

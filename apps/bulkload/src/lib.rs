//! bulkload library
//!
//! Migrates account records from a CSV file into a remote identity API,
//! replacing any existing account with a freshly created one that carries a
//! pre-hashed password. The binary in `main.rs` is a thin CLI over
//! [`pipeline::run_migration`]; the modules are public for integration tests.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod records;
pub mod safelist;
pub mod sink;

pub use config::{Config, OutputPaths};
pub use error::{CliError, CliResult};
pub use pipeline::{run_migration, RunSummary};

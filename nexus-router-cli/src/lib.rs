//! # nexus-router-cli
//!
//! Library behind the `nexus-router` binary.
//!
//! The binary scans a source tree for `#[procedures]` modules, reports what it
//! found, checks the result for routing conflicts and emits a static
//! registration table a host crate can include.
//!
//! - [`config`] - `nexus-router.toml` loading and CLI overrides
//! - [`report`] - Scan report (text and JSON)
//! - [`generator`] - Registration table generation
//! - [`writer`] - File output and dry-run support
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error types and exit codes

pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod report;
pub mod writer;

pub use config::{Config, ConfigManager};
pub use error::{CliError, CliResult};
pub use generator::{GeneratedTable, RegistrationGenerator};
pub use report::ScanReport;
pub use writer::{FileWriter, WriteResult};

//! Error types for the CLI.

use nexus_router::{DiscoveryError, RouterRejected};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Main error type for CLI operations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Fatal discovery failure (missing root, cancelled, strict policy).
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The discovered collections do not compile into a usable router.
    #[error("{0}")]
    Rejected(#[from] RouterRejected),

    /// Error during code generation.
    #[error("Failed to generate registration table: {0}")]
    Generate(#[from] GenerateError),

    /// Error loading configuration.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    /// Error writing output files.
    #[error("Failed to write output: {0}")]
    Write(#[from] WriteError),

    /// A check the user asked for did not pass.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Failed to render the JSON report.
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code: 2 for failed checks, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Rejected(_) | Self::Validation(_) => 2,
            _ => 1,
        }
    }
}

/// Error during code generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A configured Rust path or type does not parse.
    #[error("Invalid {key} '{value}': {message}")]
    InvalidRustSyntax {
        key: &'static str,
        value: String,
        message: String,
    },

    /// Nothing was discovered, so there is nothing to register.
    #[error("No procedure collections to register")]
    NothingToGenerate,
}

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file explicitly named on the command line does not exist.
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid TOML syntax.
    #[error("Invalid TOML in {path}: {message}")]
    InvalidToml { path: PathBuf, message: String },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// IO error reading config.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create a not found error.
    pub fn not_found(path: PathBuf) -> Self {
        Self::NotFound { path }
    }

    /// Create an invalid TOML error.
    pub fn invalid_toml(path: PathBuf, message: impl Into<String>) -> Self {
        Self::InvalidToml {
            path,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl GenerateError {
    pub fn invalid_syntax(
        key: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRustSyntax {
            key,
            value: value.into(),
            message: message.into(),
        }
    }
}

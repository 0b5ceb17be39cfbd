//! Adapter configuration.
//!
//! ```rust,ignore
//! let config = AdapterConfig::new()
//!     .with_max_input_size(256 * 1024)
//!     .with_expose_internal_errors(cfg!(debug_assertions));
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigValidationError {
    /// max_input_size must be greater than 0
    #[error("max_input_size must be greater than 0")]
    InvalidMaxInputSize,
}

/// Settings shared by the REST and RPC adapters.
///
/// * `max_input_size` - Maximum serialized input size in bytes. Larger inputs
///   are rejected with `PAYLOAD_TOO_LARGE` before the context factory runs.
///   Default: 1 MiB.
/// * `expose_internal_errors` - Keep the message and details of
///   `INTERNAL_ERROR`s in responses. Default: false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub max_input_size: usize,
    pub expose_internal_errors: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_input_size: 1024 * 1024,
            expose_internal_errors: false,
        }
    }
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    #[must_use]
    pub fn with_expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_input_size == 0 {
            return Err(ConfigValidationError::InvalidMaxInputSize);
        }
        Ok(())
    }
}

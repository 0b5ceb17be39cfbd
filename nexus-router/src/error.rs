//! Error types for discovery, compilation and dispatch
//!
//! Two families live here:
//!
//! - [`RpcError`] / [`RpcErrorCode`]: errors produced while a transport adapter
//!   dispatches a call. Both the REST and the RPC adapter report these, and
//!   [`map_error`](crate::adapter::map_error) projects them onto each transport.
//! - [`DiscoveryError`] / [`InvalidExport`] / [`DiscoveryErrorKind`]: problems met
//!   while scanning a source tree for procedure collections.
//!
//! # Example
//! ```rust,ignore
//! use nexus_router::{RpcError, RpcErrorCode};
//!
//! let error = RpcError::new(RpcErrorCode::NotFound, "User not found");
//! let error = RpcError::not_found("User not found"); // Convenience method
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Type-safe error codes for dispatch failures.
///
/// When serialized to JSON, codes are converted to SCREAMING_SNAKE_CASE
/// (e.g., `NotFound` becomes `"NOT_FOUND"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    // Client errors (4xx equivalent)
    /// The request was malformed or invalid
    BadRequest,
    /// Authentication is required
    Unauthorized,
    /// The authenticated user lacks permission
    Forbidden,
    /// The requested resource was not found
    NotFound,
    /// The route exists but not for the requested HTTP method
    MethodNotAllowed,
    /// Input validation failed
    ValidationError,
    /// The request conflicts with current state
    Conflict,
    /// The request payload exceeds size limits
    PayloadTooLarge,

    // Server errors (5xx equivalent)
    /// An unexpected internal error occurred
    InternalError,
    /// The requested functionality is not implemented
    NotImplemented,
    /// The service is temporarily unavailable
    ServiceUnavailable,

    // Dispatch-specific errors
    /// The requested procedure was not found
    ProcedureNotFound,
    /// An error occurred in middleware execution
    MiddlewareError,
    /// JSON serialization/deserialization failed
    SerializationError,
}

impl RpcErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::ProcedureNotFound => "PROCEDURE_NOT_FOUND",
            Self::MiddlewareError => "MIDDLEWARE_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
        }
    }

    /// HTTP status used by the REST adapter for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest | Self::SerializationError => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound | Self::ProcedureNotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Conflict => 409,
            Self::PayloadTooLarge => 413,
            Self::ValidationError => 422,
            Self::InternalError | Self::MiddlewareError => 500,
            Self::NotImplemented => 501,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Returns true if this is a server error (5xx equivalent).
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dispatch error with type-safe code and message.
///
/// # Example
/// ```rust,ignore
/// use nexus_router::{RpcError, RpcErrorCode};
///
/// let error = RpcError::new(RpcErrorCode::NotFound, "User not found")
///     .with_details(serde_json::json!({"user_id": 123}))
///     .with_cause("Database query returned empty result");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct RpcError {
    /// Type-safe error code
    pub code: RpcErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (JSON value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Optional cause for debugging (not exposed to clients in production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl RpcError {
    /// Create a new error with code and message.
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Add a cause string for debugging.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Sanitize error for client response (removes internal details for server errors).
    pub fn sanitize(mut self) -> Self {
        if matches!(self.code, RpcErrorCode::InternalError) {
            self.message = "An internal error occurred".to_string();
            self.details = None;
            self.cause = None;
        }
        self
    }

    /// Create a NOT_FOUND error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    /// Create a BAD_REQUEST error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    /// Create a VALIDATION_ERROR error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ValidationError, message)
    }

    /// Create an UNAUTHORIZED error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Unauthorized, message)
    }

    /// Create a FORBIDDEN error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Forbidden, message)
    }

    /// Create an INTERNAL_ERROR error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    /// Create a CONFLICT error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Conflict, message)
    }

    /// Create a PROCEDURE_NOT_FOUND error.
    pub fn procedure_not_found(path: &str) -> Self {
        Self::new(
            RpcErrorCode::ProcedureNotFound,
            format!("Procedure '{}' not found", path),
        )
    }

    /// Create a METHOD_NOT_ALLOWED error.
    pub fn method_not_allowed(method: impl fmt::Display, path: &str) -> Self {
        Self::new(
            RpcErrorCode::MethodNotAllowed,
            format!("Method {} is not allowed for '{}'", method, path),
        )
    }

    /// Create a PAYLOAD_TOO_LARGE error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::PayloadTooLarge, message)
    }

    /// Create a SERIALIZATION_ERROR error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::SerializationError, message)
    }

    /// Create a MIDDLEWARE_ERROR error.
    pub fn middleware(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::MiddlewareError, message)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

/// Result type alias for dispatch operations.
pub type RpcResult<T> = Result<T, RpcError>;

// =============================================================================
// Discovery errors
// =============================================================================

/// Classification of everything discovery can report, fatal or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryErrorKind {
    /// The scan root does not exist or is not a directory
    DirectoryNotFound,
    /// The scan root cannot be read
    PermissionDenied,
    /// A candidate file could not be read or parsed
    FileLoadError,
    /// An explicitly targeted file does not pass the file filter
    InvalidFileType,
    /// A tagged export does not form a valid procedure collection
    InvalidExport,
    /// The scan finished without accepting a single collection
    NoProceduresFound,
}

impl DiscoveryErrorKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound => "directoryNotFound",
            Self::PermissionDenied => "permissionDenied",
            Self::FileLoadError => "fileLoadError",
            Self::InvalidFileType => "invalidFileType",
            Self::InvalidExport => "invalidExport",
            Self::NoProceduresFound => "noProceduresFound",
        }
    }
}

impl fmt::Display for DiscoveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged export that failed collection validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid export '{export}': {reason}")]
pub struct InvalidExport {
    /// Name of the offending export (module or item identifier).
    pub export: String,
    /// Why the export was rejected.
    pub reason: String,
}

impl InvalidExport {
    /// Create a new invalid export error.
    pub fn new(export: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            export: export.into(),
            reason: reason.into(),
        }
    }

    /// The discovery kind this error is reported under.
    pub fn kind(&self) -> DiscoveryErrorKind {
        DiscoveryErrorKind::InvalidExport
    }
}

/// Fatal discovery failure. No partial result accompanies it.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Root directory does not exist or is not a directory.
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Root directory cannot be read.
    #[error("Permission denied reading {path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other IO failure on the root directory.
    #[error("IO error scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An invalid export escalated by the `error` policy.
    #[error("Invalid export in {path}: {error}")]
    InvalidExport {
        path: PathBuf,
        #[source]
        error: InvalidExport,
    },

    /// The scan was cancelled between file loads.
    #[error("Scan cancelled")]
    Cancelled,
}

impl DiscoveryError {
    /// Create a directory not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    /// Classify an IO error raised while opening the root.
    pub fn from_root_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::DirectoryNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::Io { path, source },
        }
    }

    /// The discovery kind, when the failure maps onto one.
    pub fn kind(&self) -> Option<DiscoveryErrorKind> {
        match self {
            Self::DirectoryNotFound { .. } => Some(DiscoveryErrorKind::DirectoryNotFound),
            Self::PermissionDenied { .. } => Some(DiscoveryErrorKind::PermissionDenied),
            Self::InvalidExport { .. } => Some(DiscoveryErrorKind::InvalidExport),
            Self::Io { .. } | Self::Cancelled => None,
        }
    }
}

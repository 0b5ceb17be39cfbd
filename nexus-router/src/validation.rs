//! Input validation
//!
//! Procedures registered with `.validated()` run [`Validate::validate`] on the
//! decoded input before the handler executes. Failures surface as a
//! `VALIDATION_ERROR` carrying the field errors, identically on both
//! transports.
//!
//! ```rust,ignore
//! impl Validate for CreateUser {
//!     fn validate(&self) -> ValidationResult {
//!         ValidationRules::new()
//!             .required("name", &self.name)
//!             .max_length("name", &self.name, 64)
//!             .range("age", self.age, 0, 150)
//!             .build()
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    /// Machine-readable rule name (`required`, `range`, ...)
    pub code: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{} is required", field);
        Self::new(field, message, "required")
    }

    pub fn custom(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, "custom")
    }
}

/// Outcome of validating one input value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Names of the failing fields, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self
    }
}

/// Implemented by input types that carry their own validation rules.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

impl Validate for () {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl Validate for serde_json::Value {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> ValidationResult {
        self.as_ref().map(Validate::validate).unwrap_or_default()
    }
}

/// Fluent collector for the common field checks.
#[derive(Debug, Default)]
pub struct ValidationRules {
    errors: Vec<FieldError>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blank string.
    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            trace!(field, "required field is blank");
            self.errors.push(FieldError::required(field));
        }
        self
    }

    pub fn min_length(mut self, field: &str, value: &str, min: usize) -> Self {
        if value.chars().count() < min {
            self.errors.push(FieldError::new(
                field,
                format!("{} must be at least {} characters", field, min),
                "min_length",
            ));
        }
        self
    }

    pub fn max_length(mut self, field: &str, value: &str, max: usize) -> Self {
        if value.chars().count() > max {
            self.errors.push(FieldError::new(
                field,
                format!("{} must be at most {} characters", field, max),
                "max_length",
            ));
        }
        self
    }

    /// Inclusive integer range.
    pub fn range(mut self, field: &str, value: i64, min: i64, max: i64) -> Self {
        if !(min..=max).contains(&value) {
            self.errors.push(FieldError::new(
                field,
                format!("{} must be between {} and {}", field, min, max),
                "range",
            ));
        }
        self
    }

    pub fn custom<F>(mut self, field: &str, predicate: F, message: &str) -> Self
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            self.errors.push(FieldError::custom(field, message));
        }
        self
    }

    pub fn build(self) -> ValidationResult {
        ValidationResult::from_errors(self.errors)
    }
}

// models/src/errors.rs

pub use thiserror::Error;

/// A payload failed its schema check. Every variant names the field(s) at fault.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields were absent or blank.
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<String>),
    /// A field was present but its value is unacceptable.
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
    /// An id field points at a record of the wrong kind (e.g. a doctor_id naming a patient).
    #[error("{field} must reference a {expected}")]
    WrongReference { field: String, expected: String },
    /// A field that may never change after creation was supplied with a new value.
    #[error("{0} cannot be changed")]
    Immutable(String),
}

impl ValidationError {
    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValidationError::MissingFields(fields.into_iter().map(Into::into).collect())
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn wrong_reference(field: &str, expected: &str) -> Self {
        ValidationError::WrongReference {
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }

    /// The names of the offending fields, for the response body.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationError::MissingFields(fields) => fields.iter().map(String::as_str).collect(),
            ValidationError::InvalidField { field, .. }
            | ValidationError::WrongReference { field, .. } => vec![field.as_str()],
            ValidationError::Immutable(field) => vec![field.as_str()],
        }
    }
}

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;

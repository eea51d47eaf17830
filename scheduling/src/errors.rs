// scheduling/src/errors.rs

use log::error;
use thiserror::Error;

use models::{AppointmentStatus, ValidationError};
use security::AuthError;
use storage::StoreError;

/// Every way a service operation can fail. All but `StoreFailure` and
/// `Internal` are expected business outcomes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Access denied: {0}")]
    Denied(String),

    /// The caller could not be authenticated.
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    InvalidState(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("{0}")]
    Conflict(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, .. } => ServiceError::NotFound(kind),
            StoreError::AlreadyExists(what) => ServiceError::Conflict(format!("{} already exists", what)),
            StoreError::StaleState { kind, .. } => {
                ServiceError::Conflict(format!("{} was modified concurrently, retry", kind))
            }
            other => {
                error!("entity store failure: {}", other);
                ServiceError::StoreFailure(other.to_string())
            }
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Jwt(e) => {
                error!("token signing failed: {}", e);
                ServiceError::Internal(e.to_string())
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        error!("password hashing failed: {}", err);
        ServiceError::Internal(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

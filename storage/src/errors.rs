// storage/src/errors.rs

use sled::transaction::TransactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not Found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness constraint would be violated.
    #[error("Already Exists: {0}")]
    AlreadyExists(String),

    /// A conditional write found the record in a different state than expected.
    #[error("Stale state: {kind} {id} was modified concurrently")]
    StaleState { kind: &'static str, id: String },

    #[error("Database operation failed: {0}")]
    Database(String),

    #[error("Serialization/Deserialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { kind, id: id.to_string() }
    }

    pub fn stale(kind: &'static str, id: impl ToString) -> Self {
        StoreError::StaleState { kind, id: id.to_string() }
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Database(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

//! Store error types.

use thiserror::Error;

use crate::retry::{Retryable, TaskError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Failed to decode store response: {0}")]
    Decode(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            StoreError::Status { code, .. } => *code == 429 || *code >= 500,
            StoreError::Unavailable(_) => true,
            StoreError::Decode(_) | StoreError::Config(_) => false,
        }
    }
}

impl From<StoreError> for TaskError {
    fn from(e: StoreError) -> Self {
        if e.is_retryable() {
            TaskError::Retryable(e.to_string())
        } else {
            TaskError::Fatal(e.to_string())
        }
    }
}

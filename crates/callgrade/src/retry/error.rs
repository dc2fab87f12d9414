//! Tagged task errors for retry classification.

use thiserror::Error;

/// Message fragments that mark a free-form error as transient.
///
/// Matched case-insensitively as substrings.
pub const RETRYABLE_SIGNATURES: &[&str] = &[
    "timeout",
    "network",
    "econnreset",
    "enotfound",
    "etimedout",
    "429",
    "500",
    "502",
    "503",
    "504",
];

/// Errors that know whether retrying them could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Error from a unit of work, tagged at the I/O boundary that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Transient failure (timeouts, connection resets, 429, 5xx).
    #[error("{0}")]
    Retryable(String),
    /// Permanent failure; retrying will not help.
    #[error("{0}")]
    Fatal(String),
    /// The work ran but produced an unusable result, or its input was rejected.
    #[error("{0}")]
    Validation(String),
}

impl TaskError {
    /// Classify a free-form error message.
    ///
    /// Messages containing a known transient signature become `Retryable`,
    /// messages mentioning validation become `Validation`, anything else `Fatal`.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_retryable_message(&message) {
            Self::Retryable(message)
        } else if message.to_lowercase().contains("validation") {
            Self::Validation(message)
        } else {
            Self::Fatal(message)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(m) | Self::Fatal(m) | Self::Validation(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retryable(_) => "retryable",
            Self::Fatal(_) => "fatal",
            Self::Validation(_) => "validation",
        }
    }
}

impl Retryable for TaskError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Whether a message contains any of [`RETRYABLE_SIGNATURES`].
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matching_is_case_insensitive() {
        assert!(is_retryable_message("Timeout while waiting for response"));
        assert!(is_retryable_message("socket hang up: ECONNRESET"));
        assert!(is_retryable_message("getaddrinfo ENOTFOUND api.example.com"));
        assert!(is_retryable_message("HTTP 503 Service Unavailable"));
        assert!(is_retryable_message("Network unreachable"));
        assert!(!is_retryable_message("ValidationError: bad input"));
        assert!(!is_retryable_message("HTTP 404 Not Found"));
    }

    #[test]
    fn test_from_message_tags() {
        assert_eq!(
            TaskError::from_message("Timeout"),
            TaskError::Retryable("Timeout".into())
        );
        assert_eq!(
            TaskError::from_message("ValidationError: bad input"),
            TaskError::Validation("ValidationError: bad input".into())
        );
        assert_eq!(
            TaskError::from_message("permission denied"),
            TaskError::Fatal("permission denied".into())
        );
    }

    #[test]
    fn test_only_retryable_variant_is_retryable() {
        assert!(TaskError::Retryable("x".into()).is_retryable());
        assert!(!TaskError::Fatal("x".into()).is_retryable());
        assert!(!TaskError::Validation("x".into()).is_retryable());
    }
}

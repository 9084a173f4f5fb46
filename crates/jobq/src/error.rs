//! Error types for store and queue operations.

use chrono::Duration;
use thiserror::Error;

/// Errors surfaced by the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store command failed: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("unexpected store reply during {operation}: {detail}")]
    UnexpectedReply { operation: String, detail: String },
}

impl StoreError {
    /// Build an [`UnexpectedReply`](Self::UnexpectedReply) for the given operation.
    pub fn unexpected_reply(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(err) => {
                err.is_io_error() || err.is_timeout() || err.is_connection_dropped()
            }
            Self::UnexpectedReply { .. } => false,
        }
    }
}

/// Comprehensive error type for all queue and job operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("envelope codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("malformed job record '{key}': {detail}")]
    MalformedRecord { key: String, detail: String },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Build a [`MalformedRecord`](Self::MalformedRecord) for the given record key.
    pub fn malformed_record(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::Codec(_) => false,
            Self::MalformedRecord { .. } => false,
            Self::Validation(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        if self.is_transient() {
            Some(Duration::seconds(1))
        } else {
            None
        }
    }
}

/// Errors decoding reliable-queue envelopes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("missing length prefix")]
    MissingLength,

    #[error("length prefix is not a number: '{text}'")]
    InvalidLength { text: String },

    #[error("envelope shorter than declared payload length {declared}")]
    TruncatedPayload { declared: usize },

    #[error("missing delimiter after payload")]
    MissingDelimiter,

    #[error("claim timestamp is not a number: '{text}'")]
    InvalidTimestamp { text: String },
}

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

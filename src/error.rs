//! Structured errors (spec §7).
//!
//! Hot-path meter updates never return `Result` — invalid input is
//! silently ignored (spec §7 "Invalid input on update"). These error types
//! cover the two places that do surface structured failures: identifier
//! construction, and the publisher.

use thiserror::Error;

/// Errors that can occur while constructing or registering a meter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeterError {
    /// The identifier's name was empty (after sanitization, if applicable).
    #[error("invalid identifier: name must not be empty")]
    InvalidIdentifier,

    /// A reserved tag key (`statistic`, `atlas.dstype`, `percentile`) was
    /// supplied directly by caller code.
    #[error("invalid identifier: tag key '{0}' is reserved")]
    ReservedTagKey(String),
}

/// Fatal configuration errors, surfaced only at construction (spec §7
/// "Configuration errors at start surface as a structured fatal").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `step` must evenly divide 60 seconds.
    #[error("step of {step_secs}s does not divide evenly into 60s")]
    StepNotDivisorOfMinute {
        /// The offending step, in seconds.
        step_secs: u64,
    },

    /// `batch_size` must be positive.
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    /// `num_threads` must be positive.
    #[error("num_threads must be greater than zero")]
    ZeroThreads,
}

/// Errors from a single publish attempt (spec §4.7, §7). Never surfaced to
/// user code directly; consumed entirely by the harvest/publish scheduler,
/// which turns every variant into a log line and a counter increment.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A transport-level failure (connection refused, timeout, DNS, etc.).
    #[error("transport error sending batch: {0}")]
    Transport(#[from] Box<ureq::Error>),

    /// The server responded with a retryable status (429 or 5xx).
    #[error("server returned retryable status {status}")]
    RetryableStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The server responded with structured validation errors; these are
    /// never retried.
    #[error("server rejected {error_count} measurements: {message}")]
    Validation {
        /// The category the server reported.
        category: String,
        /// Number of rejected measurements.
        error_count: u64,
        /// Human-readable message from the server.
        message: String,
    },

    /// Retries were exhausted.
    #[error("exhausted retries after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

impl PublishError {
    /// Whether this failure class should be retried per spec §4.7 ("POST
    /// retries only on connect-timeout / 429 / 503, never on generic
    /// read-timeout").
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::RetryableStatus { .. })
    }
}

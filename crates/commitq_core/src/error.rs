//! Error types for the commit engine.

use crate::target::DeliveryError;
use commitq_queue::QueueError;
use thiserror::Error;

/// Result type for commit operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Errors that can abort a flush cycle.
///
/// None of these ever cause partial, unacknowledged deletion: a
/// failed batch and everything after it stay queued exactly as they
/// were, and re-running the cycle is safe.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Local queue failure (read, write, delete).
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// The target rejected a batch irrecoverably.
    #[error("delivery failed permanently: {0}")]
    Permanent(#[source] DeliveryError),

    /// Transient failures exhausted the configured retry budget.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Total delivery attempts made (retries + the first try).
        attempts: u32,
        /// The last transient failure.
        source: DeliveryError,
    },

    /// The cycle was cancelled during a retry wait.
    #[error("flush cycle interrupted during retry wait")]
    Interrupted,
}

/// Failure of a fan-out enqueue across dispatcher members.
///
/// Every member is attempted; this error aggregates the ones that
/// failed. Members that succeeded hold the operation durably.
#[derive(Debug, Error)]
#[error("enqueue fan-out failed for {} of {attempted} member(s)", .failures.len())]
pub struct FanoutError {
    /// Number of members attempted.
    pub attempted: usize,
    /// Member name and queue error for each failed member.
    pub failures: Vec<(String, QueueError)>,
}

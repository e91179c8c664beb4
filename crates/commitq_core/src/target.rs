//! The target adapter seam: where batches leave the system.

use commitq_queue::Metadata;
use thiserror::Error;

/// A fully loaded document handed to a target adapter as part of an
/// add batch.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable external document id.
    pub reference: String,
    /// Document content bytes.
    pub content: Vec<u8>,
    /// Document metadata, in original insertion order.
    pub metadata: Metadata,
}

/// How a delivery attempt failed.
///
/// The commit driver retries [`Transient`](DeliveryError::Transient)
/// failures up to the configured retry count and aborts the cycle on
/// [`Permanent`](DeliveryError::Permanent) ones. This explicit split
/// replaces stop-on-first-exception control flow: the driver decides
/// retry vs abort, not an exception class hierarchy.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Target temporarily unavailable; the same batch will be retried.
    #[error("transient delivery failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// Target rejected the batch irrecoverably; the cycle aborts and
    /// the batch stays queued.
    #[error("permanent delivery failure: {message}")]
    Permanent {
        /// Description of the failure.
        message: String,
    },
}

impl DeliveryError {
    /// Creates a transient failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Whether the driver should retry after this failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// A pluggable target repository (search index, file store, ...).
///
/// Implementations perform the actual write against one target system.
/// Delivery is at-least-once: a crash between a confirmed commit and
/// the local delete re-delivers the batch on restart, so targets must
/// tolerate duplicate adds and deletes (idempotent upsert and
/// delete-by-id).
///
/// Batches arrive in enqueue order and never exceed the configured
/// batch size.
pub trait TargetAdapter: Send {
    /// Commits a batch of documents to the target.
    fn commit_add(&self, batch: &[Document]) -> Result<(), DeliveryError>;

    /// Deletes a batch of documents from the target by reference.
    fn commit_delete(&self, references: &[String]) -> Result<(), DeliveryError>;
}

impl<T: TargetAdapter + ?Sized> TargetAdapter for Box<T> {
    fn commit_add(&self, batch: &[Document]) -> Result<(), DeliveryError> {
        (**self).commit_add(batch)
    }

    fn commit_delete(&self, references: &[String]) -> Result<(), DeliveryError> {
        (**self).commit_delete(references)
    }
}

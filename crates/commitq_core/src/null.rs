//! A no-op target for testing and measurement.

use crate::target::{DeliveryError, Document, TargetAdapter};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A target adapter that accepts every batch and performs no external
/// I/O, counting what it would have committed.
///
/// Useful for measuring queue throughput and for draining a queue
/// without a real target (`commitq drain`).
#[derive(Debug, Default)]
pub struct NullTarget {
    docs_added: AtomicUsize,
    docs_deleted: AtomicUsize,
    batches: AtomicUsize,
}

impl NullTarget {
    /// Creates a null target with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents accepted for addition.
    #[must_use]
    pub fn docs_added(&self) -> usize {
        self.docs_added.load(Ordering::Relaxed)
    }

    /// Number of references accepted for deletion.
    #[must_use]
    pub fn docs_deleted(&self) -> usize {
        self.docs_deleted.load(Ordering::Relaxed)
    }

    /// Number of batches accepted (adds and deletes combined).
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }
}

impl TargetAdapter for NullTarget {
    fn commit_add(&self, batch: &[Document]) -> Result<(), DeliveryError> {
        self.docs_added.fetch_add(batch.len(), Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn commit_delete(&self, references: &[String]) -> Result<(), DeliveryError> {
        self.docs_deleted.fetch_add(references.len(), Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

//! Grouping pending entries into bounded batches.

use commitq_queue::{QueueEntry, QueueResult};

/// A finite, ordered set of queue entries handed atomically to one
/// target adapter call.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<QueueEntry>,
}

impl Batch {
    /// Number of entries in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries, in enqueue order.
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }
}

/// Draws up to `max` entries from the front of `pending`, without
/// skipping or reordering.
///
/// Returns fewer entries if the sequence is exhausted, and an empty
/// batch if nothing is pending. Listing errors propagate.
pub fn next_batch<I>(pending: &mut I, max: usize) -> QueueResult<Batch>
where
    I: Iterator<Item = QueueResult<QueueEntry>>,
{
    let mut entries = Vec::new();
    while entries.len() < max {
        match pending.next() {
            Some(entry) => entries.push(entry?),
            None => break,
        }
    }
    Ok(Batch { entries })
}

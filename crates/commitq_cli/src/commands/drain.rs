//! Drain command implementation.

use commitq_core::{CommitConfig, CommitDriver, NullTarget};
use commitq_queue::FileQueue;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Flushes the queue into a discarding null target and prints what
/// would have been committed.
pub fn run(path: &Path, batch_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    info!("Draining queue at {:?}", path);
    let config = CommitConfig::new()
        .queue_dir(path)
        .batch_size(batch_size);

    let queue = Arc::new(FileQueue::open(path)?);
    let driver = CommitDriver::new(queue, NullTarget::new(), config);
    let report = driver.flush()?;

    println!(
        "drained {} add(s) and {} remove(s) in {} batch(es)",
        report.docs_added, report.docs_removed, report.batches
    );
    Ok(())
}

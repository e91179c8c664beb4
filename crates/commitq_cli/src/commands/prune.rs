//! Prune command implementation.

use commitq_queue::FileQueue;
use std::path::Path;
use tracing::info;

/// Runs directory maintenance once on a queue root.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Pruning empty partitions under {:?}", path);
    let queue = FileQueue::open(path)?;
    let removed = queue.prune_empty_partitions()?;
    println!("removed {removed} empty partition(s)");
    Ok(())
}

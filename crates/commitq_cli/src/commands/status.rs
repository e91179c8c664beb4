//! Status command implementation.

use commitq_queue::{FileQueue, OpKind};
use std::fs;
use std::path::Path;
use tracing::info;

/// Prints pending entry and partition counts for a queue root.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Inspecting queue at {:?}", path);
    let queue = FileQueue::open(path)?;

    println!("Queue: {}", path.display());
    for kind in [OpKind::Add, OpKind::Remove] {
        let pending = queue.pending_count(kind)?;
        let partitions = partition_count(&path.join(kind.dir_name()))?;
        println!(
            "  {:<7} {} pending in {} partition(s)",
            kind.dir_name(),
            pending,
            partitions
        );
    }
    Ok(())
}

fn partition_count(subtree: &Path) -> Result<usize, std::io::Error> {
    match fs::read_dir(subtree) {
        Ok(rd) => Ok(rd.filter_map(Result::ok).filter(|d| d.path().is_dir()).count()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

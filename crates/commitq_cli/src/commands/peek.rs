//! Peek command implementation.

use commitq_queue::{FileQueue, OpKind};
use std::path::Path;

/// Lists up to `limit` pending references without consuming them.
pub fn run(path: &Path, kind: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let kinds: Vec<OpKind> = match kind {
        "add" => vec![OpKind::Add],
        "remove" => vec![OpKind::Remove],
        "all" => vec![OpKind::Add, OpKind::Remove],
        other => return Err(format!("unknown kind: {other} (use add, remove, all)").into()),
    };

    let queue = FileQueue::open(path)?;
    let mut shown = 0;
    for kind in kinds {
        for entry in queue.pending(kind)? {
            if shown >= limit {
                println!("... (limit {limit} reached)");
                return Ok(());
            }
            let entry = entry?;
            println!(
                "{:<7} {} {}",
                kind.dir_name(),
                entry.name(),
                entry.read_reference()?
            );
            shown += 1;
        }
    }
    if shown == 0 {
        println!("queue is empty");
    }
    Ok(())
}

//! Directory maintenance: reclaiming drained partition directories.
//!
//! As the queue drains, time partitions empty out and would otherwise
//! accumulate forever, growing the cost of every scan. Maintenance
//! removes the empty ones and sweeps out the half-written files a
//! crashed enqueue can leave behind. It runs after a flush cycle (and
//! from the CLI), never on individual deletes, to bound its own cost.

use crate::entry::META_SUFFIX;
use crate::error::QueueResult;
use crate::naming;
use crate::op::OpKind;
use crate::queue::{sorted_partitions, sync_dir, FileQueue, TMP_SUFFIX};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

impl FileQueue {
    /// Removes empty partition directories under both subtrees, and
    /// reclaims leftovers of enqueues that crashed before their commit
    /// rename (`.tmp` files, `.meta` sidecars with no content file).
    ///
    /// Only partitions at least one full window older than the current
    /// wall-clock window are touched. An enqueue stamps its entry
    /// before creating its partition directory, so a writer straddling
    /// a window boundary still lands inside the slack. A partition
    /// that gains an entry between the emptiness check and the removal
    /// is skipped; removal is atomic at the directory level, so a
    /// concurrent writer is never broken.
    ///
    /// Per-partition failures are logged and skipped; pruning is pure
    /// maintenance and retried on the next cycle. Returns the number
    /// of directories removed.
    pub fn prune_empty_partitions(&self) -> QueueResult<usize> {
        let cutoff = naming::partition_name(
            naming::now_epoch_ms().saturating_sub(naming::PARTITION_WINDOW_MS),
        );
        let mut removed = 0;

        for kind in [OpKind::Add, OpKind::Remove] {
            let subtree = self.subtree(kind);
            let mut pruned_any = false;

            for dir in sorted_partitions(&subtree)? {
                let name = dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_owned();
                if name >= cutoff {
                    continue;
                }

                reclaim_orphans(&dir);

                let empty = match fs::read_dir(&dir) {
                    Ok(mut rd) => rd.next().is_none(),
                    Err(e) => {
                        warn!("cannot inspect partition {:?}: {}", dir, e);
                        continue;
                    }
                };
                if !empty {
                    continue;
                }

                match fs::remove_dir(&dir) {
                    Ok(()) => {
                        debug!("pruned empty partition {:?}", dir);
                        removed += 1;
                        pruned_any = true;
                    }
                    // A concurrent enqueue won the race; keep the dir.
                    Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("cannot prune partition {:?}: {}", dir, e),
                }
            }

            if pruned_any {
                sync_dir(&subtree)?;
            }
        }

        Ok(removed)
    }
}

/// Deletes crash leftovers in an old partition: `.tmp` content files
/// that never got renamed, and `.meta` sidecars whose content file
/// never appeared. Such entries were never visible, but their files
/// keep the partition from ever being pruned. Old windows have no
/// in-flight writers, so nothing here races an enqueue.
fn reclaim_orphans(dir: &Path) {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            warn!("cannot inspect partition {:?}: {}", dir, e);
            return;
        }
    };

    for dirent in read_dir.flatten() {
        let file_name = dirent.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let orphan = if name.ends_with(TMP_SUFFIX) {
            true
        } else if let Some(stem) = name.strip_suffix(META_SUFFIX) {
            !dir.join(stem).exists()
        } else {
            false
        };

        if orphan {
            match fs::remove_file(dirent.path()) {
                Ok(()) => debug!("reclaimed orphan {:?}", dirent.path()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("cannot reclaim orphan {:?}: {}", dirent.path(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Metadata;
    use tempfile::tempdir;

    #[test]
    fn prune_removes_drained_partitions() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        // Build an old, fully drained partition by hand.
        let old = queue.subtree(OpKind::Add).join("w000000000001");
        fs::create_dir_all(&old).unwrap();

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
    }

    #[test]
    fn prune_skips_current_window() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        // Enqueue and drain, leaving the current partition empty.
        queue.enqueue_add("doc1", b"x", Metadata::new()).unwrap();
        let entry = queue
            .pending(OpKind::Add)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        queue.delete(&entry).unwrap();

        queue.prune_empty_partitions().unwrap();

        // The current window stays even when empty.
        assert_eq!(sorted_partitions(&queue.subtree(OpKind::Add)).unwrap().len(), 1);
    }

    #[test]
    fn prune_skips_previous_window() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        // An empty partition one window back may still receive a
        // writer that stamped its entry just before the boundary.
        let previous = naming::partition_name(
            naming::now_epoch_ms() - naming::PARTITION_WINDOW_MS,
        );
        let dir = queue.subtree(OpKind::Add).join(&previous);
        fs::create_dir_all(&dir).unwrap();

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 0);
        assert!(dir.exists());
    }

    #[test]
    fn prune_reclaims_crash_leftovers() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        // A sidecar without its content file and a stray tmp file, as
        // left by an enqueue that crashed before the commit rename.
        let old = queue.subtree(OpKind::Add).join("w000000000003");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("0000000180000-0000000000.meta"), b"commit.reference=doc1\n")
            .unwrap();
        fs::write(old.join("0000000180001-0000000001.tmp"), b"half").unwrap();

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
    }

    #[test]
    fn reclamation_keeps_live_entries() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        let old = queue.subtree(OpKind::Add).join("w000000000003");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("0000000180000-0000000000"), b"body").unwrap();
        fs::write(old.join("0000000180000-0000000000.meta"), b"commit.reference=doc1\n")
            .unwrap();
        fs::write(old.join("0000000180001-0000000001.tmp"), b"half").unwrap();

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 0);
        assert!(old.exists());
        assert!(!old.join("0000000180001-0000000001.tmp").exists());
        assert_eq!(queue.pending_count(OpKind::Add).unwrap(), 1);
        assert_eq!(
            queue.pending(OpKind::Add).unwrap().next().unwrap().unwrap()
                .read_reference().unwrap(),
            "doc1"
        );
    }

    #[test]
    fn prune_keeps_occupied_partitions() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        let old = queue.subtree(OpKind::Remove).join("w000000000002");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("0000000120000-0000000000"), b"doc1").unwrap();

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 0);
        assert!(old.exists());
        assert_eq!(queue.pending_count(OpKind::Remove).unwrap(), 1);
    }

    #[test]
    fn drained_queue_leaves_no_empty_old_partitions() {
        let temp = tempdir().unwrap();
        let queue = FileQueue::open(temp.path()).unwrap();

        // Several artificial old partitions, all drained.
        for window in 1..=3 {
            let dir = queue
                .subtree(OpKind::Add)
                .join(format!("w{window:012}"));
            fs::create_dir_all(&dir).unwrap();
        }

        let removed = queue.prune_empty_partitions().unwrap();
        assert_eq!(removed, 3);
        assert!(sorted_partitions(&queue.subtree(OpKind::Add))
            .unwrap()
            .is_empty());
    }
}

//! The durable file queue.
//!
//! Queue root layout:
//!
//! ```text
//! <root>/
//! ├─ LOCK                        # advisory lock, single instance
//! ├─ add/
//! │  └─ w000029290400/           # creation-time partition
//! │     ├─ 1757424000000-0000000000       # content file
//! │     └─ 1757424000000-0000000000.meta  # key=value sidecar
//! └─ remove/
//!    └─ w000029290400/
//!       └─ 1757424000000-0000000001       # content = reference
//! ```
//!
//! ## Durability
//!
//! An enqueue is acknowledged only after the entry's files are fsynced
//! and the final rename is fsynced at the directory level. The commit
//! point is the rename of the `.tmp` content file to its final name:
//! listers ignore `.tmp` and `.meta` files, so an entry is never
//! visible half-written.
//!
//! ## Ordering
//!
//! `pending` yields entries sorted by partition name and then entry
//! name, never in raw readdir order. Entry names sort by creation
//! stamp + sequence, so enumeration order is enqueue order. This is a
//! correctness requirement: a remove enqueued after an add for the
//! same reference must reach the target after it.

use crate::entry::{QueueEntry, META_SUFFIX};
use crate::error::{QueueError, QueueResult};
use crate::naming::{self, EntryNamer};
use crate::op::{Metadata, OpKind, Operation, REFERENCE_KEY};
use crate::sidecar;
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// A durable, ordered operation queue backed by a directory tree.
///
/// Enqueues may run concurrently from any number of producer threads;
/// the naming scheme makes them collision-free without locking. Only
/// one `FileQueue` instance may hold a given root at a time (advisory
/// `LOCK` file, as a guard against accidental double-starts).
#[derive(Debug)]
pub struct FileQueue {
    root: PathBuf,
    namer: EntryNamer,
    cycle: Mutex<()>,
    _lock_file: File,
}

/// Exclusive guard over one flush cycle on a queue root.
///
/// Consumers that drain and delete entries must hold this for the
/// whole cycle; dropping it lets the next cycle start.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl FileQueue {
    /// Opens or creates a queue rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Locked`] if another instance holds the
    /// root, [`QueueError::NotADirectory`] if `root` exists but is not
    /// a directory, or an I/O error.
    pub fn open(root: &Path) -> QueueResult<Self> {
        if root.exists() && !root.is_dir() {
            return Err(QueueError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        fs::create_dir_all(root.join(OpKind::Add.dir_name()))?;
        fs::create_dir_all(root.join(OpKind::Remove.dir_name()))?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(QueueError::Locked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            namer: EntryNamer::new(),
            cycle: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Blocks until this queue's flush-cycle lock is free, then takes
    /// it. At most one cycle runs per queue root, no matter how many
    /// consumers share the queue.
    pub fn begin_cycle(&self) -> CycleGuard<'_> {
        CycleGuard {
            _guard: self.cycle.lock(),
        }
    }

    /// Non-blocking variant of [`FileQueue::begin_cycle`]; returns
    /// `None` if a cycle is already running.
    pub fn try_begin_cycle(&self) -> Option<CycleGuard<'_>> {
        self.cycle.try_lock().map(|guard| CycleGuard { _guard: guard })
    }

    /// Returns the queue root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the subtree holding entries of `kind`.
    pub(crate) fn subtree(&self, kind: OpKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Persists an operation; durable once this returns.
    ///
    /// Returns the entry name assigned to the operation.
    pub fn enqueue(&self, op: &Operation) -> QueueResult<String> {
        let (stamp, name) = self.namer.next();
        let dir = self.subtree(op.kind()).join(naming::partition_name(stamp));

        // Maintenance may remove a still-empty partition directory as
        // it crosses a window boundary, failing the first file create
        // here with NotFound. Recreate the directory and retry;
        // bounded so an unrelated missing-path error still surfaces.
        let mut attempts = 0;
        loop {
            fs::create_dir_all(&dir)?;
            match write_entry(op, &dir, &name) {
                Ok(()) => break,
                Err(QueueError::Io(e))
                    if attempts < 2 && e.kind() == std::io::ErrorKind::NotFound =>
                {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
        sync_dir(&dir)?;

        tracing::debug!("enqueued {:?} entry {}", op.kind(), name);
        Ok(name)
    }

    /// Convenience wrapper: enqueues an add operation.
    pub fn enqueue_add(
        &self,
        reference: &str,
        content: &[u8],
        metadata: Metadata,
    ) -> QueueResult<String> {
        self.enqueue(&Operation::add(reference, content.to_vec(), metadata))
    }

    /// Convenience wrapper: enqueues a remove operation.
    ///
    /// Only the reference is persisted; `metadata` is accepted for
    /// interface symmetry with [`FileQueue::enqueue_add`].
    pub fn enqueue_remove(&self, reference: &str, metadata: Metadata) -> QueueResult<String> {
        self.enqueue(&Operation::remove(reference, metadata))
    }

    /// Returns a lazy iterator over pending entries of `kind`, in
    /// creation order.
    ///
    /// Re-listing after partial consumption yields exactly the
    /// still-present entries in the same relative order.
    pub fn pending(&self, kind: OpKind) -> QueueResult<Pending> {
        Pending::open(&self.subtree(kind), kind)
    }

    /// Counts pending entries of `kind`.
    pub fn pending_count(&self, kind: OpKind) -> QueueResult<usize> {
        let mut count = 0;
        for entry in self.pending(kind)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Deletes an entry's content file and sidecar.
    ///
    /// Idempotent: deleting an already-absent entry is not an error.
    /// Only the commit driver may call this, and only after the target
    /// confirmed the batch containing the entry.
    pub fn delete(&self, entry: &QueueEntry) -> QueueResult<()> {
        remove_if_present(entry.path())?;
        if entry.kind() == OpKind::Add {
            remove_if_present(&entry.sidecar_path())?;
        }
        Ok(())
    }
}

/// Writes one entry's files into its partition directory. The sidecar
/// lands first; the content rename is the commit point.
fn write_entry(op: &Operation, dir: &Path, name: &str) -> QueueResult<()> {
    match op.kind() {
        OpKind::Add => {
            let mut metadata = op.metadata().clone();
            metadata.set(REFERENCE_KEY, op.reference());
            write_durable(&dir.join(format!("{name}{META_SUFFIX}")), &sidecar::encode(&metadata))?;
            commit_content(dir, name, op.content().unwrap_or_default())
        }
        OpKind::Remove => commit_content(dir, name, op.reference().as_bytes()),
    }
}

/// Writes `data` to `path` and fsyncs the file.
fn write_durable(path: &Path, data: &[u8]) -> QueueResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

/// Writes content to `<name>.tmp` and renames it to `<name>`.
///
/// The rename is the commit point making the entry visible to listers.
fn commit_content(dir: &Path, name: &str, content: &[u8]) -> QueueResult<()> {
    let tmp_path = dir.join(format!("{name}{TMP_SUFFIX}"));
    write_durable(&tmp_path, content)?;
    fs::rename(&tmp_path, dir.join(name))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> QueueResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Fsyncs a directory so entry creation, rename, and deletion are
/// durable. Windows NTFS journals metadata, so this is a no-op there.
#[cfg(unix)]
pub(crate) fn sync_dir(path: &Path) -> QueueResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_path: &Path) -> QueueResult<()> {
    Ok(())
}

/// Lists partition directory paths under `subtree`, sorted by name.
pub(crate) fn sorted_partitions(subtree: &Path) -> QueueResult<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(subtree) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names: Vec<String> = Vec::new();
    for dirent in read_dir {
        let dirent = dirent?;
        if let Some(name) = dirent.file_name().to_str() {
            if naming::is_partition_name(name) && dirent.path().is_dir() {
                names.push(name.to_owned());
            }
        }
    }
    names.sort_unstable();
    Ok(names.into_iter().map(|n| subtree.join(n)).collect())
}

/// Lazy, ordered enumeration of pending entries of one kind.
///
/// Partition directories are listed up front (sorted); each partition's
/// entries are read and sorted only when the iterator reaches it, so
/// memory is bounded by the fan-out of a single partition, never the
/// whole queue depth.
#[derive(Debug)]
pub struct Pending {
    kind: OpKind,
    partitions: std::vec::IntoIter<PathBuf>,
    current: std::vec::IntoIter<QueueEntry>,
    failed: bool,
}

impl Pending {
    fn open(subtree: &Path, kind: OpKind) -> QueueResult<Self> {
        Ok(Self {
            kind,
            partitions: sorted_partitions(subtree)?.into_iter(),
            current: Vec::new().into_iter(),
            failed: false,
        })
    }

    /// Loads one partition's entries, sorted by name.
    fn load_partition(dir: &Path, kind: OpKind) -> QueueResult<Vec<QueueEntry>> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            // Pruned between listing and traversal.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = Vec::new();
        for dirent in read_dir {
            let dirent = dirent?;
            if let Some(name) = dirent.file_name().to_str() {
                if naming::is_entry_name(name) {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort_unstable();
        Ok(names
            .into_iter()
            .map(|n| QueueEntry::new(kind, dir.join(n)))
            .collect())
    }
}

impl Iterator for Pending {
    type Item = QueueResult<QueueEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(entry) = self.current.next() {
                return Some(Ok(entry));
            }
            let dir = self.partitions.next()?;
            match Self::load_partition(&dir, self.kind) {
                Ok(entries) => self.current = entries.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

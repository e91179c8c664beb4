//! The commit driver: pulls batches from the queue, delivers them to
//! the target, retries transient failures, and deletes consumed
//! entries only on confirmed success.
//!
//! ## Flush cycle
//!
//! ```text
//! Idle → Listing → Batching → Delivering → Succeeding → Batching ...
//!                                        ↘ Retrying  → Delivering
//!                                        ↘ Failing   → Idle
//! ```
//!
//! The add pass fully drains (or aborts) before the remove pass
//! starts: a remove enqueued after an add for the same reference must
//! win at the target. Each pass lists the queue once and draws
//! successive batches from that listing; a retried batch is re-sent
//! as-is, never re-listed, so retry cannot drift the batch contents.
//!
//! Delivery is at-least-once: a crash between a confirmed remote
//! commit and the local delete re-delivers on restart.

use crate::batch::{next_batch, Batch};
use crate::config::CommitConfig;
use crate::error::{CommitError, CommitResult};
use crate::target::{DeliveryError, Document, TargetAdapter};
use commitq_queue::{FileQueue, OpKind};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative cancellation handle for an in-flight retry wait.
///
/// Cancelling makes the current (or next) retry wait return
/// immediately; the cycle then ends with
/// [`CommitError::Interrupted`] without touching the current batch.
/// The token re-arms at the start of each flush cycle, so a past
/// cancellation never short-circuits a later flush.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation, waking any in-flight retry wait.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Re-arms the token for a new cycle.
    fn clear(&self) {
        *self.inner.cancelled.lock() = false;
    }

    /// Blocks for up to `timeout` or until cancelled.
    ///
    /// Returns true if cancellation was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return true;
        }
        let _ = self.inner.condvar.wait_for(&mut cancelled, timeout);
        *cancelled
    }
}

/// Counts of what one flush cycle delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Documents delivered for addition.
    pub docs_added: usize,
    /// References delivered for removal.
    pub docs_removed: usize,
    /// Delivery calls that succeeded.
    pub batches: usize,
}

/// Drives one queue's entries to one target adapter.
///
/// The queue is shared with producers (enqueues may run concurrently
/// with a flush), but flush cycles are serialized by the queue's own
/// cycle lock, so no two cycles race on the same queue root even when
/// several drivers share one queue.
pub struct CommitDriver<T: TargetAdapter> {
    queue: Arc<FileQueue>,
    target: T,
    config: CommitConfig,
    cancel: CancelToken,
}

impl<T: TargetAdapter> CommitDriver<T> {
    /// Creates a driver over an open queue and a target adapter.
    pub fn new(queue: Arc<FileQueue>, target: T, config: CommitConfig) -> Self {
        Self {
            queue,
            target,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// The underlying queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<FileQueue> {
        &self.queue
    }

    /// The target adapter.
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// A clonable handle that can interrupt this driver's retry waits
    /// from another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one flush cycle: drains pending adds, then pending
    /// removes, in batches.
    ///
    /// On failure the cycle aborts with nothing deleted from the
    /// failed batch onward; the queue is left exactly as it was for
    /// the next invocation, which resumes from the same point.
    pub fn flush(&self) -> CommitResult<FlushReport> {
        let _cycle = self.queue.begin_cycle();
        self.cancel.clear();
        let mut report = FlushReport::default();

        self.flush_adds(&mut report)?;
        self.flush_removes(&mut report)?;

        // Maintenance is best-effort; a failed prune is retried on the
        // next cycle.
        if let Err(e) = self.queue.prune_empty_partitions() {
            warn!("partition pruning failed: {}", e);
        }

        debug!(
            "flush cycle done: {} added, {} removed in {} batches",
            report.docs_added, report.docs_removed, report.batches
        );
        Ok(report)
    }

    fn flush_adds(&self, report: &mut FlushReport) -> CommitResult<()> {
        let mut pending = self.queue.pending(OpKind::Add)?;
        loop {
            let batch = next_batch(&mut pending, self.config.batch_size)?;
            if batch.is_empty() {
                return Ok(());
            }

            let documents = load_documents(&batch)?;
            info!("sending {} documents to target for addition", documents.len());
            self.deliver(|| self.target.commit_add(&documents))?;

            self.consume(&batch)?;
            report.docs_added += documents.len();
            report.batches += 1;
        }
    }

    fn flush_removes(&self, report: &mut FlushReport) -> CommitResult<()> {
        let mut pending = self.queue.pending(OpKind::Remove)?;
        loop {
            let batch = next_batch(&mut pending, self.config.batch_size)?;
            if batch.is_empty() {
                return Ok(());
            }

            let references = load_references(&batch)?;
            info!("sending {} references to target for removal", references.len());
            self.deliver(|| self.target.commit_delete(&references))?;

            self.consume(&batch)?;
            report.docs_removed += references.len();
            report.batches += 1;
        }
    }

    /// Deletes every entry of a confirmed batch.
    fn consume(&self, batch: &Batch) -> CommitResult<()> {
        for entry in batch.entries() {
            self.queue.delete(entry)?;
        }
        Ok(())
    }

    /// Invokes one delivery call, retrying transient failures up to
    /// the configured budget with an interruptible wait in between.
    ///
    /// With `max_retries = N` the call is attempted exactly `N + 1`
    /// times before giving up.
    fn deliver<F>(&self, call: F) -> CommitResult<()>
    where
        F: Fn() -> Result<(), DeliveryError>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    if attempt >= self.config.max_retries {
                        return Err(CommitError::RetriesExhausted {
                            attempts: attempt + 1,
                            source: e,
                        });
                    }
                    attempt += 1;
                    warn!(
                        "transient delivery failure ({}), retry {}/{} after {:?}",
                        e, attempt, self.config.max_retries, self.config.retry_delay
                    );
                    if self.cancel.wait(self.config.retry_delay) {
                        return Err(CommitError::Interrupted);
                    }
                }
                Err(e) => return Err(CommitError::Permanent(e)),
            }
        }
    }
}

fn load_documents(batch: &Batch) -> CommitResult<Vec<Document>> {
    let mut documents = Vec::with_capacity(batch.len());
    for entry in batch.entries() {
        documents.push(Document {
            reference: entry.read_reference()?,
            content: entry.read_content()?,
            metadata: entry.read_metadata()?,
        });
    }
    Ok(documents)
}

fn load_references(batch: &Batch) -> CommitResult<Vec<String>> {
    batch
        .entries()
        .iter()
        .map(|entry| Ok(entry.read_reference()?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitq_queue::Metadata;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Records every batch it receives, optionally failing first.
    #[derive(Default)]
    struct RecordingTarget {
        adds: Mutex<Vec<Vec<String>>>,
        deletes: Mutex<Vec<Vec<String>>>,
        transient_failures: AtomicUsize,
        calls: AtomicUsize,
        permanent: bool,
    }

    impl RecordingTarget {
        fn failing_transiently(n: usize) -> Self {
            Self {
                transient_failures: AtomicUsize::new(n),
                ..Self::default()
            }
        }

        fn failing_permanently() -> Self {
            Self {
                permanent: true,
                ..Self::default()
            }
        }

        fn check(&self) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent {
                return Err(DeliveryError::permanent("rejected"));
            }
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DeliveryError::transient("unavailable"));
            }
            Ok(())
        }
    }

    impl TargetAdapter for RecordingTarget {
        fn commit_add(&self, batch: &[Document]) -> Result<(), DeliveryError> {
            self.check()?;
            self.adds
                .lock()
                .push(batch.iter().map(|d| d.reference.clone()).collect());
            Ok(())
        }

        fn commit_delete(&self, references: &[String]) -> Result<(), DeliveryError> {
            self.check()?;
            self.deletes.lock().push(references.to_vec());
            Ok(())
        }
    }

    fn driver_with(
        temp: &tempfile::TempDir,
        target: RecordingTarget,
        config: CommitConfig,
    ) -> CommitDriver<RecordingTarget> {
        let queue = Arc::new(FileQueue::open(temp.path()).unwrap());
        CommitDriver::new(queue, target, config)
    }

    fn fast_config() -> CommitConfig {
        CommitConfig::new().retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn single_add_scenario() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::default(),
            fast_config().batch_size(10),
        );

        driver
            .queue()
            .enqueue_add("doc1", b"hello", Metadata::new())
            .unwrap();

        let report = driver.flush().unwrap();
        assert_eq!(report.docs_added, 1);
        assert_eq!(report.batches, 1);

        let adds = driver.target().adds.lock();
        assert_eq!(adds.as_slice(), &[vec!["doc1".to_owned()]]);
        drop(adds);

        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 0);
    }

    #[test]
    fn batches_never_exceed_max_size() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::default(),
            fast_config().batch_size(4),
        );

        for i in 0..10 {
            driver
                .queue()
                .enqueue_add(&format!("doc{i}"), b"x", Metadata::new())
                .unwrap();
        }

        let report = driver.flush().unwrap();
        assert_eq!(report.docs_added, 10);
        assert_eq!(report.batches, 3);

        let adds = driver.target().adds.lock();
        assert!(adds.iter().all(|b| b.len() <= 4));
        assert_eq!(adds.iter().map(Vec::len).sum::<usize>(), 10);
    }

    #[test]
    fn adds_delivered_before_removes() {
        let temp = tempdir().unwrap();
        let driver = driver_with(&temp, RecordingTarget::default(), fast_config());

        driver
            .queue()
            .enqueue_add("doc1", b"v1", Metadata::new())
            .unwrap();
        driver
            .queue()
            .enqueue_remove("doc1", Metadata::new())
            .unwrap();

        let report = driver.flush().unwrap();
        assert_eq!(report.docs_added, 1);
        assert_eq!(report.docs_removed, 1);

        // Both attempts happened, add first.
        assert_eq!(driver.target().adds.lock().len(), 1);
        assert_eq!(
            driver.target().deletes.lock().as_slice(),
            &[vec!["doc1".to_owned()]]
        );
    }

    #[test]
    fn retry_count_is_honored_exactly() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::failing_transiently(3),
            fast_config().max_retries(3),
        );

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();

        driver.flush().unwrap();
        // Fails 3 times, succeeds on attempt 4.
        assert_eq!(driver.target().calls.load(Ordering::SeqCst), 4);
        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 0);
    }

    #[test]
    fn retries_exhausted_leaves_batch_queued() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::failing_transiently(100),
            fast_config().max_retries(2),
        );

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();

        let result = driver.flush();
        assert!(matches!(
            result,
            Err(CommitError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(driver.target().calls.load(Ordering::SeqCst), 3);
        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 1);
    }

    #[test]
    fn permanent_failure_aborts_without_deleting() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::failing_permanently(),
            fast_config().max_retries(5),
        );

        for i in 0..3 {
            driver
                .queue()
                .enqueue_add(&format!("doc{i}"), b"x", Metadata::new())
                .unwrap();
        }

        let result = driver.flush();
        assert!(matches!(result, Err(CommitError::Permanent(_))));
        // No retry for permanent failures.
        assert_eq!(driver.target().calls.load(Ordering::SeqCst), 1);
        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 3);
    }

    #[test]
    fn failed_add_pass_leaves_removes_untouched() {
        let temp = tempdir().unwrap();
        let driver = driver_with(&temp, RecordingTarget::failing_permanently(), fast_config());

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();
        driver
            .queue()
            .enqueue_remove("doc2", Metadata::new())
            .unwrap();

        assert!(driver.flush().is_err());
        assert!(driver.target().deletes.lock().is_empty());
        assert_eq!(driver.queue().pending_count(OpKind::Remove).unwrap(), 1);
    }

    #[test]
    fn second_flush_is_noop() {
        let temp = tempdir().unwrap();
        let driver = driver_with(&temp, RecordingTarget::default(), fast_config());

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();

        driver.flush().unwrap();
        let report = driver.flush().unwrap();
        assert_eq!(report, FlushReport::default());
        assert_eq!(driver.target().adds.lock().len(), 1);
    }

    #[test]
    fn cancellation_interrupts_retry_wait() {
        let temp = tempdir().unwrap();
        let driver = driver_with(
            &temp,
            RecordingTarget::failing_transiently(100),
            CommitConfig::new()
                .max_retries(10)
                .retry_delay(Duration::from_secs(600)),
        );

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();

        let token = driver.cancel_token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });

        let result = driver.flush();
        canceller.join().unwrap();

        assert!(matches!(result, Err(CommitError::Interrupted)));
        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 1);
    }

    #[test]
    fn cancellation_does_not_poison_later_cycles() {
        use std::sync::mpsc;

        /// Fails its first call after signalling it, succeeds after.
        struct GatedTarget {
            started: mpsc::Sender<()>,
            calls: AtomicUsize,
        }

        impl TargetAdapter for GatedTarget {
            fn commit_add(&self, _batch: &[Document]) -> Result<(), DeliveryError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    let _ = self.started.send(());
                    return Err(DeliveryError::transient("unavailable"));
                }
                Ok(())
            }

            fn commit_delete(&self, _references: &[String]) -> Result<(), DeliveryError> {
                Ok(())
            }
        }

        let temp = tempdir().unwrap();
        let (started, first_call) = mpsc::channel();
        let queue = Arc::new(FileQueue::open(temp.path()).unwrap());
        let driver = CommitDriver::new(
            queue,
            GatedTarget {
                started,
                calls: AtomicUsize::new(0),
            },
            CommitConfig::new()
                .max_retries(5)
                .retry_delay(Duration::from_secs(600)),
        );

        driver
            .queue()
            .enqueue_add("doc1", b"x", Metadata::new())
            .unwrap();

        let token = driver.cancel_token();
        let canceller = std::thread::spawn(move || {
            first_call.recv().unwrap();
            token.cancel();
        });
        let result = driver.flush();
        canceller.join().unwrap();
        assert!(matches!(result, Err(CommitError::Interrupted)));

        // The next cycle starts un-cancelled and completes.
        let report = driver.flush().unwrap();
        assert_eq!(report.docs_added, 1);
        assert_eq!(driver.queue().pending_count(OpKind::Add).unwrap(), 0);
    }

    #[test]
    fn flush_prunes_drained_partitions() {
        let temp = tempdir().unwrap();
        let driver = driver_with(&temp, RecordingTarget::default(), fast_config());

        // Simulate an old partition with one entry left.
        let old = driver.queue().root().join("add").join("w000000000001");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("0000000060000-0000000000"), b"x").unwrap();
        std::fs::write(
            old.join("0000000060000-0000000000.meta"),
            b"commit.reference=olddoc\n",
        )
        .unwrap();

        driver.flush().unwrap();
        assert!(!old.exists());
        assert_eq!(
            driver.target().adds.lock().as_slice(),
            &[vec!["olddoc".to_owned()]]
        );
    }
}

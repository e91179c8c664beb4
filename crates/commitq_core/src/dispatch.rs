//! Fan-out of one operation stream to several independent targets.

use crate::config::CommitConfig;
use crate::driver::{CommitDriver, FlushReport};
use crate::error::{CommitResult, FanoutError};
use crate::target::TargetAdapter;
use commitq_queue::{FileQueue, Operation, QueueResult};
use std::sync::Arc;
use tracing::warn;

/// One independently configured queue + driver + target triple.
struct Member {
    name: String,
    queue: Arc<FileQueue>,
    driver: CommitDriver<Box<dyn TargetAdapter>>,
}

/// Result of flushing one dispatcher member.
#[derive(Debug)]
pub struct MemberReport {
    /// The member's name.
    pub name: String,
    /// The member's flush outcome.
    pub result: CommitResult<FlushReport>,
}

/// Fans the same operation stream out to N independently configured
/// commit drivers.
///
/// Composition, not inheritance: each member owns its own queue root,
/// configuration, and target adapter, and flushes independently — one
/// member's permanent failure neither blocks nor corrupts another
/// member's queue or progress.
#[derive(Default)]
pub struct MultiCommitter {
    members: Vec<Member>,
}

impl MultiCommitter {
    /// Creates a dispatcher with no members.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member, opening its queue at `config.queue_dir`.
    pub fn add_member(
        &mut self,
        name: impl Into<String>,
        config: CommitConfig,
        target: Box<dyn TargetAdapter>,
    ) -> QueueResult<()> {
        let queue = Arc::new(FileQueue::open(&config.queue_dir)?);
        let driver = CommitDriver::new(Arc::clone(&queue), target, config);
        self.members.push(Member {
            name: name.into(),
            queue,
            driver,
        });
        Ok(())
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the dispatcher has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names, in registration order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Enqueues one operation to every member.
    ///
    /// Every member is attempted even if an earlier one fails; the
    /// failures, if any, are aggregated into the returned error.
    pub fn enqueue(&self, op: &Operation) -> Result<(), FanoutError> {
        let mut failures = Vec::new();
        for member in &self.members {
            if let Err(e) = member.queue.enqueue(op) {
                warn!("member {} failed to enqueue: {}", member.name, e);
                failures.push((member.name.clone(), e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FanoutError {
                attempted: self.members.len(),
                failures,
            })
        }
    }

    /// Runs every member's flush cycle, independently.
    ///
    /// Failures are reported per member, never propagated across
    /// members.
    pub fn flush_all(&self) -> Vec<MemberReport> {
        self.members
            .iter()
            .map(|member| MemberReport {
                name: member.name.clone(),
                result: member.driver.flush(),
            })
            .collect()
    }
}

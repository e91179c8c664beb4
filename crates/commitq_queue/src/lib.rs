//! # commitq queue
//!
//! Durable on-disk operation queue for commitq.
//!
//! Producers enqueue add/remove operations; each is persisted as files
//! under a time-partitioned directory tree before the enqueue returns.
//! The commit driver (in `commitq_core`) later enumerates pending
//! entries in strict enqueue order, delivers them in batches, and
//! deletes them only on confirmed success.
//!
//! ## Guarantees
//!
//! - An operation is durable (survives process crash) once `enqueue`
//!   returns.
//! - An entry is never visible to a lister before its content and
//!   sidecar are fully written (commit-by-rename).
//! - Enumeration order is enqueue order, across restarts.
//! - Entries are immutable after creation; the only mutation is
//!   deletion.
//!
//! ## Example
//!
//! ```no_run
//! use commitq_queue::{FileQueue, Metadata, OpKind};
//! use std::path::Path;
//!
//! let queue = FileQueue::open(Path::new("./queue"))?;
//! queue.enqueue_add("doc1", b"hello world", Metadata::new())?;
//! for entry in queue.pending(OpKind::Add)? {
//!     println!("pending: {}", entry?.read_reference()?);
//! }
//! # Ok::<(), commitq_queue::QueueError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod maintenance;
mod naming;
mod op;
mod queue;
mod sidecar;

pub use entry::QueueEntry;
pub use error::{QueueError, QueueResult};
pub use op::{Metadata, OpKind, Operation, REFERENCE_KEY};
pub use queue::{CycleGuard, FileQueue, Pending};

//! # commitq core
//!
//! Batching, retry, and delivery engine for commitq.
//!
//! This crate turns the durable queue of `commitq_queue` into an
//! at-least-once delivery pipeline:
//!
//! - [`CommitDriver`] pulls pending entries in enqueue order, groups
//!   them into bounded batches, delivers them through a
//!   [`TargetAdapter`], retries transient failures, and deletes
//!   consumed entries only after the target confirmed the batch.
//! - [`MultiCommitter`] fans one operation stream out to several
//!   independently configured targets.
//! - [`NullTarget`] accepts everything and counts, for tests and
//!   measurement.
//!
//! ## Example
//!
//! ```no_run
//! use commitq_core::{CommitConfig, CommitDriver, NullTarget};
//! use commitq_queue::{FileQueue, Metadata};
//! use std::sync::Arc;
//!
//! let config = CommitConfig::new().batch_size(50);
//! let queue = Arc::new(FileQueue::open(&config.queue_dir)?);
//! queue.enqueue_add("doc1", b"hello", Metadata::new())?;
//!
//! let driver = CommitDriver::new(queue, NullTarget::new(), config);
//! let report = driver.flush()?;
//! assert_eq!(report.docs_added, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod dispatch;
mod driver;
mod error;
mod null;
mod target;

pub use batch::{next_batch, Batch};
pub use config::{
    CommitConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_DIR, DEFAULT_RETRY_DELAY,
};
pub use dispatch::{MemberReport, MultiCommitter};
pub use driver::{CancelToken, CommitDriver, FlushReport};
pub use error::{CommitError, CommitResult, FanoutError};
pub use null::NullTarget;
pub use target::{DeliveryError, Document, TargetAdapter};

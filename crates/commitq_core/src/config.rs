//! Commit driver configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default queue root directory.
pub const DEFAULT_QUEUE_DIR: &str = "./queue";

/// Default number of documents per delivery call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of retries after a transient failure (none).
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default wait between delivery attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for one queue + commit driver pair.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Queue root directory.
    pub queue_dir: PathBuf,

    /// Maximum number of documents handed to the target per call.
    pub batch_size: usize,

    /// How many times a transiently failed batch is re-delivered
    /// before the cycle aborts.
    pub max_retries: u32,

    /// Wait between delivery attempts for the same batch.
    pub retry_delay: Duration,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            queue_dir: PathBuf::from(DEFAULT_QUEUE_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl CommitConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue root directory.
    #[must_use]
    pub fn queue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.queue_dir = dir.into();
        self
    }

    /// Sets the delivery batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the maximum retry count.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the wait between delivery attempts.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

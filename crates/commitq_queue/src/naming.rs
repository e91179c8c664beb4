//! Entry and partition naming.
//!
//! Entry names combine a wall-clock millisecond stamp with a
//! process-local atomic sequence: `{epoch_ms:013}-{seq:010}`. Zero
//! padding makes lexicographic order equal creation order, which is
//! what the pending iterator sorts by. The stamp is clamped to be
//! non-decreasing so a backwards clock step cannot reorder entries
//! created by this process.
//!
//! Partition directories group entries by creation window
//! (`w{epoch_ms / 60_000:012}`) so no single directory accumulates
//! unbounded entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Width of one partition window in milliseconds.
pub(crate) const PARTITION_WINDOW_MS: u64 = 60_000;

const STAMP_WIDTH: usize = 13;
const SEQ_WIDTH: usize = 10;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Partition directory name for a creation stamp.
pub(crate) fn partition_name(epoch_ms: u64) -> String {
    format!("w{:012}", epoch_ms / PARTITION_WINDOW_MS)
}

/// Whether `name` looks like a partition directory name.
pub(crate) fn is_partition_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('w') else {
        return false;
    };
    rest.len() == 12 && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `name` looks like an entry content-file name.
pub(crate) fn is_entry_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == STAMP_WIDTH + 1 + SEQ_WIDTH
        && bytes[..STAMP_WIDTH].iter().all(u8::is_ascii_digit)
        && bytes[STAMP_WIDTH] == b'-'
        && bytes[STAMP_WIDTH + 1..].iter().all(u8::is_ascii_digit)
}

/// Generates unique, monotonically sorting entry names.
///
/// Safe to call from any number of producer threads without locking:
/// uniqueness comes from the atomic sequence counter, ordering from
/// the non-decreasing stamp plus the counter.
#[derive(Debug, Default)]
pub(crate) struct EntryNamer {
    last_ms: AtomicU64,
    seq: AtomicU64,
}

impl EntryNamer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the creation stamp and the entry name.
    pub(crate) fn next(&self) -> (u64, String) {
        let now = now_epoch_ms();
        // fetch_max returns the previous value; the effective stamp is
        // whichever of the two is larger.
        let prev = self.last_ms.fetch_max(now, Ordering::Relaxed);
        let ms = prev.max(now);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        (ms, format!("{ms:013}-{seq:010}"))
    }
}

//! Handle to one persisted queue entry.

use crate::error::{QueueError, QueueResult};
use crate::op::{Metadata, OpKind, REFERENCE_KEY};
use crate::sidecar;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of the metadata sidecar next to an add entry's content file.
pub(crate) const META_SUFFIX: &str = ".meta";

/// The on-disk representation of one enqueued operation.
///
/// For adds this is a content file plus a same-named `.meta` sidecar;
/// for removes a single file whose content is the reference string.
/// Entries are immutable after creation; the only mutation ever applied
/// is deletion by the commit driver after a confirmed batch.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    kind: OpKind,
    path: PathBuf,
}

impl QueueEntry {
    pub(crate) fn new(kind: OpKind, path: PathBuf) -> Self {
        Self { kind, path }
    }

    /// The operation kind this entry persists.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Path of the entry's content file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The entry's file name (creation stamp + sequence).
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Path of the metadata sidecar (adds only).
    pub(crate) fn sidecar_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    /// Reads the entry's content bytes.
    ///
    /// For removes the content is the reference string.
    pub fn read_content(&self) -> QueueResult<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Reads the entry's metadata.
    ///
    /// Removes carry no sidecar and yield empty metadata, as does an
    /// add whose sidecar is absent.
    pub fn read_metadata(&self) -> QueueResult<Metadata> {
        if self.kind == OpKind::Remove {
            return Ok(Metadata::new());
        }
        let sidecar_path = self.sidecar_path();
        match fs::read(&sidecar_path) {
            Ok(data) => sidecar::decode(&data, &sidecar_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Metadata::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the document reference this entry refers to.
    pub fn read_reference(&self) -> QueueResult<String> {
        match self.kind {
            OpKind::Remove => {
                let bytes = self.read_content()?;
                String::from_utf8(bytes).map_err(|_| QueueError::MissingReference {
                    path: self.path.clone(),
                })
            }
            OpKind::Add => self
                .read_metadata()?
                .get(REFERENCE_KEY)
                .map(str::to_owned)
                .ok_or_else(|| QueueError::MissingReference {
                    path: self.path.clone(),
                }),
        }
    }
}

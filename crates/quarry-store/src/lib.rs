//! On-disk installation metadata for Quarry.
//!
//! This crate provides the storage layer: `InstallationLayout` for the
//! `.installation` directory structure, a blake3 content-addressed
//! `SnapshotStore` holding immutable manifest and channel snapshots, the
//! append-only `Journal` of revision records, `RevisionHistoryStore` which
//! records, lists, diffs and reverts revisions, and the structural manifest
//! and channel diff used to report changes.

pub mod diff;
pub mod history;
pub mod integrity;
pub mod journal;
pub mod layout;
pub mod objects;

pub use diff::{diff_channels, diff_manifests, ArtifactChange, ChannelChange, ChannelChangeKind};
pub use history::{HistoryState, RevisionHistoryStore, SavedState};
pub use integrity::{IntegrityFailure, IntegrityReport};
pub use journal::{Journal, RevisionKind, RevisionRecord};
pub use layout::{InstallationLayout, STORE_FORMAT_VERSION};
pub use objects::{snapshot_hash, SnapshotStore};

use quarry_schema::ManifestError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives power loss until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Replace `path` with `data` via a synced temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for object '{hash}': expected {expected}, got {actual}")]
    IntegrityFailure {
        hash: String,
        expected: String,
        actual: String,
    },
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("corrupt history entry at journal line {line}: {reason}")]
    CorruptHistory { line: usize, reason: String },
    #[error("revision not found: {0}")]
    RevisionNotFound(String),
    #[error("revision prefix '{prefix}' is ambiguous ({matches} matches)")]
    AmbiguousRevision { prefix: String, matches: usize },
    #[error("installation has no recorded revisions")]
    EmptyHistory,
    #[error("no manifest working copy at {0}")]
    MissingWorkingCopy(String),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

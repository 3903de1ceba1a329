//! Installation engine for Quarry.
//!
//! This crate ties resolution and history together into `Installation`: the
//! API for installing a manifest, discovering and applying updates, listing
//! and diffing revisions, and reverting. It also provides update-set
//! calculation, lifecycle validation against the history state, and the
//! exclusive installation lock held by every mutating operation.

pub mod concurrency;
pub mod engine;
pub mod lifecycle;
pub mod updates;

pub use concurrency::InstallationLock;
pub use engine::{ApplyResult, InstallResult, Installation};
pub use lifecycle::{validate_operation, Operation};
pub use updates::{
    channel_pin_key, ArtifactUpdate, ChannelSource, ChannelVersion, ChannelVersionChange,
    ChannelVersionMode, UpdateFailure, UpdateSet, UpdateSetCalculator,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] quarry_schema::ManifestError),
    #[error("store error: {0}")]
    Store(#[from] quarry_store::StoreError),
    #[error("resolution error: {0}")]
    Resolve(#[from] quarry_resolve::ResolveError),
    #[error("cannot {operation}: {reason}")]
    InvalidOperation { operation: String, reason: String },
    #[error("unknown revision: {0}")]
    UnknownRevision(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("channel '{0}' has a URL manifest; version discovery needs a group:artifact manifest")]
    UnversionedChannel(String),
    #[error("update set is stale: {0}")]
    StaleUpdate(String),
    #[error("cannot lock installation at {path}: {reason}")]
    LockFailed { path: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Map the store's lookup failure to [`CoreError::UnknownRevision`].
    fn from_store_lookup(e: quarry_store::StoreError) -> Self {
        match e {
            quarry_store::StoreError::RevisionNotFound(id) => CoreError::UnknownRevision(id),
            other => CoreError::Store(other),
        }
    }
}

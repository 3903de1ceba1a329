//! Artifact resolution for Quarry.
//!
//! This crate provides the `ArtifactTransport` backends (local Maven layout
//! and HTTP with an explicit local cache), `maven-metadata.xml` handling, the
//! composable `MavenRepository` strategies (direct, combined, fallback) that
//! apply curation policies when choosing the latest acceptable version, the
//! bounded-parallel `ConcurrentResolver`, and `quarry.toml` configuration.

pub mod batch;
pub mod chain;
pub mod config;
pub mod http;
pub mod metadata;
pub mod repository;
pub mod transport;

pub use batch::{BatchFailure, BatchResolution, ConcurrentResolver, DEFAULT_WORKERS};
pub use chain::{build_channel_repository, build_repository, transport_for};
pub use config::{QuarryConfig, CONFIG_FILE};
pub use http::HttpRepository;
pub use metadata::MavenMetadata;
pub use repository::{
    CombinedRepository, DirectRepository, FallbackRepository, MavenRepository, ResolvedArtifact,
};
pub use transport::{ArtifactTransport, LocalRepository};

use quarry_schema::PolicyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("malformed version '{version}': {reason}")]
    MalformedVersion { version: String, reason: String },
    #[error("resolution I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("invalid repository metadata: {0}")]
    Metadata(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{}", partial_batch_message(.0))]
    PartialBatchFailure(Box<BatchResolution>),
}

fn partial_batch_message(batch: &BatchResolution) -> String {
    let names: Vec<String> = batch
        .failed
        .iter()
        .map(|f| format!("{} ({})", f.coordinate, f.error.kind()))
        .collect();
    format!(
        "{} of {} artifacts failed to resolve: {}",
        batch.failed.len(),
        batch.failed.len() + batch.resolved.len(),
        names.join(", ")
    )
}

impl ResolveError {
    /// Whether the artifact or version range was simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }

    /// Short machine-readable category, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotFound(_) => "not_found",
            ResolveError::PolicyViolation(_) => "policy_violation",
            ResolveError::MalformedVersion { .. } => "malformed_version",
            ResolveError::Io(_) | ResolveError::Http(_) => "transport",
            ResolveError::Metadata(_) => "metadata",
            ResolveError::Config(_) => "config",
            ResolveError::PartialBatchFailure(_) => "partial_batch_failure",
        }
    }
}

impl From<PolicyError> for ResolveError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::MalformedVersion { version, reason } => {
                ResolveError::MalformedVersion { version, reason }
            }
            e @ PolicyError::NoAcceptableVersion { .. } => {
                ResolveError::PolicyViolation(e.to_string())
            }
        }
    }
}

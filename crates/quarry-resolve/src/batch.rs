//! Bounded-parallel resolution of many coordinates.

use crate::repository::{MavenRepository, ResolvedArtifact};
use crate::ResolveError;
use quarry_schema::ArtifactCoordinate;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of concurrent resolution tasks.
pub const DEFAULT_WORKERS: usize = 16;

/// One coordinate that could not be resolved.
#[derive(Debug)]
pub struct BatchFailure {
    pub coordinate: ArtifactCoordinate,
    pub error: ResolveError,
}

/// Outcome of a batch: every coordinate lands in exactly one list, and both
/// lists keep the input order.
#[derive(Debug, Default)]
pub struct BatchResolution {
    pub resolved: Vec<ResolvedArtifact>,
    pub failed: Vec<BatchFailure>,
}

impl BatchResolution {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All resolved artifacts, or [`ResolveError::PartialBatchFailure`]
    /// carrying the full outcome.
    pub fn into_result(self) -> Result<Vec<ResolvedArtifact>, ResolveError> {
        if self.is_complete() {
            Ok(self.resolved)
        } else {
            Err(ResolveError::PartialBatchFailure(Box::new(self)))
        }
    }
}

/// Resolves independent coordinates on a dedicated pool of at most
/// `workers` threads. One failure never cancels the others.
pub struct ConcurrentResolver {
    repository: Arc<dyn MavenRepository>,
    workers: usize,
}

impl ConcurrentResolver {
    pub fn new(repository: Arc<dyn MavenRepository>) -> Self {
        Self {
            repository,
            workers: DEFAULT_WORKERS,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn repository(&self) -> &Arc<dyn MavenRepository> {
        &self.repository
    }

    /// Resolve each coordinate exactly as given.
    pub fn resolve_all(
        &self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<BatchResolution, ResolveError> {
        self.run(coordinates, |repo, c| repo.resolve(c))
    }

    /// Resolve the latest acceptable version of each coordinate.
    pub fn resolve_latest_all(
        &self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<BatchResolution, ResolveError> {
        self.run(coordinates, |repo, c| repo.resolve_latest_version_of(c))
    }

    fn run<F>(
        &self,
        coordinates: &[ArtifactCoordinate],
        task: F,
    ) -> Result<BatchResolution, ResolveError>
    where
        F: Fn(&dyn MavenRepository, &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError>
            + Sync,
    {
        if coordinates.is_empty() {
            return Ok(BatchResolution::default());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("quarry-resolve-{i}"))
            .build()
            .map_err(|e| ResolveError::Config(format!("resolver pool: {e}")))?;

        info!(
            "resolving {} artifact(s) with {} worker(s)",
            coordinates.len(),
            self.workers
        );
        let repo: &dyn MavenRepository = self.repository.as_ref();
        let outcomes: Vec<Result<ResolvedArtifact, ResolveError>> = pool.install(|| {
            coordinates
                .par_iter()
                .map(|c| {
                    debug!("resolving {c}");
                    task(repo, c)
                })
                .collect()
        });

        let mut batch = BatchResolution::default();
        for (coordinate, outcome) in coordinates.iter().zip(outcomes) {
            match outcome {
                Ok(resolved) => batch.resolved.push(resolved),
                Err(error) => {
                    debug!("{coordinate} failed: {error}");
                    batch.failed.push(BatchFailure {
                        coordinate: coordinate.clone(),
                        error,
                    });
                }
            }
        }
        info!(
            "resolved {}, failed {}",
            batch.resolved.len(),
            batch.failed.len()
        );
        Ok(batch)
    }
}

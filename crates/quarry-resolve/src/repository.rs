//! Composable resolution strategies.
//!
//! [`DirectRepository`] wraps one transport and applies curation policies.
//! [`CombinedRepository`] spans an ordered list of repositories and
//! [`FallbackRepository`] consults a secondary only when the primary has
//! nothing. Strategies nest freely behind [`MavenRepository`].

use crate::transport::ArtifactTransport;
use crate::ResolveError;
use quarry_schema::{ArtifactCoordinate, CurationPolicies, MavenVersion, RepositoryId, VersionRange};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A coordinate pinned to a concrete file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub coordinate: ArtifactCoordinate,
    pub path: PathBuf,
    pub repository: RepositoryId,
}

pub trait MavenRepository: Send + Sync {
    /// Resolve the exact coordinate to a local file.
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError>;

    /// Versions of the coordinate's `group:artifact` inside `range`,
    /// deduplicated and sorted ascending.
    fn version_range_of(
        &self,
        coordinate: &ArtifactCoordinate,
        range: &VersionRange,
    ) -> Result<Vec<MavenVersion>, ResolveError>;

    /// Highest version acceptable as an upgrade of `coordinate`, without
    /// downloading anything.
    fn latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<MavenVersion, ResolveError>;

    /// Resolve the highest acceptable version of `coordinate`.
    fn resolve_latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let latest = self.latest_version_of(coordinate)?;
        self.resolve(&coordinate.with_version(latest.as_str()))
    }
}

impl<T: MavenRepository + ?Sized> MavenRepository for Arc<T> {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError> {
        (**self).resolve(coordinate)
    }

    fn version_range_of(
        &self,
        coordinate: &ArtifactCoordinate,
        range: &VersionRange,
    ) -> Result<Vec<MavenVersion>, ResolveError> {
        (**self).version_range_of(coordinate, range)
    }

    fn latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<MavenVersion, ResolveError> {
        (**self).latest_version_of(coordinate)
    }

    fn resolve_latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<ResolvedArtifact, ResolveError> {
        (**self).resolve_latest_version_of(coordinate)
    }
}

/// Resolution against a single transport.
///
/// "Latest" asks for the open range `[base,)` (or exactly `[base]` in strict
/// mode) and lets the curation policies pick among the result.
pub struct DirectRepository {
    transport: Box<dyn ArtifactTransport>,
    policies: Arc<CurationPolicies>,
    strict: bool,
}

impl DirectRepository {
    pub fn new(transport: Box<dyn ArtifactTransport>, policies: Arc<CurationPolicies>) -> Self {
        Self {
            transport,
            policies,
            strict: false,
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl MavenRepository for DirectRepository {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError> {
        let path = self.transport.fetch(coordinate)?;
        debug!("resolved {coordinate} from {}", self.transport.id());
        Ok(ResolvedArtifact {
            coordinate: coordinate.clone(),
            path,
            repository: self.transport.id().clone(),
        })
    }

    fn version_range_of(
        &self,
        coordinate: &ArtifactCoordinate,
        range: &VersionRange,
    ) -> Result<Vec<MavenVersion>, ResolveError> {
        let mut versions: Vec<MavenVersion> = self
            .transport
            .list_versions(&coordinate.group_id, &coordinate.artifact_id)?
            .into_iter()
            .map(MavenVersion::new)
            .filter(|v| range.contains(v))
            .collect();
        versions.sort();
        versions.dedup();
        debug!(
            "{} versions of {} in {range} from {}",
            versions.len(),
            coordinate.name(),
            self.transport.id()
        );
        Ok(versions)
    }

    fn latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<MavenVersion, ResolveError> {
        let base = coordinate.maven_version();
        let range = if self.strict {
            VersionRange::Exact(base)
        } else {
            VersionRange::AtLeast(base)
        };
        let candidates = self.version_range_of(coordinate, &range)?;
        if candidates.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "{} {range} in {}",
                coordinate.name(),
                self.transport.id()
            )));
        }
        Ok(self
            .policies
            .select_best(&coordinate.name(), &coordinate.version, &candidates)?)
    }
}

/// Outcome bookkeeping while scanning sub-repositories.
///
/// Not-found and policy violations are absences. Transport failures are
/// remembered: `resolve` may still succeed from a later member, but version
/// queries fail with them, since a partial answer can hide the installed
/// version. Malformed versions abort immediately.
#[derive(Default)]
struct Absences {
    policy_violation: Option<ResolveError>,
    transport: Option<ResolveError>,
    not_found: Option<ResolveError>,
}

impl Absences {
    fn absorb(&mut self, err: ResolveError, index: usize) -> Result<(), ResolveError> {
        match err {
            e @ ResolveError::NotFound(_) => {
                debug!("repository #{index}: {e}");
                self.not_found.get_or_insert(e);
            }
            e @ ResolveError::PolicyViolation(_) => {
                debug!("repository #{index}: {e}");
                self.policy_violation.get_or_insert(e);
            }
            e @ (ResolveError::MalformedVersion { .. } | ResolveError::PartialBatchFailure(_)) => {
                return Err(e);
            }
            e => {
                warn!("repository #{index} failed: {e}");
                self.transport.get_or_insert(e);
            }
        }
        Ok(())
    }

    /// A member that could not be queried at all.
    fn unreachable(&mut self) -> Option<ResolveError> {
        self.transport.take()
    }

    /// The error to report when no repository produced a result.
    fn into_error(self, what: &str) -> ResolveError {
        self.policy_violation
            .or(self.transport)
            .or(self.not_found)
            .unwrap_or_else(|| ResolveError::NotFound(format!("{what}: no repositories configured")))
    }
}

/// An ordered list of repositories.
///
/// `resolve` is first-success in list order; `latest_version_of` asks every
/// member and keeps the highest; `version_range_of` is the sorted union.
/// Both version queries fail if any member is unreachable.
pub struct CombinedRepository {
    repositories: Vec<Box<dyn MavenRepository>>,
}

impl CombinedRepository {
    pub fn new(repositories: Vec<Box<dyn MavenRepository>>) -> Self {
        Self { repositories }
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl MavenRepository for CombinedRepository {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError> {
        let mut absences = Absences::default();
        for (index, repo) in self.repositories.iter().enumerate() {
            match repo.resolve(coordinate) {
                Ok(resolved) => return Ok(resolved),
                Err(e) => absences.absorb(e, index)?,
            }
        }
        Err(absences.into_error(&coordinate.to_string()))
    }

    fn version_range_of(
        &self,
        coordinate: &ArtifactCoordinate,
        range: &VersionRange,
    ) -> Result<Vec<MavenVersion>, ResolveError> {
        let mut absences = Absences::default();
        let mut answered = false;
        let mut union = Vec::new();
        for (index, repo) in self.repositories.iter().enumerate() {
            match repo.version_range_of(coordinate, range) {
                Ok(versions) => {
                    answered = true;
                    union.extend(versions);
                }
                Err(e) => absences.absorb(e, index)?,
            }
        }
        if let Some(e) = absences.unreachable() {
            return Err(e);
        }
        if !answered && !self.repositories.is_empty() {
            return Err(absences.into_error(&coordinate.name()));
        }
        union.sort();
        union.dedup();
        Ok(union)
    }

    fn latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<MavenVersion, ResolveError> {
        let mut absences = Absences::default();
        let mut best: Option<MavenVersion> = None;
        for (index, repo) in self.repositories.iter().enumerate() {
            match repo.latest_version_of(coordinate) {
                Ok(version) => {
                    if best.as_ref().map_or(true, |b| version > *b) {
                        best = Some(version);
                    }
                }
                Err(e) => absences.absorb(e, index)?,
            }
        }
        if let Some(e) = absences.unreachable() {
            return Err(e);
        }
        best.ok_or_else(|| absences.into_error(&coordinate.name()))
    }
}

/// Primary first; the fallback only when the primary has nothing.
///
/// A positive answer from the primary always wins, even if the fallback
/// could offer a higher version.
pub struct FallbackRepository {
    primary: Box<dyn MavenRepository>,
    fallback: Box<dyn MavenRepository>,
}

impl FallbackRepository {
    pub fn new(primary: Box<dyn MavenRepository>, fallback: Box<dyn MavenRepository>) -> Self {
        Self { primary, fallback }
    }
}

impl MavenRepository for FallbackRepository {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<ResolvedArtifact, ResolveError> {
        match self.primary.resolve(coordinate) {
            Err(e) if e.is_not_found() => {
                debug!("{coordinate} not in primary, trying fallback");
                self.fallback.resolve(coordinate)
            }
            other => other,
        }
    }

    fn version_range_of(
        &self,
        coordinate: &ArtifactCoordinate,
        range: &VersionRange,
    ) -> Result<Vec<MavenVersion>, ResolveError> {
        match self.primary.version_range_of(coordinate, range) {
            Ok(versions) if versions.is_empty() => self.fallback.version_range_of(coordinate, range),
            Err(e) if e.is_not_found() => self.fallback.version_range_of(coordinate, range),
            other => other,
        }
    }

    fn latest_version_of(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<MavenVersion, ResolveError> {
        match self.primary.latest_version_of(coordinate) {
            Err(e) if e.is_not_found() => {
                debug!("no {} in primary, trying fallback", coordinate.name());
                self.fallback.latest_version_of(coordinate)
            }
            other => other,
        }
    }
}

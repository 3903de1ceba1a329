//! Update discovery: which installed artifacts and channel manifests have a
//! different acceptable version available.

use crate::CoreError;
use quarry_resolve::{MavenRepository, ResolveError, DEFAULT_WORKERS};
use quarry_schema::{
    ArtifactCoordinate, ArtifactKey, Channel, CurationPolicies, Manifest, ManifestLocation,
    MavenVersion, VersionRange, MANIFEST_EXTENSION,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// A proposed version change for one installed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactUpdate {
    pub key: ArtifactKey,
    pub artifact_name: String,
    pub old_version: String,
    pub new_version: String,
    /// The proposal is lower than what is installed.
    pub downgrade: bool,
}

/// A channel manifest version: the physical artifact version and the
/// display version carried in its header, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelVersion {
    pub physical: String,
    pub logical: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelVersionChange {
    pub channel: String,
    pub old_version: String,
    pub new_version: String,
    pub new_logical_version: Option<String>,
    pub downgrade: bool,
}

/// An artifact or channel whose lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateFailure {
    pub subject: String,
    /// `not_found`, `policy_violation`, `malformed_version`, ...
    pub kind: String,
    pub message: String,
}

impl UpdateFailure {
    fn new(subject: String, error: &ResolveError) -> Self {
        Self {
            subject,
            kind: error.kind().to_owned(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSet {
    pub artifacts: Vec<ArtifactUpdate>,
    pub channels: Vec<ChannelVersionChange>,
    pub failures: Vec<UpdateFailure>,
}

impl UpdateSet {
    /// No proposed changes. Failures alone do not make a set non-empty.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.channels.is_empty()
    }

    pub fn has_downgrades(&self) -> bool {
        self.artifacts.iter().any(|a| a.downgrade) || self.channels.iter().any(|c| c.downgrade)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len() + self.channels.len()
    }
}

/// Which channel manifest versions to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVersionMode {
    /// Strictly greater than the pinned version.
    Newer,
    /// Every published version.
    Available,
}

/// A channel together with the resolver over its own repositories.
pub struct ChannelSource {
    pub channel: Channel,
    pub repository: Box<dyn MavenRepository>,
}

/// Identity key under which a channel's manifest is pinned in an installed
/// manifest, or `None` for URL-backed channels.
pub fn channel_pin_key(channel: &Channel) -> Option<ArtifactKey> {
    match channel.manifest {
        ManifestLocation::Artifact {
            ref group_id,
            ref artifact_id,
        } => Some(ArtifactKey::new(
            group_id,
            artifact_id,
            "",
            MANIFEST_EXTENSION,
        )),
        ManifestLocation::Url(_) => None,
    }
}

pub struct UpdateSetCalculator<'a> {
    repository: &'a dyn MavenRepository,
    policies: &'a CurationPolicies,
    channels: &'a [ChannelSource],
    workers: usize,
}

impl<'a> UpdateSetCalculator<'a> {
    pub fn new(repository: &'a dyn MavenRepository, policies: &'a CurationPolicies) -> Self {
        Self {
            repository,
            policies,
            channels: &[],
            workers: DEFAULT_WORKERS,
        }
    }

    #[must_use]
    pub fn with_channels(mut self, channels: &'a [ChannelSource]) -> Self {
        self.channels = channels;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Propose a version for every stream of `manifest` and every pinned
    /// channel. Lookup failures are collected, never fatal.
    pub fn calculate(&self, manifest: &Manifest) -> Result<UpdateSet, CoreError> {
        let pins: BTreeSet<ArtifactKey> = self
            .channels
            .iter()
            .filter_map(|s| channel_pin_key(&s.channel))
            .collect();
        let artifacts: Vec<&ArtifactCoordinate> = manifest
            .streams()
            .filter(|c| !pins.contains(&c.key()))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| CoreError::Resolve(ResolveError::Config(format!("update pool: {e}"))))?;
        let outcomes: Vec<Result<MavenVersion, ResolveError>> = pool.install(|| {
            artifacts
                .par_iter()
                .map(|c| self.best_version(c))
                .collect()
        });

        let mut set = UpdateSet::default();
        for (coordinate, outcome) in artifacts.iter().zip(outcomes) {
            match outcome {
                Ok(best) => {
                    let installed = coordinate.maven_version();
                    if best != installed {
                        debug!("{}: {} -> {best}", coordinate.name(), coordinate.version);
                        set.artifacts.push(ArtifactUpdate {
                            key: coordinate.key(),
                            artifact_name: coordinate.name(),
                            old_version: coordinate.version.clone(),
                            new_version: best.as_str().to_owned(),
                            downgrade: best < installed,
                        });
                    }
                }
                Err(e) => {
                    debug!("{}: {e}", coordinate.name());
                    set.failures.push(UpdateFailure::new(coordinate.name(), &e));
                }
            }
        }

        for source in self.channels {
            let Some(key) = channel_pin_key(&source.channel) else {
                debug!("channel {} has no versioned manifest", source.channel.name);
                continue;
            };
            let Some(pinned) = manifest.get(&key) else {
                continue;
            };
            match newest_of(source, &pinned.version) {
                Ok(newest) => {
                    if let Some(newest) = newest {
                        set.channels.push(ChannelVersionChange {
                            channel: source.channel.name.clone(),
                            old_version: pinned.version.clone(),
                            downgrade: MavenVersion::new(newest.physical.as_str())
                                < pinned.maven_version(),
                            new_version: newest.physical,
                            new_logical_version: newest.logical,
                        });
                    }
                }
                Err(CoreError::Resolve(e)) => set
                    .failures
                    .push(UpdateFailure::new(format!("channel {}", source.channel.name), &e)),
                Err(e) => return Err(e),
            }
        }

        info!(
            "{} artifact update(s), {} channel update(s), {} failure(s)",
            set.artifacts.len(),
            set.channels.len(),
            set.failures.len()
        );
        Ok(set)
    }

    /// Highest version of `coordinate` its curation policy accepts, taken
    /// from every version the repositories publish.
    fn best_version(&self, coordinate: &ArtifactCoordinate) -> Result<MavenVersion, ResolveError> {
        let candidates = self
            .repository
            .version_range_of(coordinate, &VersionRange::All)?;
        if candidates.is_empty() {
            return Err(ResolveError::NotFound(coordinate.name()));
        }
        Ok(self
            .policies
            .select_best(&coordinate.name(), &coordinate.version, &candidates)?)
    }

    /// Versions of the named channel's manifest relative to `pinned`.
    pub fn channel_versions(
        &self,
        channel: &str,
        pinned: Option<&str>,
        mode: ChannelVersionMode,
    ) -> Result<Vec<ChannelVersion>, CoreError> {
        let source = self
            .channels
            .iter()
            .find(|s| s.channel.name == channel)
            .ok_or_else(|| CoreError::UnknownChannel(channel.to_owned()))?;
        versions_of(source, pinned, mode)
    }
}

fn versions_of(
    source: &ChannelSource,
    pinned: Option<&str>,
    mode: ChannelVersionMode,
) -> Result<Vec<ChannelVersion>, CoreError> {
    let (coordinate, versions) = published_versions(source, pinned, mode)?;
    Ok(versions
        .into_iter()
        .map(|v| {
            let logical = logical_version(source.repository.as_ref(), &coordinate, &v);
            ChannelVersion {
                physical: v.as_str().to_owned(),
                logical,
            }
        })
        .collect())
}

/// Highest channel manifest version above `pinned`. Only that one
/// manifest is fetched for its display version.
fn newest_of(source: &ChannelSource, pinned: &str) -> Result<Option<ChannelVersion>, CoreError> {
    let (coordinate, versions) =
        published_versions(source, Some(pinned), ChannelVersionMode::Newer)?;
    Ok(versions.into_iter().max().map(|v| ChannelVersion {
        logical: logical_version(source.repository.as_ref(), &coordinate, &v),
        physical: v.as_str().to_owned(),
    }))
}

/// The channel's manifest coordinate and its published versions relative
/// to `pinned`, ascending.
fn published_versions(
    source: &ChannelSource,
    pinned: Option<&str>,
    mode: ChannelVersionMode,
) -> Result<(ArtifactCoordinate, Vec<MavenVersion>), CoreError> {
    let coordinate = source
        .channel
        .manifest
        .coordinate(pinned.unwrap_or("0"))
        .ok_or_else(|| CoreError::UnversionedChannel(source.channel.name.clone()))?;
    let range = match (mode, pinned) {
        (ChannelVersionMode::Newer, Some(v)) => VersionRange::GreaterThan(MavenVersion::new(v)),
        (ChannelVersionMode::Newer, None) | (ChannelVersionMode::Available, _) => VersionRange::All,
    };
    let versions = source.repository.version_range_of(&coordinate, &range)?;
    debug!(
        "channel {}: {} version(s) in {range}",
        source.channel.name,
        versions.len()
    );
    Ok((coordinate, versions))
}

/// Display version from the header of a published channel manifest.
fn logical_version(
    repository: &dyn MavenRepository,
    coordinate: &ArtifactCoordinate,
    version: &MavenVersion,
) -> Option<String> {
    let target = coordinate.with_version(version.as_str());
    let resolved = match repository.resolve(&target) {
        Ok(r) => r,
        Err(e) => {
            warn!("cannot fetch {target}: {e}");
            return None;
        }
    };
    match Manifest::read_from_file(&resolved.path) {
        Ok(manifest) => manifest.logical_version,
        Err(e) => {
            warn!("unreadable channel manifest {target}: {e}");
            None
        }
    }
}

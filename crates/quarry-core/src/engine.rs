use crate::concurrency::InstallationLock;
use crate::lifecycle::{validate_operation, Operation};
use crate::updates::{
    channel_pin_key, ArtifactUpdate, ChannelSource, ChannelVersion, ChannelVersionChange,
    ChannelVersionMode, UpdateSet, UpdateSetCalculator,
};
use crate::CoreError;
use quarry_resolve::{
    build_channel_repository, build_repository, ConcurrentResolver, MavenRepository, QuarryConfig,
    ResolvedArtifact,
};
use quarry_schema::{ArtifactCoordinate, Manifest};
use quarry_store::{
    ArtifactChange, ChannelChange, HistoryState, InstallationLayout, IntegrityReport,
    RevisionHistoryStore, SavedState,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One installation directory: its working copy, revision history and the
/// repositories its channels resolve against.
///
/// Reads never lock. Install, apply and revert hold the installation lock for
/// their whole duration.
pub struct Installation {
    layout: InstallationLayout,
    config: QuarryConfig,
    history: RevisionHistoryStore,
    repository: Arc<dyn MavenRepository>,
    channels: Vec<ChannelSource>,
}

#[derive(Debug, Serialize)]
pub struct InstallResult {
    pub revision: SavedState,
    pub artifacts: Vec<ResolvedArtifact>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResult {
    pub revision: SavedState,
    pub artifacts: Vec<ArtifactUpdate>,
    pub channels: Vec<ChannelVersionChange>,
    pub resolved: Vec<ResolvedArtifact>,
}

impl Installation {
    /// Open the installation at `root` with the given resolution settings.
    /// Nothing is created on disk until the first mutating operation.
    pub fn open(root: impl Into<PathBuf>, config: QuarryConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let layout = InstallationLayout::new(root);
        if layout.is_initialized() {
            layout.verify_version()?;
        }

        let default_cache = layout.cache_dir();
        let repository = build_repository(&config, &default_cache)?;
        let cache = config.cache_dir(&default_cache);
        let policies = Arc::new(config.policies.clone());
        let mut channels = Vec::with_capacity(config.channels.len());
        for channel in &config.channels {
            let repository = build_channel_repository(channel, &policies, &cache, config.strict)?;
            channels.push(ChannelSource {
                channel: channel.clone(),
                repository: Box::new(repository),
            });
        }
        debug!(
            "opened {} ({} channel(s), cache {})",
            layout.root().display(),
            channels.len(),
            cache.display()
        );

        Ok(Self {
            history: RevisionHistoryStore::new(layout.clone()),
            layout,
            config,
            repository,
            channels,
        })
    }

    pub fn initialize(&self) -> Result<(), CoreError> {
        self.layout.initialize()?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    pub fn state(&self) -> Result<HistoryState, CoreError> {
        if !self.layout.is_initialized() {
            return Ok(HistoryState::Empty);
        }
        Ok(self.history.state()?)
    }

    fn lock(&self) -> Result<InstallationLock, CoreError> {
        InstallationLock::acquire(&self.layout.lock_file())
    }

    fn resolver(&self) -> ConcurrentResolver {
        ConcurrentResolver::new(Arc::clone(&self.repository)).with_workers(self.config.workers)
    }

    fn calculator(&self) -> UpdateSetCalculator<'_> {
        UpdateSetCalculator::new(self.repository.as_ref(), &self.config.policies)
            .with_channels(&self.channels)
            .with_workers(self.config.workers)
    }

    /// Resolve every stream of `manifest`, then record it as the `INSTALL`
    /// revision. Nothing is written unless every stream resolves.
    pub fn install(&self, manifest: &Manifest) -> Result<InstallResult, CoreError> {
        info!(
            "installing '{}' ({} stream(s)) into {}",
            manifest.name,
            manifest.len(),
            self.root().display()
        );
        self.initialize()?;
        let _lock = self.lock()?;
        validate_operation(Operation::Install, self.state()?)?;

        let coordinates: Vec<ArtifactCoordinate> = manifest.streams().cloned().collect();
        let artifacts = self.resolver().resolve_all(&coordinates)?.into_result()?;
        let revision = self
            .history
            .commit_working_copy(manifest, &self.config.channels)?;
        info!("installed as revision {}", revision.id);
        Ok(InstallResult {
            revision,
            artifacts,
        })
    }

    /// The manifest as currently installed.
    pub fn manifest(&self) -> Result<Manifest, CoreError> {
        Ok(self.history.working_copy()?)
    }

    pub fn find_updates(&self) -> Result<UpdateSet, CoreError> {
        validate_operation(Operation::Update, self.state()?)?;
        let manifest = self.manifest()?;
        self.calculator().calculate(&manifest)
    }

    /// Apply a previously computed update set and record an `UPDATE` revision.
    ///
    /// Returns `None` for an empty set. Fails with [`CoreError::StaleUpdate`]
    /// if the installation moved since the set was computed.
    pub fn apply_updates(
        &self,
        updates: &UpdateSet,
        allow_downgrades: bool,
    ) -> Result<Option<ApplyResult>, CoreError> {
        if updates.is_empty() {
            info!("no updates to apply");
            return Ok(None);
        }
        if updates.has_downgrades() && !allow_downgrades {
            return Err(CoreError::InvalidOperation {
                operation: Operation::Update.to_string(),
                reason: "the update set contains downgrades".to_owned(),
            });
        }
        let _lock = self.lock()?;
        validate_operation(Operation::Update, self.state()?)?;

        let mut manifest = self.manifest()?;
        let mut targets = Vec::with_capacity(updates.len());
        for update in &updates.artifacts {
            repin(
                &mut manifest,
                &update.key.with_version(&update.old_version),
                &update.new_version,
            )?;
            targets.push(update.key.with_version(&update.new_version));
        }
        for change in &updates.channels {
            let source = self
                .channels
                .iter()
                .find(|s| s.channel.name == change.channel)
                .ok_or_else(|| CoreError::UnknownChannel(change.channel.clone()))?;
            let key = channel_pin_key(&source.channel)
                .ok_or_else(|| CoreError::UnversionedChannel(change.channel.clone()))?;
            repin(
                &mut manifest,
                &key.with_version(&change.old_version),
                &change.new_version,
            )?;
            targets.push(key.with_version(&change.new_version));
        }

        let resolved = self.resolver().resolve_all(&targets)?.into_result()?;
        let revision = self
            .history
            .commit_working_copy(&manifest, &self.config.channels)?;
        info!(
            "applied {} update(s) as revision {}",
            updates.len(),
            revision.id
        );
        Ok(Some(ApplyResult {
            revision,
            artifacts: updates.artifacts.clone(),
            channels: updates.channels.clone(),
            resolved,
        }))
    }

    /// Revisions, newest first. Empty for a fresh installation.
    pub fn history(&self) -> Result<Vec<SavedState>, CoreError> {
        if !self.layout.is_initialized() {
            return Ok(Vec::new());
        }
        Ok(self.history.revisions()?)
    }

    /// Artifact changes from revision `id` to the current head.
    pub fn changes(&self, id: &str) -> Result<Vec<ArtifactChange>, CoreError> {
        validate_operation(Operation::Changes, self.state()?)?;
        self.history.changes(id).map_err(CoreError::from_store_lookup)
    }

    pub fn changes_between(&self, from: &str, to: &str) -> Result<Vec<ArtifactChange>, CoreError> {
        validate_operation(Operation::Changes, self.state()?)?;
        self.history
            .changes_between(from, to)
            .map_err(CoreError::from_store_lookup)
    }

    pub fn channel_changes(&self, id: &str) -> Result<Vec<ChannelChange>, CoreError> {
        validate_operation(Operation::Changes, self.state()?)?;
        self.history
            .channel_changes(id)
            .map_err(CoreError::from_store_lookup)
    }

    /// Restore the manifest of revision `id` and record it as `ROLLBACK`.
    pub fn revert(&self, id: &str) -> Result<SavedState, CoreError> {
        let _lock = self.lock()?;
        validate_operation(Operation::Revert, self.state()?)?;
        self.history.revert(id).map_err(CoreError::from_store_lookup)
    }

    /// Manifest versions of `channel` newer than the installed pin, or all of
    /// them. Without a pin every version counts as newer.
    pub fn channel_versions(
        &self,
        channel: &str,
        mode: ChannelVersionMode,
    ) -> Result<Vec<ChannelVersion>, CoreError> {
        let source = self
            .channels
            .iter()
            .find(|s| s.channel.name == channel)
            .ok_or_else(|| CoreError::UnknownChannel(channel.to_owned()))?;
        let manifest = match self.state()? {
            HistoryState::HasHistory => Some(self.manifest()?),
            HistoryState::Empty => None,
        };
        let pinned = channel_pin_key(&source.channel)
            .and_then(|key| manifest.as_ref()?.get(&key))
            .map(|c| c.version.as_str());
        self.calculator().channel_versions(channel, pinned, mode)
    }

    pub fn verify(&self) -> Result<IntegrityReport, CoreError> {
        Ok(self.history.verify()?)
    }
}

/// Move `expected` to `version`, failing if the manifest does not currently
/// pin exactly `expected`.
fn repin(
    manifest: &mut Manifest,
    expected: &ArtifactCoordinate,
    version: &str,
) -> Result<(), CoreError> {
    let key = expected.key();
    match manifest.get(&key) {
        Some(current) if current.version == expected.version => {
            manifest.set_version(&key, version);
            Ok(())
        }
        Some(current) => Err(CoreError::StaleUpdate(format!(
            "{} is at {}, update expected {}",
            expected.name(),
            current.version,
            expected.version
        ))),
        None => Err(CoreError::StaleUpdate(format!("{key} is no longer installed"))),
    }
}

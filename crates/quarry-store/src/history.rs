use crate::diff::{diff_channels, diff_manifests, ArtifactChange, ChannelChange};
use crate::integrity::{verify_history, IntegrityReport};
use crate::journal::{Journal, RevisionKind, RevisionRecord};
use crate::layout::InstallationLayout;
use crate::objects::SnapshotStore;
use crate::{write_atomic, StoreError};
use quarry_schema::{Channel, Manifest, RevisionId};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

/// User-facing view of one revision: `{id, timestamp, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    pub id: RevisionId,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: RevisionKind,
}

impl From<&RevisionRecord> for SavedState {
    fn from(record: &RevisionRecord) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record.timestamp,
            kind: record.kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    Empty,
    HasHistory,
}

/// Append-only revision history of one installation's manifest.
///
/// Each committed state of the working copy (and the channel definitions in
/// force) is snapshotted into the object store and referenced by one journal
/// record. Records are never rewritten or removed; rollback appends.
///
/// Single writer: callers serialize `record` and `revert` (the engine holds
/// the installation lock).
pub struct RevisionHistoryStore {
    layout: InstallationLayout,
    objects: SnapshotStore,
    journal: Journal,
}

impl RevisionHistoryStore {
    pub fn new(layout: InstallationLayout) -> Self {
        let objects = SnapshotStore::new(layout.clone());
        let journal = Journal::new(layout.journal_path());
        Self {
            layout,
            objects,
            journal,
        }
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    pub fn state(&self) -> Result<HistoryState, StoreError> {
        if self.journal.read_all()?.is_empty() {
            Ok(HistoryState::Empty)
        } else {
            Ok(HistoryState::HasHistory)
        }
    }

    /// Commit the current working copy. The first revision is `INSTALL`, every
    /// later one `UPDATE`.
    pub fn record(&self) -> Result<SavedState, StoreError> {
        let records = self.journal.read_all()?;
        let kind = if records.is_empty() {
            RevisionKind::Install
        } else {
            RevisionKind::Update
        };
        self.commit(&records, kind)
    }

    /// The current working copy of the manifest.
    pub fn working_copy(&self) -> Result<Manifest, StoreError> {
        let path = self.layout.manifest_path();
        if !path.exists() {
            return Err(StoreError::MissingWorkingCopy(path.display().to_string()));
        }
        Ok(Manifest::read_from_file(&path)?)
    }

    /// Replace the working copy and channel definitions without recording.
    pub fn stage(&self, manifest: &Manifest, channels: &[Channel]) -> Result<(), StoreError> {
        let channels_bytes = serde_json::to_vec_pretty(channels)?;
        self.restore_files(manifest.to_text().as_bytes(), Some(&channels_bytes))
    }

    /// Stage `manifest` and `channels`, then [`record`](Self::record) them.
    ///
    /// On failure the previous working copy is put back.
    pub fn commit_working_copy(
        &self,
        manifest: &Manifest,
        channels: &[Channel],
    ) -> Result<SavedState, StoreError> {
        let previous_manifest = read_optional(&self.layout.manifest_path())?;
        let previous_channels = read_optional(&self.layout.channels_path())?;
        match self.stage(manifest, channels).and_then(|()| self.record()) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!("commit failed, restoring working copy: {e}");
                if let Err(restore_err) =
                    self.restore_previous(previous_manifest, previous_channels)
                {
                    warn!("failed to restore working copy: {restore_err}");
                }
                Err(e)
            }
        }
    }

    fn commit(
        &self,
        records: &[RevisionRecord],
        kind: RevisionKind,
    ) -> Result<SavedState, StoreError> {
        let manifest_path = self.layout.manifest_path();
        if !manifest_path.exists() {
            return Err(StoreError::MissingWorkingCopy(
                manifest_path.display().to_string(),
            ));
        }
        let manifest_bytes = fs::read(&manifest_path)?;
        // Refuse to snapshot something later reads could not parse.
        Manifest::parse_str(&String::from_utf8_lossy(&manifest_bytes))?;
        let manifest = self.objects.put(&manifest_bytes)?;

        let channels_path = self.layout.channels_path();
        let channels = if channels_path.exists() {
            let bytes = fs::read(&channels_path)?;
            serde_json::from_slice::<Vec<Channel>>(&bytes)?;
            Some(self.objects.put(&bytes)?)
        } else {
            None
        };

        let existing: Vec<RevisionId> = records.iter().map(|r| r.id.clone()).collect();
        let record = RevisionRecord::new(
            records.last().map_or(1, |r| r.seq + 1),
            kind,
            chrono::Utc::now().timestamp(),
            manifest,
            channels,
            records.last().map(|r| r.id.clone()),
            &existing,
        );
        self.journal.append(&record)?;
        info!("recorded revision {} ({})", record.id, record.kind);
        Ok(SavedState::from(&record))
    }

    /// Raw journal records, oldest first.
    pub fn records(&self) -> Result<Vec<RevisionRecord>, StoreError> {
        self.journal.read_all()
    }

    /// All revisions, newest first.
    pub fn revisions(&self) -> Result<Vec<SavedState>, StoreError> {
        Ok(self
            .journal
            .read_all()?
            .iter()
            .rev()
            .map(SavedState::from)
            .collect())
    }

    pub fn head(&self) -> Result<Option<SavedState>, StoreError> {
        Ok(self.journal.read_all()?.last().map(SavedState::from))
    }

    /// Look up a revision by full id or unambiguous prefix.
    pub fn revision(&self, id: &str) -> Result<RevisionRecord, StoreError> {
        let records = self.journal.read_all()?;
        find_record(&records, id).cloned()
    }

    pub fn manifest_at(&self, id: &str) -> Result<Manifest, StoreError> {
        let record = self.revision(id)?;
        self.load_manifest(&record)
    }

    pub fn channels_at(&self, id: &str) -> Result<Vec<Channel>, StoreError> {
        let record = self.revision(id)?;
        self.load_channels(&record)
    }

    fn load_manifest(&self, record: &RevisionRecord) -> Result<Manifest, StoreError> {
        let bytes = self.objects.get(&record.manifest)?;
        Ok(Manifest::parse_str(&String::from_utf8_lossy(&bytes))?)
    }

    fn load_channels(&self, record: &RevisionRecord) -> Result<Vec<Channel>, StoreError> {
        match record.channels {
            Some(ref hash) => Ok(serde_json::from_slice(&self.objects.get(hash)?)?),
            None => Ok(Vec::new()),
        }
    }

    fn head_record(records: &[RevisionRecord]) -> Result<&RevisionRecord, StoreError> {
        records.last().ok_or(StoreError::EmptyHistory)
    }

    /// Artifact changes from `target` to the current head revision.
    pub fn changes(&self, target: &str) -> Result<Vec<ArtifactChange>, StoreError> {
        let records = self.journal.read_all()?;
        let head = Self::head_record(&records)?;
        let from = find_record(&records, target)?;
        Ok(diff_manifests(
            &self.load_manifest(from)?,
            &self.load_manifest(head)?,
        ))
    }

    /// Artifact changes from revision `from` to revision `to`.
    pub fn changes_between(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ArtifactChange>, StoreError> {
        let records = self.journal.read_all()?;
        let from = find_record(&records, from)?;
        let to = find_record(&records, to)?;
        Ok(diff_manifests(
            &self.load_manifest(from)?,
            &self.load_manifest(to)?,
        ))
    }

    /// Channel definition changes from `target` to the current head revision.
    pub fn channel_changes(&self, target: &str) -> Result<Vec<ChannelChange>, StoreError> {
        let records = self.journal.read_all()?;
        let head = Self::head_record(&records)?;
        let from = find_record(&records, target)?;
        Ok(diff_channels(
            &self.load_channels(from)?,
            &self.load_channels(head)?,
        ))
    }

    /// Restore the working copy to `target` and append a `ROLLBACK` revision.
    ///
    /// Either the new revision is recorded, or the working copy is put back
    /// the way it was and head stays the effective state.
    pub fn revert(&self, target: &str) -> Result<SavedState, StoreError> {
        let records = self.journal.read_all()?;
        let record = find_record(&records, target)?;

        let manifest_bytes = self.objects.get(&record.manifest)?;
        let channels_bytes = match record.channels {
            Some(ref hash) => Some(self.objects.get(hash)?),
            None => None,
        };

        let manifest_path = self.layout.manifest_path();
        let channels_path = self.layout.channels_path();
        let previous_manifest = read_optional(&manifest_path)?;
        let previous_channels = read_optional(&channels_path)?;

        let result = self
            .restore_files(&manifest_bytes, channels_bytes.as_deref())
            .and_then(|()| self.commit(&records, RevisionKind::Rollback));

        match result {
            Ok(state) => {
                info!("reverted to {} as revision {}", record.id, state.id);
                Ok(state)
            }
            Err(e) => {
                warn!("revert to {} failed, restoring working copy: {e}", record.id);
                if let Err(restore_err) =
                    self.restore_previous(previous_manifest, previous_channels)
                {
                    warn!("failed to restore working copy: {restore_err}");
                }
                Err(e)
            }
        }
    }

    fn restore_files(&self, manifest: &[u8], channels: Option<&[u8]>) -> Result<(), StoreError> {
        write_atomic(&self.layout.manifest_path(), manifest)?;
        let channels_path = self.layout.channels_path();
        match channels {
            Some(bytes) => write_atomic(&channels_path, bytes)?,
            None if channels_path.exists() => fs::remove_file(&channels_path)?,
            None => {}
        }
        Ok(())
    }

    fn restore_previous(
        &self,
        manifest: Option<Vec<u8>>,
        channels: Option<Vec<u8>>,
    ) -> Result<(), StoreError> {
        match manifest {
            Some(bytes) => write_atomic(&self.layout.manifest_path(), &bytes)?,
            None => remove_if_exists(&self.layout.manifest_path())?,
        }
        match channels {
            Some(bytes) => write_atomic(&self.layout.channels_path(), &bytes)?,
            None => remove_if_exists(&self.layout.channels_path())?,
        }
        Ok(())
    }

    /// Re-read every record and every referenced snapshot.
    pub fn verify(&self) -> Result<IntegrityReport, StoreError> {
        verify_history(&self.layout, &self.objects, &self.journal)
    }
}

fn read_optional(path: &std::path::Path) -> Result<Option<Vec<u8>>, StoreError> {
    if path.exists() {
        Ok(Some(fs::read(path)?))
    } else {
        Ok(None)
    }
}

fn remove_if_exists(path: &std::path::Path) -> Result<(), StoreError> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn find_record<'a>(
    records: &'a [RevisionRecord],
    id: &str,
) -> Result<&'a RevisionRecord, StoreError> {
    if id.is_empty() {
        return Err(StoreError::RevisionNotFound(id.to_owned()));
    }
    if let Some(exact) = records.iter().find(|r| r.id == id) {
        return Ok(exact);
    }
    let matches: Vec<&RevisionRecord> = records.iter().filter(|r| r.id.starts_with(id)).collect();
    match matches.as_slice() {
        [single] => Ok(single),
        [] => Err(StoreError::RevisionNotFound(id.to_owned())),
        many => Err(StoreError::AmbiguousRevision {
            prefix: id.to_owned(),
            matches: many.len(),
        }),
    }
}

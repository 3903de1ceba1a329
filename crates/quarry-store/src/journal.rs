//! Append-only revision journal.
//!
//! One JSON record per line. Lines are only ever appended, with a single
//! write followed by `fsync`; nothing in this module rewrites or truncates
//! the file. Every record embeds a blake3 checksum over its own content, and
//! sequence numbers must increase by one from line to line. Any violation is
//! reported as [`StoreError::CorruptHistory`] and left for an operator to
//! inspect.

use crate::StoreError;
use quarry_schema::{ObjectHash, RevisionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// What produced a revision. The journal stores the literal upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RevisionKind {
    Install,
    Update,
    Rollback,
}

impl RevisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RevisionKind::Install => "INSTALL",
            RevisionKind::Update => "UPDATE",
            RevisionKind::Rollback => "ROLLBACK",
        }
    }
}

impl fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevisionKind {
    type Err = String;

    /// Case-sensitive: only the three literal names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSTALL" => Ok(RevisionKind::Install),
            "UPDATE" => Ok(RevisionKind::Update),
            "ROLLBACK" => Ok(RevisionKind::Rollback),
            other => Err(format!("unknown revision kind '{other}'")),
        }
    }
}

impl TryFrom<String> for RevisionKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RevisionKind> for String {
    fn from(kind: RevisionKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// One immutable journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub seq: u64,
    pub id: RevisionId,
    pub kind: RevisionKind,
    /// Commit time in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Snapshot of the manifest working copy.
    pub manifest: ObjectHash,
    /// Snapshot of the channel definitions, when any were in force.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<ObjectHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl RevisionRecord {
    /// Build a record, deriving an id that does not collide with `existing`.
    pub fn new(
        seq: u64,
        kind: RevisionKind,
        timestamp: i64,
        manifest: ObjectHash,
        channels: Option<ObjectHash>,
        parent: Option<RevisionId>,
        existing: &[RevisionId],
    ) -> Self {
        let mut nonce = 0u64;
        let id = loop {
            let candidate = derive_id(seq, &manifest, timestamp, parent.as_ref(), nonce);
            if !existing.contains(&candidate) {
                break candidate;
            }
            nonce += 1;
        };
        Self {
            seq,
            id,
            kind,
            timestamp,
            manifest,
            channels,
            parent,
            checksum: None,
        }
    }

    /// Checksum over the record content, excluding the checksum field itself.
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn derive_id(
    seq: u64,
    manifest: &ObjectHash,
    timestamp: i64,
    parent: Option<&RevisionId>,
    nonce: u64,
) -> RevisionId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(manifest.as_bytes());
    hasher.update(&timestamp.to_le_bytes());
    if let Some(parent) = parent {
        hasher.update(parent.as_bytes());
    }
    if nonce > 0 {
        hasher.update(&nonce.to_le_bytes());
    }
    RevisionId::from_digest(hasher.finalize().to_hex().as_str())
}

/// Handle on the journal file. Holds no open descriptor between calls.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate every record, oldest first. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<RevisionRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records: Vec<RevisionRecord> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |reason: String| StoreError::CorruptHistory {
                line: line_no,
                reason,
            };

            let record: RevisionRecord =
                serde_json::from_str(&line).map_err(|e| corrupt(e.to_string()))?;

            let Some(ref expected) = record.checksum else {
                return Err(corrupt("record has no checksum".to_owned()));
            };
            let actual = record.compute_checksum()?;
            if actual != *expected {
                return Err(corrupt(format!(
                    "checksum mismatch: expected {expected}, got {actual}"
                )));
            }

            let expected_seq = records.last().map_or(1, |r| r.seq + 1);
            if record.seq != expected_seq {
                return Err(corrupt(format!(
                    "sequence {} out of order, expected {expected_seq}",
                    record.seq
                )));
            }
            if !RevisionId::is_valid(&record.id) {
                return Err(corrupt(format!("malformed revision id '{}'", record.id)));
            }
            if records.iter().any(|r| r.id == record.id) {
                return Err(corrupt(format!("duplicate revision id '{}'", record.id)));
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Append one record as a single line and sync it to disk.
    pub fn append(&self, record: &RevisionRecord) -> Result<(), StoreError> {
        let mut sealed = record.clone();
        sealed.checksum = Some(sealed.compute_checksum()?);
        let mut line = serde_json::to_string(&sealed)?;
        line.push('\n');

        let created = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        if created {
            if let Some(dir) = self.path.parent() {
                crate::fsync_dir(dir)?;
            }
        }

        debug!(
            "journal append: seq={} id={} kind={}",
            sealed.seq, sealed.id, sealed.kind
        );
        Ok(())
    }

    pub fn exists(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|m| m.len() > 0)
    }
}

use crate::coordinate::{ArtifactCoordinate, ArtifactKey};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Current manifest text format version.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

const FORMAT_HEADER: &str = "quarry-manifest";
const NAME_HEADER: &str = "name";
const LOGICAL_VERSION_HEADER: &str = "logical-version";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid artifact coordinate {0}")]
    InvalidCoordinate(String),
    #[error("manifest line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
    #[error("duplicate stream for '{0}'")]
    DuplicateStream(String),
    #[error("unsupported manifest format version: {0}, expected 1")]
    UnsupportedVersion(u32),
}

/// Pinned component versions: the single source of truth for what is installed.
///
/// The text form writes one record per line, sorted by identity key, so two
/// snapshots of the same manifest differ only on the lines whose versions
/// changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub logical_version: Option<String>,
    streams: BTreeMap<ArtifactKey, ArtifactCoordinate>,
}

impl Manifest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            logical_version: None,
            streams: BTreeMap::new(),
        }
    }

    /// Build a manifest from coordinates, rejecting duplicate identity keys.
    pub fn from_streams(
        name: &str,
        streams: impl IntoIterator<Item = ArtifactCoordinate>,
    ) -> Result<Self, ManifestError> {
        let mut manifest = Self::new(name);
        for coordinate in streams {
            manifest.add_stream(coordinate)?;
        }
        Ok(manifest)
    }

    /// Add a new stream. Fails if the identity key is already pinned.
    pub fn add_stream(&mut self, coordinate: ArtifactCoordinate) -> Result<(), ManifestError> {
        let key = coordinate.key();
        if self.streams.contains_key(&key) {
            return Err(ManifestError::DuplicateStream(key.to_string()));
        }
        self.streams.insert(key, coordinate);
        Ok(())
    }

    /// Re-pin an existing stream. Returns the previous version, or `None` if
    /// the key is not tracked (nothing is inserted in that case).
    pub fn set_version(&mut self, key: &ArtifactKey, version: &str) -> Option<String> {
        let stream = self.streams.get_mut(key)?;
        Some(std::mem::replace(&mut stream.version, version.to_owned()))
    }

    pub fn remove_stream(&mut self, key: &ArtifactKey) -> Option<ArtifactCoordinate> {
        self.streams.remove(key)
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&ArtifactCoordinate> {
        self.streams.get(key)
    }

    pub fn streams(&self) -> impl Iterator<Item = &ArtifactCoordinate> {
        self.streams.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.streams.keys()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Serialize to the line-oriented text form.
    pub fn to_text(&self) -> String {
        let mut out = format!("# {FORMAT_HEADER}: {MANIFEST_FORMAT_VERSION}\n");
        if !self.name.is_empty() {
            out.push_str(&format!("# {NAME_HEADER}: {}\n", self.name));
        }
        if let Some(ref logical) = self.logical_version {
            out.push_str(&format!("# {LOGICAL_VERSION_HEADER}: {logical}\n"));
        }
        for coordinate in self.streams.values() {
            out.push_str(&coordinate.to_record());
            out.push('\n');
        }
        out
    }

    pub fn parse_str(input: &str) -> Result<Self, ManifestError> {
        let mut manifest = Self::default();
        for (idx, raw) in input.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                manifest.apply_header(line_no, comment.trim())?;
                continue;
            }
            let coordinate =
                ArtifactCoordinate::parse_record(line).map_err(|e| ManifestError::InvalidLine {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            manifest.add_stream(coordinate)?;
        }
        Ok(manifest)
    }

    fn apply_header(&mut self, line_no: usize, comment: &str) -> Result<(), ManifestError> {
        let Some((key, value)) = comment.split_once(':') else {
            return Ok(());
        };
        let value = value.trim();
        match key.trim() {
            FORMAT_HEADER => {
                let version: u32 = value.parse().map_err(|_| ManifestError::InvalidLine {
                    line: line_no,
                    reason: format!("invalid format version '{value}'"),
                })?;
                if version != MANIFEST_FORMAT_VERSION {
                    return Err(ManifestError::UnsupportedVersion(version));
                }
            }
            NAME_HEADER => value.clone_into(&mut self.name),
            LOGICAL_VERSION_HEADER if !value.is_empty() => {
                self.logical_version = Some(value.to_owned());
            }
            _ => {}
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, self.to_text().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ManifestError::Io(e.error))?;
        // Fsync parent directory to ensure rename durability on power loss.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }
}

use crate::metadata::{MavenMetadata, METADATA_FILE};
use crate::ResolveError;
use quarry_schema::{ArtifactCoordinate, RepositoryId};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Low-level access to one backing Maven repository.
///
/// Implementations must be safe to call from several resolution tasks at
/// once; shared on-disk caches rely on atomic file replacement rather than
/// locking.
pub trait ArtifactTransport: Send + Sync {
    fn id(&self) -> &RepositoryId;

    /// Make the artifact available locally and return its path.
    fn fetch(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, ResolveError>;

    /// Every published version of `group:artifact`, unordered. An unknown
    /// artifact yields an empty list.
    fn list_versions(&self, group_id: &str, artifact_id: &str)
        -> Result<Vec<String>, ResolveError>;
}

/// Relative directory of `group:artifact` in a Maven layout.
pub(crate) fn artifact_dir(group_id: &str, artifact_id: &str) -> String {
    format!("{}/{artifact_id}", group_id.replace('.', "/"))
}

/// Write `data` to `dest` through a temp file in the destination directory.
pub(crate) fn persist_atomic(dest: &Path, data: &[u8]) -> Result<(), ResolveError> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| ResolveError::Io(e.error))?;
    Ok(())
}

/// A Maven repository laid out on the local filesystem.
pub struct LocalRepository {
    id: RepositoryId,
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(id: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            id: RepositoryId::from(id),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publish an artifact into this repository and register its version in
    /// `maven-metadata.xml`.
    ///
    /// Single writer only: the metadata update is an unlocked
    /// read-modify-write, so concurrent deploys of one `group:artifact` can
    /// drop versions. Meant for seeding local repositories and fixtures.
    pub fn deploy(
        &self,
        coordinate: &ArtifactCoordinate,
        data: &[u8],
    ) -> Result<PathBuf, ResolveError> {
        let dest = self.root.join(coordinate.repository_path());
        persist_atomic(&dest, data)?;

        let dir = self
            .root
            .join(artifact_dir(&coordinate.group_id, &coordinate.artifact_id));
        let metadata_path = dir.join(METADATA_FILE);
        let mut meta = if metadata_path.exists() {
            MavenMetadata::parse(&fs::read_to_string(&metadata_path)?)?
        } else {
            MavenMetadata::new(&coordinate.group_id, &coordinate.artifact_id)
        };
        meta.add_version(&coordinate.version);
        persist_atomic(&metadata_path, meta.to_xml().as_bytes())?;

        debug!("deployed {coordinate} to {}", self.id);
        Ok(dest)
    }
}

impl ArtifactTransport for LocalRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn fetch(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, ResolveError> {
        let path = self.root.join(coordinate.repository_path());
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolveError::NotFound(format!("{coordinate} in {}", self.id)))
        }
    }

    fn list_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let dir = self.root.join(artifact_dir(group_id, artifact_id));
        let metadata_path = dir.join(METADATA_FILE);
        if metadata_path.is_file() {
            let meta = MavenMetadata::parse(&fs::read_to_string(&metadata_path)?)?;
            return Ok(meta.versions);
        }
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') {
                        versions.push(name.to_owned());
                    }
                }
            }
        }
        Ok(versions)
    }
}

use crate::layout::InstallationLayout;
use crate::{write_atomic, StoreError};
use quarry_schema::ObjectHash;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Hash under which `data` is stored.
pub fn snapshot_hash(data: &[u8]) -> ObjectHash {
    ObjectHash::new(blake3::hash(data).to_hex().to_string())
}

/// Manifest and channel snapshots, one file per distinct content, named by
/// its blake3 hash. Revisions that share content share the file.
pub struct SnapshotStore {
    layout: InstallationLayout,
}

impl SnapshotStore {
    pub fn new(layout: InstallationLayout) -> Self {
        Self { layout }
    }

    fn path_of(&self, hash: &str) -> PathBuf {
        self.layout.objects_dir().join(hash)
    }

    /// Snapshot `data`. A snapshot already on disk is left untouched.
    pub fn put(&self, data: &[u8]) -> Result<ObjectHash, StoreError> {
        let hash = snapshot_hash(data);
        let path = self.path_of(&hash);
        if !path.exists() {
            write_atomic(&path, data)?;
        }
        Ok(hash)
    }

    /// Read a snapshot back. Content that no longer hashes to its name is
    /// an [`StoreError::IntegrityFailure`].
    pub fn get(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        let data = match fs::read(self.path_of(hash)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(hash.to_owned()))
            }
            Err(e) => return Err(e.into()),
        };
        let actual = snapshot_hash(&data);
        if actual != hash {
            return Err(StoreError::IntegrityFailure {
                hash: hash.to_owned(),
                expected: hash.to_owned(),
                actual: actual.into_inner(),
            });
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = InstallationLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, SnapshotStore::new(layout))
    }

    fn stored_files(dir: &tempfile::TempDir) -> usize {
        fs::read_dir(InstallationLayout::new(dir.path()).objects_dir())
            .unwrap()
            .count()
    }

    #[test]
    fn manifest_snapshot_reads_back() {
        let (_dir, store) = setup();
        let data = b"org.example:core::jar:1.0\n";
        let hash = store.put(data).unwrap();
        assert_eq!(hash, snapshot_hash(data));
        assert_eq!(store.get(&hash).unwrap(), data);
    }

    #[test]
    fn identical_snapshots_share_one_file() {
        let (dir, store) = setup();
        let h1 = store.put(b"g:a::jar:1.0\n").unwrap();
        let h2 = store.put(b"g:a::jar:1.0\n").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(stored_files(&dir), 1);

        store.put(b"g:a::jar:1.1\n").unwrap();
        assert_eq!(stored_files(&dir), 2);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let (_dir, store) = setup();
        assert!(matches!(
            store.get("0123abcd"),
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn edited_snapshot_fails_on_read() {
        let (dir, store) = setup();
        let hash = store.put(b"g:a::jar:1.0\n").unwrap();
        fs::write(
            InstallationLayout::new(dir.path())
                .objects_dir()
                .join(hash.as_str()),
            b"g:a::jar:6.6\n",
        )
        .unwrap();
        assert!(matches!(
            store.get(&hash),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }
}

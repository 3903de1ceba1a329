use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current history format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";
const METADATA_DIR: &str = ".installation";

/// Directory layout of an installation's metadata.
///
/// Everything Quarry owns lives under `<root>/.installation`; the rest of the
/// installation root belongs to the provisioned server. Subdirectories are
/// created on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct InstallationLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl InstallationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Working copy of the installed manifest.
    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.metadata_dir().join("manifest.txt")
    }

    /// Channel definitions in force for the working copy.
    #[inline]
    pub fn channels_path(&self) -> PathBuf {
        self.metadata_dir().join("channels.json")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.metadata_dir().join(".lock")
    }

    #[inline]
    pub fn history_dir(&self) -> PathBuf {
        self.metadata_dir().join("history")
    }

    #[inline]
    pub fn journal_path(&self) -> PathBuf {
        self.history_dir().join("journal")
    }

    #[inline]
    pub fn objects_dir(&self) -> PathBuf {
        self.history_dir().join("objects")
    }

    /// Default local artifact cache, used when no explicit cache is configured.
    #[inline]
    pub fn cache_dir(&self) -> PathBuf {
        self.metadata_dir().join("cache")
    }

    pub fn is_initialized(&self) -> bool {
        self.history_dir().join(VERSION_FILE).exists()
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.objects_dir())?;

        let version_path = self.history_dir().join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            crate::write_atomic(&version_path, content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.history_dir().join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

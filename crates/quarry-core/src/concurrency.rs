use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock on one installation.
///
/// Every mutating operation (install, update, revert) holds it for its whole
/// duration, so two processes never append to the same journal at once.
/// Released on drop.
pub struct InstallationLock {
    lock_file: File,
    path: PathBuf,
}

fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl InstallationLock {
    /// Block until the lock is available.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive().map_err(|e| CoreError::LockFailed {
            path: lock_path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("acquired {}", lock_path.display());
        Ok(Self {
            lock_file: file,
            path: lock_path.to_path_buf(),
        })
    }

    /// Take the lock if nobody holds it, else `None`.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file: file,
                path: lock_path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallationLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("meta/.lock");

        {
            let lock = InstallationLock::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
            assert_eq!(lock.path(), lock_path);
        }
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        let _lock = InstallationLock::acquire(&lock_path).unwrap();
        assert!(InstallationLock::try_acquire(&lock_path).unwrap().is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        {
            let _lock = InstallationLock::acquire(&lock_path).unwrap();
        }
        assert!(InstallationLock::try_acquire(&lock_path).unwrap().is_some());
    }
}

//! Advisory lock preventing two gitfs processes on one working tree

use std::fs::{File, OpenOptions};

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Name of the lock file inside the repository's `.git` directory.
pub const LOCK_FILE_NAME: &str = "gitfs.lock";

/// Exclusive advisory lock held for the lifetime of a mount.
///
/// The lock lives in `.git/` so it is never reported by `git status`.
#[derive(Debug)]
pub struct RepoLockFile {
    file: File,
    path: NormalizedPath,
}

impl RepoLockFile {
    /// Take the lock for the working tree at `root` without blocking.
    pub fn acquire(root: &NormalizedPath) -> Result<Self> {
        let path = root.join(".git").join(LOCK_FILE_NAME);
        let native = path.to_native();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&native)
            .map_err(|e| Error::io(&native, e))?;

        file.try_lock_exclusive().map_err(|_| Error::AlreadyLocked {
            path: root.to_native(),
        })?;

        tracing::debug!(path = %path, "acquired repository lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }
}

impl Drop for RepoLockFile {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path, error = %e, "failed to release repository lock");
        }
    }
}

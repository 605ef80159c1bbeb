//! Last commit known to have reached the remote, kept across mounts

use std::fs;
use std::io;
use std::path::PathBuf;

use gitfs_git::RepositoryState;

use crate::Result;

/// Name of the record inside the repository's `.git` directory.
pub const PUSH_RECORD_NAME: &str = "gitfs-pushed";

/// Commit id of the last successful push.
///
/// Stored next to the repository lock so `git status` never reports it. A
/// missing record means no push from gitfs has been observed yet.
#[derive(Debug, Clone)]
pub struct PushRecord {
    path: PathBuf,
}

impl PushRecord {
    pub fn for_repo(repo: &RepositoryState) -> Self {
        Self {
            path: repo.root().join(".git").join(PUSH_RECORD_NAME).to_native(),
        }
    }

    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, commit: &str) -> Result<()> {
        fs::write(&self.path, format!("{commit}\n"))?;
        Ok(())
    }
}

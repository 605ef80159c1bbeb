//! Error types for gitfs-git

use std::path::PathBuf;
use std::time::Duration;

/// Result type for gitfs-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitfs-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] gitfs_fs::Error),

    #[error("Not a git working tree: {path}")]
    NotARepository { path: PathBuf },

    #[error("Invalid branch name: {name}")]
    InvalidBranchName { name: String },

    #[error("Invalid origin: {origin}")]
    InvalidOrigin { origin: String },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

impl Error {
    /// Whether retrying the same command could succeed.
    ///
    /// Rejections by the remote (non-fast-forward, hook refusal) and local
    /// misconfiguration are permanent; timeouts and other command failures,
    /// such as an unreachable host, are treated as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                !(stderr.contains("rejected")
                    || stderr.contains("non-fast-forward")
                    || stderr.contains("does not appear to be a git repository")
                    || stderr.contains("src refspec"))
            }
            _ => false,
        }
    }
}

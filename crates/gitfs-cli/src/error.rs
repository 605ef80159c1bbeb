//! Error types for gitfs-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from gitfs-core
    #[error(transparent)]
    Core(#[from] gitfs_core::Error),

    /// Error from gitfs-fs
    #[error(transparent)]
    Fs(#[from] gitfs_fs::Error),

    /// Error from gitfs-git
    #[error(transparent)]
    Git(#[from] gitfs_git::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Mounting the filesystem failed
    #[error("Failed to mount at {mount_point}: {source}")]
    Mount {
        mount_point: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}

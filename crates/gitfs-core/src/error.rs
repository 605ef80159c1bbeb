//! Error types for gitfs-core

/// Result type for gitfs-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitfs-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Filesystem error from gitfs-fs
    #[error(transparent)]
    Fs(#[from] gitfs_fs::Error),

    /// Git error from gitfs-git
    #[error(transparent)]
    Git(#[from] gitfs_git::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

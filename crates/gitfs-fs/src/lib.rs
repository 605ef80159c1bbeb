//! Filesystem layer for gitfs
//!
//! Provides the passthrough operations that back the mounted filesystem,
//! the shared working-tree lock that serializes handle I/O with the sync
//! engine, and configuration loading.

pub mod config;
pub mod error;
pub mod guard;
pub mod handles;
pub mod lockfile;
pub mod passthrough;
pub mod path;

pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use guard::{WorktreeGuard, WorktreeLock};
pub use handles::HandleTable;
pub use lockfile::RepoLockFile;
pub use passthrough::{DirEntry, FsStats, Passthrough};
pub use path::NormalizedPath;

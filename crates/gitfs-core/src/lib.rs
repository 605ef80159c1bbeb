//! Synchronization layer for gitfs
//!
//! Decides when the working tree behind a mount has drifted from its last
//! commit and performs the stage → commit → push sequence:
//!
//! ```text
//!        mount / unmount / interval
//!                   |
//!              SyncEngine  ── WorktreeLock (shared with handle I/O)
//!                   |
//!             StatusTracker
//!                   |
//!             RepoCommands (git)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod push_record;
pub mod scheduler;

pub use config::GitFsConfig;
pub use engine::{SyncEngine, SyncOptions, SyncOutcome, SyncReport, commit_message};
pub use error::{Error, Result};
pub use push_record::PushRecord;
pub use scheduler::SyncScheduler;

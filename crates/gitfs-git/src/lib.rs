//! Git plumbing for gitfs
//!
//! Everything the sync engine needs from git goes through the
//! [`RepoCommands`] port: status, stage, commit and push. [`GitCli`] is the
//! production adapter that shells out to the `git` binary; tests substitute
//! a fake.

pub mod error;
pub mod git_cli;
pub mod inspect;
pub mod port;
pub mod state;
pub mod status;

pub use error::{Error, Result};
pub use git_cli::GitCli;
pub use inspect::{CommitSummary, current_branch, head_commit};
pub use port::RepoCommands;
pub use state::RepositoryState;
pub use status::{FileStatusCategory, StatusSnapshot, StatusTracker, parse_status_report, unquote_path};

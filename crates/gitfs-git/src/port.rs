//! Repository command port
//!
//! The four git operations the sync engine performs. Every call names the
//! repository explicitly and returns a structured result, so failures can
//! be inspected instead of discarded.

use crate::{RepositoryState, Result};

pub trait RepoCommands: Send + Sync {
    /// Long-format status report with `#`-prefixed lines.
    fn status(&self, repo: &RepositoryState) -> Result<String>;

    /// Stage a single working-tree path.
    fn stage(&self, repo: &RepositoryState, path: &str) -> Result<()>;

    /// Commit every tracked change, including what was just staged.
    fn commit(&self, repo: &RepositoryState, message: &str) -> Result<()>;

    /// Push the configured branch to the same branch on the origin.
    fn push(&self, repo: &RepositoryState) -> Result<()>;
}

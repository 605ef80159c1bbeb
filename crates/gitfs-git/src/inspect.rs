//! Read-only repository inspection through libgit2

use git2::Repository;
use gitfs_fs::NormalizedPath;

use crate::Result;

/// Summary of a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Full object id in hex
    pub id: String,

    /// First line of the commit message
    pub message: String,
}

/// Get the current branch name of the working tree at `root`.
///
/// Returns `None` when HEAD is detached or the branch has no commits yet.
pub fn current_branch(root: &NormalizedPath) -> Result<Option<String>> {
    let repo = Repository::open(root.to_native())?;
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if head.is_branch() {
        Ok(head.shorthand().map(str::to_string))
    } else {
        Ok(None)
    }
}

/// Get the commit at the tip of `reference` (e.g. `HEAD`, `refs/heads/main`).
///
/// Returns `None` when the reference does not exist yet.
pub fn head_commit(root: &NormalizedPath, reference: &str) -> Result<Option<CommitSummary>> {
    let repo = Repository::open(root.to_native())?;
    let commit = match repo.revparse_single(reference) {
        Ok(object) => object.peel_to_commit()?,
        Err(e) if matches!(e.code(), git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch) => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let message = commit
        .message()
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .to_string();

    Ok(Some(CommitSummary {
        id: commit.id().to_string(),
        message,
    }))
}

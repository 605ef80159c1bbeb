//! Immutable description of the repository being synchronized

use gitfs_fs::NormalizedPath;

use crate::{Error, Result};

/// Working tree, remote and branch that one gitfs mount synchronizes.
///
/// Built once at startup and never modified. Every git invocation receives
/// the working-tree path from here; the process working directory is never
/// changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    root: NormalizedPath,
    origin: String,
    branch: String,
}

impl RepositoryState {
    /// Validate and build the state for the working tree at `root`.
    ///
    /// `root` must contain a `.git` entry. `origin` may be a remote name or
    /// a URL; neither it nor `branch` may be mistaken for a git option.
    pub fn new(root: NormalizedPath, origin: impl Into<String>, branch: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let branch = branch.into();

        if !root.join(".git").exists() {
            return Err(Error::NotARepository {
                path: root.to_native(),
            });
        }
        if origin.trim().is_empty() || origin.starts_with('-') {
            return Err(Error::InvalidOrigin { origin });
        }
        if !is_valid_branch_name(&branch) {
            return Err(Error::InvalidBranchName { name: branch });
        }

        Ok(Self {
            root,
            origin,
            branch,
        })
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Refspec pushing the local branch to the remote branch of the same name.
    pub fn push_refspec(&self) -> String {
        format!("refs/heads/{0}:refs/heads/{0}", self.branch)
    }
}

/// Subset of `git check-ref-format` rules that matter for a CLI argument.
fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("@{")
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_root() -> (tempfile::TempDir, NormalizedPath) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let root = NormalizedPath::new(dir.path());
        (dir, root)
    }

    #[test]
    fn accepts_plain_names() {
        let (_dir, root) = repo_root();
        let state = RepositoryState::new(root, "origin", "feature/sync-1").unwrap();
        assert_eq!(state.branch(), "feature/sync-1");
        assert_eq!(state.push_refspec(), "refs/heads/feature/sync-1:refs/heads/feature/sync-1");
    }

    #[test]
    fn rejects_option_like_arguments() {
        let (_dir, root) = repo_root();
        assert!(matches!(
            RepositoryState::new(root.clone(), "--upload-pack=x", "main"),
            Err(Error::InvalidOrigin { .. })
        ));
        assert!(matches!(
            RepositoryState::new(root, "origin", "-f"),
            Err(Error::InvalidBranchName { .. })
        ));
    }

    #[test]
    fn rejects_malformed_branches() {
        for bad in ["", "a..b", "a b", "x:y", "topic.lock", "trailing/"] {
            assert!(!is_valid_branch_name(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn requires_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = RepositoryState::new(NormalizedPath::new(dir.path()), "origin", "main");
        assert!(matches!(result, Err(Error::NotARepository { .. })));
    }
}

//! Git repository fixtures.
//!
//! Choose the lowest-realism fixture that satisfies your test's needs.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git <args>` in `dir`, panicking with stderr on failure.
///
/// # Panics
/// Panics if git cannot be spawned or exits unsuccessfully.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Creates a bare `.git` marker directory under `path`.
///
/// Realism level: **FAKE**. Enough to build a repository description for
/// tests that drive a fake command port and never run git.
///
/// # Panics
/// Panics if the directory cannot be created.
pub fn fake_git_dir(path: &Path) {
    fs::create_dir_all(path.join(".git/refs/heads"))
        .unwrap_or_else(|e| panic!("fake_git_dir: failed to create .git: {e}"));
    fs::write(path.join(".git/HEAD"), "ref: refs/heads/main\n")
        .unwrap_or_else(|e| panic!("fake_git_dir: failed to write HEAD: {e}"));
}

/// Initialises a real git repository using `git2` (no commit, no config).
///
/// Realism level: **REAL**: valid git object store, empty history.
///
/// # Panics
/// Panics if `git2::Repository::init` fails.
pub fn real_git_repo(path: &Path) -> git2::Repository {
    git2::Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "real_git_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}

/// Configure identity and signing so commits work on any machine.
fn configure_identity(path: &Path) {
    git(path, &["config", "user.email", "test@test.com"]);
    git(path, &["config", "user.name", "Test User"]);
    git(path, &["config", "commit.gpgsign", "false"]);
}

/// A working tree with one commit on `main`, pushed to a bare remote that is
/// registered as `origin`.
///
/// Realism level: **REAL WITH REMOTE**: both repositories live in one
/// temporary directory that is removed on drop.
pub struct RemoteFixture {
    temp_dir: TempDir,
}

impl Default for RemoteFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFixture {
    pub const BRANCH: &'static str = "main";

    /// # Panics
    /// Panics if any git operation fails.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let remote = temp_dir.path().join("remote.git");
        let work = temp_dir.path().join("work");
        fs::create_dir(&remote).unwrap();
        fs::create_dir(&work).unwrap();

        git(&remote, &["init", "--bare", "--quiet"]);

        git(&work, &["init", "--quiet"]);
        configure_identity(&work);
        fs::write(work.join("README.md"), "# Test").unwrap();
        git(&work, &["add", "README.md"]);
        git(&work, &["commit", "--quiet", "-m", "Initial commit"]);
        git(&work, &["branch", "-M", Self::BRANCH]);
        git(&work, &["remote", "add", "origin", &remote.to_string_lossy()]);
        git(&work, &["push", "--quiet", "origin", Self::BRANCH]);

        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root().join("work")
    }

    pub fn remote_dir(&self) -> PathBuf {
        self.root().join("remote.git")
    }

    /// Remote location usable as a push target.
    pub fn remote_url(&self) -> String {
        self.remote_dir().to_string_lossy().into_owned()
    }

    pub fn branch(&self) -> &'static str {
        Self::BRANCH
    }

    /// Commit id at the tip of `refs/heads/main` in the working tree.
    pub fn local_head(&self) -> String {
        git(&self.work_dir(), &["rev-parse", "HEAD"]).trim().to_string()
    }

    /// Commit id at the tip of `refs/heads/main` in the bare remote.
    pub fn remote_head(&self) -> String {
        git(
            &self.remote_dir(),
            &["rev-parse", &format!("refs/heads/{}", Self::BRANCH)],
        )
        .trim()
        .to_string()
    }

    /// Subject lines of the working tree's history, newest first.
    pub fn log_subjects(&self) -> Vec<String> {
        git(&self.work_dir(), &["log", "--format=%s"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write a file relative to the working tree, creating parents.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.work_dir().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

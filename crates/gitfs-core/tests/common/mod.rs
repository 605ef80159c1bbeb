#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use gitfs_fs::{NormalizedPath, WorktreeLock};
use gitfs_git::{Error, RepoCommands, RepositoryState, Result};
use gitfs_test_utils::git::fake_git_dir;
use tempfile::TempDir;

pub const CLEAN_REPORT: &str = "# On branch main\nnothing to commit, working tree clean\n";

/// One call made through the command port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status,
    Stage(String),
    Commit(String),
    Push,
}

#[derive(Default)]
struct FakeState {
    report: String,
    calls: Vec<Call>,
    failing_stage: HashSet<String>,
    fail_commit: bool,
    fail_status: bool,
    push_failures: VecDeque<Error>,
    lock_held_at_commit: Option<bool>,
    lock_held_at_push: Option<bool>,
}

/// In-memory command port that records every call.
///
/// A successful commit makes the next status report clean, the way git
/// would after `commit --all`.
pub struct RecordingCommands {
    state: Mutex<FakeState>,
    probe: Option<WorktreeLock>,
}

impl RecordingCommands {
    pub fn clean() -> Arc<Self> {
        Self::with_report(CLEAN_REPORT)
    }

    pub fn with_report(report: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                report: report.to_string(),
                ..Default::default()
            }),
            probe: None,
        })
    }

    /// Like `with_report`, additionally recording whether `lock` is held
    /// when commit and push run.
    pub fn watching(report: &str, lock: WorktreeLock) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                report: report.to_string(),
                ..Default::default()
            }),
            probe: Some(lock),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_report(&self, report: &str) {
        self.state().report = report.to_string();
    }

    pub fn fail_stage(&self, path: &str) {
        self.state().failing_stage.insert(path.to_string());
    }

    pub fn fail_commit(&self, fail: bool) {
        self.state().fail_commit = fail;
    }

    pub fn fail_status(&self, fail: bool) {
        self.state().fail_status = fail;
    }

    /// Queue an error for the next push attempt.
    pub fn fail_next_push(&self, error: Error) {
        self.state().push_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Calls other than status.
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| *call != Call::Status)
            .collect()
    }

    pub fn push_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Push).count()
    }

    pub fn lock_held_at_commit(&self) -> Option<bool> {
        self.state().lock_held_at_commit
    }

    pub fn lock_held_at_push(&self) -> Option<bool> {
        self.state().lock_held_at_push
    }

    fn probe_held(&self) -> Option<bool> {
        self.probe.as_ref().map(|lock| lock.try_acquire().is_none())
    }
}

impl RepoCommands for RecordingCommands {
    fn status(&self, _repo: &RepositoryState) -> Result<String> {
        let mut state = self.state();
        state.calls.push(Call::Status);
        if state.fail_status {
            return Err(command_failed("git status", "fatal: index file corrupt"));
        }
        Ok(state.report.clone())
    }

    fn stage(&self, _repo: &RepositoryState, path: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Stage(path.to_string()));
        if state.failing_stage.contains(path) {
            return Err(command_failed(
                "git add",
                &format!("fatal: pathspec '{path}' did not match any files"),
            ));
        }
        Ok(())
    }

    fn commit(&self, _repo: &RepositoryState, message: &str) -> Result<()> {
        let held = self.probe_held();
        let mut state = self.state();
        state.calls.push(Call::Commit(message.to_string()));
        state.lock_held_at_commit = held;
        if state.fail_commit {
            return Err(command_failed("git commit", "fatal: unable to write new index file"));
        }
        state.report = CLEAN_REPORT.to_string();
        Ok(())
    }

    fn push(&self, _repo: &RepositoryState) -> Result<()> {
        let held = self.probe_held();
        let mut state = self.state();
        state.calls.push(Call::Push);
        state.lock_held_at_push = held;
        match state.push_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn command_failed(command: &str, stderr: &str) -> Error {
    Error::CommandFailed {
        command: command.to_string(),
        code: 128,
        stderr: stderr.to_string(),
    }
}

/// Push error worth retrying.
pub fn unreachable_remote() -> Error {
    command_failed(
        "git push",
        "fatal: unable to access 'https://example.invalid/repo.git/': Could not resolve host",
    )
}

/// Push error that retrying cannot fix.
pub fn rejected_push() -> Error {
    command_failed(
        "git push",
        "! [rejected]        main -> main (non-fast-forward)",
    )
}

/// A repository description over a directory holding only a `.git` marker.
pub fn fake_repo() -> (TempDir, RepositoryState) {
    let temp = TempDir::new().unwrap();
    fake_git_dir(temp.path());
    let repo = RepositoryState::new(NormalizedPath::new(temp.path()), "origin", "main").unwrap();
    (temp, repo)
}

pub fn dirty_report(untracked: &[&str], modified: &[&str]) -> String {
    let mut report = String::from("# On branch main\n");
    if !modified.is_empty() {
        report.push_str("# Changes not staged for commit:\n");
        for path in modified {
            report.push_str(&format!("#\tmodified:   {path}\n"));
        }
        report.push_str("#\n");
    }
    if !untracked.is_empty() {
        report.push_str("# Untracked files:\n");
        for path in untracked {
            report.push_str(&format!("#\t{path}\n"));
        }
    }
    report
}

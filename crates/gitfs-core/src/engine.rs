//! SyncEngine implementation
//!
//! The SyncEngine brings the remote branch up to date with the working tree
//! behind a mount. A pass refreshes the status, stages untracked paths one by
//! one, commits everything in a single timestamped commit and pushes.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use gitfs_fs::WorktreeLock;
use gitfs_git::{RepoCommands, RepositoryState, StatusTracker, current_branch, head_commit};

use crate::Result;
use crate::push_record::PushRecord;

/// Prefix of every commit created by a sync pass.
pub const COMMIT_PREFIX: &str = "syncing files @ ";

/// Build the commit message for a sync pass started at `at`.
///
/// Microsecond resolution keeps messages unique and lexically sortable.
pub fn commit_message<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{COMMIT_PREFIX}{}", at.format("%Y-%m-%d %H:%M:%S%.6f"))
}

/// How a sync pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Clean tree and nothing left to push; no git command beyond status ran
    NothingToSync,
    /// Changes (or an earlier commit) reached the remote
    Synced,
    /// The commit failed; changes stay pending in the working tree
    CommitFailed,
    /// Committed locally but the push failed; it is retried next pass
    PushFailed,
}

/// Report from a sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Paths staged individually during this pass
    pub staged: Vec<String>,
    /// Paths whose staging failed
    pub skipped: Vec<String>,
    /// Message of the commit created by this pass
    pub commit_message: Option<String>,
    /// Errors encountered during the pass
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            staged: Vec::new(),
            skipped: Vec::new(),
            commit_message: None,
            errors: Vec::new(),
        }
    }

    pub fn nothing_to_sync() -> Self {
        Self::new(SyncOutcome::NothingToSync)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::NothingToSync | SyncOutcome::Synced)
    }
}

/// Options for sync passes
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Extra push attempts after a transient failure
    pub push_retries: u32,
    /// Delay before the first push retry; doubles on each attempt
    pub push_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            push_retries: 2,
            push_backoff: Duration::from_millis(500),
        }
    }
}

/// Engine for synchronizing a working tree with its remote branch
///
/// Owns the repository description and the only status tracker. Passes are
/// serialized by `&mut self`; share the engine behind a mutex when more than
/// one trigger can fire.
pub struct SyncEngine {
    repo: RepositoryState,
    commands: Arc<dyn RepoCommands>,
    tracker: StatusTracker,
    record: PushRecord,
    lock: WorktreeLock,
    options: SyncOptions,
    /// A commit exists locally that has not reached the remote
    push_pending: bool,
    shut_down: bool,
}

impl SyncEngine {
    /// Create an engine without running a pass.
    ///
    /// `lock` must be the lock used for handle I/O on the same tree.
    pub fn new(repo: RepositoryState, commands: Arc<dyn RepoCommands>, lock: WorktreeLock) -> Self {
        Self {
            tracker: StatusTracker::new(Arc::clone(&commands)),
            record: PushRecord::for_repo(&repo),
            repo,
            commands,
            lock,
            options: SyncOptions::default(),
            push_pending: false,
            shut_down: false,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Create an engine and immediately reconcile any drift that built up
    /// while nothing was mounted.
    pub fn open(
        repo: RepositoryState,
        commands: Arc<dyn RepoCommands>,
        lock: WorktreeLock,
        options: SyncOptions,
    ) -> (Self, SyncReport) {
        let mut engine = Self::new(repo, commands, lock).with_options(options);
        engine.check_branch();
        engine.check_unpushed();
        let report = engine.synchronize();
        (engine, report)
    }

    pub fn repository(&self) -> &RepositoryState {
        &self.repo
    }

    pub fn staged_files(&mut self) -> Vec<String> {
        self.tracker.staged_files(&self.repo)
    }

    pub fn unstaged_files(&mut self) -> Vec<String> {
        self.tracker.unstaged_files(&self.repo)
    }

    /// True when the working tree has staged or unstaged changes.
    pub fn sync_needed(&mut self) -> bool {
        !self.tracker.refresh(&self.repo).is_empty()
    }

    /// True when an earlier pass committed but could not push.
    pub fn push_pending(&self) -> bool {
        self.push_pending
    }

    /// Warn when the checked-out branch is not the one being pushed.
    pub fn check_branch(&self) {
        match current_branch(self.repo.root()) {
            Ok(Some(branch)) if branch == self.repo.branch() => {}
            Ok(Some(branch)) => tracing::warn!(
                checked_out = %branch,
                configured = %self.repo.branch(),
                "working tree is on a different branch than the one being synced"
            ),
            Ok(None) => tracing::warn!(
                configured = %self.repo.branch(),
                "working tree has a detached or unborn HEAD"
            ),
            Err(e) => tracing::warn!(error = %e, "could not determine the checked-out branch"),
        }
    }

    /// Owe a push when the local branch tip is not the last commit this
    /// repository saw reach the remote, e.g. after a failed shutdown push.
    ///
    /// Without a record (first mount) the push is owed too; pushing an
    /// up-to-date branch changes nothing on the remote.
    pub fn check_unpushed(&mut self) {
        let Some(tip) = self.local_tip() else {
            return;
        };
        match self.record.load() {
            Ok(Some(pushed)) if pushed == tip => {}
            Ok(pushed) => {
                tracing::info!(
                    branch = %self.repo.branch(),
                    local = %tip,
                    last_pushed = pushed.as_deref().unwrap_or("none"),
                    "local branch may be ahead of the remote; push owed"
                );
                self.push_pending = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read the push record; push owed");
                self.push_pending = true;
            }
        }
    }

    /// Commit id at the tip of the synchronized branch, if it has one.
    fn local_tip(&self) -> Option<String> {
        let reference = format!("refs/heads/{}", self.repo.branch());
        match head_commit(self.repo.root(), &reference) {
            Ok(commit) => commit.map(|c| c.id),
            Err(e) => {
                tracing::debug!(%reference, error = %e, "could not resolve local branch tip");
                None
            }
        }
    }

    fn record_push(&self) {
        if let Some(tip) = self.local_tip() {
            if let Err(e) = self.record.store(&tip) {
                tracing::warn!(error = %e, "failed to record pushed commit");
            }
        }
    }

    /// Run one sync pass.
    ///
    /// Status, staging and commit run under the working-tree lock so they do
    /// not observe a half-applied write. The push runs after the lock is
    /// released. Failures never panic or propagate; they are logged and
    /// returned in the report.
    pub fn synchronize(&mut self) -> SyncReport {
        let guard = self.lock.acquire();

        let snapshot = self.tracker.refresh(&self.repo).clone();
        if snapshot.is_empty() && !self.push_pending {
            tracing::debug!(repo = %self.repo.root(), "nothing to sync");
            return SyncReport::nothing_to_sync();
        }

        let mut report = SyncReport::new(SyncOutcome::Synced);

        if !snapshot.is_empty() {
            for path in snapshot.unstaged() {
                tracing::debug!(%path, "staging");
                match self.commands.stage(&self.repo, &path) {
                    Ok(()) => report.staged.push(path),
                    Err(e) => {
                        // The path may have been removed since the status ran
                        tracing::warn!(%path, error = %e, "failed to stage path; skipping");
                        report.errors.push(e.to_string());
                        report.skipped.push(path);
                    }
                }
            }

            let message = commit_message(&Local::now());
            match self.commands.commit(&self.repo, &message) {
                Ok(()) => {
                    tracing::debug!(%message, "committed");
                    report.commit_message = Some(message);
                    self.push_pending = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "commit failed; changes remain pending");
                    report.errors.push(e.to_string());
                    report.outcome = SyncOutcome::CommitFailed;
                    if !self.push_pending {
                        return report;
                    }
                }
            }
        }

        drop(guard);

        match self.push_with_retry() {
            Ok(()) => {
                self.push_pending = false;
                self.record_push();
                self.tracker.clear();
                if report.outcome == SyncOutcome::Synced {
                    tracing::info!(
                        origin = %self.repo.origin(),
                        branch = %self.repo.branch(),
                        staged = report.staged.len(),
                        "synchronized"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    origin = %self.repo.origin(),
                    branch = %self.repo.branch(),
                    error = %e,
                    "push failed; will retry on next sync"
                );
                report.errors.push(e.to_string());
                report.outcome = SyncOutcome::PushFailed;
            }
        }

        report
    }

    /// Final pass before unmount. Runs at most once; later calls return
    /// `None` without touching git.
    pub fn shutdown(&mut self) -> Option<SyncReport> {
        if self.shut_down {
            return None;
        }
        self.shut_down = true;
        tracing::info!(repo = %self.repo.root(), "flushing pending changes");
        Some(self.synchronize())
    }

    fn push_with_retry(&self) -> Result<()> {
        let retries = self.options.push_retries;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.options.push_backoff)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        backoff::retry(policy, || {
            attempt += 1;
            self.commands.push(&self.repo).map_err(|e| {
                if e.is_transient() && attempt <= retries {
                    tracing::debug!(attempt, error = %e, "push failed; retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .map_err(|e| match e {
            backoff::Error::Permanent(e) => e.into(),
            backoff::Error::Transient { err, .. } => err.into(),
        })
    }
}

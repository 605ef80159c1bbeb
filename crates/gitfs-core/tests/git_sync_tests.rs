//! SyncEngine driving real git against a bare remote

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use gitfs_core::{PushRecord, SyncEngine, SyncOptions, SyncOutcome, SyncReport};
use gitfs_fs::{NormalizedPath, WorktreeLock};
use gitfs_git::{GitCli, RepoCommands, RepositoryState};
use gitfs_test_utils::git::{RemoteFixture, git};
use pretty_assertions::assert_eq;

fn parts(fixture: &RemoteFixture, origin: &str) -> (RepositoryState, Arc<dyn RepoCommands>) {
    let root = NormalizedPath::canonical_dir(fixture.work_dir()).unwrap();
    let repo = RepositoryState::new(root, origin, fixture.branch()).unwrap();
    let commands: Arc<dyn RepoCommands> = Arc::new(GitCli::new(Duration::from_secs(60)).unwrap());
    (repo, commands)
}

fn options() -> SyncOptions {
    SyncOptions {
        push_retries: 0,
        push_backoff: Duration::from_millis(1),
    }
}

fn engine_for(fixture: &RemoteFixture, origin: &str) -> SyncEngine {
    let (repo, commands) = parts(fixture, origin);
    SyncEngine::new(repo, commands, WorktreeLock::new()).with_options(options())
}

/// Mount-time engine: branch check, push check and the eager pass.
fn open_engine(fixture: &RemoteFixture) -> (SyncEngine, SyncReport) {
    let (repo, commands) = parts(fixture, "origin");
    SyncEngine::open(repo, commands, WorktreeLock::new(), options())
}

#[test]
fn test_new_file_reaches_remote() {
    let fixture = RemoteFixture::new();
    let mut engine = engine_for(&fixture, "origin");
    assert!(!engine.sync_needed());

    fixture.write("foo.txt", "hello");
    assert_eq!(engine.unstaged_files(), vec!["foo.txt"]);

    let report = engine.synchronize();

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert!(!engine.sync_needed());
    assert_eq!(fixture.remote_head(), fixture.local_head());
    assert_eq!(
        fixture.log_subjects().first().cloned(),
        report.commit_message
    );
    let shown = git(&fixture.remote_dir(), &["show", "refs/heads/main:foo.txt"]);
    assert_eq!(shown, "hello");
}

#[test]
fn test_modifications_deletions_and_nested_files_are_synced() {
    let fixture = RemoteFixture::new();
    fixture.write("keep.txt", "v1");
    fixture.write("drop.txt", "bye");
    git(&fixture.work_dir(), &["add", "."]);
    git(&fixture.work_dir(), &["commit", "--quiet", "-m", "seed"]);
    git(&fixture.work_dir(), &["push", "--quiet", "origin", "main"]);

    let mut engine = engine_for(&fixture, "origin");
    fixture.write("keep.txt", "v2");
    fs::remove_file(fixture.work_dir().join("drop.txt")).unwrap();
    fixture.write("deep/dir/new.txt", "nested");

    assert!(engine.synchronize().is_success());

    assert!(!engine.sync_needed());
    assert_eq!(fixture.remote_head(), fixture.local_head());
    let tree = git(&fixture.remote_dir(), &["ls-tree", "-r", "--name-only", "refs/heads/main"]);
    let files: Vec<&str> = tree.lines().collect();
    assert_eq!(files, vec!["README.md", "deep/dir/new.txt", "keep.txt"]);
}

#[test]
fn test_names_git_quotes_are_synced() {
    let fixture = RemoteFixture::new();
    let mut engine = engine_for(&fixture, "origin");
    fixture.write("say \"hi\".txt", "quoted");
    fixture.write("back\\slash.txt", "escaped");

    let report = engine.synchronize();

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert!(report.skipped.is_empty(), "skipped: {:?}", report.skipped);
    assert!(!engine.sync_needed());
    assert_eq!(fixture.remote_head(), fixture.local_head());
    let shown = git(&fixture.remote_dir(), &["show", "refs/heads/main:say \"hi\".txt"]);
    assert_eq!(shown, "quoted");
}

#[test]
fn test_unreachable_origin_keeps_local_commit_and_owes_push() {
    let fixture = RemoteFixture::new();
    let missing = fixture.root().join("missing.git");
    let mut engine = engine_for(&fixture, &missing.to_string_lossy());
    let remote_before = fixture.remote_head();

    fixture.write("foo.txt", "hello");
    let report = engine.synchronize();

    assert_eq!(report.outcome, SyncOutcome::PushFailed);
    assert!(engine.push_pending());
    assert_ne!(fixture.local_head(), remote_before);
    assert_eq!(fixture.remote_head(), remote_before);
}

#[test]
fn test_shutdown_flushes_pending_changes() {
    let fixture = RemoteFixture::new();
    let mut engine = engine_for(&fixture, "origin");

    fixture.write("last-minute.txt", "flush me");
    let report = engine.shutdown().unwrap();

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert_eq!(fixture.remote_head(), fixture.local_head());
    assert!(engine.shutdown().is_none());
}

#[test]
fn test_open_records_pushed_commit_and_reopen_is_quiet() {
    let fixture = RemoteFixture::new();

    let (first, report) = open_engine(&fixture);
    assert!(report.is_success());
    let recorded = PushRecord::for_repo(first.repository()).load().unwrap();
    assert_eq!(recorded, Some(fixture.local_head()));
    drop(first);

    let (engine, report) = open_engine(&fixture);
    assert_eq!(report.outcome, SyncOutcome::NothingToSync);
    assert!(!engine.push_pending());
}

#[test]
fn test_push_lost_at_shutdown_is_retried_on_next_open() {
    let fixture = RemoteFixture::new();
    let (mut engine, _) = open_engine(&fixture);

    fixture.write("late.txt", "written just before unmount");
    let parked = fixture.root().join("parked.git");
    fs::rename(fixture.remote_dir(), &parked).unwrap();

    let report = engine.shutdown().unwrap();
    assert_eq!(report.outcome, SyncOutcome::PushFailed);
    drop(engine);

    fs::rename(&parked, fixture.remote_dir()).unwrap();
    assert_ne!(fixture.remote_head(), fixture.local_head());

    let (engine, report) = open_engine(&fixture);

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert!(report.staged.is_empty());
    assert!(!engine.push_pending());
    assert_eq!(fixture.remote_head(), fixture.local_head());
    let shown = git(&fixture.remote_dir(), &["show", "refs/heads/main:late.txt"]);
    assert_eq!(shown, "written just before unmount");
}

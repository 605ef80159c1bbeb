//! End-to-end scenarios against real git
//!
//! Files are written through the passthrough layer, exactly as the FUSE
//! adapter would, and synchronized to a bare remote by the engine.

use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use gitfs_core::{SyncEngine, SyncOptions, SyncOutcome};
use gitfs_fs::{NormalizedPath, Passthrough, RepoLockFile, WorktreeLock};
use gitfs_git::{GitCli, RepoCommands, RepositoryState};
use gitfs_test_utils::git::{RemoteFixture, git};
use pretty_assertions::assert_eq;
use regex::Regex;

// =============================================================================
// Test Infrastructure
// =============================================================================

/// A working tree with a bare remote, seen through the passthrough layer and
/// synchronized by an engine that shares its lock.
struct MountedRepo {
    fixture: RemoteFixture,
    passthrough: Passthrough,
    engine: SyncEngine,
}

impl MountedRepo {
    fn new() -> Self {
        let fixture = RemoteFixture::new();
        let root = NormalizedPath::canonical_dir(fixture.work_dir()).unwrap();
        let lock = WorktreeLock::new();
        let repo = RepositoryState::new(root.clone(), "origin", fixture.branch()).unwrap();
        let commands: Arc<dyn RepoCommands> =
            Arc::new(GitCli::new(Duration::from_secs(60)).unwrap());
        let engine = SyncEngine::new(repo, commands, lock.clone()).with_options(SyncOptions {
            push_retries: 0,
            push_backoff: Duration::from_millis(1),
        });
        Self {
            passthrough: Passthrough::new(&root, lock),
            fixture,
            engine,
        }
    }

    /// create(2) + write(2) + release through the passthrough layer.
    fn write_file(&self, path: &str, content: &str) {
        let fh = self
            .passthrough
            .create(path, 0o644, libc::O_WRONLY | libc::O_TRUNC)
            .unwrap();
        self.passthrough.write(fh, 0, content.as_bytes()).unwrap();
        self.passthrough.flush(fh).unwrap();
        self.passthrough.release(fh).unwrap();
    }

    fn remote_file(&self, path: &str) -> String {
        git(
            &self.fixture.remote_dir(),
            &["show", &format!("refs/heads/main:{path}")],
        )
    }

    fn commit_count(&self) -> usize {
        self.fixture.log_subjects().len()
    }
}

fn commit_message_pattern() -> Regex {
    Regex::new(r"^syncing files @ \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{6}$").unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn clean_repository_needs_no_sync() {
    let mut mounted = MountedRepo::new();
    let head = mounted.fixture.local_head();

    assert!(!mounted.engine.sync_needed());
    assert_eq!(mounted.engine.synchronize().outcome, SyncOutcome::NothingToSync);
    assert_eq!(mounted.fixture.local_head(), head);
}

#[test]
fn file_written_through_mount_reaches_remote() {
    let mut mounted = MountedRepo::new();

    mounted.write_file("foo.txt", "hello");
    assert_eq!(mounted.engine.unstaged_files(), vec!["foo.txt"]);

    let report = mounted.engine.synchronize();

    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert!(mounted.engine.staged_files().is_empty());
    assert!(mounted.engine.unstaged_files().is_empty());
    assert_eq!(mounted.fixture.remote_head(), mounted.fixture.local_head());
    assert_eq!(mounted.remote_file("foo.txt"), "hello");

    let subject = mounted.fixture.log_subjects().remove(0);
    assert!(commit_message_pattern().is_match(&subject), "{subject}");
}

#[test]
fn second_sync_creates_no_commit() {
    let mut mounted = MountedRepo::new();
    mounted.write_file("foo.txt", "hello");
    assert!(mounted.engine.synchronize().is_success());
    let commits = mounted.commit_count();

    assert!(!mounted.engine.sync_needed());
    assert_eq!(mounted.engine.synchronize().outcome, SyncOutcome::NothingToSync);
    assert_eq!(mounted.commit_count(), commits);
}

#[test]
fn directory_operations_are_synced() {
    let mut mounted = MountedRepo::new();
    mounted.passthrough.mkdir("docs", 0o755).unwrap();
    mounted.write_file("docs/guide.md", "# Guide");
    mounted.write_file("draft.txt", "draft");
    mounted.passthrough.rename("draft.txt", "docs/final.txt").unwrap();
    mounted.passthrough.unlink("README.md").unwrap();

    assert!(mounted.engine.synchronize().is_success());

    let tree = git(
        &mounted.fixture.remote_dir(),
        &["ls-tree", "-r", "--name-only", "refs/heads/main"],
    );
    assert_eq!(
        tree.lines().collect::<Vec<_>>(),
        vec!["docs/final.txt", "docs/guide.md"]
    );
}

#[test]
fn commit_messages_increase_across_syncs() {
    let mut mounted = MountedRepo::new();

    mounted.write_file("one.txt", "1");
    assert!(mounted.engine.synchronize().is_success());
    mounted.write_file("two.txt", "2");
    assert!(mounted.engine.synchronize().is_success());

    let subjects = mounted.fixture.log_subjects();
    // Newest first
    assert!(subjects[0] > subjects[1], "{subjects:?}");
    assert!(commit_message_pattern().is_match(&subjects[1]));
}

#[test]
fn push_owed_after_outage_is_delivered_later() {
    let mut mounted = MountedRepo::new();
    let remote = mounted.fixture.remote_dir();
    let parked = mounted.fixture.root().join("parked.git");
    let remote_before = mounted.fixture.remote_head();

    fs::rename(&remote, &parked).unwrap();
    mounted.write_file("offline.txt", "queued");
    let report = mounted.engine.synchronize();
    assert_eq!(report.outcome, SyncOutcome::PushFailed);
    assert!(mounted.engine.push_pending());

    fs::rename(&parked, &remote).unwrap();
    assert_eq!(mounted.fixture.remote_head(), remote_before);

    let report = mounted.engine.synchronize();
    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert!(report.commit_message.is_none());
    assert_eq!(mounted.fixture.remote_head(), mounted.fixture.local_head());
    assert_eq!(mounted.remote_file("offline.txt"), "queued");
}

#[test]
fn writes_racing_a_sync_are_never_lost() {
    let mounted = MountedRepo::new();
    let MountedRepo {
        fixture,
        passthrough,
        engine,
    } = mounted;
    let passthrough = Arc::new(passthrough);
    let engine = Arc::new(Mutex::new(engine));

    let writer = {
        let passthrough = Arc::clone(&passthrough);
        thread::spawn(move || {
            for i in 0..20 {
                let fh = passthrough
                    .create(format!("burst-{i}.txt"), 0o644, libc::O_WRONLY)
                    .unwrap();
                passthrough.write(fh, 0, format!("payload {i}").as_bytes()).unwrap();
                passthrough.release(fh).unwrap();
            }
        })
    };
    let syncer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..3 {
                engine.lock().unwrap().synchronize();
            }
        })
    };
    writer.join().unwrap();
    syncer.join().unwrap();

    let report = engine.lock().unwrap().shutdown().unwrap();
    assert!(report.is_success(), "{report:?}");

    let tree = git(
        &fixture.remote_dir(),
        &["ls-tree", "-r", "--name-only", "refs/heads/main"],
    );
    for i in 0..20 {
        assert!(tree.contains(&format!("burst-{i}.txt")), "burst-{i}.txt missing");
    }
    assert_eq!(fixture.remote_head(), fixture.local_head());
}

#[test]
fn second_mount_of_same_tree_is_refused() {
    let fixture = RemoteFixture::new();
    let root = NormalizedPath::canonical_dir(fixture.work_dir()).unwrap();

    let first = RepoLockFile::acquire(&root).unwrap();
    assert!(RepoLockFile::acquire(&root).is_err());
    drop(first);
    assert!(RepoLockFile::acquire(&root).is_ok());
}

#[test]
fn lock_file_is_invisible_to_status() {
    let mut mounted = MountedRepo::new();
    let root = NormalizedPath::canonical_dir(mounted.fixture.work_dir()).unwrap();
    let _lock = RepoLockFile::acquire(&root).unwrap();

    assert!(!mounted.engine.sync_needed());
}

//! gitfs CLI
//!
//! Mounts a git working tree through FUSE. Changes are committed and pushed
//! to `<origin> <branch>` when the mount starts, when it is unmounted, and
//! optionally on a fixed interval in between.

mod cli;
mod error;
mod inode_table;
mod mount;

use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gitfs_core::{GitFsConfig, SyncEngine, SyncReport, SyncScheduler};
use gitfs_fs::{NormalizedPath, Passthrough, RepoLockFile, WorktreeLock};
use gitfs_git::{GitCli, RepoCommands, RepositoryState};

use cli::Cli;
use error::{CliError, Result};
use mount::{GitFs, mount_options};

/// How long teardown waits for the kernel to release the mount.
const UNMOUNT_GRACE: Duration = Duration::from_secs(5);

fn main() {
    let cli = parse_args();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Parse arguments; any usage error exits with status 1 before mounting.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let usage_error = e.use_stderr();
            let _ = e.print();
            std::process::exit(if usage_error { 1 } else { 0 });
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr);

    // A second subscriber can only come from an embedding test harness
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

/// Config file values, overridden by explicit flags.
fn load_config(cli: &Cli) -> Result<GitFsConfig> {
    let mut config = match &cli.config {
        Some(path) => GitFsConfig::load(&NormalizedPath::new(path))?,
        None => GitFsConfig::default(),
    };
    if let Some(secs) = cli.sync_interval {
        config.sync_interval_secs = Some(secs);
    }
    if let Some(secs) = cli.command_timeout {
        config.command_timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let root = NormalizedPath::canonical_dir(&cli.local_repo)?;
    let mount_point = NormalizedPath::canonical_dir(&cli.mount_point)?;
    // git would walk into the mount while the engine holds the worktree lock
    if mount_point.to_native().starts_with(root.to_native()) {
        return Err(CliError::user(format!(
            "mount point {mount_point} must be outside the working tree {root}"
        )));
    }

    let repo = RepositoryState::new(root.clone(), cli.origin, cli.branch)?;
    let _repo_lock = RepoLockFile::acquire(&root)?;

    let commands: Arc<dyn RepoCommands> = Arc::new(GitCli::new(config.command_timeout())?);
    let lock = WorktreeLock::new();

    tracing::info!(
        repo = %root,
        origin = %repo.origin(),
        branch = %repo.branch(),
        "syncing before mount"
    );
    let (engine, report) = SyncEngine::open(repo, commands, lock.clone(), config.sync_options());
    log_report("mount", &report);
    let engine = Arc::new(Mutex::new(engine));

    let mut scheduler = config
        .sync_interval()
        .map(|interval| SyncScheduler::start(Arc::clone(&engine), interval))
        .transpose()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    // Installed before the mount exists so no signal can slip past the flush
    let mut signals = {
        let _context = runtime.enter();
        ExitSignals::install()?
    };

    let (unmounted_tx, unmounted_rx) = oneshot::channel();
    let filesystem = GitFs::new(Passthrough::new(&root, lock), unmounted_tx);
    let session = fuser::spawn_mount2(
        filesystem,
        mount_point.to_native(),
        &mount_options(&config.fs_name, config.allow_other),
    )
    .map_err(|source| CliError::Mount {
        mount_point: mount_point.to_native(),
        source,
    })?;
    tracing::info!(mount_point = %mount_point, "mounted");

    let reason = runtime.block_on(signals.wait(unmounted_rx));
    drop(signals);
    drop(runtime);

    tracing::info!(reason, mount_point = %mount_point, "unmounting");
    if !join_within(move || session.join(), UNMOUNT_GRACE) {
        tracing::warn!(
            mount_point = %mount_point,
            "mount point is still busy; flushing without waiting for the unmount"
        );
    }

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop();
    }

    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(report) = engine.shutdown() {
        log_report("unmount", &report);
    }

    Ok(())
}

/// SIGINT and SIGTERM listeners that end the mount.
struct ExitSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl ExitSignals {
    /// Must run inside a tokio runtime context.
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolve when the process is asked to stop or the mount goes away.
    async fn wait(&mut self, unmounted: oneshot::Receiver<()>) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "interrupted",
            _ = self.terminate.recv() => "terminated",
            _ = unmounted => "unmounted externally",
        }
    }
}

/// Run `join` on a helper thread and report whether it finished within
/// `grace`. A join that never returns is left behind.
fn join_within(join: impl FnOnce() + Send + 'static, grace: Duration) -> bool {
    let (done_tx, done_rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("gitfs-unmount".into())
        .spawn(move || {
            join();
            let _ = done_tx.send(());
        });
    match spawned {
        Ok(_) => done_rx.recv_timeout(grace).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "could not start unmount thread");
            false
        }
    }
}

fn log_report(trigger: &str, report: &SyncReport) {
    if report.is_success() {
        tracing::info!(
            trigger,
            outcome = ?report.outcome,
            staged = report.staged.len(),
            "sync finished"
        );
    } else {
        tracing::warn!(
            trigger,
            outcome = ?report.outcome,
            errors = ?report.errors,
            "sync did not complete; changes stay pending"
        );
    }
}

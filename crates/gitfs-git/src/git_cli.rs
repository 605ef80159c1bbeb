//! `git` command-line adapter for the repository command port

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::Runtime;

use crate::{Error, RepoCommands, RepositoryState, Result, unquote_path};

/// Default upper bound for a single git invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Options forcing the status layout the tracker parses: comment-prefixed
/// long format, no colors, one line per untracked file.
const STATUS_ARGS: &[&str] = &[
    "-c",
    "status.displayCommentPrefix=true",
    "-c",
    "color.status=false",
    "-c",
    "core.quotePath=false",
    "status",
    "--long",
    "--untracked-files=all",
];

/// Runs git as a child process in the repository's working tree.
///
/// Each invocation is bounded by a timeout; a child that outlives it is
/// killed. Output is always produced in the C locale so that status labels
/// are stable.
pub struct GitCli {
    runtime: Runtime,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|source| Error::Spawn {
                command: "tokio runtime".into(),
                source,
            })?;
        Ok(Self { runtime, timeout })
    }

    /// Run `git <args>` in the working tree and return its stdout.
    fn git(&self, repo: &RepositoryState, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(repo = %repo.root(), %command, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(repo.root().to_native())
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, cmd.output()).await });

        let output = match output {
            Err(_) => {
                return Err(Error::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
            Ok(result) => result.map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Err(Error::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                // `git commit` reports "nothing to commit" on stdout
                stderr: if stderr.is_empty() { stdout } else { stderr },
            })
        }
    }
}

impl RepoCommands for GitCli {
    fn status(&self, repo: &RepositoryState) -> Result<String> {
        self.git(repo, STATUS_ARGS)
    }

    fn stage(&self, repo: &RepositoryState, path: &str) -> Result<()> {
        let path = unquote_path(path);
        // "--" keeps a path such as "-n" from being read as a flag
        self.git(repo, &["add", "--all", "--", &*path]).map(drop)
    }

    fn commit(&self, repo: &RepositoryState, message: &str) -> Result<()> {
        self.git(repo, &["commit", "--all", "--quiet", "-m", message])
            .map(drop)
    }

    fn push(&self, repo: &RepositoryState) -> Result<()> {
        let refspec = repo.push_refspec();
        self.git(repo, &["push", "--quiet", repo.origin(), &refspec])
            .map(drop)
    }
}

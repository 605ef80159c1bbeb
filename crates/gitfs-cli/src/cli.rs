//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;

/// gitfs - Mount a git working tree and push every change to its remote
#[derive(Parser, Debug)]
#[command(name = "gitfs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Remote to push to (a configured remote name or a URL)
    pub origin: String,

    /// Branch committed to locally and pushed to the same branch remotely
    pub branch: String,

    /// Working tree backing the mount
    pub local_repo: PathBuf,

    /// Directory where the filesystem is mounted
    pub mount_point: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (.toml, .json, .yaml)
    #[arg(short, long, env = "GITFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds between periodic syncs while mounted; 0 disables them
    #[arg(long, value_name = "SECS")]
    pub sync_interval: Option<u64>,

    /// Upper bound in seconds for a single git command
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,
}

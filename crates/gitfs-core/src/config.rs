//! Runtime configuration for a mount
//!
//! Every field has a default, so an absent or empty config file is valid.
//! Unknown keys are rejected to catch typos early.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gitfs_fs::{ConfigStore, NormalizedPath};

use crate::engine::SyncOptions;
use crate::{Error, Result};

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_push_retries() -> u32 {
    2
}

fn default_push_backoff_ms() -> u64 {
    500
}

fn default_fs_name() -> String {
    "gitfs".to_string()
}

/// Mount configuration, loaded from TOML, JSON or YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitFsConfig {
    /// Seconds between periodic sync passes; absent or 0 disables them
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,

    /// Upper bound for a single git invocation
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Extra push attempts after a transient failure
    #[serde(default = "default_push_retries")]
    pub push_retries: u32,

    /// Delay before the first push retry
    #[serde(default = "default_push_backoff_ms")]
    pub push_backoff_ms: u64,

    /// Filesystem name shown in the mount table
    #[serde(default = "default_fs_name")]
    pub fs_name: String,

    /// Let users other than the mounting user access the mount
    #[serde(default)]
    pub allow_other: bool,
}

impl Default for GitFsConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: None,
            command_timeout_secs: default_command_timeout_secs(),
            push_retries: default_push_retries(),
            push_backoff_ms: default_push_backoff_ms(),
            fs_name: default_fs_name(),
            allow_other: false,
        }
    }
}

impl GitFsConfig {
    /// Load and validate a config file.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        let config: Self = ConfigStore::new().load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                message: "command_timeout_secs must be greater than zero".into(),
            });
        }
        if self.fs_name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "fs_name must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            push_retries: self.push_retries,
            push_backoff: Duration::from_millis(self.push_backoff_ms),
        }
    }
}

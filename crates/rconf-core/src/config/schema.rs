//! Configuration schema for rconf.toml
//!
//! Every field can also be given on the command line; flags win over the
//! file, and the file wins over the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::{DEFAULT_STAGING_DIR, DEFAULT_WORKERS};
use crate::error::ConfigError;
use crate::transport::KeyConfig;

/// Default log file
pub const DEFAULT_LOG_FILE: &str = "rconf.log";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "rconf.toml";

/// Parameters of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Script paths, globs, directories or URLs
    pub filenames: Vec<String>,

    /// Connection strings, one per host
    pub hosts: Vec<String>,

    /// Private key for hosts without a password
    pub pkey: Option<PathBuf>,

    /// Passphrase of an encrypted private key
    pub pkey_pass: Option<String>,

    /// Hosts processed at once
    pub workers: usize,

    /// Log file
    pub log: PathBuf,

    /// Walk directories recursively
    pub recursive: bool,

    /// Remote directory scripts are uploaded to
    pub staging_dir: String,

    /// Timeout for fetching remote scripts, in seconds
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            filenames: Vec::new(),
            hosts: Vec::new(),
            pkey: None,
            pkey_pass: None,
            workers: DEFAULT_WORKERS,
            log: PathBuf::from(DEFAULT_LOG_FILE),
            recursive: true,
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
            fetch_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// Check the configuration is runnable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filenames.is_empty() {
            return Err(ConfigError::Missing("script"));
        }
        if self.hosts.is_empty() {
            return Err(ConfigError::Missing("connection string"));
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if !self.staging_dir.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "staging_dir",
                reason: format!("'{}' is not an absolute path", self.staging_dir),
            });
        }
        if self.fetch_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Private key settings with `~/` expanded.
    pub fn key_config(&self) -> KeyConfig {
        KeyConfig::new(
            self.pkey.as_deref().map(expand_home),
            self.pkey_pass.clone().filter(|p| !p.is_empty()),
        )
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

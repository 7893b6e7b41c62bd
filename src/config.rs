// src/config.rs
//! Mirror configuration
//!
//! Loaded from a YAML file such as:
//!
//! ```yaml
//! mirror_path: /srv/mirror/ubuntu
//! mirror_url: archive.ubuntu.com/ubuntu
//! temp_indices: /var/tmp/dists-indices
//! log_file: /var/log/apt-mirror.log
//! log_level: INFO
//! package_ttl: 10800
//! hash_function: SHA256
//! distributions: [noble, noble-updates]
//! architectures: [amd64]
//! repos: [main, universe]
//! parallel_downloads: 8
//! ```
//!
//! Every key except `mirror_path` and `mirror_url` is optional.

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Name of the run-lock marker inside the staging directory
pub const LOCK_FILE_NAME: &str = "sync_in_progress";

/// Name of the deletion ledger inside the staging directory
pub const LEDGER_FILE_NAME: &str = "files_to_delete";

/// YAML configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Root of the live mirror tree (must exist)
    pub mirror_path: PathBuf,

    /// Upstream rsync module, e.g. `archive.ubuntu.com/ubuntu`
    pub mirror_url: String,

    /// Staging area for metadata, the lock marker and the ledger
    #[serde(default = "default_temp_indices", alias = "temp_files_path")]
    pub temp_indices: PathBuf,

    /// Optional log file, appended to in addition to stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds a file must stay unindexed before it is deleted
    #[serde(default = "default_package_ttl")]
    pub package_ttl: u64,

    #[serde(default = "default_hash_function")]
    pub hash_function: String,

    #[serde(default = "default_wildcard")]
    pub distributions: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub architectures: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub repos: Vec<String>,

    /// Maximum concurrently running per-file fetches
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,
}

fn default_temp_indices() -> PathBuf {
    PathBuf::from("/tmp/dists-indices")
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_package_ttl() -> u64 {
    10800
}

fn default_hash_function() -> String {
    "SHA256".to_string()
}

fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_parallel_downloads() -> usize {
    8
}

impl MirrorConfig {
    /// Minimal configuration with every optional key at its default
    pub fn new(mirror_path: impl Into<PathBuf>, mirror_url: impl Into<String>) -> Self {
        Self {
            mirror_path: mirror_path.into(),
            mirror_url: mirror_url.into(),
            temp_indices: default_temp_indices(),
            log_file: None,
            log_level: default_log_level(),
            package_ttl: default_package_ttl(),
            hash_function: default_hash_function(),
            distributions: default_wildcard(),
            architectures: default_wildcard(),
            repos: default_wildcard(),
            parallel_downloads: default_parallel_downloads(),
        }
    }

    /// Parse configuration from YAML text without validating it
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to load the config file {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.mirror_path.is_dir() {
            return Err(Error::Config(format!(
                "mirror_path {} does not exist",
                self.mirror_path.display()
            )));
        }

        if self.mirror_url.trim().is_empty() {
            return Err(Error::Config("mirror_url must not be empty".to_string()));
        }

        self.hash_algorithm()?;

        if self.parallel_downloads == 0 {
            return Err(Error::Config(
                "parallel_downloads must be at least 1".to_string(),
            ));
        }

        for (key, list) in [
            ("distributions", &self.distributions),
            ("architectures", &self.architectures),
            ("repos", &self.repos),
        ] {
            if list.is_empty() {
                return Err(Error::Config(format!("the '{key}' option must not be empty")));
            }
        }

        Ok(())
    }

    /// Algorithm whose Release section gets verified
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm> {
        self.hash_function
            .parse()
            .map_err(|e| Error::Config(format!("hash_function: {e}")))
    }

    /// Configured log level, `None` if the name is not recognised
    pub fn tracing_level(&self) -> Option<Level> {
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => Some(Level::DEBUG),
            "INFO" => Some(Level::INFO),
            "WARNING" | "WARN" => Some(Level::WARN),
            "ERROR" | "CRITICAL" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Path of the run-lock marker
    pub fn lock_path(&self) -> PathBuf {
        self.temp_indices.join(LOCK_FILE_NAME)
    }

    /// Path of the persisted deletion ledger
    pub fn ledger_path(&self) -> PathBuf {
        self.temp_indices.join(LEDGER_FILE_NAME)
    }
}

// src/sync/lock.rs

//! Run lock
//!
//! A zero-byte marker file in the staging directory. Its existence means a
//! run is active; a second run refuses to start rather than waiting.
//!
//! The check and the creation are two separate steps, so two runs started
//! at the same instant can both get through. Runs are scheduled externally
//! one at a time, which keeps that window theoretical.
//!
//! # Example
//!
//! ```ignore
//! let lock = RunLock::acquire(&config.lock_path())?;
//! // ... stages run ...
//! // marker removed on drop, including on early return
//! ```

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Held for the duration of one run
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create the marker, refusing if it already exists
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if Self::is_held(&path) {
            return Err(Error::LockHeld(path));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;

        info!("Acquired run lock at {}", path.display());
        Ok(Self { path })
    }

    /// Whether a marker exists at `path`
    pub fn is_held(path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Released run lock at {}", self.path.display()),
            Err(e) => warn!("Failed to remove run lock {}: {}", self.path.display(), e),
        }
    }
}

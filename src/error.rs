// src/error.rs

//! Error taxonomy for a mirror run
//!
//! Every fatal condition unwinds as one of these variants through the
//! orchestrator, which releases the run lock before handing the error to
//! `main`. Non-fatal transfer failures on bulk stages are logged by the
//! orchestrator and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the mirror engine
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration, raised before the lock is taken
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another run holds the lock marker
    #[error("Sync already in progress (lock file {0} exists)")]
    LockHeld(PathBuf),

    /// An index file could not be read or decompressed
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Hash mismatch, or a referenced file still missing after a fetch
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The Transfer Client could not be started or failed inside the download queue
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The deletion ledger could not be written
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mirror operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::LockHeld(_) => 3,
            Self::Decode { .. } => 4,
            Self::Integrity(_) => 5,
            Self::Transfer(_) | Self::Ledger(_) | Self::Io(_) => 1,
        }
    }

    /// Build a missing-file integrity error
    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::Integrity(format!("missing file: {}", path.into().display()))
    }
}

// src/transfer/mod.rs

//! Transfer Client boundary
//!
//! All network file movement is delegated to an external client (rsync in
//! production). The engine only ever describes *what* to move with a typed
//! [`TransferRequest`]; a [`TransferClient`] turns that into a process.
//!
//! Two calling patterns exist:
//! - [`TransferClient::run`]: bulk stages, blocking until the client exits,
//!   with stdout handed over line by line
//! - [`TransferClient::start`]: the download queue, which keeps several
//!   per-file transfers in flight and reaps them later

mod rsync;

pub use rsync::{RsyncClient, RsyncCommand};

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Exit status of a finished transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    code: Option<i32>,
}

impl TransferStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Fixed flag set understood by every Transfer Client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Remote (`rsync://...`) or local source locators
    pub sources: Vec<String>,
    pub destination: PathBuf,
    pub excludes: Vec<String>,
    pub recursive: bool,
    /// Recreate the source path below the destination (`-R`)
    pub relative: bool,
    /// Remove destination files absent from the source
    pub delete: bool,
    /// Report what would change without touching the destination
    pub dry_run: bool,
    /// Move updated files into place only at the end of the transfer
    pub delay_updates: bool,
}

impl TransferRequest {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            sources: Vec::new(),
            destination: destination.into(),
            excludes: Vec::new(),
            recursive: false,
            relative: false,
            delete: false,
            dry_run: false,
            delay_updates: false,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn delay_updates(mut self) -> Self {
        self.delay_updates = true;
        self
    }

    /// Whether any source is fetched over the network
    pub fn has_remote_source(&self) -> bool {
        self.sources.iter().any(|s| s.starts_with("rsync://"))
    }
}

/// Locator for `relative_path` under the upstream module
///
/// The `/./` marker anchors `-R` transfers so only `relative_path` is
/// recreated below the destination.
pub fn remote_source(mirror_url: &str, relative_path: &str) -> String {
    format!(
        "rsync://{}/./{}",
        mirror_url.trim_end_matches('/'),
        relative_path.trim_start_matches('/')
    )
}

/// Local tree used as a transfer source
pub fn local_source(path: &Path) -> String {
    path.display().to_string()
}

/// A transfer started by [`TransferClient::start`]
pub trait PendingTransfer {
    /// Block until the transfer exits
    fn wait(self: Box<Self>) -> Result<TransferStatus>;
}

/// External file synchronisation client
pub trait TransferClient {
    /// Run a transfer to completion
    ///
    /// Every stdout line is passed to `on_line` as it arrives. A nonzero
    /// exit is reported through the status, not as an error; `Err` means
    /// the client could not be run at all.
    fn run(&self, request: &TransferRequest, on_line: &mut dyn FnMut(&str))
    -> Result<TransferStatus>;

    /// Start a transfer without waiting for it
    fn start(&self, request: &TransferRequest) -> Result<Box<dyn PendingTransfer>>;
}

/// Path named by a `deleting <path>` line of a dry-run diff
///
/// Directory entries carry a trailing slash, which is stripped.
pub fn parse_deleting_line(line: &str) -> Option<&str> {
    let path = line.trim_end().strip_prefix("deleting ")?.trim_end_matches('/');
    if path.is_empty() { None } else { Some(path) }
}

// src/repository/download.rs

//! Download Queue
//!
//! Bounded-concurrency fetching of individual files referenced by indices.
//!
//! # Admission
//!
//! At most `window` transfers run at once. When the window is full the
//! *oldest* transfer is awaited before the next one starts: strict FIFO, no
//! reordering. A stuck transfer therefore blocks admission but nothing else.
//!
//! # Completion
//!
//! Every completed transfer adds its path to the [`IndexedSet`] and then
//! requires the file to exist, failing with [`Error::Integrity`] otherwise.
//! Transfers still in flight when the queue is dropped are waited for, so an
//! early return never leaves an orphaned child process.

use crate::error::{Error, Result};
use crate::transfer::{PendingTransfer, TransferClient, TransferRequest, remote_source};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, error, warn};

use super::{IndexedSet, is_contained};

/// A fetch that has been started but not yet reaped
struct InFlight {
    relative_path: String,
    transfer: Box<dyn PendingTransfer>,
}

/// FIFO window of per-file fetches
pub struct DownloadQueue<'a> {
    transfer: &'a dyn TransferClient,
    mirror_url: &'a str,
    mirror_path: &'a Path,
    window: usize,
    in_flight: VecDeque<InFlight>,
    fetched: usize,
}

impl<'a> DownloadQueue<'a> {
    pub fn new(
        transfer: &'a dyn TransferClient,
        mirror_url: &'a str,
        mirror_path: &'a Path,
        window: usize,
    ) -> Self {
        Self {
            transfer,
            mirror_url,
            mirror_path,
            window: window.max(1),
            in_flight: VecDeque::new(),
            fetched: 0,
        }
    }

    /// Number of transfers currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of transfers reaped with the file present
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Reconcile one file reference from an index
    ///
    /// Files already present are marked indexed immediately; anything else
    /// is fetched through the Transfer Client.
    pub fn submit(&mut self, relative_path: &str, indexed: &mut IndexedSet) -> Result<()> {
        if !is_contained(relative_path) {
            warn!("Ignoring index entry outside the mirror: {}", relative_path);
            return Ok(());
        }

        if self.mirror_path.join(relative_path).is_file() {
            indexed.insert(relative_path);
            return Ok(());
        }

        if self.in_flight.len() >= self.window {
            if let Some(oldest) = self.in_flight.pop_front() {
                self.complete(oldest, indexed)?;
            }
        }

        debug!("Downloading: {}", relative_path);
        let request = TransferRequest::new(self.mirror_path)
            .source(remote_source(self.mirror_url, relative_path))
            .relative();
        let transfer = self.transfer.start(&request)?;

        self.in_flight.push_back(InFlight {
            relative_path: relative_path.to_string(),
            transfer,
        });
        Ok(())
    }

    /// Wait for every outstanding transfer
    ///
    /// All transfers are reaped even after a failure; the first error is
    /// returned.
    pub fn drain(&mut self, indexed: &mut IndexedSet) -> Result<()> {
        let mut first_error = None;
        while let Some(task) = self.in_flight.pop_front() {
            if let Err(e) = self.complete(task, indexed) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn complete(&mut self, task: InFlight, indexed: &mut IndexedSet) -> Result<()> {
        let status = task.transfer.wait()?;
        if !status.is_success() {
            warn!("Fetch of {} finished with {}", task.relative_path, status);
        }

        indexed.insert(&task.relative_path);

        let full_path = self.mirror_path.join(&task.relative_path);
        if !full_path.is_file() {
            error!("Missing file: {}", full_path.display());
            return Err(Error::missing_file(full_path));
        }

        self.fetched += 1;
        Ok(())
    }
}

impl Drop for DownloadQueue<'_> {
    fn drop(&mut self) {
        while let Some(task) = self.in_flight.pop_front() {
            if let Err(e) = task.transfer.wait() {
                warn!("Failed to reap fetch of {}: {}", task.relative_path, e);
            }
        }
    }
}

// src/sync/context.rs

//! State threaded through every stage of one run

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::hash::HashAlgorithm;
use crate::repository::IndexedSet;
use crate::transfer::{TransferClient, TransferRequest, TransferStatus};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// Everything a stage may read or mutate
///
/// The [`IndexedSet`] starts empty for every run and is only written by the
/// index walk.
pub struct RunContext<'a> {
    pub config: &'a MirrorConfig,
    pub transfer: &'a dyn TransferClient,
    pub algorithm: HashAlgorithm,
    pub indexed: IndexedSet,
    pub started: DateTime<Utc>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a MirrorConfig,
        transfer: &'a dyn TransferClient,
        started: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            transfer,
            algorithm: config.hash_algorithm()?,
            indexed: IndexedSet::default(),
            started,
        })
    }

    pub fn mirror_path(&self) -> &Path {
        &self.config.mirror_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.config.temp_indices
    }

    /// Run start as UNIX seconds, the ledger's bucket key
    pub fn now(&self) -> u64 {
        u64::try_from(self.started.timestamp()).unwrap_or(0)
    }

    /// Run one bulk transfer to completion
    ///
    /// Output is logged at debug level. A nonzero exit is logged and
    /// tolerated; later verification catches whatever it left behind.
    pub fn run_bulk(&self, what: &str, request: &TransferRequest) -> Result<TransferStatus> {
        let status = self
            .transfer
            .run(request, &mut |line| debug!("{}", line))?;
        if !status.is_success() {
            warn!("Transfer for {} finished with {}", what, status);
        }
        Ok(status)
    }
}

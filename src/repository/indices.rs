// src/repository/indices.rs

//! Index walk
//!
//! Every Packages/Sources index in the staged metadata is decoded and each
//! file it references is handed to the [`DownloadQueue`]. The queue is
//! drained after every index, so no transfer outlives the walk.

use crate::compression;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

use super::IndexedSet;
use super::discovery::{IndexKind, find_indices};
use super::download::DownloadQueue;
use super::parsers::{ParseError, parse_packages, parse_sources};

/// Counters for one index walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Index files decoded
    pub indices: usize,
    /// File references encountered across all indices
    pub references: usize,
    /// Files that had to be fetched
    pub fetched: usize,
}

/// Walk one index file, feeding every reference to the queue
pub fn check_index(
    kind: IndexKind,
    path: &Path,
    queue: &mut DownloadQueue<'_>,
    indexed: &mut IndexedSet,
) -> Result<usize> {
    debug!("Checking index {}", path.display());
    let text = compression::open(path)?;

    let mut references = 0;
    match kind {
        IndexKind::Packages => {
            for record in parse_packages(&text).map_err(|e| decode_error(path, e))? {
                queue.submit(&record.relative_path, indexed)?;
                references += 1;
            }
        }
        IndexKind::Sources => {
            for record in parse_sources(&text).map_err(|e| decode_error(path, e))? {
                for relative_path in record.paths() {
                    queue.submit(&relative_path, indexed)?;
                    references += 1;
                }
            }
        }
    }

    queue.drain(indexed)?;
    Ok(references)
}

fn decode_error(path: &Path, e: ParseError) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Walk every index under `staging`, populating `indexed`
pub fn check_indices(
    staging: &Path,
    queue: &mut DownloadQueue<'_>,
    indexed: &mut IndexedSet,
) -> Result<IndexSummary> {
    info!("Gathering indices");

    let mut summary = IndexSummary::default();
    let fetched_before = queue.fetched();

    for group in find_indices(staging)? {
        for (kind, path) in group.indices() {
            summary.references += check_index(kind, path, queue, indexed)?;
            summary.indices += 1;
        }
    }

    summary.fetched = queue.fetched() - fetched_before;
    info!(
        "Checked {} indices: {} references, {} files fetched",
        summary.indices, summary.references, summary.fetched
    );
    Ok(summary)
}

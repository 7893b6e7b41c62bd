// src/repository/verify.rs

//! Hash Verifier
//!
//! Checks the content of files a Release file describes. Only files that
//! already exist are hashed; completeness of the file set is the download
//! queue's job.

use crate::compression;
use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, verify_file};
use std::path::Path;
use tracing::{debug, error, info};

use super::discovery::find_release_files;
use super::parsers::release::{entries_for, parse_release};

/// Outcome of verifying one or more Release files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub release_files: usize,
    pub verified: usize,
    pub absent: usize,
}

/// Verify the files listed under `algorithm` in one Release file
///
/// Entry paths resolve against the Release file's directory. Any digest
/// mismatch aborts with [`Error::Integrity`].
pub fn verify_release_file(release: &Path, algorithm: HashAlgorithm) -> Result<VerifySummary> {
    debug!("Checking release file {}", release.display());

    let text = compression::open(release)?;
    let entries = parse_release(&text);
    let base = release.parent().unwrap_or(Path::new(""));

    let mut summary = VerifySummary {
        release_files: 1,
        ..Default::default()
    };

    for entry in entries_for(&entries, algorithm) {
        let path = base.join(&entry.relative_path);
        if !path.is_file() {
            summary.absent += 1;
            continue;
        }

        debug!("Checking {} {}", path.display(), algorithm);
        if let Err(mismatch) = verify_file(&path, &entry.digest, algorithm)? {
            error!("{} for file {}", mismatch, path.display());
            return Err(Error::Integrity(format!(
                "{} for file {}",
                mismatch,
                path.display()
            )));
        }
        summary.verified += 1;
    }

    Ok(summary)
}

/// Verify every Release file found under `root`
pub fn check_release_files(root: &Path, algorithm: HashAlgorithm) -> Result<VerifySummary> {
    info!("Gathering Release files");

    let mut total = VerifySummary::default();
    for release in find_release_files(root)? {
        let summary = verify_release_file(&release, algorithm)?;
        total.release_files += summary.release_files;
        total.verified += summary.verified;
        total.absent += summary.absent;
    }

    info!(
        "Verified {} files from {} Release files ({} listed but not staged)",
        total.verified, total.release_files, total.absent
    );
    Ok(total)
}

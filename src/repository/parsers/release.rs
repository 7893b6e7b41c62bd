// src/repository/parsers/release.rs

//! Release file hash sections
//!
//! ```text
//! MD5Sum:
//!  0d5f8c07a0d1e7bd3a0c0d9a0b1d2e3f     1234 main/binary-amd64/Packages
//! SHA256:
//!  9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08     1234 main/binary-amd64/Packages
//! ```
//!
//! A header line opens a section; indented lines under it are entries; any
//! other unindented line closes it.

use crate::hash::HashAlgorithm;
use tracing::warn;

/// One line of a Release file's hash section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    /// Section the entry was parsed under
    pub algorithm: HashAlgorithm,
    pub digest: String,
    pub size: u64,
    /// Path relative to the Release file's directory
    pub relative_path: String,
}

/// Parse every hash section of a Release file
///
/// Malformed entry lines, including digests of the wrong length for their
/// section, are skipped with a warning.
pub fn parse_release(text: &str) -> Vec<HashEntry> {
    let mut entries = Vec::new();
    let mut section: Option<HashAlgorithm> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if let Some(algorithm) = HashAlgorithm::from_release_header(line) {
            section = Some(algorithm);
            continue;
        }

        if !is_continuation(line) {
            section = None;
            continue;
        }

        let Some(algorithm) = section else {
            continue;
        };

        match parse_entry(line, algorithm) {
            Some(entry) => entries.push(entry),
            None => warn!("Skipping malformed {} entry: {:?}", algorithm, line.trim()),
        }
    }

    entries
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Entries of a single section, in file order
pub fn entries_for(entries: &[HashEntry], algorithm: HashAlgorithm) -> Vec<&HashEntry> {
    entries.iter().filter(|e| e.algorithm == algorithm).collect()
}

fn parse_entry(line: &str, algorithm: HashAlgorithm) -> Option<HashEntry> {
    let mut fields = line.split_whitespace();
    let digest = fields.next().filter(|d| d.len() == algorithm.hex_len())?;
    let size = fields.next()?.parse().ok()?;
    let relative_path = fields.next()?;

    Some(HashEntry {
        algorithm,
        digest: digest.to_string(),
        size,
        relative_path: relative_path.to_string(),
    })
}

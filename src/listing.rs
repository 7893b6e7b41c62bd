// src/listing.rs

//! `ls-lR.gz` directory listing
//!
//! Clients use the listing to see what the mirror holds without crawling
//! it. The format follows `ls -lR`: each directory gets a `path:` header
//! followed by one line per entry, and subdirectories are listed after
//! their parent.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, Metadata};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

pub const LISTING_NAME: &str = "ls-lR.gz";
const LISTING_TEMP_NAME: &str = "ls-lR.new.gz";

/// Regenerate `ls-lR.gz` at the root of `mirror_path`
///
/// The listing is built in `ls-lR.new.gz` and renamed into place. On failure
/// the partial file is removed and any previous listing stays.
pub fn write_listing(mirror_path: &Path) -> Result<PathBuf> {
    info!("Generating {}", LISTING_NAME);

    let temp_path = mirror_path.join(LISTING_TEMP_NAME);
    let final_path = mirror_path.join(LISTING_NAME);

    match build_listing(mirror_path, &temp_path, &final_path) {
        Ok(entries) => {
            debug!("Listed {} entries", entries);
            Ok(final_path)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&temp_path)
                && rm.kind() != io::ErrorKind::NotFound
            {
                warn!("Failed to remove {}: {}", temp_path.display(), rm);
            }
            Err(e)
        }
    }
}

fn build_listing(mirror_path: &Path, temp_path: &Path, final_path: &Path) -> Result<usize> {
    let file = File::create(temp_path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let entries = write_tree(mirror_path, &mut encoder)?;
    let writer = encoder.finish()?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?
        .sync_all()?;

    fs::rename(temp_path, final_path)?;
    Ok(entries)
}

/// Entries directly below `dir`, sorted by name
fn read_entries(dir: &Path) -> std::result::Result<Vec<DirEntry>, walkdir::Error> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect()
}

/// Write the listing for `root`, returning the number of entries listed
///
/// A directory or entry that cannot be read is reported and skipped, the
/// way `ls -lR` carries on past permission errors. Only write failures abort.
fn write_tree(root: &Path, out: &mut impl Write) -> Result<usize> {
    let mut pending = vec![PathBuf::new()];
    let mut entries = 0;
    let mut first = true;

    while let Some(relative) = pending.pop() {
        let dir = root.join(&relative);
        if !first {
            writeln!(out)?;
        }
        first = false;

        let header = if relative.as_os_str().is_empty() {
            ".".to_string()
        } else {
            format!("./{}", relative.display())
        };
        writeln!(out, "{}:", header)?;

        let listing = match read_entries(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Cannot list {}: {}", dir.display(), e);
                continue;
            }
        };

        let mut subdirs = Vec::new();
        for entry in listing {
            let name = entry.file_name().to_string_lossy().into_owned();
            if relative.as_os_str().is_empty() && name.starts_with("ls-lR") {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let target = if metadata.file_type().is_symlink() {
                fs::read_link(entry.path()).ok()
            } else {
                None
            };
            writeln!(out, "{}", format_entry(&name, &metadata, target.as_deref()))?;
            entries += 1;

            if metadata.is_dir() {
                subdirs.push(relative.join(&name));
            }
        }

        // reversed so the stack pops them in name order
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(entries)
}

/// One `ls -l` style line
fn format_entry(name: &str, metadata: &Metadata, link_target: Option<&Path>) -> String {
    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        'l'
    } else if file_type.is_dir() {
        'd'
    } else {
        '-'
    };

    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| DateTime::from(UNIX_EPOCH));

    let mut line = format!(
        "{}{} {:>3} {:>12} {} {}",
        kind,
        format_mode(metadata.permissions().mode()),
        metadata.nlink(),
        metadata.len(),
        modified.format("%Y-%m-%d %H:%M"),
        name
    );
    if let Some(target) = link_target {
        line.push_str(" -> ");
        line.push_str(&target.display().to_string());
    }
    line
}

/// Format Unix mode as rwxrwxrwx string
fn format_mode(mode: u32) -> String {
    let user = format_triplet((mode >> 6) & 0o7);
    let group = format_triplet((mode >> 3) & 0o7);
    let other = format_triplet(mode & 0o7);
    format!("{}{}{}", user, group, other)
}

fn format_triplet(bits: u32) -> String {
    let r = if bits & 0o4 != 0 { 'r' } else { '-' };
    let w = if bits & 0o2 != 0 { 'w' } else { '-' };
    let x = if bits & 0o1 != 0 { 'x' } else { '-' };
    format!("{}{}{}", r, w, x)
}

// src/gc/ledger.rs

//! Deletion Ledger
//!
//! Paths that upstream no longer carries are remembered under the UNIX
//! timestamp at which they were first seen missing. Each run either
//! exonerates a path (an index referenced it again), deletes it (its bucket
//! is at least `package_ttl` seconds old), or leaves it pending.
//!
//! On disk the ledger is YAML mapping the stringified timestamp to a list of
//! mirror-relative paths:
//!
//! ```yaml
//! "1700000000":
//!   - pool/main/c/c.deb
//! ```

use crate::error::{Error, Result};
use crate::repository::{IndexedSet, is_contained};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Paths newly recorded this run
    pub recorded: usize,
    /// Paths dropped because an index referenced them
    pub exonerated: usize,
    /// Paths physically removed
    pub deleted: usize,
    /// Paths still waiting out their grace period
    pub pending: usize,
}

/// What happened when a due path was removed
enum Removal {
    Removed,
    AlreadyGone,
    NotEmpty,
}

/// Timestamp buckets of paths pending deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionLedger {
    buckets: BTreeMap<u64, BTreeSet<String>>,
}

impl DeletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger, treating a missing or unreadable file as empty
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No ledger at {}, starting empty", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Cannot read ledger {}: {}; starting empty", path.display(), e);
                return Self::new();
            }
        };

        match Self::from_yaml(&text) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Discarding corrupt ledger {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Parse the serialized form
    ///
    /// Buckets whose key is not a timestamp are skipped.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: Mapping = serde_yaml::from_str(text).map_err(|e| Error::Ledger(e.to_string()))?;

        let mut ledger = Self::new();
        for (key, value) in raw {
            let since = match &key {
                Value::String(s) => s.trim().parse::<u64>().ok(),
                Value::Number(n) => n.as_u64(),
                _ => None,
            };
            let Some(since) = since else {
                warn!("Skipping ledger bucket with invalid timestamp {:?}", key);
                continue;
            };
            let paths: Vec<String> =
                serde_yaml::from_value(value).map_err(|e| Error::Ledger(e.to_string()))?;
            ledger.buckets.entry(since).or_default().extend(paths);
        }
        ledger.prune();
        Ok(ledger)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let raw: BTreeMap<String, Vec<&String>> = self
            .buckets
            .iter()
            .map(|(since, paths)| (since.to_string(), paths.iter().collect()))
            .collect();
        serde_yaml::to_string(&raw).map_err(|e| Error::Ledger(e.to_string()))
    }

    /// Rewrite the ledger file wholesale
    ///
    /// The new content is written next to the target and renamed over it,
    /// so a crash leaves either the old or the new ledger.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(yaml.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path)
            .map_err(|e| Error::Ledger(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!("Saved ledger with {} paths to {}", self.len(), path.display());
        Ok(())
    }

    /// Whether `path` is pending in any bucket
    pub fn is_tracked(&self, path: &str) -> bool {
        self.since(path).is_some()
    }

    /// Record `path` under the `now` bucket unless it is already tracked
    pub fn record(&mut self, now: u64, path: &str) -> bool {
        if self.is_tracked(path) {
            return false;
        }
        self.buckets.entry(now).or_default().insert(path.to_string())
    }

    /// Bucket a path is pending under
    pub fn since(&self, path: &str) -> Option<u64> {
        self.buckets
            .iter()
            .find(|(_, paths)| paths.contains(path))
            .map(|(since, _)| *since)
    }

    /// Total number of pending paths
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Exonerate, delete or keep every tracked path
    ///
    /// Indexed paths are dropped first, regardless of age. Paths whose bucket
    /// is at least `ttl` seconds old are removed below `mirror_root`, deepest
    /// first so emptied directories can follow their contents. A directory
    /// that still has entries is dropped from the ledger without being
    /// touched. A removal that fails for another reason stays pending.
    pub fn reconcile(
        &mut self,
        indexed: &IndexedSet,
        now: u64,
        ttl: u64,
        mirror_root: &Path,
    ) -> GcReport {
        let mut report = GcReport::default();

        for paths in self.buckets.values_mut() {
            paths.retain(|path| {
                if indexed.contains(path) {
                    debug!("Exonerated: {}", path);
                    report.exonerated += 1;
                    false
                } else {
                    true
                }
            });
        }

        let mut due: Vec<(u64, String)> = self
            .buckets
            .iter()
            .filter(|(since, _)| now.saturating_sub(**since) >= ttl)
            .flat_map(|(since, paths)| paths.iter().map(move |p| (*since, p.clone())))
            .collect();
        due.sort_by(|a, b| b.1.cmp(&a.1));

        for (since, path) in due {
            let forget = if !is_contained(&path) {
                warn!("Dropping ledger entry outside the mirror: {}", path);
                true
            } else {
                match remove_path(&mirror_root.join(&path)) {
                    Ok(Removal::Removed) => {
                        info!("Deleted: {}", path);
                        report.deleted += 1;
                        true
                    }
                    Ok(Removal::AlreadyGone) => {
                        debug!("Already gone: {}", path);
                        true
                    }
                    Ok(Removal::NotEmpty) => {
                        debug!("Directory not empty, keeping: {}", path);
                        true
                    }
                    Err(e) => {
                        warn!("Failed to delete {}: {}", path, e);
                        false
                    }
                }
            };

            if forget && let Some(paths) = self.buckets.get_mut(&since) {
                paths.remove(&path);
            }
        }

        self.prune();
        report.pending = self.len();
        report
    }

    /// Drop buckets with no paths left
    fn prune(&mut self) {
        self.buckets.retain(|_, paths| !paths.is_empty());
    }
}

/// Remove a file, symlink or empty directory
fn remove_path(path: &Path) -> io::Result<Removal> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::AlreadyGone),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        match fs::remove_dir(path) {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => Ok(Removal::NotEmpty),
            Err(e) => Err(e),
        }
    } else {
        fs::remove_file(path)?;
        Ok(Removal::Removed)
    }
}

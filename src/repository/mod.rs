// src/repository/mod.rs

//! Repository metadata handling
//!
//! This module provides functionality for:
//! - Locating Release files and Packages/Sources indices in a staged tree
//! - Parsing Debian repository metadata
//! - Verifying staged files against Release-declared hashes
//! - Fetching files referenced by indices under a bounded download window

mod discovery;
mod download;
mod indices;
mod verify;

pub mod parsers;

pub use discovery::{IndexGroup, IndexKind, find_indices, find_release_files};
pub use download::DownloadQueue;
pub use indices::{IndexSummary, check_index, check_indices};
pub use parsers::{HashEntry, PackageRecord, SourceFile, SourceRecord};
pub use verify::{VerifySummary, check_release_files, verify_release_file};

use std::collections::HashSet;
use std::path::{Component, Path};

/// Whether a mirror-relative path stays below the mirror root when joined to it
pub(crate) fn is_contained(relative_path: &str) -> bool {
    !relative_path.is_empty()
        && Path::new(relative_path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Mirror-relative paths confirmed referenced by an index during this run
///
/// Built fresh for every run and never persisted. Paths are only ever added.
#[derive(Debug, Clone, Default)]
pub struct IndexedSet {
    paths: HashSet<String>,
}

impl IndexedSet {
    /// Add a path, returning whether it was new
    pub fn insert(&mut self, relative_path: &str) -> bool {
        self.paths.insert(relative_path.to_owned())
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.paths.contains(relative_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for IndexedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::default();
        for path in iter {
            set.insert(path.as_ref());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_set_accumulates() {
        let mut set = IndexedSet::default();
        assert!(set.is_empty());

        assert!(set.insert("pool/a.deb"));
        assert!(!set.insert("pool/a.deb"));
        assert!(set.insert("pool/b.deb"));

        assert_eq!(set.len(), 2);
        assert!(set.contains("pool/a.deb"));
        assert!(!set.contains("pool/c.deb"));
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("pool/main/a.deb"));
        assert!(is_contained("./pool/a.deb"));
        assert!(!is_contained("../pool/a.deb"));
        assert!(!is_contained("pool/../../a.deb"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained(""));
    }

    #[test]
    fn test_indexed_set_from_iter() {
        let set: IndexedSet = ["pool/a.deb", "pool/b.deb"].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}

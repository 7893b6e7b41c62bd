// src/repository/discovery.rs

//! Locating Release files and indices in a staged metadata tree
//!
//! Traversal is iterative (walkdir keeps its own stack), so deep mirrors
//! cannot exhaust the call stack.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static INDEX_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Packages|Sources)(\.gz|\.bz2)?$").expect("index name pattern is valid")
});

/// Kind of index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKind {
    Sources,
    Packages,
}

/// The indices found in one directory, at most one of each kind
///
/// When several encodings of the same index exist, the plain file wins
/// over `.gz`, which wins over `.bz2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGroup {
    pub directory: PathBuf,
    pub sources: Option<PathBuf>,
    pub packages: Option<PathBuf>,
}

impl IndexGroup {
    /// Chosen indices, Sources before Packages
    pub fn indices(&self) -> impl Iterator<Item = (IndexKind, &Path)> {
        self.sources
            .iter()
            .map(|p| (IndexKind::Sources, p.as_path()))
            .chain(self.packages.iter().map(|p| (IndexKind::Packages, p.as_path())))
    }
}

/// Classify a file name as an index, returning its kind and encoding rank
fn classify(name: &str) -> Option<(IndexKind, u8)> {
    let caps = INDEX_NAME.captures(name)?;
    let kind = match &caps[1] {
        "Sources" => IndexKind::Sources,
        _ => IndexKind::Packages,
    };
    let rank = match caps.get(2).map(|m| m.as_str()) {
        None => 0,
        Some(".gz") => 1,
        _ => 2,
    };
    Some((kind, rank))
}

/// Every regular file under `root`, in a stable order
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Find every file named exactly `Release` under `root`
pub fn find_release_files(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(walk_files(root)?
        .into_iter()
        .filter(|p| p.file_name().is_some_and(|n| n == "Release"))
        .collect())
}

/// Find Packages/Sources indices under `root`, grouped by directory
pub fn find_indices(root: &Path) -> Result<Vec<IndexGroup>> {
    let mut best: BTreeMap<(PathBuf, IndexKind), (u8, PathBuf)> = BTreeMap::new();

    for path in walk_files(root)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((kind, rank)) = classify(name) else {
            continue;
        };
        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            continue;
        };

        let slot = best.entry((dir, kind)).or_insert((rank, path.clone()));
        if rank < slot.0 {
            *slot = (rank, path);
        }
    }

    let mut groups: BTreeMap<PathBuf, IndexGroup> = BTreeMap::new();
    for ((dir, kind), (_, path)) in best {
        let group = groups.entry(dir.clone()).or_insert_with(|| IndexGroup {
            directory: dir,
            sources: None,
            packages: None,
        });
        match kind {
            IndexKind::Sources => group.sources = Some(path),
            IndexKind::Packages => group.packages = Some(path),
        }
    }

    Ok(groups.into_values().collect())
}

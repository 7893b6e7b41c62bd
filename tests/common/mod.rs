// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! [`FakeUpstream`] stands in for rsync: `rsync://` sources resolve against
//! a local "upstream" directory, local sources are copied as-is, and a
//! dry-run with delete reports destination files the source lacks as
//! `deleting <path>` lines.

#![allow(dead_code)]

use apt_mirror::hash::{HashAlgorithm, hash_bytes};
use apt_mirror::transfer::{PendingTransfer, TransferClient, TransferRequest, TransferStatus};
use apt_mirror::{MirrorConfig, Result};
use regex::Regex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const MIRROR_URL: &str = "mirror.test/debian";

/// Upstream simulated by a local directory tree
pub struct FakeUpstream {
    pub root: PathBuf,
    /// Every bulk request seen, in order
    pub requests: RefCell<Vec<TransferRequest>>,
    /// Every per-file fetch started, in order
    pub fetches: RefCell<Vec<String>>,
    /// Bulk sources (relative to upstream) that fail without copying
    pub broken: RefCell<Vec<String>>,
}

impl FakeUpstream {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            requests: RefCell::new(Vec::new()),
            fetches: RefCell::new(Vec::new()),
            broken: RefCell::new(Vec::new()),
        }
    }

    pub fn break_source(&self, relative: &str) {
        self.broken.borrow_mut().push(relative.to_string());
    }

    fn upstream_relative<'s>(&self, source: &'s str) -> Option<&'s str> {
        source
            .strip_prefix("rsync://")?
            .strip_prefix(MIRROR_URL)?
            .strip_prefix("/./")
    }

    /// Expand one source into (source path, destination-relative path) pairs
    fn expand(&self, source: &str, relative: bool) -> Vec<(PathBuf, PathBuf)> {
        let Some(pattern) = self.upstream_relative(source) else {
            let path = PathBuf::from(source);
            return match path.file_name() {
                Some(name) if path.exists() => vec![(path.clone(), PathBuf::from(name))],
                _ => Vec::new(),
            };
        };

        let mut matches = vec![PathBuf::new()];
        for component in pattern.split('/') {
            let mut next = Vec::new();
            for base in &matches {
                if component.contains('*') {
                    let re = glob(component);
                    let Ok(entries) = fs::read_dir(self.root.join(base)) else {
                        continue;
                    };
                    let mut names: Vec<String> = entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                        .filter(|n| re.is_match(n))
                        .collect();
                    names.sort();
                    next.extend(names.into_iter().map(|n| base.join(n)));
                } else if self.root.join(base).join(component).exists() {
                    next.push(base.join(component));
                }
            }
            matches = next;
        }

        matches
            .into_iter()
            .map(|rel| {
                let dest = if relative {
                    rel.clone()
                } else {
                    PathBuf::from(rel.file_name().unwrap_or_default())
                };
                (self.root.join(rel), dest)
            })
            .collect()
    }
}

impl TransferClient for FakeUpstream {
    fn run(&self, request: &TransferRequest, on_line: &mut dyn FnMut(&str)) -> Result<TransferStatus> {
        self.requests.borrow_mut().push(request.clone());

        let mut complete = true;
        for source in &request.sources {
            if let Some(rel) = self.upstream_relative(source)
                && self.broken.borrow().iter().any(|b| b == rel)
            {
                complete = false;
                continue;
            }

            let pairs = self.expand(source, request.relative);
            if pairs.is_empty() {
                complete = false;
            }

            for (src, dest_rel) in pairs {
                let top = dest_rel.components().next().map(|c| c.as_os_str().to_owned());
                if top.is_some_and(|t| request.excludes.iter().any(|e| t == e.as_str())) {
                    continue;
                }
                let dest = request.destination.join(&dest_rel);

                if request.dry_run {
                    if request.delete {
                        for gone in extraneous(&src, &dest) {
                            on_line(&format!("deleting {}", dest_rel.join(gone).display()));
                        }
                    }
                    continue;
                }

                on_line(&dest_rel.display().to_string());
                if src.is_dir() {
                    if request.recursive {
                        copy_tree(&src, &dest);
                    }
                } else {
                    copy_file(&src, &dest);
                }
            }
        }

        Ok(TransferStatus::from_code(Some(if complete { 0 } else { 23 })))
    }

    fn start(&self, request: &TransferRequest) -> Result<Box<dyn PendingTransfer>> {
        let source = &request.sources[0];
        let rel = self.upstream_relative(source).unwrap_or(source).to_string();
        self.fetches.borrow_mut().push(rel.clone());
        Ok(Box::new(FakeFetch {
            source: self.root.join(&rel),
            dest: request.destination.join(&rel),
        }))
    }
}

/// Per-file fetch; the copy happens when it is reaped
struct FakeFetch {
    source: PathBuf,
    dest: PathBuf,
}

impl PendingTransfer for FakeFetch {
    fn wait(self: Box<Self>) -> Result<TransferStatus> {
        if self.source.is_file() {
            copy_file(&self.source, &self.dest);
            Ok(TransferStatus::success())
        } else {
            Ok(TransferStatus::from_code(Some(23)))
        }
    }
}

fn glob(pattern: &str) -> Regex {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", escaped.join(".*"))).unwrap()
}

fn copy_file(src: &Path, dest: &Path) {
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    fs::copy(src, dest).unwrap();
}

fn copy_tree(src: &Path, dest: &Path) {
    for entry in WalkDir::new(src) {
        let entry = entry.unwrap();
        let target = dest.join(entry.path().strip_prefix(src).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            copy_file(entry.path(), &target);
        }
    }
}

/// Paths below `dest` with no counterpart below `src`, relative to `dest`
fn extraneous(src: &Path, dest: &Path) -> Vec<PathBuf> {
    if !dest.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dest)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(dest).ok()?.to_path_buf();
            (!src.join(&rel).exists()).then_some(rel)
        })
        .collect()
}

/// A mirror, its staging area and a fake upstream, all in temp dirs
pub struct Fixture {
    pub upstream: TempDir,
    pub mirror: TempDir,
    pub staging: TempDir,
    pub config: MirrorConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let upstream = TempDir::new().unwrap();
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();

        let mut config = MirrorConfig::new(mirror.path(), MIRROR_URL);
        config.temp_indices = staging.path().join("indices");
        config.distributions = vec!["stable".to_string()];
        config.repos = vec!["main".to_string()];
        config.architectures = vec!["amd64".to_string()];
        config.parallel_downloads = 2;

        Self {
            upstream,
            mirror,
            staging,
            config,
        }
    }

    pub fn client(&self) -> FakeUpstream {
        FakeUpstream::new(self.upstream.path())
    }

    pub fn upstream_path(&self, relative: &str) -> PathBuf {
        self.upstream.path().join(relative)
    }

    pub fn mirror_path(&self, relative: &str) -> PathBuf {
        self.mirror.path().join(relative)
    }

    /// Publish `packages` upstream: pool files, a Packages index and a Release
    pub fn publish(&self, packages: &[&str]) {
        let mut index = String::new();
        for name in packages {
            let rel = format!("pool/main/{name}.deb");
            put(&self.upstream_path(&rel), package_content(name).as_bytes());
            index.push_str(&format!("Package: {name}\nVersion: 1.0\nFilename: {rel}\n\n"));
        }
        put(
            &self.upstream_path("dists/stable/main/binary-amd64/Packages"),
            index.as_bytes(),
        );
        self.write_release(&index);
    }

    /// Write a Release for the given Packages content
    pub fn write_release(&self, packages_index: &str) {
        let release = format!(
            "Origin: Test\nSuite: stable\nSHA256:\n {} {} main/binary-amd64/Packages\n",
            hash_bytes(HashAlgorithm::Sha256, packages_index.as_bytes()),
            packages_index.len()
        );
        put(&self.upstream_path("dists/stable/Release"), release.as_bytes());
    }

    /// Place a package in the local pool with the content upstream would have
    pub fn seed_mirror(&self, names: &[&str]) {
        for name in names {
            put(
                &self.mirror_path(&format!("pool/main/{name}.deb")),
                package_content(name).as_bytes(),
            );
        }
    }
}

pub fn package_content(name: &str) -> String {
    format!("contents of {name}")
}

pub fn put(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Every file below `root` with its content
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

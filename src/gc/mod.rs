// src/gc/mod.rs

//! Garbage collection of pool files upstream no longer carries
//!
//! A dry-run diff of the Transfer Client against the upstream pool lists
//! what upstream would delete. Those paths feed the [`DeletionLedger`], which
//! holds each one for `package_ttl` seconds before removing it, unless an
//! index references it again first.

mod ledger;

pub use ledger::{DeletionLedger, GcReport};

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::repository::{IndexedSet, is_contained};
use crate::transfer::{TransferClient, TransferRequest, parse_deleting_line, remote_source};
use tracing::{debug, info, warn};

/// Paths under `pool/` that upstream no longer has
///
/// Returns `None` when the diff exited nonzero, since its output may be
/// incomplete.
pub fn upstream_absent(
    transfer: &dyn TransferClient,
    config: &MirrorConfig,
) -> Result<Option<Vec<String>>> {
    let request = TransferRequest::new(&config.mirror_path)
        .source(remote_source(&config.mirror_url, "pool"))
        .recursive()
        .relative()
        .delete()
        .dry_run();

    let mut absent = Vec::new();
    let status = transfer.run(&request, &mut |line| match parse_deleting_line(line) {
        Some(path) => absent.push(path.to_string()),
        None => debug!("{}", line),
    })?;

    if !status.is_success() {
        warn!("Upstream diff finished with {}, not recording new candidates", status);
        return Ok(None);
    }
    Ok(Some(absent))
}

/// Run one GC reconciliation and persist the ledger
pub fn collect_garbage(
    transfer: &dyn TransferClient,
    config: &MirrorConfig,
    indexed: &IndexedSet,
    now: u64,
) -> Result<GcReport> {
    info!("Collecting garbage");

    let ledger_path = config.ledger_path();
    let mut ledger = DeletionLedger::load(&ledger_path);

    let mut recorded = 0;
    if let Some(absent) = upstream_absent(transfer, config)? {
        for path in absent {
            if !is_contained(&path) || indexed.contains(&path) {
                continue;
            }
            if !config.mirror_path.join(&path).exists() {
                continue;
            }
            if ledger.record(now, &path) {
                debug!("Pending deletion: {}", path);
                recorded += 1;
            }
        }
    }

    let mut report = ledger.reconcile(indexed, now, config.package_ttl, &config.mirror_path);
    report.recorded = recorded;
    ledger.save(&ledger_path)?;

    info!(
        "GC: {} recorded, {} exonerated, {} deleted, {} pending",
        report.recorded, report.exonerated, report.deleted, report.pending
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{PendingTransfer, TransferStatus};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Replays canned diff output
    struct DiffClient {
        lines: Vec<&'static str>,
        code: i32,
        requests: RefCell<Vec<TransferRequest>>,
    }

    impl DiffClient {
        fn new(lines: Vec<&'static str>, code: i32) -> Self {
            Self {
                lines,
                code,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl TransferClient for DiffClient {
        fn run(
            &self,
            request: &TransferRequest,
            on_line: &mut dyn FnMut(&str),
        ) -> Result<TransferStatus> {
            self.requests.borrow_mut().push(request.clone());
            for line in &self.lines {
                on_line(line);
            }
            Ok(TransferStatus::from_code(Some(self.code)))
        }

        fn start(&self, _: &TransferRequest) -> Result<Box<dyn PendingTransfer>> {
            unreachable!("gc never starts background transfers")
        }
    }

    fn setup() -> (TempDir, TempDir, MirrorConfig) {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let mut config = MirrorConfig::new(mirror.path(), "example.org/debian");
        config.temp_indices = staging.path().to_path_buf();
        for rel in ["pool/a.deb", "pool/b.deb", "pool/c.deb"] {
            put(mirror.path(), rel);
        }
        (mirror, staging, config)
    }

    fn put(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"deb").unwrap();
    }

    #[test]
    fn test_diff_request_is_non_destructive() {
        let (_mirror, _staging, config) = setup();
        let client = DiffClient::new(vec![], 0);
        upstream_absent(&client, &config).unwrap();

        let requests = client.requests.borrow();
        let request = &requests[0];
        assert!(request.dry_run && request.delete && request.recursive);
        assert_eq!(request.sources, vec!["rsync://example.org/debian/./pool"]);
    }

    #[test]
    fn test_records_only_unindexed_existing_paths() {
        let (mirror, _staging, mut config) = setup();
        config.package_ttl = 3600;
        let client = DiffClient::new(
            vec![
                "receiving file list ... done",
                "deleting pool/c.deb",
                "deleting pool/b.deb",
                "deleting pool/ghost.deb",
                "deleting ../etc/passwd",
            ],
            0,
        );
        let indexed: IndexedSet = ["pool/a.deb", "pool/b.deb"].into_iter().collect();

        let report = collect_garbage(&client, &config, &indexed, 1000).unwrap();
        assert_eq!(report.recorded, 1);
        assert_eq!(report.pending, 1);
        assert!(mirror.path().join("pool/c.deb").exists());

        let ledger = DeletionLedger::load(&config.ledger_path());
        assert_eq!(ledger.since("pool/c.deb"), Some(1000));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_zero_ttl_removes_in_same_run() {
        let (mirror, _staging, mut config) = setup();
        config.package_ttl = 0;
        let client = DiffClient::new(vec!["deleting pool/c.deb"], 0);
        let indexed: IndexedSet = ["pool/a.deb", "pool/b.deb"].into_iter().collect();

        let report = collect_garbage(&client, &config, &indexed, 1000).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(!mirror.path().join("pool/c.deb").exists());
        assert!(mirror.path().join("pool/a.deb").exists());
        assert!(mirror.path().join("pool/b.deb").exists());
        assert!(DeletionLedger::load(&config.ledger_path()).is_empty());
    }

    #[test]
    fn test_failed_diff_still_ages_existing_entries() {
        let (mirror, _staging, mut config) = setup();
        config.package_ttl = 100;

        let mut ledger = DeletionLedger::new();
        ledger.record(1000, "pool/c.deb");
        ledger.save(&config.ledger_path()).unwrap();

        let client = DiffClient::new(vec!["deleting pool/b.deb"], 12);
        let report = collect_garbage(&client, &config, &IndexedSet::default(), 1100).unwrap();

        assert_eq!(report.recorded, 0);
        assert_eq!(report.deleted, 1);
        assert!(!mirror.path().join("pool/c.deb").exists());
        assert!(mirror.path().join("pool/b.deb").exists());
    }

    #[test]
    fn test_ledger_persisted_even_when_unchanged() {
        let (_mirror, _staging, config) = setup();
        let client = DiffClient::new(vec![], 0);

        collect_garbage(&client, &config, &IndexedSet::default(), 1000).unwrap();
        assert!(config.ledger_path().exists());
    }
}

// src/sync/mod.rs

//! Sync Orchestrator
//!
//! One run walks a fixed sequence of stages:
//!
//! 1. take the [`RunLock`]
//! 2. fetch new pool content
//! 3. stage `dists`/`zzz-dists` metadata in `temp_indices`
//! 4. verify every staged Release file
//! 5. walk every staged index, fetching missing files (builds the IndexedSet)
//! 6. promote: refresh top-level files, write the trace file, move staged
//!    metadata into the live tree
//! 7. garbage-collect unindexed pool files
//! 8. regenerate `ls-lR.gz`
//!
//! Any fatal error unwinds through [`MirrorSync::run`]; the lock guard is
//! dropped on the way out, so the marker never outlives the run. Transfer
//! failures on bulk stages are only logged, since the verification stages
//! that follow catch whatever they left inconsistent.

mod context;
mod lock;

pub use context::RunContext;
pub use lock::RunLock;

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::gc::{GcReport, collect_garbage};
use crate::listing::write_listing;
use crate::repository::{self, DownloadQueue, IndexSummary, VerifySummary};
use crate::transfer::{TransferClient, TransferRequest, local_source, remote_source};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, info_span, warn};

/// Top-level upstream entries never touched by the top-level refresh
const TOP_LEVEL_EXCLUDES: [&str; 4] = ["dists", "zzz-dists", "pool", "ls-lR.gz"];

/// Per-distribution metadata
const DIST_FILES: [&str; 3] = ["Release*", "InRelease", "Changelog*"];

/// Per-repository metadata
const REPO_FILES: [&str; 8] = [
    "by-hash",
    "binary-all",
    "*source*",
    "i18n",
    "Release*",
    "InRelease",
    "dep11/by-hash",
    "dep11/icons*",
];

/// What a completed run did
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub verified: VerifySummary,
    pub indices: IndexSummary,
    pub gc: GcReport,
    /// Listing written this run, `None` if generation failed
    pub listing: Option<PathBuf>,
}

/// Drives a mirror run against one configuration
pub struct MirrorSync<'a> {
    config: &'a MirrorConfig,
    transfer: &'a dyn TransferClient,
    clock: Option<DateTime<Utc>>,
}

impl<'a> MirrorSync<'a> {
    pub fn new(config: &'a MirrorConfig, transfer: &'a dyn TransferClient) -> Self {
        Self {
            config,
            transfer,
            clock: None,
        }
    }

    /// Pin the run start time instead of reading the clock
    pub fn at(mut self, started: DateTime<Utc>) -> Self {
        self.clock = Some(started);
        self
    }

    fn context(&self) -> Result<RunContext<'a>> {
        RunContext::new(
            self.config,
            self.transfer,
            self.clock.unwrap_or_else(Utc::now),
        )
    }

    /// Full sync
    pub fn run(&self) -> Result<SyncReport> {
        let mut ctx = self.context()?;
        let _lock = RunLock::acquire(self.config.lock_path())?;

        info!("Starting sync of {}", self.config.mirror_url);
        let result = run_stages(&mut ctx);
        match &result {
            Ok(_) => info!("Sync complete"),
            Err(e) => error!("Sync aborted: {}", e),
        }
        result
    }

    /// Fetch new pool content only, under the lock
    pub fn run_pool_only(&self) -> Result<()> {
        let ctx = self.context()?;
        let _lock = RunLock::acquire(self.config.lock_path())?;

        info!("Updating packages only from {}", self.config.mirror_url);
        stage("update_pool", || update_pool(&ctx))
    }
}

/// Run `f` inside a span naming the stage
fn stage<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    let span = info_span!("stage", stage = name);
    let _entered = span.enter();
    f()
}

fn run_stages(ctx: &mut RunContext<'_>) -> Result<SyncReport> {
    stage("update_pool", || update_pool(ctx))?;
    stage("update_dists", || update_dists(ctx))?;
    let verified = stage("check_release_files", || {
        repository::check_release_files(ctx.staging_path(), ctx.algorithm)
    })?;
    let indices = stage("check_indices", || check_indices(ctx))?;
    stage("promote", || promote(ctx))?;
    let gc = stage("gc", || {
        collect_garbage(ctx.transfer, ctx.config, &ctx.indexed, ctx.now())
    })?;
    let listing = stage("listing", || match write_listing(ctx.mirror_path()) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Failed to generate listing: {}", e);
            None
        }
    });

    Ok(SyncReport {
        verified,
        indices,
        gc,
        listing,
    })
}

/// Pull new and changed pool files; nothing is deleted here
pub fn update_pool(ctx: &RunContext<'_>) -> Result<()> {
    info!("Updating 'pool' directory");
    let request = TransferRequest::new(ctx.mirror_path())
        .source(remote_source(&ctx.config.mirror_url, "pool"))
        .recursive()
        .relative();
    ctx.run_bulk("pool", &request)?;
    Ok(())
}

/// Stage metadata for every configured distribution, repo and architecture
pub fn update_dists(ctx: &RunContext<'_>) -> Result<()> {
    info!("Fetching 'dists' metadata into {}", ctx.staging_path().display());
    fs::create_dir_all(ctx.staging_path())?;

    let config = ctx.config;
    let url = config.mirror_url.as_str();
    let staged = |sources: Vec<String>| {
        TransferRequest::new(ctx.staging_path())
            .sources(sources)
            .recursive()
            .relative()
    };

    for dist in &config.distributions {
        let sources = DIST_FILES
            .iter()
            .map(|f| remote_source(url, &format!("dists/{dist}/{f}")))
            .collect();
        ctx.run_bulk(&format!("dists/{dist}"), &staged(sources))?;

        let zzz = vec![remote_source(url, &format!("zzz-dists/{dist}"))];
        ctx.run_bulk(&format!("zzz-dists/{dist}"), &staged(zzz))?;

        for repo in &config.repos {
            let sources = REPO_FILES
                .iter()
                .map(|f| remote_source(url, &format!("dists/{dist}/{repo}/{f}")))
                .collect();
            ctx.run_bulk(&format!("dists/{dist}/{repo}"), &staged(sources))?;

            for arch in &config.architectures {
                let sources = [
                    format!("debian-installer/*{arch}*"),
                    format!("dep11/*{arch}*"),
                    format!("*{arch}*"),
                ]
                .iter()
                .map(|f| remote_source(url, &format!("dists/{dist}/{repo}/{f}")))
                .collect();
                ctx.run_bulk(&format!("dists/{dist}/{repo} ({arch})"), &staged(sources))?;
            }
        }
    }
    Ok(())
}

/// Walk every staged index, populating the run's IndexedSet
fn check_indices(ctx: &mut RunContext<'_>) -> Result<IndexSummary> {
    let config = ctx.config;
    let mut queue = DownloadQueue::new(
        ctx.transfer,
        &config.mirror_url,
        &config.mirror_path,
        config.parallel_downloads,
    );
    repository::check_indices(&config.temp_indices, &mut queue, &mut ctx.indexed)
}

/// Move verified state into the live tree
fn promote(ctx: &RunContext<'_>) -> Result<()> {
    update_top_level(ctx)?;
    write_trace(ctx);
    update_indices(ctx)
}

/// Mirror everything at the upstream root except the big trees
fn update_top_level(ctx: &RunContext<'_>) -> Result<()> {
    info!("Updating top-level directories");
    let request = TOP_LEVEL_EXCLUDES.iter().fold(
        TransferRequest::new(ctx.mirror_path())
            .source(remote_source(&ctx.config.mirror_url, "*"))
            .recursive()
            .delete(),
        |request, pattern| request.exclude(*pattern),
    );
    ctx.run_bulk("top-level directories", &request)?;
    Ok(())
}

/// Record this host's sync time in `project/trace/<hostname>`
fn write_trace(ctx: &RunContext<'_>) {
    let host = nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    let trace_dir = ctx.mirror_path().join("project").join("trace");
    let trace_path = trace_dir.join(&host);
    let stamp = format!("{}\n", Utc::now().format("%a %b %e %H:%M:%S UTC %Y"));

    if let Err(e) = fs::create_dir_all(&trace_dir).and_then(|()| fs::write(&trace_path, stamp)) {
        warn!("Failed to write trace file {}: {}", trace_path.display(), e);
    }
}

/// Switch the live `dists` and `zzz-dists` over to the staged copies
fn update_indices(ctx: &RunContext<'_>) -> Result<()> {
    for tree in ["dists", "zzz-dists"] {
        let staged = ctx.staging_path().join(tree);
        if !staged.is_dir() {
            info!("No staged '{}', skipping", tree);
            continue;
        }

        info!("Updating '{}' directory", tree);
        let request = TransferRequest::new(ctx.mirror_path())
            .source(local_source(&staged))
            .recursive()
            .delay_updates();
        ctx.run_bulk(tree, &request)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transfer::{PendingTransfer, TransferStatus};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records requests and fails every one of them
    #[derive(Default)]
    struct RecordingClient {
        requests: RefCell<Vec<TransferRequest>>,
    }

    impl TransferClient for RecordingClient {
        fn run(
            &self,
            request: &TransferRequest,
            _: &mut dyn FnMut(&str),
        ) -> Result<TransferStatus> {
            self.requests.borrow_mut().push(request.clone());
            Ok(TransferStatus::from_code(Some(23)))
        }

        fn start(&self, _: &TransferRequest) -> Result<Box<dyn PendingTransfer>> {
            Err(Error::Transfer("not expected".to_string()))
        }
    }

    fn config(mirror: &TempDir, staging: &TempDir) -> MirrorConfig {
        let mut config = MirrorConfig::new(mirror.path(), "example.org/debian");
        config.temp_indices = staging.path().to_path_buf();
        config.distributions = vec!["noble".to_string()];
        config.repos = vec!["main".to_string(), "universe".to_string()];
        config.architectures = vec!["amd64".to_string()];
        config
    }

    #[test]
    fn test_update_dists_request_layout() {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let config = config(&mirror, &staging);
        let client = RecordingClient::default();
        let ctx = RunContext::new(&config, &client, Utc::now()).unwrap();

        update_dists(&ctx).unwrap();

        let requests = client.requests.borrow();
        // dist + zzz-dists, then per repo: repo + one arch
        assert_eq!(requests.len(), 2 + 2 * 2);
        assert!(requests.iter().all(|r| r.relative && r.recursive && !r.delete));
        assert!(requests.iter().all(|r| r.destination == staging.path()));
        assert_eq!(
            requests[0].sources[0],
            "rsync://example.org/debian/./dists/noble/Release*"
        );
        assert_eq!(
            requests[1].sources,
            vec!["rsync://example.org/debian/./zzz-dists/noble"]
        );
        assert!(
            requests[3]
                .sources
                .contains(&"rsync://example.org/debian/./dists/noble/main/*amd64*".to_string())
        );
    }

    #[test]
    fn test_top_level_refresh_excludes_trees() {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let config = config(&mirror, &staging);
        let client = RecordingClient::default();
        let ctx = RunContext::new(&config, &client, Utc::now()).unwrap();

        update_top_level(&ctx).unwrap();

        let requests = client.requests.borrow();
        assert_eq!(requests[0].excludes, TOP_LEVEL_EXCLUDES);
        assert!(requests[0].delete);
        assert!(!requests[0].dry_run);
    }

    #[test]
    fn test_unstaged_zzz_dists_skipped() {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        fs::create_dir_all(staging.path().join("dists/noble")).unwrap();
        let config = config(&mirror, &staging);
        let client = RecordingClient::default();
        let ctx = RunContext::new(&config, &client, Utc::now()).unwrap();

        update_indices(&ctx).unwrap();

        let requests = client.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].delay_updates);
        assert!(requests[0].sources[0].ends_with("dists"));
    }

    #[test]
    fn test_trace_file_written() {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let config = config(&mirror, &staging);
        let client = RecordingClient::default();
        let ctx = RunContext::new(&config, &client, Utc::now()).unwrap();

        write_trace(&ctx);

        let traces: Vec<_> = fs::read_dir(mirror.path().join("project/trace"))
            .unwrap()
            .collect();
        assert_eq!(traces.len(), 1);
    }

    #[test]
    fn test_bad_hash_function_fails_before_lock() {
        let mirror = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let mut config = config(&mirror, &staging);
        config.hash_function = "CRC32".to_string();
        let client = RecordingClient::default();

        let err = MirrorSync::new(&config, &client).run().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!config.lock_path().exists());
        assert!(client.requests.borrow().is_empty());
    }
}

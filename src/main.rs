// src/main.rs

use anyhow::{Context, Result};
use apt_mirror::cli::Cli;
use apt_mirror::{MirrorConfig, MirrorSync, RsyncClient};
use clap::Parser;
use nix::sys::stat::{Mode, umask};
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Set up stderr logging, plus the configured log file if any
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: Option<&MirrorConfig>) -> Result<()> {
    let level = config.and_then(MirrorConfig::tracing_level);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.unwrap_or(Level::INFO)).into())
        .from_env_lossy();

    let file_layer = match config.and_then(|c| c.log_file.as_ref()) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("failed to initialise logging")?;

    if let Some(config) = config
        && level.is_none()
    {
        warn!("Unknown log level {:?}, using INFO", config.log_level);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // mirrored files must be world-readable
    umask(Mode::from_bits_truncate(0o022));

    let config = match MirrorConfig::load(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            if init_logging(None).is_ok() {
                error!("{}", e);
            } else {
                eprintln!("Error: {}", e);
            }
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = init_logging(Some(&config)) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let transfer = RsyncClient::default();
    let sync = MirrorSync::new(&config, &transfer);

    let result = if cli.update_packages_only {
        sync.run_pool_only()
    } else {
        sync.run().map(|report| {
            info!(
                "Verified {} files, checked {} index references ({} fetched), deleted {} files ({} pending)",
                report.verified.verified,
                report.indices.references,
                report.indices.fetched,
                report.gc.deleted,
                report.gc.pending
            );
        })
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

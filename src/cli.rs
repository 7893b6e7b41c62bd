// src/cli.rs
//! CLI definitions for apt-mirror

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "apt-mirror")]
#[command(version)]
#[command(about = "Keep a local apt repository mirror in sync with upstream", long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(default_value = "config.yaml")]
    pub config_file: PathBuf,

    /// Only fetch new packages into 'pool' (no verification, no cleanup)
    #[arg(short = 'U', long)]
    pub update_packages_only: bool,
}

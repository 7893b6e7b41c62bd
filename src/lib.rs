// src/lib.rs

//! apt mirror synchronisation and integrity engine
//!
//! Keeps a local Debian/Ubuntu archive mirror consistent with upstream
//! metadata and reclaims space held by packages upstream stopped carrying.
//!
//! # Architecture
//!
//! - Metadata is staged first and only promoted once every Release hash and
//!   every index reference checks out
//! - All network movement goes through a [`transfer::TransferClient`]
//!   (rsync in production, a fake in tests)
//! - Per-file fetches run in a bounded FIFO window
//! - Pool files upstream dropped are deleted only after a grace period,
//!   tracked in a ledger that survives restarts

pub mod cli;
pub mod compression;
pub mod config;
mod error;
pub mod gc;
pub mod hash;
pub mod listing;
pub mod repository;
pub mod sync;
pub mod transfer;

pub use config::MirrorConfig;
pub use error::{Error, Result};
pub use gc::{DeletionLedger, GcReport};
pub use hash::{HashAlgorithm, Hasher};
pub use repository::IndexedSet;
pub use sync::{MirrorSync, RunLock, SyncReport};
pub use transfer::{RsyncClient, TransferClient, TransferRequest, TransferStatus};

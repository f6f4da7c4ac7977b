// src/lib.rs

//! Quarry Package Index
//!
//! In-memory package repository index and query engine with a
//! concurrent download orchestrator.
//!
//! # Architecture
//!
//! - Sack: append-mostly in-memory index keyed by stable package ids
//! - Repos: cached metadata loading with mirror fallback and OpenPGP
//!   verification, New → Loading → {Loaded, Failed} lifecycle
//! - Queries: builder-style narrowing with glob and version-aware
//!   comparators, plus set algebra between result sets
//! - Downloads: rayon-backed batch transfers with per-item callbacks,
//!   mirror fallback, and checksum verification

pub mod base;
pub mod download;
mod error;
pub mod hash;
pub mod logger;
pub mod query;
pub mod repo;
pub mod sack;
pub mod version;

pub use base::{Base, BaseHandle};
pub use download::{
    DownloadCallbacks, DownloadSpec, Downloader, NullCallbacks, ProgressBarCallbacks,
    TaskHandle, TaskOutcome, TransferStatus,
};
pub use error::{Error, Result};
pub use hash::{Checksum, ChecksumKind};
pub use logger::{LogLevel, LogRecord, LogRouter, LogSink, StreamSink, TracingSink};
pub use query::{Cmp, Query};
pub use repo::{
    LoadResult, NullRepoCallbacks, Repo, RepoCallbacks, RepoConfig, RepoState, SystemRepo,
};
pub use sack::{CollisionPreference, DuplicatePolicy, Package, PackageId, Sack, SackConfig};
pub use version::{Evr, Nevra};

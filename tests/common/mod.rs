// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use quarry::repo::{PackageEntry, RepoMetadata};
use quarry::{Checksum, ChecksumKind, DownloadCallbacks, Package, Sack, TransferStatus};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Initialize tracing once per test binary; `RUST_LOG` controls output.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a package record from a full NEVRA string.
pub fn test_package(nevra: &str) -> Package {
    let n = quarry::Nevra::parse(nevra).unwrap();
    Package {
        name: n.name.clone(),
        epoch: n.epoch,
        version: n.version.clone(),
        release: n.release.clone(),
        arch: n.arch.clone(),
        checksum: Checksum::of_bytes(ChecksumKind::Sha256, nevra.as_bytes()),
        repo_id: "main".to_string(),
        provides: vec![n.name.clone()],
        requires: vec![],
        size: 100,
        location: format!("packages/{nevra}.rpm"),
    }
}

/// Sack preloaded with nginx, nginx-core and redis.
pub fn fixture_sack() -> Sack {
    let sack = Sack::new();
    sack.insert_all(vec![
        test_package("nginx-1.24.0-1.x86_64"),
        test_package("nginx-core-1:1.24.0-1.x86_64"),
        test_package("redis-6.2.0-3.x86_64"),
    ])
    .unwrap();
    sack
}

/// Write a loadable repository source directory with a primary index.
pub fn write_repo_source(dir: &Path, packages: &[(&str, &str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    let entries: Vec<PackageEntry> = packages
        .iter()
        .map(|(name, version, release)| PackageEntry {
            name: name.to_string(),
            epoch: 0,
            version: version.to_string(),
            release: release.to_string(),
            arch: "x86_64".to_string(),
            checksum: Checksum::of_bytes(ChecksumKind::Sha256, name.as_bytes()).to_string(),
            provides: vec![],
            requires: vec![],
            size: 100,
            location: format!("packages/{name}-{version}-{release}.x86_64.rpm"),
        })
        .collect();
    let meta = RepoMetadata {
        revision: "1".to_string(),
        packages: entries,
    };
    fs::write(dir.join("primary.json"), meta.to_json().unwrap()).unwrap();
}

/// Download callbacks that count lifecycle events and record contexts.
#[derive(Default)]
pub struct CountingCallbacks {
    pub started: AtomicUsize,
    pub ended: AtomicUsize,
    pub mirror_failures: AtomicUsize,
    pub progress_calls: AtomicUsize,
    /// Contexts seen by `end`; exposed to assert per-task stability
    pub contexts: Mutex<Vec<u64>>,
}

impl CountingCallbacks {
    pub fn distinct_contexts(&self) -> usize {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .copied()
            .collect::<HashSet<u64>>()
            .len()
    }
}

/// Forwarder so a test can hand the orchestrator its callbacks while
/// keeping a handle to inspect the counters afterwards.
pub struct SharedCallbacks(pub std::sync::Arc<CountingCallbacks>);

impl DownloadCallbacks for SharedCallbacks {
    fn add_new_download(&self, user_data: u64, description: &str, total_size: u64) -> u64 {
        self.0.add_new_download(user_data, description, total_size)
    }

    fn progress(&self, context: u64, total: u64, downloaded: u64) {
        self.0.progress(context, total, downloaded);
    }

    fn mirror_failure(&self, context: u64, message: &str, url: &str) {
        self.0.mirror_failure(context, message, url);
    }

    fn end(&self, context: u64, status: TransferStatus, message: Option<&str>) {
        self.0.end(context, status, message);
    }
}

impl DownloadCallbacks for CountingCallbacks {
    fn add_new_download(&self, user_data: u64, _description: &str, _total_size: u64) -> u64 {
        // Distinct contexts per task, independent of user_data
        let started = self.started.fetch_add(1, Ordering::SeqCst);
        user_data + started as u64 * 1000
    }

    fn progress(&self, _context: u64, _total: u64, _downloaded: u64) {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn mirror_failure(&self, _context: u64, _message: &str, _url: &str) {
        self.mirror_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self, context: u64, _status: TransferStatus, _message: Option<&str>) {
        self.ended.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context);
    }
}

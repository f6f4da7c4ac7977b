// src/repo/mod.rs

//! Repository management and metadata loading
//!
//! A `Repo` walks the lifecycle New → Loading → {Loaded, Failed}. A
//! load first consults the on-disk cache; fresh metadata is parsed
//! straight from disk. Stale or absent metadata is fetched through the
//! download orchestrator with fallback across the configured base urls,
//! verified (checksum always, OpenPGP signature when enabled), parsed,
//! and bulk-inserted into the sack. A load that fails across every
//! mirror leaves the sack untouched; re-loading a repository replaces
//! its records instead of duplicating them.
//!
//! Missing *optional* metadata (updateinfo) degrades the load instead
//! of failing it; the `LoadResult` records this.

mod cache;
mod callbacks;
mod keys;
mod metadata;
mod system;

pub use cache::{CacheManifest, RepoCache};
pub use callbacks::{NullRepoCallbacks, RepoCallbacks};
pub use keys::KeyRing;
pub use metadata::{Advisory, PackageEntry, RepoMetadata, UpdateInfo};
pub use system::SystemRepo;

use crate::download::{
    DownloadCallbacks, DownloadSpec, Downloader, TransferStatus,
};
use crate::error::{Error, Result};
use crate::hash::{Checksum, ChecksumKind};
use crate::sack::Sack;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Default metadata expiry: 48 hours
pub const DEFAULT_METADATA_EXPIRE: u64 = 48 * 3600;

/// Configuration for one repository, consumed at load time
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Unique repository id
    pub id: String,
    /// Base urls (remote) or base directories (local), tried in order
    pub baseurls: Vec<String>,
    /// Root of the metadata cache; this repo caches under
    /// `<cache_dir>/<id>/`
    pub cache_dir: PathBuf,
    /// Lower value wins NEVRA collisions across repositories
    pub priority: i32,
    pub enabled: bool,
    /// Seconds before cached metadata is considered stale
    pub metadata_expire: u64,
    /// Verify a detached OpenPGP signature over the primary index
    pub pgp_check: bool,
    /// Keyring location; defaults to `<cache_dir>/keys`
    pub keyring_dir: Option<PathBuf>,
}

impl RepoConfig {
    pub fn new(id: impl Into<String>, baseurl: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            baseurls: vec![baseurl.into()],
            cache_dir: cache_dir.into(),
            priority: 99,
            enabled: true,
            metadata_expire: DEFAULT_METADATA_EXPIRE,
            pgp_check: false,
            keyring_dir: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Config("repository id must not be empty".to_string()));
        }
        if self.baseurls.is_empty() {
            return Err(Error::Config(format!(
                "repository '{}' has no base urls",
                self.id
            )));
        }
        Ok(())
    }

    fn keyring_dir(&self) -> PathBuf {
        self.keyring_dir
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("keys"))
    }
}

/// Repository lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    New,
    Loading,
    /// Loaded; `degraded` when optional metadata was missing
    Loaded { degraded: bool },
    Failed,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Copy)]
pub struct LoadResult {
    /// No network fetch was needed
    pub from_cache: bool,
    /// Optional metadata (updateinfo) was unavailable
    pub degraded: bool,
    /// Number of package records inserted into the sack
    pub packages_added: usize,
}

/// One configured repository
pub struct Repo {
    config: RepoConfig,
    state: Mutex<RepoState>,
    /// Serializes loads: only one Loading per repository id
    load_lock: Mutex<()>,
}

impl Repo {
    pub fn new(config: RepoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(RepoState::New),
            load_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn state(&self) -> RepoState {
        *self.state.lock().expect("repo state lock poisoned")
    }

    fn set_state(&self, state: RepoState) {
        *self.state.lock().expect("repo state lock poisoned") = state;
    }

    /// The cache paths this repository uses
    pub fn cache(&self) -> RepoCache {
        RepoCache::new(&self.config.cache_dir, &self.config.id)
    }

    /// Import a signing key for this repository, consulting
    /// `repokey_import` before accepting it
    pub fn import_key(&self, key_data: &[u8], callbacks: &dyn RepoCallbacks) -> Result<String> {
        let ring = KeyRing::new(self.config.keyring_dir())?;
        let fingerprint = KeyRing::fingerprint_of(key_data)?;
        if !callbacks.repokey_import(&self.config.id, &fingerprint) {
            return Err(Error::RepoPgp {
                repo_id: self.config.id.clone(),
                message: format!("key {} rejected by callback", fingerprint),
                source: None,
            });
        }
        ring.import_key(key_data, &self.config.id)
    }

    /// Load this repository's metadata into the sack
    ///
    /// Concurrent calls for the same repository serialize on an
    /// internal lock; the second caller typically hits the cache the
    /// first one just wrote. `force` bypasses the freshness check.
    pub fn load(
        &self,
        sack: &Sack,
        callbacks: Arc<dyn RepoCallbacks>,
        force: bool,
    ) -> Result<LoadResult> {
        let _guard = self.load_lock.lock().expect("repo load lock poisoned");

        if !self.config.enabled {
            return Err(Error::Config(format!(
                "repository '{}' is disabled",
                self.config.id
            )));
        }

        callbacks.start(&self.config.id);
        self.set_state(RepoState::Loading);

        let result = self.load_inner(sack, &callbacks, force);
        match &result {
            Ok(load) => {
                self.set_state(RepoState::Loaded {
                    degraded: load.degraded,
                });
                sack.set_repo_priority(&self.config.id, self.config.priority);
                callbacks.end(&self.config.id, load.degraded);
                info!(
                    "Repository '{}' loaded: {} packages ({})",
                    self.config.id,
                    load.packages_added,
                    if load.from_cache { "cache" } else { "fetched" }
                );
            }
            Err(e) => {
                self.set_state(RepoState::Failed);
                callbacks.end(&self.config.id, false);
                warn!("Repository '{}' failed to load: {}", self.config.id, e);
            }
        }
        result
    }

    fn load_inner(
        &self,
        sack: &Sack,
        callbacks: &Arc<dyn RepoCallbacks>,
        force: bool,
    ) -> Result<LoadResult> {
        let cache = self.cache();

        if !force && cache.is_fresh(self.config.metadata_expire) {
            debug!("Repository '{}' cache is fresh, skipping fetch", self.config.id);
            return self.load_from_cache(sack, &cache);
        }

        let mut last_error: Option<Error> = None;
        for baseurl in &self.config.baseurls {
            match self.fetch_mirror(baseurl, &cache, callbacks) {
                Ok(degraded) => {
                    let result = self.load_from_cache(sack, &cache)?;
                    return Ok(LoadResult {
                        from_cache: false,
                        degraded,
                        packages_added: result.packages_added,
                    });
                }
                Err(e) => {
                    callbacks.handle_mirror_failure(&self.config.id, &e.to_string(), baseurl);
                    last_error = Some(e);
                }
            }
        }

        Err(Error::RepoDownload {
            repo_id: self.config.id.clone(),
            message: format!("all {} mirrors failed", self.config.baseurls.len()),
            source: last_error.map(Box::new),
        })
    }

    /// Fetch metadata from one mirror into the cache directory
    ///
    /// Returns the degraded flag. Everything mandatory must succeed;
    /// optional updateinfo failing only degrades the result.
    fn fetch_mirror(
        &self,
        baseurl: &str,
        cache: &RepoCache,
        callbacks: &Arc<dyn RepoCallbacks>,
    ) -> Result<bool> {
        cache.ensure_dir()?;
        let adapter: Box<dyn DownloadCallbacks> = Box::new(LoadProgressAdapter {
            repo_id: self.config.id.clone(),
            callbacks: Arc::clone(callbacks),
        });

        // Primary index is mandatory
        let mut dl = Downloader::new(adapter)?;
        dl.add(DownloadSpec::new(
            join_url(baseurl, "primary.json"),
            cache.primary_path(),
        ));
        let outcomes = dl.download(false, false)?;
        if outcomes[0].status == TransferStatus::Error {
            return Err(Error::Download(
                outcomes[0]
                    .message
                    .clone()
                    .unwrap_or_else(|| "primary index fetch failed".to_string()),
            ));
        }

        // Parse up front so a mirror serving garbage falls back like an
        // unreachable one
        let data = fs::read(cache.primary_path())
            .map_err(|e| Error::io("reading fetched primary index".to_string(), e))?;
        RepoMetadata::from_json(&data)?;

        if self.config.pgp_check {
            self.verify_signature(baseurl, cache, callbacks)?;
        }

        // Optional updateinfo: failure degrades, never fails
        let degraded = !self.fetch_optional(baseurl, "updateinfo.json", cache.updateinfo_path());

        let primary_checksum = Checksum::of_file(ChecksumKind::Sha256, &cache.primary_path())?;
        let mut manifest = CacheManifest::new(baseurl, primary_checksum);
        if !degraded {
            manifest.updateinfo_checksum =
                Checksum::of_file(ChecksumKind::Sha256, &cache.updateinfo_path()).ok();
        }
        cache.store_manifest(&manifest)?;

        callbacks.fastest_mirror(&self.config.id, baseurl);
        Ok(degraded)
    }

    /// Fetch the detached signature and verify it, importing an
    /// offered signing key if the callback accepts it
    fn verify_signature(
        &self,
        baseurl: &str,
        cache: &RepoCache,
        callbacks: &Arc<dyn RepoCallbacks>,
    ) -> Result<()> {
        let repo_id = &self.config.id;

        let mut dl = Downloader::new(Box::new(crate::download::NullCallbacks))?;
        dl.add(DownloadSpec::new(
            join_url(baseurl, "primary.json.asc"),
            cache.signature_path(),
        ));
        dl.download(false, false).map_err(|e| Error::RepoPgp {
            repo_id: repo_id.clone(),
            message: "signature required but not available".to_string(),
            source: Some(Box::new(e)),
        })?;

        let ring = KeyRing::new(self.config.keyring_dir())?;
        if !ring.has_key(repo_id) {
            // The mirror may publish its signing key alongside the
            // metadata; offer it to the callback
            let key_path = cache.dir().join("repo.key");
            if self.fetch_optional(baseurl, "repo.key", key_path.clone()) {
                let key_data = fs::read(&key_path)
                    .map_err(|e| Error::io("reading published repo key".to_string(), e))?;
                self.import_key(&key_data, callbacks.as_ref())?;
            } else {
                return Err(Error::RepoPgp {
                    repo_id: repo_id.clone(),
                    message: "no signing key imported and none published".to_string(),
                    source: None,
                });
            }
        }

        ring.verify_detached(&cache.primary_path(), &cache.signature_path(), repo_id)
            .map_err(|e| match e {
                already @ Error::RepoPgp { .. } => already,
                other => Error::RepoPgp {
                    repo_id: repo_id.clone(),
                    message: "signature verification failed".to_string(),
                    source: Some(Box::new(other)),
                },
            })
    }

    /// Fetch an optional file; returns whether it is now in place
    fn fetch_optional(&self, baseurl: &str, name: &str, dest: PathBuf) -> bool {
        let Ok(mut dl) = Downloader::new(Box::new(crate::download::NullCallbacks)) else {
            return false;
        };
        dl.add(DownloadSpec::new(join_url(baseurl, name), dest));
        match dl.download(false, false) {
            Ok(outcomes) => outcomes[0].status != TransferStatus::Error,
            Err(_) => {
                debug!("Optional file {} not available from {}", name, baseurl);
                false
            }
        }
    }

    /// Parse the cached primary index and insert its packages
    fn load_from_cache(&self, sack: &Sack, cache: &RepoCache) -> Result<LoadResult> {
        let data = fs::read(cache.primary_path()).map_err(|e| Error::Cache {
            path: cache.primary_path(),
            message: format!("missing cached primary index: {e}"),
        })?;
        let metadata = RepoMetadata::from_json(&data)?;

        let packages = metadata
            .packages
            .into_iter()
            .map(|entry| entry.into_package(&self.config.id))
            .collect::<Result<Vec<_>>>()?;

        let count = packages.len();
        // Replacing makes re-loads idempotent: a second load of the
        // same repository swaps its records instead of colliding
        sack.replace_repo(&self.config.id, packages)?;

        Ok(LoadResult {
            from_cache: true,
            degraded: !cache.updateinfo_path().exists(),
            packages_added: count,
        })
    }

    /// Parse cached advisories, when the repository carries them
    pub fn updateinfo(&self) -> Result<Option<UpdateInfo>> {
        let path = self.cache().updateinfo_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Ok(Some(UpdateInfo::from_json(&data)?))
    }
}

/// Forwards orchestrator events to the repository callbacks
struct LoadProgressAdapter {
    repo_id: String,
    callbacks: Arc<dyn RepoCallbacks>,
}

impl DownloadCallbacks for LoadProgressAdapter {
    fn progress(&self, _context: u64, total: u64, downloaded: u64) {
        self.callbacks.progress(&self.repo_id, total, downloaded);
    }

    fn mirror_failure(&self, _context: u64, message: &str, url: &str) {
        self.callbacks
            .handle_mirror_failure(&self.repo_id, message, url);
    }
}

/// Join a base url or directory with a file name
fn join_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

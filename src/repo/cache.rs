// src/repo/cache.rs

//! On-disk metadata cache
//!
//! Layout, per repository: `<cache_root>/<repo_id>/` containing
//! `primary.json`, optional `updateinfo.json`, optional
//! `primary.json.asc`, and `manifest.json`. The manifest records when
//! metadata was fetched, from where, and with which checksums. A load
//! first consults it: fresh and matching metadata is parsed straight
//! from disk with no network fetch.
//!
//! The cache directory is assumed to be owned by a single process.

use crate::error::{Error, Result};
use crate::hash::Checksum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths for one repository's cache directory
#[derive(Debug, Clone)]
pub struct RepoCache {
    dir: PathBuf,
}

impl RepoCache {
    pub fn new(cache_root: &Path, repo_id: &str) -> Self {
        Self {
            dir: cache_root.join(repo_id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join("primary.json")
    }

    pub fn signature_path(&self) -> PathBuf {
        self.dir.join("primary.json.asc")
    }

    pub fn updateinfo_path(&self) -> PathBuf {
        self.dir.join("updateinfo.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Ensure the cache directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::io(format!("creating cache directory {}", self.dir.display()), e))
    }

    /// Load the freshness manifest, if one exists
    pub fn load_manifest(&self) -> Result<Option<CacheManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        let manifest = serde_json::from_slice(&data).map_err(|e| Error::Cache {
            path: path.clone(),
            message: format!("corrupt manifest: {e}"),
        })?;
        Ok(Some(manifest))
    }

    /// Write the freshness manifest
    pub fn store_manifest(&self, manifest: &CacheManifest) -> Result<()> {
        self.ensure_dir()?;
        let path = self.manifest_path();
        let data = serde_json::to_vec_pretty(manifest).map_err(|e| Error::Cache {
            path: path.clone(),
            message: format!("failed to serialize manifest: {e}"),
        })?;
        fs::write(&path, data)
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))
    }

    /// Whether cached metadata can satisfy a load without a fetch
    ///
    /// The cache is usable when the manifest exists, is younger than
    /// `expire_secs`, and the primary file still matches its recorded
    /// checksum.
    pub fn is_fresh(&self, expire_secs: u64) -> bool {
        let Ok(Some(manifest)) = self.load_manifest() else {
            return false;
        };
        if !manifest.is_within_expiry(expire_secs) {
            debug!("Cache at {} expired", self.dir.display());
            return false;
        }
        let primary = self.primary_path();
        if !primary.exists() {
            return false;
        }
        manifest.primary_checksum.verify_file(&primary).is_ok()
    }

    /// Remove everything cached for this repository
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .map_err(|e| Error::io(format!("clearing cache {}", self.dir.display()), e))?;
        }
        Ok(())
    }
}

/// Freshness manifest for one repository's cached metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// RFC 3339 timestamp of the last successful fetch
    pub fetched_at: String,
    /// Base url the metadata was fetched from
    pub source_url: String,
    /// Checksum of the cached primary index
    pub primary_checksum: Checksum,
    /// Checksum of cached updateinfo, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updateinfo_checksum: Option<Checksum>,
}

impl CacheManifest {
    pub fn new(source_url: &str, primary_checksum: Checksum) -> Self {
        Self {
            fetched_at: Utc::now().to_rfc3339(),
            source_url: source_url.to_string(),
            primary_checksum,
            updateinfo_checksum: None,
        }
    }

    /// Seconds since the recorded fetch; `None` for unparseable stamps
    pub fn age_secs(&self) -> Option<u64> {
        let fetched = DateTime::parse_from_rfc3339(&self.fetched_at).ok()?;
        let age = Utc::now().signed_duration_since(fetched);
        u64::try_from(age.num_seconds()).ok()
    }

    /// Whether the manifest is younger than the expiry window
    pub fn is_within_expiry(&self, expire_secs: u64) -> bool {
        match self.age_secs() {
            Some(age) => age < expire_secs,
            None => false,
        }
    }
}

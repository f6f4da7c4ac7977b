// src/repo/metadata.rs

//! Repository metadata format
//!
//! A repository serves a JSON primary index (`primary.json`) listing
//! every package it carries, and optionally `updateinfo.json` with
//! advisories. Entries are converted into sack `Package` records at
//! load time; conversion validates checksums and fills in the implicit
//! self-provide.

use crate::error::{Error, Result};
use crate::hash::{Checksum, ChecksumKind};
use crate::sack::Package;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Primary index: everything the repository serves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Metadata revision, opaque to the engine
    #[serde(default)]
    pub revision: String,
    pub packages: Vec<PackageEntry>,
}

impl RepoMetadata {
    /// Parse a primary index from raw JSON bytes
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::Parse(format!("invalid primary index: {e}")))
    }

    /// Serialize back to JSON (used by tests and repo tooling)
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Parse(format!("failed to serialize metadata: {e}")))
    }
}

/// One package entry in the primary index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// `<kind>:<hex>`, e.g. `sha256:ab12...`
    pub checksum: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub size: u64,
    /// Download path relative to the repository base url
    pub location: String,
}

impl PackageEntry {
    /// Convert into a sack record owned by `repo_id`
    pub fn into_package(self, repo_id: &str) -> Result<Package> {
        let checksum = parse_checksum(&self.checksum)?;

        let mut provides = self.provides;
        if !provides.contains(&self.name) {
            // Every package provides its own name
            provides.insert(0, self.name.clone());
        }

        Ok(Package {
            name: self.name,
            epoch: self.epoch,
            version: self.version,
            release: self.release,
            arch: self.arch,
            checksum,
            repo_id: repo_id.to_string(),
            provides,
            requires: self.requires,
            size: self.size,
            location: self.location,
        })
    }
}

/// Advisory metadata (`updateinfo.json`); optional per repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(default)]
    pub advisories: Vec<Advisory>,
}

impl UpdateInfo {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::Parse(format!("invalid updateinfo: {e}")))
    }
}

/// One security/bugfix advisory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    /// NEVRAs this advisory updates
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Parse a `<kind>:<hex>` checksum declaration
pub fn parse_checksum(s: &str) -> Result<Checksum> {
    let (kind, digest) = s
        .split_once(':')
        .ok_or_else(|| Error::Parse(format!("checksum '{}' missing algorithm prefix", s)))?;
    Checksum::new(ChecksumKind::from_str(kind)?, digest)
}

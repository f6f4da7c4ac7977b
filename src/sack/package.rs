// src/sack/package.rs

//! Package records and ids
//!
//! A `Package` is immutable after load: the loader builds it from
//! repository metadata, the sack owns it, and queries hand out clones.

use crate::hash::Checksum;
use crate::version::{Evr, Nevra};
use std::fmt;

/// Opaque package id assigned by a sack
///
/// Ids are monotonically increasing per sack and never reused within a
/// process lifetime, even after a repository is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) u64);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One package record from a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// Checksum of the package payload as declared by the repository
    pub checksum: Checksum,
    /// Id of the repository this record came from
    pub repo_id: String,
    /// Capabilities this package provides (including its own name)
    pub provides: Vec<String>,
    /// Capabilities this package requires
    pub requires: Vec<String>,
    /// Payload size in bytes
    pub size: u64,
    /// Download location, relative to the repository base url
    pub location: String,
}

impl Package {
    /// The canonical identity tuple of this package
    pub fn nevra(&self) -> Nevra {
        Nevra {
            name: self.name.clone(),
            epoch: self.epoch,
            version: self.version.clone(),
            release: self.release.clone(),
            arch: self.arch.clone(),
        }
    }

    /// The epoch:version-release portion, used by version-aware filters
    pub fn evr(&self) -> Evr {
        Evr {
            epoch: self.epoch,
            version: self.version.clone(),
            release: Some(self.release.clone()),
        }
    }

    /// Whether this record and `other` name the same NEVRA
    pub fn same_nevra(&self, other: &Package) -> bool {
        self.name == other.name
            && self.epoch == other.epoch
            && self.version == other.version
            && self.release == other.release
            && self.arch == other.arch
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra())
    }
}

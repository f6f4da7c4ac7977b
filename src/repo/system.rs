// src/repo/system.rs

//! System repository
//!
//! Reads installed-package state from a local JSON state file instead
//! of fetching remote metadata. The state file uses the same shape as
//! a primary index, so tooling that writes one can write the other.

use super::metadata::RepoMetadata;
use super::{LoadResult, RepoState};
use crate::error::{Error, Result};
use crate::sack::Sack;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Conventional id for the system repository
pub const SYSTEM_REPO_ID: &str = "@system";

/// The installed-package side of the sack
pub struct SystemRepo {
    state_path: PathBuf,
    state: Mutex<RepoState>,
}

impl SystemRepo {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            state: Mutex::new(RepoState::New),
        }
    }

    pub fn state(&self) -> RepoState {
        *self.state.lock().expect("system repo state lock poisoned")
    }

    /// Load installed packages into the sack under the `@system` repo id
    ///
    /// A missing state file is an empty system, not an error; an
    /// unreadable or malformed one fails the load.
    pub fn load(&self, sack: &Sack) -> Result<LoadResult> {
        *self.state.lock().expect("system repo state lock poisoned") = RepoState::Loading;

        let result = self.load_inner(sack);
        let next = match &result {
            Ok(_) => RepoState::Loaded { degraded: false },
            Err(_) => RepoState::Failed,
        };
        *self.state.lock().expect("system repo state lock poisoned") = next;
        result
    }

    fn load_inner(&self, sack: &Sack) -> Result<LoadResult> {
        if !self.state_path.exists() {
            info!("No system state at {}, starting empty", self.state_path.display());
            return Ok(LoadResult {
                from_cache: true,
                degraded: false,
                packages_added: 0,
            });
        }

        let data = fs::read(&self.state_path)
            .map_err(|e| Error::io(format!("reading {}", self.state_path.display()), e))?;
        let metadata = RepoMetadata::from_json(&data)?;

        let packages = metadata
            .packages
            .into_iter()
            .map(|entry| entry.into_package(SYSTEM_REPO_ID))
            .collect::<Result<Vec<_>>>()?;

        let count = packages.len();
        sack.replace_repo(SYSTEM_REPO_ID, packages)?;
        info!("Loaded {} installed packages from system state", count);

        Ok(LoadResult {
            from_cache: true,
            degraded: false,
            packages_added: count,
        })
    }
}

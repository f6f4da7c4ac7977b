// src/base.rs

//! Session context
//!
//! `Base` owns the sack, the configured repositories, and the log
//! router, and hands out weak handles that long-lived callers can hold
//! without keeping the session alive. A handle whose session has been
//! dropped fails its upgrade with a stale-handle error instead of
//! resurrecting freed state.

use crate::error::{Error, Result};
use crate::logger::LogRouter;
use crate::repo::{LoadResult, Repo, RepoCallbacks, RepoConfig};
use crate::sack::{Sack, SackConfig};
use std::sync::{Arc, Mutex, Weak};
use tracing::{info, warn};

struct BaseInner {
    sack: Sack,
    repos: Mutex<Vec<Arc<Repo>>>,
    logger: LogRouter,
}

/// Shared session: sack, repositories, and logging in one place
#[derive(Clone)]
pub struct Base {
    inner: Arc<BaseInner>,
}

impl Base {
    pub fn new() -> Self {
        Self::with_sack_config(SackConfig::default())
    }

    pub fn with_sack_config(config: SackConfig) -> Self {
        Self {
            inner: Arc::new(BaseInner {
                sack: Sack::with_config(config),
                repos: Mutex::new(Vec::new()),
                logger: LogRouter::new(),
            }),
        }
    }

    pub fn sack(&self) -> &Sack {
        &self.inner.sack
    }

    pub fn logger(&self) -> &LogRouter {
        &self.inner.logger
    }

    /// Register a repository with this session
    ///
    /// Repository ids are unique within a session; registering a
    /// duplicate id is rejected.
    pub fn add_repo(&self, config: RepoConfig) -> Result<Arc<Repo>> {
        let mut repos = self.inner.repos.lock().expect("repo list poisoned");
        if repos.iter().any(|r| r.id() == config.id) {
            return Err(Error::IdAlreadyExists(config.id));
        }
        let repo = Arc::new(Repo::new(config)?);
        repos.push(repo.clone());
        Ok(repo)
    }

    /// Look up a registered repository by id
    pub fn repo(&self, id: &str) -> Result<Arc<Repo>> {
        self.inner
            .repos
            .lock()
            .expect("repo list poisoned")
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no repository with id '{id}'")))
    }

    /// Snapshot of the registered repositories
    pub fn repos(&self) -> Vec<Arc<Repo>> {
        self.inner.repos.lock().expect("repo list poisoned").clone()
    }

    /// Load every enabled repository into the sack
    ///
    /// Each repository loads independently; one failure does not stop
    /// the others. Per-repo outcomes are returned in registration
    /// order, disabled repositories skipped.
    pub fn load_repos(
        &self,
        callbacks: Arc<dyn RepoCallbacks>,
        force: bool,
    ) -> Vec<(String, Result<LoadResult>)> {
        let repos = self.repos();
        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            if !repo.config().enabled {
                continue;
            }
            let id = repo.id().to_string();
            let outcome = repo.load(&self.inner.sack, callbacks.clone(), force);
            match &outcome {
                Ok(result) => info!(
                    "Loaded repo '{}': {} packages ({})",
                    id,
                    result.packages_added,
                    if result.from_cache { "cache" } else { "fetched" }
                ),
                Err(e) => warn!("Repo '{}' failed to load: {e}", id),
            }
            outcomes.push((id, outcome));
        }
        outcomes
    }

    /// Create a weak handle onto this session
    pub fn weak(&self) -> BaseHandle {
        BaseHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Base {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak reference to a session
///
/// Does not keep the session alive. `upgrade` recovers a usable `Base`
/// while the session exists and reports a stale handle afterwards.
#[derive(Clone)]
pub struct BaseHandle {
    inner: Weak<BaseInner>,
}

impl BaseHandle {
    pub fn upgrade(&self) -> Result<Base> {
        self.inner
            .upgrade()
            .map(|inner| Base { inner })
            .ok_or_else(|| Error::StaleHandle("session has been dropped".to_string()))
    }

    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

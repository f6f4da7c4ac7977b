// src/repo/callbacks.rs

//! Repository load callback protocol
//!
//! Loads report their lifecycle through this trait, mirroring the
//! download callback protocol one level up. All methods default to
//! no-ops; implementations override what they need. The loader invokes
//! these synchronously and makes no assumption that they are
//! side-effect-free.

/// Callback interface for repository load progress
pub trait RepoCallbacks: Send + Sync {
    /// A load attempt is starting for this repository
    fn start(&self, repo_id: &str) {
        let _ = repo_id;
    }

    /// The load finished; `degraded` is set when optional metadata was
    /// missing but the load still succeeded
    fn end(&self, repo_id: &str, degraded: bool) {
        let _ = (repo_id, degraded);
    }

    /// Bytes fetched so far across the load's transfers
    fn progress(&self, repo_id: &str, total: u64, downloaded: u64) {
        let _ = (repo_id, total, downloaded);
    }

    /// A mirror selection finished (fastest-mirror style probing)
    fn fastest_mirror(&self, repo_id: &str, url: &str) {
        let _ = (repo_id, url);
    }

    /// A mirror failed during the load; fallback continues
    fn handle_mirror_failure(&self, repo_id: &str, message: &str, url: &str) {
        let _ = (repo_id, message, url);
    }

    /// A previously unseen signing key was encountered; return `true`
    /// to accept and import it, `false` to reject the load
    fn repokey_import(&self, repo_id: &str, fingerprint: &str) -> bool {
        let _ = (repo_id, fingerprint);
        true
    }
}

/// Callbacks that ignore every event and accept every key
#[derive(Debug, Default)]
pub struct NullRepoCallbacks;

impl RepoCallbacks for NullRepoCallbacks {}

// src/sack/mod.rs

//! In-memory package index ("sack")
//!
//! The sack owns the canonical set of package records for one execution
//! context. Repository loads append to it, queries read from it. The
//! index is append-mostly: `invalidate_repo` hides a repository's
//! entries without renumbering anyone else's ids.
//!
//! # Concurrency
//!
//! All state sits behind one `RwLock`. Mutations (insert, invalidate)
//! take the write lock and bump a generation counter; queries capture
//! the generation at creation and refuse to run against a sack that has
//! mutated since (see `crate::query`). Concurrent read-only access is
//! safe.

mod package;

pub use package::{Package, PackageId};

use crate::error::{Error, Result};
use crate::version::Nevra;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{debug, info};

/// Whether inserting an already-present NEVRA from the same repository
/// is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Reject the insert with `DuplicatePackage`
    #[default]
    Reject,
    /// Accept the insert; both records stay live
    Allow,
}

/// How NEVRA collisions across repositories are resolved when a single
/// winner is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPreference {
    /// Prefer the repository with the lowest priority value; ties fall
    /// back to first-seen order
    #[default]
    RepoPriority,
    /// Prefer whichever record was inserted first
    FirstSeen,
}

/// Sack construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct SackConfig {
    pub duplicate_policy: DuplicatePolicy,
    pub collision_preference: CollisionPreference,
}

#[derive(Debug, Default)]
pub(crate) struct SackInner {
    /// Live records keyed by id; BTreeMap keeps iteration in id order
    pub(crate) packages: BTreeMap<PackageId, Package>,
    /// Reverse index: package name -> ids, insertion order
    pub(crate) by_name: HashMap<String, Vec<PackageId>>,
    /// Reverse index: provided capability -> ids, insertion order
    pub(crate) by_provide: HashMap<String, Vec<PackageId>>,
    /// Repository priorities, registered by the loader
    pub(crate) repo_priority: HashMap<String, i32>,
    /// Next id to hand out; never decremented
    next_id: u64,
    /// Bumped on every mutation
    pub(crate) generation: u64,
}

impl SackInner {
    fn allocate_id(&mut self) -> PackageId {
        let id = PackageId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index(&mut self, id: PackageId, package: &Package) {
        self.by_name
            .entry(package.name.clone())
            .or_default()
            .push(id);
        for provide in &package.provides {
            self.by_provide.entry(provide.clone()).or_default().push(id);
        }
    }

    fn has_duplicate(&self, package: &Package) -> bool {
        self.by_name
            .get(&package.name)
            .map(|ids| {
                ids.iter().any(|id| {
                    self.packages
                        .get(id)
                        .is_some_and(|p| p.same_nevra(package) && p.repo_id == package.repo_id)
                })
            })
            .unwrap_or(false)
    }

    /// Drop a repository's records from the map and reverse indices;
    /// ids stay retired
    fn remove_repo_entries(&mut self, repo_id: &str) -> usize {
        let doomed: Vec<PackageId> = self
            .packages
            .iter()
            .filter(|(_, p)| p.repo_id == repo_id)
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            if let Some(package) = self.packages.remove(id) {
                if let Some(ids) = self.by_name.get_mut(&package.name) {
                    ids.retain(|i| i != id);
                }
                for provide in &package.provides {
                    if let Some(ids) = self.by_provide.get_mut(provide) {
                        ids.retain(|i| i != id);
                    }
                }
            }
        }
        doomed.len()
    }
}

/// The in-memory package index for one execution context
#[derive(Debug, Default)]
pub struct Sack {
    config: SackConfig,
    inner: RwLock<SackInner>,
}

impl Sack {
    /// Create an empty sack with default policies
    pub fn new() -> Self {
        Self::with_config(SackConfig::default())
    }

    /// Create an empty sack with explicit policies
    pub fn with_config(config: SackConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(SackInner::default()),
        }
    }

    pub(crate) fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, SackInner> {
        self.inner.read().expect("sack lock poisoned")
    }

    /// Insert a single package record
    ///
    /// Fails with `DuplicatePackage` when the same NEVRA is already
    /// present from the same repository and the duplicate policy is
    /// `Reject`. The same NEVRA from a *different* repository is always
    /// accepted.
    pub fn insert(&self, package: Package) -> Result<PackageId> {
        let mut inner = self.inner.write().expect("sack lock poisoned");

        if self.config.duplicate_policy == DuplicatePolicy::Reject && inner.has_duplicate(&package)
        {
            return Err(Error::DuplicatePackage {
                nevra: package.nevra().to_string(),
                repo_id: package.repo_id.clone(),
            });
        }

        let id = inner.allocate_id();
        inner.index(id, &package);
        debug!("Inserted {} as {}", package.nevra(), id);
        inner.packages.insert(id, package);
        inner.generation += 1;
        Ok(id)
    }

    /// Insert a batch of records atomically
    ///
    /// Either every record is inserted or none is; a duplicate anywhere
    /// in the batch leaves the sack untouched. Repository loads use this
    /// so a failed load never leaves partial records behind.
    pub fn insert_all(&self, packages: Vec<Package>) -> Result<Vec<PackageId>> {
        let mut inner = self.inner.write().expect("sack lock poisoned");

        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            // Validate the whole batch (including intra-batch duplicates)
            // before committing anything
            for (i, package) in packages.iter().enumerate() {
                let dup_in_sack = inner.has_duplicate(package);
                let dup_in_batch = packages[..i]
                    .iter()
                    .any(|p| p.same_nevra(package) && p.repo_id == package.repo_id);
                if dup_in_sack || dup_in_batch {
                    return Err(Error::DuplicatePackage {
                        nevra: package.nevra().to_string(),
                        repo_id: package.repo_id.clone(),
                    });
                }
            }
        }

        let mut ids = Vec::with_capacity(packages.len());
        for package in packages {
            let id = inner.allocate_id();
            inner.index(id, &package);
            inner.packages.insert(id, package);
            ids.push(id);
        }
        inner.generation += 1;
        Ok(ids)
    }

    /// Fetch a package record by id
    pub fn get(&self, id: PackageId) -> Result<Package> {
        self.read_inner()
            .packages
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("package {}", id)))
    }

    /// Ids of all live packages with this exact name, insertion order
    pub fn ids_by_name(&self, name: &str) -> Vec<PackageId> {
        self.read_inner()
            .by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of all live packages providing this capability
    pub fn ids_by_provide(&self, capability: &str) -> Vec<PackageId> {
        self.read_inner()
            .by_provide
            .get(capability)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a repository's priority for collision resolution
    pub fn set_repo_priority(&self, repo_id: &str, priority: i32) {
        let mut inner = self.inner.write().expect("sack lock poisoned");
        inner.repo_priority.insert(repo_id.to_string(), priority);
    }

    /// Remove all of a repository's entries from the active indices
    ///
    /// Ids are not reused and remaining entries are not renumbered;
    /// `get` on a removed id reports `NotFound`.
    pub fn invalidate_repo(&self, repo_id: &str) {
        let mut inner = self.inner.write().expect("sack lock poisoned");

        let removed = inner.remove_repo_entries(repo_id);
        if removed == 0 {
            return;
        }
        inner.generation += 1;
        info!("Invalidated {} packages from repository '{}'", removed, repo_id);
    }

    /// Atomically replace a repository's records with a new batch
    ///
    /// Re-loads use this so loading an already loaded repository swaps
    /// its records instead of colliding with them. The incoming batch is
    /// validated before anything is removed; a bad batch leaves the
    /// previous records in place. New records get fresh ids.
    pub fn replace_repo(&self, repo_id: &str, packages: Vec<Package>) -> Result<Vec<PackageId>> {
        let mut inner = self.inner.write().expect("sack lock poisoned");

        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            // Only intra-batch duplicates can conflict: this repo's old
            // records are about to be removed, and other repos never
            // collide on NEVRA
            for (i, package) in packages.iter().enumerate() {
                let dup_in_batch = packages[..i]
                    .iter()
                    .any(|p| p.same_nevra(package) && p.repo_id == package.repo_id);
                if dup_in_batch {
                    return Err(Error::DuplicatePackage {
                        nevra: package.nevra().to_string(),
                        repo_id: package.repo_id.clone(),
                    });
                }
            }
        }

        let removed = inner.remove_repo_entries(repo_id);
        let mut ids = Vec::with_capacity(packages.len());
        for package in packages {
            let id = inner.allocate_id();
            inner.index(id, &package);
            inner.packages.insert(id, package);
            ids.push(id);
        }
        inner.generation += 1;
        debug!(
            "Replaced {} records of repository '{}' with {}",
            removed,
            repo_id,
            ids.len()
        );
        Ok(ids)
    }

    /// Resolve a NEVRA present in several repositories to one winner
    ///
    /// Applies the configured `CollisionPreference`; returns `None` when
    /// no live record matches the NEVRA.
    pub fn preferred_by_nevra(&self, nevra: &Nevra) -> Option<PackageId> {
        let inner = self.read_inner();
        let candidates: Vec<PackageId> = inner
            .by_name
            .get(&nevra.name)?
            .iter()
            .filter(|id| {
                inner.packages.get(id).is_some_and(|p| {
                    p.epoch == nevra.epoch
                        && p.version == nevra.version
                        && p.release == nevra.release
                        && p.arch == nevra.arch
                })
            })
            .copied()
            .collect();

        match self.config.collision_preference {
            CollisionPreference::FirstSeen => candidates.first().copied(),
            CollisionPreference::RepoPriority => candidates
                .iter()
                .min_by_key(|id| {
                    let priority = inner
                        .packages
                        .get(id)
                        .and_then(|p| inner.repo_priority.get(&p.repo_id))
                        .copied()
                        .unwrap_or(i32::MAX);
                    // Ties resolve to the lower (earlier) id
                    (priority, id.0)
                })
                .copied(),
        }
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.read_inner().packages.len()
    }

    /// Whether the sack holds no live records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current mutation generation; bumped on insert and invalidate
    pub fn generation(&self) -> u64 {
        self.read_inner().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Checksum, ChecksumKind};

    fn pkg(name: &str, version: &str, release: &str, repo: &str) -> Package {
        Package {
            name: name.to_string(),
            epoch: 0,
            version: version.to_string(),
            release: release.to_string(),
            arch: "x86_64".to_string(),
            checksum: Checksum::of_bytes(ChecksumKind::Sha256, name.as_bytes()),
            repo_id: repo.to_string(),
            provides: vec![name.to_string(), format!("lib{name}.so")],
            requires: vec![],
            size: 100,
            location: format!("packages/{name}-{version}-{release}.x86_64.rpm"),
        }
    }

    #[test]
    fn test_insert_then_get_returns_equal_record() {
        let sack = Sack::new();
        let record = pkg("nginx", "1.21.0", "1", "main");
        let id = sack.insert(record.clone()).unwrap();
        assert_eq!(sack.get(id).unwrap(), record);
    }

    #[test]
    fn test_duplicate_same_repo_rejected() {
        let sack = Sack::new();
        sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();
        let err = sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap_err();
        assert!(matches!(err, Error::DuplicatePackage { .. }));
    }

    #[test]
    fn test_duplicate_other_repo_accepted() {
        let sack = Sack::new();
        sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();
        sack.insert(pkg("nginx", "1.21.0", "1", "extras")).unwrap();
        assert_eq!(sack.len(), 2);
    }

    #[test]
    fn test_duplicate_policy_allow() {
        let sack = Sack::with_config(SackConfig {
            duplicate_policy: DuplicatePolicy::Allow,
            ..Default::default()
        });
        sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();
        sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();
        assert_eq!(sack.len(), 2);
    }

    #[test]
    fn test_insert_all_is_atomic() {
        let sack = Sack::new();
        sack.insert(pkg("redis", "6.2.0", "1", "main")).unwrap();

        let batch = vec![
            pkg("nginx", "1.21.0", "1", "main"),
            pkg("redis", "6.2.0", "1", "main"), // duplicate of existing
        ];
        assert!(sack.insert_all(batch).is_err());
        assert_eq!(sack.len(), 1);
        assert!(sack.ids_by_name("nginx").is_empty());
    }

    #[test]
    fn test_name_and_provide_indices() {
        let sack = Sack::new();
        let id = sack.insert(pkg("openssl", "3.0.0", "2", "main")).unwrap();
        assert_eq!(sack.ids_by_name("openssl"), vec![id]);
        assert_eq!(sack.ids_by_provide("libopenssl.so"), vec![id]);
        assert!(sack.ids_by_name("nothere").is_empty());
    }

    #[test]
    fn test_invalidate_repo_hides_without_renumbering() {
        let sack = Sack::new();
        let a = sack.insert(pkg("a", "1", "1", "main")).unwrap();
        let b = sack.insert(pkg("b", "1", "1", "extras")).unwrap();
        let c = sack.insert(pkg("c", "1", "1", "main")).unwrap();

        sack.invalidate_repo("main");

        assert!(matches!(sack.get(a), Err(Error::NotFound(_))));
        assert!(matches!(sack.get(c), Err(Error::NotFound(_))));
        assert_eq!(sack.get(b).unwrap().name, "b");
        assert!(sack.ids_by_name("a").is_empty());

        // Ids keep growing past the invalidated range
        let d = sack.insert(pkg("d", "1", "1", "main")).unwrap();
        assert!(d > c);
    }

    #[test]
    fn test_replace_repo_swaps_records() {
        let sack = Sack::new();
        let old_id = sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();
        sack.insert(pkg("redis", "6.2.0", "1", "extras")).unwrap();

        let new_ids = sack
            .replace_repo("main", vec![pkg("nginx", "1.21.0", "1", "main")])
            .unwrap();

        assert_eq!(sack.len(), 2);
        assert!(matches!(sack.get(old_id), Err(Error::NotFound(_))));
        assert!(new_ids[0] > old_id);
        assert_eq!(sack.get(new_ids[0]).unwrap().name, "nginx");
        // The other repository's records are untouched
        assert_eq!(sack.ids_by_name("redis").len(), 1);
    }

    #[test]
    fn test_replace_repo_bad_batch_keeps_old_records() {
        let sack = Sack::new();
        let old_id = sack.insert(pkg("nginx", "1.21.0", "1", "main")).unwrap();

        let batch = vec![
            pkg("redis", "6.2.0", "1", "main"),
            pkg("redis", "6.2.0", "1", "main"), // intra-batch duplicate
        ];
        assert!(matches!(
            sack.replace_repo("main", batch),
            Err(Error::DuplicatePackage { .. })
        ));
        assert_eq!(sack.get(old_id).unwrap().name, "nginx");
        assert_eq!(sack.len(), 1);
    }

    #[test]
    fn test_generation_bumps_on_mutation() {
        let sack = Sack::new();
        let g0 = sack.generation();
        sack.insert(pkg("a", "1", "1", "main")).unwrap();
        let g1 = sack.generation();
        assert!(g1 > g0);
        sack.invalidate_repo("main");
        assert!(sack.generation() > g1);
    }

    #[test]
    fn test_collision_preference_repo_priority() {
        let sack = Sack::new();
        sack.set_repo_priority("slow", 90);
        sack.set_repo_priority("fast", 10);
        sack.insert(pkg("nginx", "1.21.0", "1", "slow")).unwrap();
        let preferred = sack.insert(pkg("nginx", "1.21.0", "1", "fast")).unwrap();

        let nevra = sack.get(preferred).unwrap().nevra();
        assert_eq!(sack.preferred_by_nevra(&nevra), Some(preferred));
    }

    #[test]
    fn test_collision_preference_first_seen() {
        let sack = Sack::with_config(SackConfig {
            collision_preference: CollisionPreference::FirstSeen,
            ..Default::default()
        });
        sack.set_repo_priority("slow", 90);
        sack.set_repo_priority("fast", 10);
        let first = sack.insert(pkg("nginx", "1.21.0", "1", "slow")).unwrap();
        sack.insert(pkg("nginx", "1.21.0", "1", "fast")).unwrap();

        let nevra = sack.get(first).unwrap().nevra();
        assert_eq!(sack.preferred_by_nevra(&nevra), Some(first));
    }
}

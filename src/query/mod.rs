// src/query/mod.rs

//! Query engine: narrowable, set-algebra-capable views over a sack
//!
//! A `Query` starts as the full set of live packages and narrows with
//! each filter call. Filters AND across calls; the values within one
//! call OR together. Set operators (`update`, `intersection`,
//! `difference`) combine two queries over package identity regardless
//! of which filters produced them.
//!
//! The working set is an id list kept in ascending id order, so
//! repeated iteration of an unmodified query is stable. A query records
//! the sack generation it was created against; once the sack mutates,
//! narrowing or resolving the query fails with `StaleHandle` instead of
//! silently reading inconsistent state. Pure snapshot accessors
//! (`size`, `is_empty`, `ids`) keep answering from the captured id
//! list, which never dereferences the sack.
//!
//! An empty value list is a common caller mistake and is defined to
//! produce an empty result set, not a no-op.

use crate::error::{Error, Result};
use crate::sack::{Package, PackageId, Sack};
use crate::version::{compare_version_strings, Evr};
use glob::Pattern;
use std::cmp::Ordering;

/// Filter comparators
///
/// `Eq`, `Neq` and `Glob` apply to string attributes; the ordered
/// comparators are version-aware and apply to version, release, evr and
/// epoch attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Exact match
    Eq,
    /// Negated exact match
    Neq,
    /// Shell-style wildcard match (`*`, `?`, `[...]`)
    Glob,
    /// Greater than, under epoch:version-release ordering
    Gt,
    /// Greater or equal
    Gte,
    /// Less than
    Lt,
    /// Less or equal
    Lte,
}

impl Cmp {
    fn matches_ordering(&self, ord: Ordering) -> bool {
        match self {
            Cmp::Eq => ord == Ordering::Equal,
            Cmp::Neq => ord != Ordering::Equal,
            Cmp::Gt => ord == Ordering::Greater,
            Cmp::Gte => ord != Ordering::Less,
            Cmp::Lt => ord == Ordering::Less,
            Cmp::Lte => ord != Ordering::Greater,
            Cmp::Glob => false,
        }
    }
}

/// A filtered view over a sack's packages
#[derive(Debug, Clone)]
pub struct Query<'a> {
    sack: &'a Sack,
    generation: u64,
    /// Matching ids, ascending
    ids: Vec<PackageId>,
}

impl<'a> Query<'a> {
    /// Create a query matching every live package in the sack
    pub fn new(sack: &'a Sack) -> Self {
        let inner = sack.read_inner();
        Self {
            sack,
            generation: inner.generation,
            ids: inner.packages.keys().copied().collect(),
        }
    }

    /// Fail with `StaleHandle` if the sack mutated after this query was
    /// created
    fn check_live(&self) -> Result<()> {
        if self.sack.generation() != self.generation {
            return Err(Error::StaleHandle(
                "query outlived a sack mutation; rebuild it".to_string(),
            ));
        }
        Ok(())
    }

    fn check_same_source(&self, other: &Query<'_>) -> Result<()> {
        if !std::ptr::eq(self.sack, other.sack) {
            return Err(Error::Query(
                "set operation between queries over different sacks".to_string(),
            ));
        }
        self.check_live()?;
        other.check_live()
    }

    /// Narrow by a string attribute extracted per package
    fn filter_str<F>(&mut self, values: &[&str], cmp: Cmp, extract: F) -> Result<&mut Self>
    where
        F: Fn(&Package) -> &str,
    {
        match cmp {
            Cmp::Eq | Cmp::Neq | Cmp::Glob => {}
            other => {
                return Err(Error::Query(format!(
                    "comparator {:?} not supported for string attributes",
                    other
                )))
            }
        }
        self.check_live()?;

        if values.is_empty() {
            self.ids.clear();
            return Ok(self);
        }

        let patterns = compile_globs(values, cmp)?;
        let inner = self.sack.read_inner();
        self.ids.retain(|id| {
            let Some(package) = inner.packages.get(id) else {
                return false;
            };
            let attr = extract(package);
            match cmp {
                Cmp::Eq => values.iter().any(|v| *v == attr),
                Cmp::Neq => values.iter().all(|v| *v != attr),
                Cmp::Glob => patterns.iter().any(|p| p.matches(attr)),
                _ => unreachable!("validated above"),
            }
        });
        Ok(self)
    }

    /// Narrow by exact or wildcard package name
    pub fn filter_name(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        self.filter_str(values, cmp, |p| &p.name)
    }

    /// Narrow by architecture
    pub fn filter_arch(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        self.filter_str(values, cmp, |p| &p.arch)
    }

    /// Narrow by source repository id
    pub fn filter_repo(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        self.filter_str(values, cmp, |p| &p.repo_id)
    }

    /// Narrow by version component
    ///
    /// Ordered comparators use rpm segment ordering, not lexicographic.
    pub fn filter_version(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        self.filter_version_like(values, cmp, |p| p.version.clone())
    }

    /// Narrow by release component
    pub fn filter_release(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        self.filter_version_like(values, cmp, |p| p.release.clone())
    }

    fn filter_version_like<F>(&mut self, values: &[&str], cmp: Cmp, extract: F) -> Result<&mut Self>
    where
        F: Fn(&Package) -> String,
    {
        self.check_live()?;

        if values.is_empty() {
            self.ids.clear();
            return Ok(self);
        }

        let patterns = compile_globs(values, cmp)?;
        let inner = self.sack.read_inner();
        self.ids.retain(|id| {
            let Some(package) = inner.packages.get(id) else {
                return false;
            };
            let attr = extract(package);
            match cmp {
                Cmp::Glob => patterns.iter().any(|p| p.matches(&attr)),
                _ => values
                    .iter()
                    .any(|v| cmp.matches_ordering(compare_version_strings(&attr, v))),
            }
        });
        Ok(self)
    }

    /// Narrow by epoch
    ///
    /// Glob is not meaningful for a numeric attribute and is rejected.
    pub fn filter_epoch(&mut self, values: &[u64], cmp: Cmp) -> Result<&mut Self> {
        if cmp == Cmp::Glob {
            return Err(Error::Query(
                "comparator Glob not supported for epoch".to_string(),
            ));
        }
        self.check_live()?;

        if values.is_empty() {
            self.ids.clear();
            return Ok(self);
        }

        let inner = self.sack.read_inner();
        self.ids.retain(|id| {
            inner.packages.get(id).is_some_and(|p| {
                values
                    .iter()
                    .any(|v| cmp.matches_ordering(p.epoch.cmp(v)))
            })
        });
        Ok(self)
    }

    /// Narrow by full epoch:version-release
    ///
    /// A value without an explicit epoch is treated as epoch 0.
    pub fn filter_evr(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        if cmp == Cmp::Glob {
            return Err(Error::Query(
                "comparator Glob not supported for evr; glob the version instead".to_string(),
            ));
        }
        self.check_live()?;

        if values.is_empty() {
            self.ids.clear();
            return Ok(self);
        }

        let wanted: Vec<Evr> = values
            .iter()
            .map(|v| Evr::parse(v))
            .collect::<Result<_>>()
            .map_err(|e| Error::Query(format!("bad evr filter value: {e}")))?;

        let inner = self.sack.read_inner();
        self.ids.retain(|id| {
            inner.packages.get(id).is_some_and(|p| {
                let evr = p.evr();
                wanted
                    .iter()
                    .any(|w| cmp.matches_ordering(evr.compare(w)))
            })
        });
        Ok(self)
    }

    /// Narrow to packages providing any of the given capabilities
    pub fn filter_provides(&mut self, values: &[&str], cmp: Cmp) -> Result<&mut Self> {
        match cmp {
            Cmp::Eq | Cmp::Glob => {}
            other => {
                return Err(Error::Query(format!(
                    "comparator {:?} not supported for provides",
                    other
                )))
            }
        }
        self.check_live()?;

        if values.is_empty() {
            self.ids.clear();
            return Ok(self);
        }

        let patterns = compile_globs(values, cmp)?;
        let inner = self.sack.read_inner();
        self.ids.retain(|id| {
            let Some(package) = inner.packages.get(id) else {
                return false;
            };
            package.provides.iter().any(|provide| match cmp {
                Cmp::Eq => values.iter().any(|v| v == provide),
                Cmp::Glob => patterns.iter().any(|p| p.matches(provide)),
                _ => unreachable!("validated above"),
            })
        });
        Ok(self)
    }

    /// Union: add every id from `other` to this query's working set
    pub fn update(&mut self, other: &Query<'_>) -> Result<&mut Self> {
        self.check_same_source(other)?;
        let mut merged = Vec::with_capacity(self.ids.len() + other.ids.len());
        merged.extend_from_slice(&self.ids);
        merged.extend_from_slice(&other.ids);
        merged.sort_unstable();
        merged.dedup();
        self.ids = merged;
        Ok(self)
    }

    /// Keep only ids present in both queries
    pub fn intersection(&mut self, other: &Query<'_>) -> Result<&mut Self> {
        self.check_same_source(other)?;
        self.ids.retain(|id| other.ids.binary_search(id).is_ok());
        Ok(self)
    }

    /// Remove every id present in `other`
    pub fn difference(&mut self, other: &Query<'_>) -> Result<&mut Self> {
        self.check_same_source(other)?;
        self.ids.retain(|id| other.ids.binary_search(id).is_err());
        Ok(self)
    }

    /// Current cardinality of the working set
    ///
    /// Reports the captured snapshot and stays available on a stale
    /// query; only narrowing and record-returning operations fail with
    /// `StaleHandle`.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// Whether the working set is empty; snapshot-based like [`size`](Self::size)
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Matching ids in ascending id order; snapshot-based like [`size`](Self::size)
    pub fn ids(&self) -> &[PackageId] {
        &self.ids
    }

    /// Clone out the matching records, ascending id order
    pub fn list(&self) -> Result<Vec<Package>> {
        self.check_live()?;
        let inner = self.sack.read_inner();
        self.ids
            .iter()
            .map(|id| {
                inner
                    .packages
                    .get(id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("package {}", id)))
            })
            .collect()
    }
}

fn compile_globs(values: &[&str], cmp: Cmp) -> Result<Vec<Pattern>> {
    if cmp != Cmp::Glob {
        return Ok(Vec::new());
    }
    values
        .iter()
        .map(|v| Pattern::new(v).map_err(|e| Error::Query(format!("bad glob '{}': {}", v, e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Checksum, ChecksumKind};

    fn pkg(nevra: &str) -> Package {
        let n = crate::version::Nevra::parse(nevra).unwrap();
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
            size: 10,
            location: format!("packages/{nevra}.rpm"),
        }
    }

    fn fixture_sack() -> Sack {
        let sack = Sack::new();
        sack.insert_all(vec![
            pkg("pkg-1.2-3.x86_64"),
            pkg("pkg-libs-1:1.3-4.x86_64"),
            pkg("other-1-1.x86_64"),
        ])
        .unwrap();
        sack
    }

    #[test]
    fn test_filter_name_eq() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pkg"], Cmp::Eq).unwrap();
        let names: Vec<String> = q.list().unwrap().iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["pkg-1.2-3.x86_64"]);
    }

    #[test]
    fn test_filter_name_glob_is_stable() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pk*"], Cmp::Glob).unwrap();
        assert_eq!(q.size(), 2);

        let first: Vec<String> = q.list().unwrap().iter().map(|p| p.name.clone()).collect();
        let second: Vec<String> = q.list().unwrap().iter().map(|p| p.name.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["pkg", "pkg-libs"]);
    }

    #[test]
    fn test_filters_and_across_calls() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pk*"], Cmp::Glob)
            .unwrap()
            .filter_epoch(&[1], Cmp::Eq)
            .unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.list().unwrap()[0].name, "pkg-libs");
    }

    #[test]
    fn test_values_or_within_call() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pkg", "other"], Cmp::Eq).unwrap();
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_empty_values_yield_empty_set() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pk*"], Cmp::Glob).unwrap();
        assert_eq!(q.size(), 2);
        q.filter_name(&[], Cmp::Eq).unwrap();
        assert_eq!(q.size(), 0);

        // Still empty, not a no-op, on a fresh query
        let mut q2 = Query::new(&sack);
        q2.filter_arch(&[], Cmp::Glob).unwrap();
        assert!(q2.is_empty());
    }

    #[test]
    fn test_version_aware_comparison() {
        let sack = Sack::new();
        sack.insert_all(vec![
            pkg("app-1.9-1.x86_64"),
            pkg("app-1.10-1.x86_64"),
            pkg("app-2:1.0-1.x86_64"),
        ])
        .unwrap();

        // 1.10 is newer than 1.9 under rpm rules
        let mut q = Query::new(&sack);
        q.filter_version(&["1.9"], Cmp::Gt).unwrap();
        let versions: Vec<String> = q.list().unwrap().iter().map(|p| p.version.clone()).collect();
        assert_eq!(versions, vec!["1.10"]);

        // EVR comparison respects the epoch
        let mut q = Query::new(&sack);
        q.filter_evr(&["1.10-1"], Cmp::Gt).unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.list().unwrap()[0].epoch, 2);
    }

    #[test]
    fn test_set_algebra() {
        let sack = Sack::new();
        sack.insert_all(vec![
            pkg("a-1.0-1.x86_64"),
            pkg("b-1.0-2.x86_64"),
            pkg("c-1.0-3.x86_64"),
        ])
        .unwrap();

        let mut q1 = Query::new(&sack);
        q1.filter_release(&["1", "2"], Cmp::Eq).unwrap();
        let mut q2 = Query::new(&sack);
        q2.filter_release(&["2", "3"], Cmp::Eq).unwrap();
        assert_eq!(q1.size(), 2);
        assert_eq!(q2.size(), 2);

        let mut union = q1.clone();
        union.update(&q2).unwrap();
        assert_eq!(union.size(), 3);

        let mut diff = q1.clone();
        diff.difference(&q2).unwrap();
        assert_eq!(diff.size(), 1);
        assert_eq!(diff.list().unwrap()[0].release, "1");

        let mut inter = q1.clone();
        inter.intersection(&q2).unwrap();
        assert_eq!(inter.size(), 1);
        assert_eq!(inter.list().unwrap()[0].release, "2");
    }

    #[test]
    fn test_set_ops_idempotent() {
        let sack = fixture_sack();
        let q_all = Query::new(&sack);
        let mut q = Query::new(&sack);
        q.update(&q_all).unwrap();
        q.update(&q_all).unwrap();
        assert_eq!(q.size(), 3);
        q.intersection(&q_all).unwrap();
        q.intersection(&q_all).unwrap();
        assert_eq!(q.size(), 3);
    }

    #[test]
    fn test_unsupported_comparator_is_an_error() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        assert!(matches!(
            q.filter_name(&["pkg"], Cmp::Gt),
            Err(Error::Query(_))
        ));
        assert!(matches!(
            q.filter_epoch(&[1], Cmp::Glob),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_bad_glob_is_an_error() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        assert!(matches!(
            q.filter_name(&["[unclosed"], Cmp::Glob),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_size_is_idempotent() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pk*"], Cmp::Glob).unwrap();
        assert_eq!(q.size(), q.size());
    }

    #[test]
    fn test_stale_query_rejected_after_mutation() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        sack.insert(pkg("late-1.0-1.x86_64")).unwrap();

        assert!(matches!(
            q.filter_name(&["pkg"], Cmp::Eq),
            Err(Error::StaleHandle(_))
        ));
        assert!(matches!(q.list(), Err(Error::StaleHandle(_))));
    }

    #[test]
    fn test_stale_query_still_reports_snapshot_cardinality() {
        let sack = fixture_sack();
        let mut q = Query::new(&sack);
        q.filter_name(&["pk*"], Cmp::Glob).unwrap();
        let snapshot = q.ids().to_vec();

        sack.insert(pkg("late-1.0-1.x86_64")).unwrap();

        // Snapshot accessors keep working; they never touch the sack
        assert_eq!(q.size(), 2);
        assert!(!q.is_empty());
        assert_eq!(q.ids(), snapshot.as_slice());
    }

    #[test]
    fn test_filter_provides() {
        let sack = Sack::new();
        let mut p = pkg("webserver-1.0-1.x86_64");
        p.provides.push("httpd".to_string());
        sack.insert(p).unwrap();
        sack.insert(pkg("other-1-1.x86_64")).unwrap();

        let mut q = Query::new(&sack);
        q.filter_provides(&["httpd"], Cmp::Eq).unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(q.list().unwrap()[0].name, "webserver");
    }
}

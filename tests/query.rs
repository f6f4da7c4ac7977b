// tests/query.rs

//! Query engine integration tests: filtering, set algebra, staleness.

mod common;

use common::{fixture_sack, test_package};
use quarry::{Cmp, Error, Query, Sack};

#[test]
fn test_query_by_name_and_glob() {
    let sack = fixture_sack();

    let mut q = Query::new(&sack);
    q.filter_name(&["nginx"], Cmp::Eq).unwrap();
    assert_eq!(q.size(), 1);
    assert_eq!(q.list().unwrap()[0].version, "1.24.0");

    let mut q = Query::new(&sack);
    q.filter_name(&["nginx*"], Cmp::Glob).unwrap();
    let names: Vec<String> = q.list().unwrap().iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec!["nginx", "nginx-core"]);
}

#[test]
fn test_chained_filters_narrow() {
    let sack = fixture_sack();

    let mut q = Query::new(&sack);
    q.filter_name(&["nginx*"], Cmp::Glob)
        .unwrap()
        .filter_epoch(&[1], Cmp::Eq)
        .unwrap()
        .filter_arch(&["x86_64"], Cmp::Eq)
        .unwrap();
    assert_eq!(q.size(), 1);
    assert_eq!(q.list().unwrap()[0].name, "nginx-core");
}

#[test]
fn test_version_ordering_is_rpm_style() {
    let sack = Sack::new();
    sack.insert_all(vec![
        test_package("app-1.9-1.x86_64"),
        test_package("app-1.10-1.x86_64"),
        test_package("app-1.9.1-1.x86_64"),
    ])
    .unwrap();

    let mut q = Query::new(&sack);
    q.filter_version(&["1.9"], Cmp::Gt).unwrap();
    let mut versions: Vec<String> = q.list().unwrap().iter().map(|p| p.version.clone()).collect();
    versions.sort();
    assert_eq!(versions, vec!["1.10", "1.9.1"]);

    let mut q = Query::new(&sack);
    q.filter_evr(&["1.10-1"], Cmp::Gte).unwrap();
    assert_eq!(q.size(), 1);
}

#[test]
fn test_set_algebra_between_queries() {
    let sack = fixture_sack();

    let mut nginx = Query::new(&sack);
    nginx.filter_name(&["nginx*"], Cmp::Glob).unwrap();
    let mut epoch1 = Query::new(&sack);
    epoch1.filter_epoch(&[1], Cmp::Eq).unwrap();

    let mut union = nginx.clone();
    union.update(&epoch1).unwrap();
    assert_eq!(union.size(), 2);

    let mut inter = nginx.clone();
    inter.intersection(&epoch1).unwrap();
    assert_eq!(inter.size(), 1);
    assert_eq!(inter.list().unwrap()[0].name, "nginx-core");

    let mut diff = nginx.clone();
    diff.difference(&epoch1).unwrap();
    assert_eq!(diff.size(), 1);
    assert_eq!(diff.list().unwrap()[0].name, "nginx");
}

#[test]
fn test_empty_filter_values_empty_the_set() {
    let sack = fixture_sack();
    let mut q = Query::new(&sack);
    q.filter_name(&[], Cmp::Eq).unwrap();
    assert!(q.is_empty());

    // Further narrowing of an empty set stays empty
    q.filter_arch(&["x86_64"], Cmp::Eq).unwrap();
    assert!(q.is_empty());
}

#[test]
fn test_query_goes_stale_on_sack_mutation() {
    let sack = fixture_sack();
    let mut q = Query::new(&sack);
    q.filter_name(&["nginx"], Cmp::Eq).unwrap();

    sack.insert(test_package("late-1.0-1.x86_64")).unwrap();

    assert!(matches!(q.list(), Err(Error::StaleHandle(_))));
    assert!(matches!(
        q.filter_name(&["nginx"], Cmp::Eq),
        Err(Error::StaleHandle(_))
    ));

    // A fresh query sees the mutated sack
    let q2 = Query::new(&sack);
    assert_eq!(q2.size(), 4);
}

#[test]
fn test_query_after_repo_invalidation() {
    let sack = fixture_sack();
    let mut by_repo = Query::new(&sack);
    by_repo.filter_repo(&["main"], Cmp::Eq).unwrap();
    assert_eq!(by_repo.size(), 3);

    sack.invalidate_repo("main");
    assert!(matches!(by_repo.list(), Err(Error::StaleHandle(_))));
    assert!(Query::new(&sack).is_empty());
}

//! Branch creation, isolation and inheritance

mod common;

use chronokv::prelude::*;
use chronokv::ChronoError;
use common::*;
use std::collections::BTreeSet;

#[test]
fn test_master_exists_on_open() {
    let db = memory_db();
    let master = db.branch(MASTER_BRANCH_NAME).unwrap();

    assert!(master.is_master());
    assert_eq!(master.origin(), None);
    assert_eq!(master.branching_timestamp(), 0);
    assert_eq!(db.branch_names(), vec![MASTER_BRANCH_NAME.to_string()]);
    assert!(db.origins_recursive(MASTER_BRANCH_NAME).unwrap().is_empty());
}

#[test]
fn test_child_inherits_state_at_branching_timestamp() {
    let db = memory_db();
    let t1 = commit_value(&db, MASTER_BRANCH_NAME, "a", "master-1");

    let feature = db.create_branch("feature").unwrap();
    assert_eq!(feature.branching_timestamp(), t1);
    assert_eq!(feature.origin(), Some(MASTER_BRANCH_NAME));
    assert_eq!(db.now("feature").unwrap(), t1);

    // Later master changes never reach the child
    commit_value(&db, MASTER_BRANCH_NAME, "a", "master-2");
    commit_value(&db, MASTER_BRANCH_NAME, "b", "master-only");

    let child = db.tx_on("feature").unwrap();
    assert_eq!(child.get::<String>("a").unwrap().as_deref(), Some("master-1"));
    assert!(!child.exists("b").unwrap());

    let master = db.read_only_tx().unwrap();
    assert_eq!(master.get::<String>("a").unwrap().as_deref(), Some("master-2"));
}

#[test]
fn test_child_writes_stay_local() {
    let db = memory_db();
    commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
    db.create_branch("feature").unwrap();

    let t = commit_value(&db, "feature", "a", "feature");
    commit_value(&db, "feature", "c", "feature-only");
    assert_eq!(db.now("feature").unwrap(), t + 1);

    assert_eq!(read_string(&db, "feature", t, "a").as_deref(), Some("feature"));
    let master = db.read_only_tx().unwrap();
    assert_eq!(master.get::<String>("a").unwrap().as_deref(), Some("1"));
    assert!(!master.exists("c").unwrap());
}

#[test]
fn test_child_history_includes_inherited_versions() {
    let db = memory_db();
    let t1 = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
    let t2 = commit_value(&db, MASTER_BRANCH_NAME, "a", "2");
    db.create_branch("feature").unwrap();
    commit_value(&db, MASTER_BRANCH_NAME, "a", "3");
    let t4 = commit_value(&db, "feature", "a", "feature");

    let child = db.tx_on("feature").unwrap();
    assert_eq!(child.history(DEFAULT_KEYSPACE, "a").unwrap(), vec![t4, t2, t1]);

    let modified: Vec<_> = child
        .modifications_between(DEFAULT_KEYSPACE, 0, t4)
        .unwrap()
        .into_iter()
        .map(|m| m.timestamp)
        .collect();
    assert_eq!(modified, vec![t1, t2, t4]);
}

#[test]
fn test_child_key_set_applies_local_modifications() {
    let db = memory_db();
    let mut tx = db.tx().unwrap();
    tx.put("a", "1").unwrap();
    tx.put("b", "1").unwrap();
    tx.commit().unwrap();
    db.create_branch("feature").unwrap();

    let mut child = db.tx_on("feature").unwrap();
    child.remove("a").unwrap();
    child.put("c", "1").unwrap();
    child.commit().unwrap();

    let expected: BTreeSet<String> = ["b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(db.tx_on("feature").unwrap().key_set(DEFAULT_KEYSPACE).unwrap(), expected);

    let master: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
    assert_eq!(db.read_only_tx().unwrap().key_set(DEFAULT_KEYSPACE).unwrap(), master);
}

#[test]
fn test_inherited_period_is_clipped_at_branch_boundary() {
    let db = memory_db();
    let t1 = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
    db.create_branch("feature").unwrap();
    commit_value(&db, MASTER_BRANCH_NAME, "a", "2");

    // Master's next version lies after the fork: invisible to the child
    let child = db.tx_on("feature").unwrap();
    let inherited = child.get_ranged(DEFAULT_KEYSPACE, "a").unwrap();
    assert_eq!(inherited.period(), Period::open_ended(t1));

    // A local version bounds the inherited one
    let local = commit_value(&db, "feature", "a", "feature");
    let past = db.read_only_tx_at("feature", t1).unwrap();
    let inherited = past.get_ranged(DEFAULT_KEYSPACE, "a").unwrap();
    assert_eq!(inherited.value().map(|v| v.to_vec()), Some(b"\"1\"".to_vec()));
    assert_eq!(inherited.period(), Period::new(t1, local));
}

#[test]
fn test_branch_from_past_timestamp() {
    let db = memory_db();
    let t1 = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
    commit_value(&db, MASTER_BRANCH_NAME, "a", "2");

    db.create_branch_from(MASTER_BRANCH_NAME, "hotfix", t1).unwrap();
    let child = db.tx_on("hotfix").unwrap();
    assert_eq!(child.timestamp(), t1);
    assert_eq!(child.get::<String>("a").unwrap().as_deref(), Some("1"));
}

#[test]
fn test_nested_branches_and_origins() {
    let db = memory_db();
    commit_value(&db, MASTER_BRANCH_NAME, "level", "master");
    db.create_branch("one").unwrap();
    commit_value(&db, "one", "one", "1");
    let one_now = db.now("one").unwrap();
    db.create_branch_from("one", "two", one_now).unwrap();
    commit_value(&db, "two", "two", "2");

    let origins: Vec<String> = db
        .origins_recursive("two")
        .unwrap()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(origins, vec![MASTER_BRANCH_NAME.to_string(), "one".to_string()]);

    let grandchild = db.tx_on("two").unwrap();
    assert_eq!(grandchild.get::<String>("level").unwrap().as_deref(), Some("master"));
    assert_eq!(grandchild.get::<String>("one").unwrap().as_deref(), Some("1"));
    assert_eq!(grandchild.get::<String>("two").unwrap().as_deref(), Some("2"));
    assert!(!db.tx_on("one").unwrap().exists("two").unwrap());

    assert_eq!(
        db.branch_names(),
        vec![MASTER_BRANCH_NAME.to_string(), "one".to_string(), "two".to_string()]
    );
}

#[test]
fn test_branch_creation_validation() {
    let db = memory_db();
    let now = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
    db.create_branch("feature").unwrap();

    let cases = [
        db.create_branch("feature"),
        db.create_branch(""),
        db.create_branch_from("missing", "child", 0),
        db.create_branch_from(MASTER_BRANCH_NAME, "future", now + 1),
    ];
    for result in cases {
        let err = result.unwrap_err();
        assert!(matches!(err, ChronoError::Branching(_)), "unexpected: {err}");
        assert!(err.is_validation());
    }

    assert!(db.branch("missing").is_err());
    assert!(db.tx_on("missing").is_err());
    assert_eq!(db.branch_names().len(), 2);
}

#[test]
fn test_branches_survive_reopen() {
    let backend = InMemoryBackend::new();
    let t1 = {
        let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
        let t1 = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
        db.create_branch("feature").unwrap();
        commit_value(&db, "feature", "a", "feature");
        t1
    };

    let db = open_db(Arc::new(backend), ChronoConfig::default());
    assert!(db.branch_exists("feature"));
    assert_eq!(db.branch("feature").unwrap().branching_timestamp(), t1);
    assert_eq!(db.now("feature").unwrap(), t1 + 1);
    let child = db.tx_on("feature").unwrap();
    assert_eq!(child.get::<String>("a").unwrap().as_deref(), Some("feature"));
}

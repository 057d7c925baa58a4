//! Back-references and the session cache of their queries

mod common;

use common::{at, root, Fixture};
use nav_adaptor::{external_ref_key, Interest, NavError, Session};
use nav_test_utils::{system_schemas, MemoryArchiveSource};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn referencing_entries(fixture: &Fixture, count: usize) {
    for i in 0..count {
        let entry_id = format!("R{i}");
        fixture
            .archives
            .insert(&entry_id, json!({"data": {"m_def": "lab.Experiment", "sample_ref": "../upload/archive/E1#/data/samples/0"}}));
        fixture.search.add_reference(&entry_id, "E1", "/data/samples/0");
    }
}

#[tokio::test]
async fn full_result_window_is_marked_truncated() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 20);
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();

    let references = sample.back_references().await.unwrap();
    assert_eq!(references.len(), 20);
    assert!(references.is_truncated());
    assert_eq!(references.keys().last(), Some(external_ref_key(19)));
}

#[tokio::test]
async fn few_matches_are_complete() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 3);
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();

    let references = sample.back_references().await.unwrap();
    assert_eq!(references.len(), 3);
    assert!(!references.is_truncated());
    assert_eq!(references.get("_external_ref_1").unwrap().entry_id, "R1");
    assert!(references.get("_external_ref_3").is_none());
    for entry in references.entries() {
        assert!(entry
            .entry_references
            .iter()
            .all(|reference| reference.target_path == "/data/samples/0"));
    }
}

#[tokio::test]
async fn queries_run_once_per_target() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 3);
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();

    let first = sample.back_references().await.unwrap();
    let second = sample.back_references().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.search.query_count(), 1);

    let other = fixture.session.open(&at("E1", "/data/samples/1")).await.unwrap();
    assert!(other.back_references().await.unwrap().is_empty());
    assert_eq!(fixture.search.query_count(), 2);
}

#[tokio::test]
async fn external_ref_keys_open_referencing_roots() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 3);
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();

    assert!(matches!(
        sample.resolve_child("_external_ref_0").await,
        Err(NavError::UnknownKey { .. })
    ));

    sample.back_references().await.unwrap();
    let referencing = sample.resolve_child("_external_ref_0").await.unwrap();
    assert_eq!(referencing.address(), &root("R0"));
    assert_eq!(
        referencing.section().unwrap().qualified_name(),
        "nomad.datamodel.EntryArchive"
    );

    let again = sample.resolve_child(&external_ref_key(0)).await.unwrap();
    assert!(referencing.same_node(&again));
    assert_eq!(fixture.search.query_count(), 1);

    let back = referencing.resolve_path(["data", "sample_ref"]).await.unwrap();
    assert!(back.fragment().same_as(sample.fragment()));
}

#[tokio::test]
async fn failed_queries_are_retried() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 2);
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();

    fixture.search.fail(true);
    assert!(matches!(sample.back_references().await, Err(NavError::Search(_))));
    assert!(fixture.session.cached_back_references(sample.address()).is_none());

    fixture.search.fail(false);
    assert_eq!(sample.back_references().await.unwrap().len(), 2);
    assert_eq!(fixture.search.query_count(), 2);
}

#[tokio::test]
async fn reload_forgets_back_references_of_the_entry() {
    let fixture = Fixture::new();
    referencing_entries(&fixture, 1);
    let address = at("E1", "/data/samples/0");
    let sample = fixture.session.open(&address).await.unwrap();
    sample.back_references().await.unwrap();

    let reloaded = fixture.session.reload(&address).await.unwrap();
    assert!(fixture.session.cached_back_references(&address).is_none());
    reloaded.back_references().await.unwrap();
    assert_eq!(fixture.search.query_count(), 2);
}

#[tokio::test]
async fn sessions_without_search_report_it() {
    let archives = MemoryArchiveSource::new();
    archives.insert("E1", common::experiment_archive());
    let session = Session::builder(Arc::new(archives), Arc::new(system_schemas())).build();
    let root = session.open(&root("E1")).await.unwrap();
    assert!(matches!(
        root.back_references().await,
        Err(NavError::SearchUnavailable)
    ));
}

#[tokio::test]
async fn abandoned_interest_drops_late_results() {
    let archives = MemoryArchiveSource::new().with_delay(Duration::from_millis(100));
    let fixture = Fixture::with_archives(archives, nav_adaptor::NavConfig::default());
    let address = at("E1", "/data");

    let interest = Interest::new();
    let pending = {
        let interest = interest.clone();
        let session = fixture.session.clone();
        let address = address.clone();
        tokio::spawn(async move { interest.deliver(session.open(&address)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    interest.abandon();
    assert!(pending.await.unwrap().is_none());

    // the fetch still completed and warmed the cache
    let data = fixture.session.open(&address).await.unwrap();
    assert_eq!(data.section().unwrap().qualified_name(), "lab.Experiment");
    assert_eq!(fixture.archives.fetch_count(), 1);
}

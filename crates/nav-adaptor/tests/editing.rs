//! Section selection, structural edits and persistence

mod common;

use common::{at, root, Fixture};
use nav_adaptor::{NavError, Navigator};
use pretty_assertions::assert_eq;
use serde_json::json;

fn names(sections: &[std::sync::Arc<nav_metainfo::SectionDef>]) -> Vec<&str> {
    sections.iter().map(|s| s.qualified_name()).collect()
}

#[tokio::test]
async fn inheriting_sections_start_with_the_expected_one() {
    let fixture = Fixture::new();
    let step = fixture.session.open(&at("E1", "/data/steps/0")).await.unwrap();

    let candidates = step.inheriting_sections().await.unwrap();
    assert_eq!(names(&candidates), vec!["lab.Step", "lab.Heating", "lab.Cooling"]);
}

#[tokio::test]
async fn selecting_a_section_changes_the_definition_of_its_data() {
    let fixture = Fixture::new();
    let step = fixture.session.open(&at("E1", "/data/steps/0")).await.unwrap();
    let heating = fixture
        .session
        .schemas()
        .section("lab.Heating", None)
        .await
        .unwrap();

    step.select_section(&heating).await.unwrap();
    assert_eq!(step.value(), Some(json!({"m_def": "lab.Heating"})));

    let reopened = fixture.session.open(&at("E1", "/data/steps/0")).await.unwrap();
    assert_eq!(reopened.section().unwrap().qualified_name(), "lab.Heating");
    let temperature = reopened.resolve_child("temperature").await.unwrap();
    assert_eq!(temperature.value(), None);

    // still empty apart from m_def, so it can be switched again
    let candidates = reopened.inheriting_sections().await.unwrap();
    assert_eq!(candidates[0].qualified_name(), "lab.Step");
    reopened.select_section(&candidates[2]).await.unwrap();
    assert_eq!(reopened.value(), Some(json!({"m_def": "lab.Cooling"})));
}

#[tokio::test]
async fn populated_sections_cannot_be_switched() {
    let fixture = Fixture::new();
    let sample = fixture.session.open(&at("E1", "/data/samples/0")).await.unwrap();
    let candidates = sample.inheriting_sections().await.unwrap();
    assert_eq!(names(&candidates), vec!["lab.Sample"]);

    let err = sample.select_section(&candidates[0]).await.unwrap_err();
    match err {
        NavError::SectionPopulated { mut fields, .. } => {
            fields.sort();
            assert_eq!(fields, vec!["mass", "name"]);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(sample.value(), Some(json!({"name": "A", "mass": 1.0})));
}

#[tokio::test]
async fn only_specializations_of_the_expected_section_can_be_selected() {
    let fixture = Fixture::new();
    let step = fixture.session.open(&at("E1", "/data/steps/0")).await.unwrap();
    let sample = fixture
        .session
        .schemas()
        .section("lab.Sample", None)
        .await
        .unwrap();

    match step.select_section(&sample).await.unwrap_err() {
        NavError::NotASpecialization {
            expected, candidate, ..
        } => {
            assert_eq!(expected, "lab.Step");
            assert_eq!(candidate, "lab.Sample");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(step.value(), Some(json!({})));
    assert!(!step.fragment().entry().unwrap().is_dirty());

    // a selected specialization still accepts its siblings
    let heating = fixture
        .session
        .schemas()
        .section("lab.Heating", None)
        .await
        .unwrap();
    step.select_section(&heating).await.unwrap();
    let reopened = fixture.session.open(&at("E1", "/data/steps/0")).await.unwrap();
    let cooling = fixture
        .session
        .schemas()
        .section("lab.Cooling", None)
        .await
        .unwrap();
    reopened.select_section(&cooling).await.unwrap();
    assert!(matches!(
        reopened.select_section(&sample).await,
        Err(NavError::NotASpecialization { .. })
    ));
}

#[tokio::test]
async fn read_only_entries_refuse_edits() {
    let fixture = Fixture::new();
    fixture.insert_read_only("R1", json!({"data": {"m_def": "lab.Experiment", "steps": [{}]}}));
    let step = fixture.session.open(&at("R1", "/data/steps/0")).await.unwrap();
    assert!(step.is_in_eln());
    assert!(!step.is_editable());

    let heating = fixture
        .session
        .schemas()
        .section("lab.Heating", None)
        .await
        .unwrap();
    assert!(matches!(
        step.select_section(&heating).await,
        Err(NavError::NotEditable(_))
    ));

    let data = fixture.session.open(&at("R1", "/data")).await.unwrap();
    assert!(matches!(data.add_sub_section("samples"), Err(NavError::NotEditable(_))));
}

#[tokio::test]
async fn adding_sub_sections_returns_their_keys() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    assert_eq!(data.add_sub_section("samples").unwrap(), "samples:3");
    assert_eq!(data.add_sub_section("instrument").unwrap(), "instrument");
    assert!(matches!(data.add_sub_section("title"), Err(NavError::UnknownKey { .. })));

    let added = data.resolve_child("samples:3").await.unwrap();
    assert_eq!(added.value(), Some(json!({})));
    let instrument = data.resolve_child("instrument").await.unwrap();
    assert!(instrument.fragment().is_present());

    fixture
        .archives
        .insert("E7", json!({"data": {"m_def": "lab.Experiment"}}));
    let empty = fixture.session.open(&at("E7", "/data")).await.unwrap();
    assert_eq!(empty.add_sub_section("steps").unwrap(), "steps");
    assert_eq!(empty.add_sub_section("steps").unwrap(), "steps:1");
}

#[tokio::test]
async fn removing_sub_sections_shifts_later_entries() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    let second = data.resolve_child("samples:1").await.unwrap();
    second.remove_sub_section().unwrap();

    let shifted = data.resolve_child("samples:1").await.unwrap();
    assert_eq!(shifted.value(), Some(json!({"name": "C"})));
    assert!(matches!(
        data.resolve_child("samples:2").await,
        Err(NavError::IndexOutOfRange { len: 2, .. })
    ));

    let root = fixture.session.open(&root("E1")).await.unwrap();
    assert!(matches!(root.remove_sub_section(), Err(NavError::NotEditable(_))));
}

#[tokio::test]
async fn refused_edits_leave_the_entry_clean() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();
    let last = data.resolve_child("samples:2").await.unwrap();
    for _ in 0..2 {
        data.resolve_child("samples:0").await.unwrap().remove_sub_section().unwrap();
    }
    fixture.session.save(&root("E1")).await.unwrap();
    assert_eq!(fixture.archives.save_count(), 1);

    // the entry `last` pointed at is gone
    assert!(matches!(last.remove_sub_section(), Err(NavError::NotEditable(_))));
    assert!(!data.fragment().entry().unwrap().is_dirty());
    fixture.session.save(&root("E1")).await.unwrap();
    assert_eq!(fixture.archives.save_count(), 1);
}

#[tokio::test]
async fn navigator_recomputes_lanes_after_selection() {
    let fixture = Fixture::new();
    let archive = fixture.session.open(&root("E1")).await.unwrap();
    let mut navigator = Navigator::new(archive);

    navigator.navigate(["data", "steps:0"]).await.unwrap();
    assert_eq!(navigator.lanes().len(), 3);
    let candidates = navigator.current().inheriting_sections().await.unwrap();

    let current = navigator.select_section(2, &candidates[1]).await.unwrap();
    assert_eq!(current.section().unwrap().qualified_name(), "lab.Heating");
    assert_eq!(navigator.keys(), ["data", "steps:0"]);

    navigator
        .navigate(["data", "steps:0", "temperature"])
        .await
        .unwrap();
    assert_eq!(navigator.lanes().len(), 4);
}

#[tokio::test]
async fn navigator_reuses_common_prefix_and_cuts_at_errors() {
    let fixture = Fixture::new();
    let archive = fixture.session.open(&root("E1")).await.unwrap();
    let mut navigator = Navigator::new(archive);

    navigator.navigate(["data", "samples:0", "name"]).await.unwrap();
    let data = navigator.lane(1).unwrap().clone();

    navigator.navigate(["data", "samples:2"]).await.unwrap();
    assert!(navigator.lane(1).unwrap().same_node(&data));
    assert_eq!(navigator.current().value(), Some(json!({"name": "C"})));

    let err = navigator.navigate(["data", "nonsense", "deeper"]).await;
    assert!(matches!(err, Err(NavError::UnknownKey { .. })));
    assert_eq!(navigator.keys(), ["data"]);
    assert_eq!(navigator.lanes().len(), 2);
}

#[tokio::test]
async fn navigator_removal_returns_to_the_parent() {
    let fixture = Fixture::new();
    let archive = fixture.session.open(&root("E1")).await.unwrap();
    let mut navigator = Navigator::new(archive);

    navigator.navigate(["data", "samples:0"]).await.unwrap();
    let parent = navigator.remove_sub_section(2).await.unwrap();
    assert_eq!(parent.section().unwrap().qualified_name(), "lab.Experiment");
    assert_eq!(navigator.keys(), ["data"]);
    assert_eq!(
        navigator.current().resolve_child("samples:0").await.unwrap().value(),
        Some(json!({"name": "B"}))
    );
}

#[tokio::test]
async fn saving_persists_local_edits() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();
    data.add_sub_section("samples").unwrap();

    fixture.session.save(&root("E1")).await.unwrap();
    assert_eq!(fixture.archives.save_count(), 1);
    assert_eq!(fixture.archives.revision("E1"), Some(1));
    let stored = fixture.archives.archive("E1").unwrap();
    assert_eq!(stored["data"]["samples"].as_array().map(Vec::len), Some(4));

    // clean entries are not sent again
    fixture.session.save(&root("E1")).await.unwrap();
    assert_eq!(fixture.archives.save_count(), 1);
}

#[tokio::test]
async fn conflicting_saves_keep_local_edits_until_reload() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();
    data.add_sub_section("samples").unwrap();
    fixture.archives.touch("E1");

    let err = fixture.session.save(&root("E1")).await.unwrap_err();
    assert!(err.is_conflict());
    let local = fixture.session.open(&at("E1", "/data")).await.unwrap();
    assert_eq!(local.resolve_child("samples:3").await.unwrap().value(), Some(json!({})));

    let reloaded = fixture.session.reload(&at("E1", "/data")).await.unwrap();
    assert!(matches!(
        reloaded.resolve_child("samples:3").await,
        Err(NavError::IndexOutOfRange { len: 3, .. })
    ));
    assert_eq!(fixture.archives.fetch_count(), 2);
}

//! Following reference quantities

mod common;

use common::{at, Fixture};
use nav_adaptor::{AdaptorKind, UnresolvedReason};
use nav_address::AddressKind;
use nav_metainfo::Definition;
use pretty_assertions::assert_eq;
use serde_json::json;

fn reason(node: &nav_adaptor::Adaptor) -> Option<&UnresolvedReason> {
    match node.kind() {
        AdaptorKind::UnresolvedReference { reason, .. } => Some(reason),
        _ => None,
    }
}

#[tokio::test]
async fn local_reference_resolves_to_the_target_section() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    let sample = data.resolve_child("sample_ref").await.unwrap();
    assert_eq!(sample.section().unwrap().qualified_name(), "lab.Sample");
    assert_eq!(sample.address(), &at("E1", "/data/samples/1"));
    assert_eq!(sample.value(), Some(json!({"name": "B"})));
    assert!(matches!(sample.property(), Some(Definition::Quantity(q)) if q.name() == "sample_ref"));

    let direct = data.resolve_child("samples:1").await.unwrap();
    assert_eq!(sample.value(), direct.value());
    assert!(sample.fragment().same_as(direct.fragment()));
}

#[tokio::test]
async fn cross_entry_reference_falls_back_to_the_referenced_section() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    let remote = data.resolve_child("inputs:1").await.unwrap();
    let expected = fixture
        .session
        .schemas()
        .section("lab.Sample", None)
        .await
        .unwrap();
    assert!(remote.definition().same_as(&Definition::Section(expected)));
    assert_eq!(remote.address(), &at("E2", "/data/specimen"));
    assert_eq!(remote.value(), Some(json!({"name": "remote"})));
    assert_eq!(fixture.archives.fetch_count(), 2);
}

#[tokio::test]
async fn static_schema_describes_untyped_targets() {
    let fixture = Fixture::new();
    fixture.archives.insert(
        "E3",
        json!({"data": {"m_def": "lab.Experiment", "sample_ref": "../upload/archive/E1#/results/material"}}),
    );
    let data = fixture.session.open(&at("E3", "/data")).await.unwrap();

    let material = data.resolve_child("sample_ref").await.unwrap();
    assert_eq!(material.section().unwrap().qualified_name(), "nomad.datamodel.Material");

    fixture.archives.insert(
        "E4",
        json!({"data": {"m_def": "lab.Experiment", "sample_ref": "../upload/archive/E1#/results/material/formula"}}),
    );
    let data = fixture.session.open(&at("E4", "/data")).await.unwrap();
    let formula = data.resolve_child("sample_ref").await.unwrap();
    assert!(matches!(formula.kind(), AdaptorKind::Quantity { definition, .. } if definition.name() == "formula"));
    assert_eq!(formula.value(), Some(json!("H2O")));
}

#[tokio::test]
async fn declared_definition_of_the_target_wins() {
    let fixture = Fixture::new();
    fixture.archives.insert(
        "E5",
        json!({"data": {
            "m_def": "lab.Experiment",
            "sample_ref": "#/data/steps/0",
            "steps": [{"m_def": "lab.Heating", "temperature": 400.0}]
        }}),
    );
    let data = fixture.session.open(&at("E5", "/data")).await.unwrap();
    let step = data.resolve_child("sample_ref").await.unwrap();
    assert_eq!(step.section().unwrap().qualified_name(), "lab.Heating");
}

#[tokio::test]
async fn broken_references_degrade_to_unresolved_nodes() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    let cases = [
        ("inputs:2", UnresolvedReason::Missing),
        ("inputs:3", UnresolvedReason::NotAString),
        ("inputs:4", UnresolvedReason::UnsupportedKind(AddressKind::Raw)),
    ];
    for (key, expected) in cases {
        let node = data.resolve_child(key).await.unwrap();
        assert_eq!(reason(&node), Some(&expected), "{key}");
    }

    let fetch = data.resolve_child("inputs:5").await.unwrap();
    assert!(matches!(reason(&fetch), Some(UnresolvedReason::Fetch(_))));

    let broken = data.resolve_child("inputs:6").await.unwrap();
    assert_eq!(
        reason(&broken),
        Some(&UnresolvedReason::BrokenPath("/data/samples/9".to_string()))
    );

    let invalid = data.resolve_child("inputs:-1").await.unwrap();
    assert!(matches!(reason(&invalid), Some(UnresolvedReason::InvalidAddress(_))));
    assert_eq!(invalid.value(), Some(json!("not a reference at all")));
    match invalid.kind() {
        AdaptorKind::UnresolvedReference { value, expected, .. } => {
            assert_eq!(value, &json!("not a reference at all"));
            assert_eq!(expected.name(), "inputs");
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[tokio::test]
async fn reference_resolution_is_total() {
    let fixture = Fixture::new();
    let data = fixture.session.open(&at("E1", "/data")).await.unwrap();

    for index in -10..10 {
        let key = format!("inputs:{index}");
        let node = data.resolve_child(&key).await;
        assert!(node.is_ok(), "{key}: {node:?}");
    }

    let whole = data.resolve_child("inputs").await.unwrap();
    assert_eq!(reason(&whole), Some(&UnresolvedReason::Missing));
    assert_eq!(whole.value().unwrap().as_array().map(Vec::len), Some(8));

    // siblings keep resolving after failures
    let first = data.resolve_child("inputs:0").await.unwrap();
    assert_eq!(first.value(), Some(json!({"name": "A", "mass": 1.0})));
}

#[tokio::test]
async fn missing_scalar_reference_is_unresolved() {
    let fixture = Fixture::new();
    fixture
        .archives
        .insert("E6", json!({"data": {"m_def": "lab.Experiment"}}));
    let data = fixture.session.open(&at("E6", "/data")).await.unwrap();

    let node = data.resolve_child("sample_ref").await.unwrap();
    assert_eq!(reason(&node), Some(&UnresolvedReason::Missing));
    assert!(matches!(node.definition(), Definition::Quantity(q) if q.name() == "sample_ref"));
}

#![allow(dead_code)]

use nav_adaptor::{NavConfig, Session};
use nav_address::Address;
use nav_store::EntryMetadata;
use nav_test_utils::{system_schemas, MemoryArchiveSource, MemorySchemaSource, MemorySearch, DEPLOYMENT};
use serde_json::{json, Value};
use std::sync::Arc;

/// Collaborators of one test session, kept for inspection
pub struct Fixture {
    pub archives: MemoryArchiveSource,
    pub schemas: MemorySchemaSource,
    pub search: MemorySearch,
    pub session: Session,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_archives(MemoryArchiveSource::new(), NavConfig::default())
    }

    pub fn with_archives(archives: MemoryArchiveSource, config: NavConfig) -> Self {
        archives.insert("E1", experiment_archive());
        archives.insert("E2", remote_archive());
        let schemas = system_schemas();
        let search = MemorySearch::new();
        let session = Session::builder(Arc::new(archives.clone()), Arc::new(schemas.clone()))
            .config(config)
            .search(Arc::new(search.clone()))
            .build();
        Self {
            archives,
            schemas,
            search,
            session,
        }
    }

    /// Register an entry the backend does not allow editing
    pub fn insert_read_only(&self, entry_id: &str, archive: Value) {
        let metadata = EntryMetadata {
            upload_id: Some("U1".to_string()),
            editable: false,
            ..EntryMetadata::new(entry_id)
        };
        self.archives.insert_with_metadata(metadata, archive);
    }
}

/// Root of `entry_id` in upload `U1`
pub fn root(entry_id: &str) -> Address {
    Address::parse(&format!("{DEPLOYMENT}/uploads/U1/archive/{entry_id}")).unwrap()
}

/// `path` inside `entry_id` in upload `U1`
pub fn at(entry_id: &str, path: &str) -> Address {
    Address::parse(&format!("{DEPLOYMENT}/uploads/U1/archive/{entry_id}#{path}")).unwrap()
}

pub fn experiment_archive() -> Value {
    json!({
        "metadata": {"entry_id": "E1", "upload_id": "U1", "mainfile": "experiment.archive.json"},
        "data": {
            "m_def": "lab.Experiment",
            "m_attributes": {"operator": "ada"},
            "sample_ref": "#/data/samples/1",
            "inputs": [
                "#/data/samples/0",
                "../upload/archive/E2#/data/specimen",
                "",
                42,
                "../upload/raw/notes.txt",
                "../upload/archive/E404#/data",
                "#/data/samples/9",
                "not a reference at all"
            ],
            "energy": {
                "total": {"m_value": 1.5, "m_unit": "J", "m_attributes": {"method": "DFT"}}
            },
            "raw_file": "measurements/run1.csv",
            "samples": [
                {"name": "A", "mass": 1.0},
                {"name": "B"},
                {"name": "C"}
            ],
            "steps": [{}]
        },
        "results": {
            "material": {"formula": "H2O", "elements": ["H", "O"]}
        }
    })
}

pub fn remote_archive() -> Value {
    json!({
        "metadata": {"entry_id": "E2", "upload_id": "U1"},
        "data": {
            "m_def": "lab.Experiment",
            "specimen": {"name": "remote"}
        }
    })
}

//! Testing utilities for the archive navigation workspace
//!
//! In-memory collaborators for the document store, schema store and
//! back-reference search, plus a small system schema.

#![allow(missing_docs)]

mod archives;
mod fixtures;
mod schemas;
mod search;

pub use archives::MemoryArchiveSource;
pub use fixtures::{lab_package, metainfo_package, nomad_datamodel_package, system_schemas, DEPLOYMENT};
pub use schemas::MemorySchemaSource;
pub use search::MemorySearch;

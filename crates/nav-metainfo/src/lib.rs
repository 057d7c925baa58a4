//! Schema definitions for archive navigation
//!
//! Schema packages are loaded lazily from a [`SchemaSource`], resolved into
//! immutable [`Definition`]s and kept in a process wide [`SchemaStore`].
//!
//! # Core Concepts
//!
//! - [`PackageSpec`]: serialized package as delivered by a source
//! - [`Definition`]: section, quantity, subsection, attribute or package node
//! - [`SectionDef`]: section with properties flattened over its base sections
//! - [`SchemaStore`]: memoized lookup by address, qualified name or version,
//!   plus enumeration of the sections specializing a base section

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod definition;
mod error;
mod fs;
mod registry;
pub mod spec;
mod store;

pub use definition::{
    AttributeDef, AttributeOwner, Definition, DefinitionKind, PackageDef, PackageOrigin, Property,
    QuantityDef, SectionDef, SubSectionDef, PACKAGE_DEFINITION, RAW_FILE_ADAPTOR,
};
pub use error::{SchemaError, SchemaResult};
pub use fs::FsSchemaSource;
pub use spec::{PackageSpec, QuantityType};
pub use store::{PackageLocator, SchemaSource, SchemaStore, DEFAULT_SCHEMA_CACHE_CAPACITY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

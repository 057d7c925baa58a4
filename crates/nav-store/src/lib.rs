//! Archive document store
//!
//! Fetches and caches whole archives, deduplicating concurrent identical
//! fetches, and persists local edits with optimistic concurrency.
//!
//! # Core Concepts
//!
//! - [`ArchiveSource`]: backend contract (fetch + save)
//! - [`DocumentStore`]: moka backed cache of [`ArchiveEntry`] instances
//! - [`ArchiveEntry`]: shared mutable archive with a dirty flag
//! - [`SearchClient`]: paginated back-reference query

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod entry;
mod error;
mod fs;
mod metadata;
mod search;
mod source;
mod store;

pub use entry::ArchiveEntry;
pub use error::{SaveError, StoreError, StoreResult, TransportError};
pub use fs::FsArchiveSource;
pub use metadata::EntryMetadata;
pub use search::{
    EntryReference, Order, PageInfo, Pagination, ReferenceFilter, ReferencingEntry, SearchClient,
    SearchRequest, SearchResponse, ENTRIES_COLLECTION,
};
pub use source::{ArchiveSource, FetchRequest, FetchedArchive, Fields, SaveRequest};
pub use store::{DocumentStore, DEFAULT_DOCUMENT_CACHE_CAPACITY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

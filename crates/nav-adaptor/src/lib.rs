//! Lazy archive navigation
//!
//! Resolves archive data against its schema one key at a time. Each step
//! yields an [`Adaptor`] node that combines an address, the data found
//! there and the effective definition describing it.
//!
//! # Core Concepts
//!
//! - [`Session`]: document store, schema store, search and configuration
//! - [`Adaptor`]: navigable node; [`Adaptor::resolve_child`] is the key
//!   resolution protocol
//! - [`AdaptorKind::UnresolvedReference`]: references that cannot be
//!   followed degrade to nodes, never to errors
//! - [`Navigator`]: memoized lanes along a key path
//! - [`Interest`]: suppress delivery of results nobody waits for anymore
//!
//! # Example
//!
//! ```ignore
//! let session = Session::builder(archives, schemas).build();
//! let root = session.open(&Address::parse("http://host/api/v1/entries/E1/archive")?).await?;
//! let sample = root.resolve_path(["data", "samples:-1"]).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod adaptor;
mod config;
mod edit;
mod error;
mod external;
mod fragment;
mod inheritance;
mod key;
mod navigator;
mod packages;
mod pending;
mod reference;
mod session;

pub use adaptor::{
    Adaptor, AdaptorKind, ParentLink, RawFileHandle, ATTRIBUTES_FIELD, M_DEF_FIELD,
    M_DEF_ID_FIELD,
};
pub use config::{NavConfig, DEFAULT_BACK_REFERENCE_PAGE_SIZE, DEFAULT_ROOT_SECTION};
pub use error::{ConfigError, NavError, NavResult};
pub use external::BackReferences;
pub use fragment::Fragment;
pub use inheritance::declared_definition;
pub use key::{
    external_ref_key, ItemKey, KeyIndex, ReservedKey, EXTERNAL_REF_PREFIX, METAINFO_KEY,
    SUB_SECTION_METAINFO_KEY,
};
pub use navigator::Navigator;
pub use packages::{ArchivePackageSource, DEFINITIONS_FIELD};
pub use pending::Interest;
pub use reference::UnresolvedReason;
pub use session::{Session, SessionBuilder};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

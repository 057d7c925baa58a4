//! Navigation error types

use nav_address::AddressError;
use nav_metainfo::SchemaError;
use nav_store::{StoreError, TransportError};
use std::path::PathBuf;

/// Errors from adaptor resolution and editing
#[derive(Debug, Clone, thiserror::Error)]
pub enum NavError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Back-reference search failed
    #[error("back-reference search failed: {0}")]
    Search(#[source] TransportError),

    /// Key matches no property and no reserved key
    #[error("unknown key '{key}' at {address}")]
    UnknownKey { key: String, address: String },

    /// Repeating subsection index outside the sequence
    #[error("index {index} out of range for '{key}' with {len} entries")]
    IndexOutOfRange { key: String, index: i64, len: usize },

    /// Section selection refused because the section already holds data
    #[error("section at {address} already has data in {fields:?}")]
    SectionPopulated { address: String, fields: Vec<String> },

    /// Selected definition does not specialize the expected one
    #[error("section {candidate} cannot be used at {address}, expected {expected} or a specialization")]
    NotASpecialization {
        address: String,
        expected: String,
        candidate: String,
    },

    /// Node is not backed by an editable archive fragment
    #[error("not editable: {0}")]
    NotEditable(String),

    /// No search collaborator configured
    #[error("back-reference search is not available")]
    SearchUnavailable,
}

impl NavError {
    pub(crate) fn unknown_key(key: impl Into<String>, address: impl ToString) -> Self {
        Self::UnknownKey {
            key: key.into(),
            address: address.to_string(),
        }
    }

    /// Check if this is a save conflict that requires a reload
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}

/// Result type for navigation operations
pub type NavResult<T> = Result<T, NavError>;

/// Errors loading a [`NavConfig`](crate::NavConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

//! Session configuration
//!
//! ```toml
//! root_section = "nomad.datamodel.EntryArchive"
//! fields = "*"
//! back_reference_page_size = 20
//! document_cache_capacity = 1000
//! schema_cache_capacity = 10000
//! ```
//!
//! Every field is optional. Display settings are deliberately absent: the
//! resolution core does not depend on them.

use crate::error::ConfigError;
use nav_metainfo::DEFAULT_SCHEMA_CACHE_CAPACITY;
use nav_store::{Fields, DEFAULT_DOCUMENT_CACHE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Qualified name of the archive root section
pub const DEFAULT_ROOT_SECTION: &str = "nomad.datamodel.EntryArchive";

/// Result window of the back-reference query
pub const DEFAULT_BACK_REFERENCE_PAGE_SIZE: usize = 20;

/// Navigation session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Static schema of every archive root
    pub root_section: String,
    /// Field selection for archive fetches
    pub fields: Fields,
    pub back_reference_page_size: usize,
    pub document_cache_capacity: u64,
    pub schema_cache_capacity: u64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            root_section: DEFAULT_ROOT_SECTION.to_string(),
            fields: Fields::All,
            back_reference_page_size: DEFAULT_BACK_REFERENCE_PAGE_SIZE,
            document_cache_capacity: DEFAULT_DOCUMENT_CACHE_CAPACITY,
            schema_cache_capacity: DEFAULT_SCHEMA_CACHE_CAPACITY,
        }
    }
}

impl NavConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different root section
    #[inline]
    #[must_use]
    pub fn with_root_section(mut self, root_section: impl Into<String>) -> Self {
        self.root_section = root_section.into();
        self
    }

    /// With a different back-reference result window
    #[inline]
    #[must_use]
    pub fn with_back_reference_page_size(mut self, page_size: usize) -> Self {
        self.back_reference_page_size = page_size;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on invalid TOML or mistyped fields.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NavConfig::default();
        assert_eq!(config.root_section, "nomad.datamodel.EntryArchive");
        assert_eq!(config.fields, Fields::All);
        assert_eq!(config.back_reference_page_size, 20);
        assert_eq!(NavConfig::from_toml("").unwrap(), config);
    }

    #[test]
    fn partial_toml() {
        let config = NavConfig::from_toml(
            r#"
            root_section = "custom.Root"
            fields = "data,metadata"
            back_reference_page_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.root_section, "custom.Root");
        assert_eq!(config.fields, Fields::only(["metadata", "data"]));
        assert_eq!(config.back_reference_page_size, 5);
        assert_eq!(config.document_cache_capacity, 1_000);
    }

    #[test]
    fn invalid_toml() {
        assert!(matches!(
            NavConfig::from_toml("back_reference_page_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nav.toml");
        std::fs::write(&path, "schema_cache_capacity = 7").unwrap();
        assert_eq!(NavConfig::load(&path).unwrap().schema_cache_capacity, 7);
        assert!(matches!(
            NavConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}

//! Entry metadata delivered alongside an archive

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub entry_id: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub entry_name: Option<String>,
    /// Path of the file the entry was parsed from
    #[serde(default)]
    pub mainfile: Option<String>,
    #[serde(default)]
    pub upload_create_time: Option<DateTime<Utc>>,
    /// Whether the current user may edit the archive
    #[serde(default)]
    pub editable: bool,
    /// Upstream revision, bumped by every successful save
    #[serde(default)]
    pub revision: u64,
}

impl EntryMetadata {
    /// Minimal metadata for `entry_id`
    #[must_use]
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            ..Self::default()
        }
    }
}

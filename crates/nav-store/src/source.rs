//! Archive backend contract

use crate::error::{SaveError, TransportError};
use crate::metadata::EntryMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Which top level archive fields to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Fields {
    /// Everything (`*`)
    #[default]
    All,
    /// Explicit list of top level fields
    Only(Vec<String>),
}

impl Fields {
    /// Explicit field list, sorted so equal selections compare equal
    #[must_use]
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();
        fields.dedup();
        Self::Only(fields)
    }

    /// Check if a top level field is selected
    #[must_use]
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.iter().any(|f| f == field),
        }
    }

    /// Reduce an archive to the selected fields
    #[must_use]
    pub fn select(&self, archive: Value) -> Value {
        match (self, archive) {
            (Self::All, archive) => archive,
            (Self::Only(_), Value::Object(map)) => {
                Value::Object(map.into_iter().filter(|(k, _)| self.includes(k)).collect())
            }
            (Self::Only(_), other) => other,
        }
    }
}

impl Display for Fields {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Only(fields) => f.write_str(&fields.join(",")),
        }
    }
}

impl FromStr for Fields {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            Ok(Self::All)
        } else {
            Ok(Self::only(s.split(',').map(str::trim).filter(|f| !f.is_empty())))
        }
    }
}

impl From<String> for Fields {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(fields) => fields,
            Err(never) => match never {},
        }
    }
}

impl From<Fields> for String {
    fn from(fields: Fields) -> Self {
        fields.to_string()
    }
}

/// One archive fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub deployment: String,
    pub entry_id: String,
    pub include_raw_file: bool,
    pub fields: Fields,
}

/// Archive and metadata as delivered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedArchive {
    pub metadata: EntryMetadata,
    pub archive: Value,
}

/// One archive save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub deployment: String,
    pub entry_id: String,
    pub archive: Value,
    /// Revision the edits were made against
    pub base_revision: u64,
}

/// Backend serving and persisting archives
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetch an archive and its metadata
    ///
    /// # Errors
    /// [`TransportError`] on any backend failure.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedArchive, TransportError>;

    /// Persist an archive, returning the new revision
    ///
    /// # Errors
    /// [`SaveError::Conflict`] if upstream moved past `base_revision`.
    async fn save(&self, request: &SaveRequest) -> Result<u64, SaveError>;
}

//! Back-reference search contract
//!
//! A single paginated query primitive over the entry index, used to find the
//! entries whose references name a given entry and path.

use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding entry metadata
pub const ENTRIES_COLLECTION: &str = "entries";

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

/// Filter selecting entries that reference a target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceFilter {
    #[serde(rename = "entry_references.target_entry_id")]
    pub target_entry_id: String,
    /// Slash path inside the target archive, `/` for the root
    #[serde(rename = "entry_references.target_path")]
    pub target_path: String,
}

/// Pagination request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub order_by: String,
    pub order: Order,
    pub page_size: usize,
}

/// One search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub collection: String,
    pub query: ReferenceFilter,
    pub pagination: Pagination,
}

impl SearchRequest {
    /// Most recently created entries referencing `target_path` of `target_entry_id`
    #[must_use]
    pub fn referencing(
        target_entry_id: impl Into<String>,
        target_path: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            collection: ENTRIES_COLLECTION.to_string(),
            query: ReferenceFilter {
                target_entry_id: target_entry_id.into(),
                target_path: target_path.into(),
            },
            pagination: Pagination {
                order_by: "upload_create_time".to_string(),
                order: Order::Desc,
                page_size,
            },
        }
    }
}

/// A reference from one entry into another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReference {
    pub source_path: String,
    pub target_entry_id: String,
    pub target_path: String,
    #[serde(default)]
    pub target_upload_id: Option<String>,
}

/// Summary of an entry returned by the search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencingEntry {
    pub entry_id: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub mainfile: Option<String>,
    #[serde(default)]
    pub upload_create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entry_references: Vec<EntryReference>,
}

/// Pagination of a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: usize,
    pub page_size: usize,
    #[serde(default)]
    pub next_page_after_value: Option<String>,
}

/// Search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<ReferencingEntry>,
    pub pagination: PageInfo,
}

/// Entry index client
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run one page of a query
    ///
    /// # Errors
    /// [`TransportError`] on backend failure.
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn referencing_request_shape() {
        let request = SearchRequest::referencing("abc", "/results", 20);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "collection": "entries",
                "query": {
                    "entry_references.target_entry_id": "abc",
                    "entry_references.target_path": "/results"
                },
                "pagination": {"order_by": "upload_create_time", "order": "desc", "page_size": 20}
            })
        );
    }
}

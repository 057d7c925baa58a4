use async_trait::async_trait;
use nav_store::{
    EntryReference, PageInfo, ReferencingEntry, SearchClient, SearchRequest, SearchResponse,
    TransportError,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    entries: RwLock<Vec<ReferencingEntry>>,
    queries: AtomicUsize,
    failing: AtomicBool,
}

/// Back-reference index held in memory
///
/// Entries are returned in insertion order, which tests treat as newest
/// first.
#[derive(Debug, Clone, Default)]
pub struct MemorySearch {
    inner: Arc<Inner>,
}

impl MemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source_entry` references `target_entry` at `target_path`
    pub fn add_reference(&self, source_entry: &str, target_entry: &str, target_path: &str) {
        let reference = EntryReference {
            source_path: "data/reference".to_string(),
            target_entry_id: target_entry.to_string(),
            target_path: target_path.to_string(),
            target_upload_id: Some("U1".to_string()),
        };
        let mut entries = self.inner.entries.write();
        match entries.iter_mut().find(|entry| entry.entry_id == source_entry) {
            Some(entry) => entry.entry_references.push(reference),
            None => entries.push(ReferencingEntry {
                entry_id: source_entry.to_string(),
                upload_id: Some("U1".to_string()),
                mainfile: Some(format!("{source_entry}.archive.json")),
                upload_create_time: Some(chrono::Utc::now()),
                entry_references: vec![reference],
            }),
        }
    }

    /// Make every following query fail
    pub fn fail(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.inner.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchClient for MemorySearch {
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("search is down".to_string()));
        }
        let filter = &request.query;
        let matching: Vec<ReferencingEntry> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|entry| {
                entry.entry_references.iter().any(|reference| {
                    reference.target_entry_id == filter.target_entry_id
                        && reference.target_path == filter.target_path
                })
            })
            .cloned()
            .collect();
        let total = matching.len();
        Ok(SearchResponse {
            data: matching
                .into_iter()
                .take(request.pagination.page_size)
                .collect(),
            pagination: PageInfo {
                total,
                page_size: request.pagination.page_size,
                next_page_after_value: None,
            },
        })
    }
}

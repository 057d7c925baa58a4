use async_trait::async_trait;
use nav_store::{
    ArchiveSource, EntryMetadata, FetchRequest, FetchedArchive, SaveError, SaveRequest,
    TransportError,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    entries: RwLock<HashMap<String, FetchedArchive>>,
    fetches: AtomicUsize,
    saves: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// Archive backend held in memory
///
/// Clones share state, so a test can keep one handle for inspection and hand
/// another to the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchiveSource {
    inner: Arc<Inner>,
}

impl MemoryArchiveSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch, to make concurrent requests overlap
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock() = Some(delay);
        self
    }

    /// Editable entry in upload `U1`
    pub fn insert(&self, entry_id: &str, archive: Value) {
        let metadata = EntryMetadata {
            upload_id: Some("U1".to_string()),
            editable: true,
            ..EntryMetadata::new(entry_id)
        };
        self.insert_with_metadata(metadata, archive);
    }

    pub fn insert_with_metadata(&self, metadata: EntryMetadata, archive: Value) {
        self.inner
            .entries
            .write()
            .insert(metadata.entry_id.clone(), FetchedArchive { metadata, archive });
    }

    /// Simulate an upstream change of `entry_id`
    pub fn touch(&self, entry_id: &str) {
        if let Some(fetched) = self.inner.entries.write().get_mut(entry_id) {
            fetched.metadata.revision += 1;
        }
    }

    /// Stored upstream copy of an archive
    pub fn archive(&self, entry_id: &str) -> Option<Value> {
        self.inner
            .entries
            .read()
            .get(entry_id)
            .map(|fetched| fetched.archive.clone())
    }

    pub fn revision(&self, entry_id: &str) -> Option<u64> {
        self.inner
            .entries
            .read()
            .get(entry_id)
            .map(|fetched| fetched.metadata.revision)
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSource for MemoryArchiveSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedArchive, TransportError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut fetched = self
            .inner
            .entries
            .read()
            .get(&request.entry_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(request.entry_id.clone()))?;
        fetched.archive = request.fields.select(fetched.archive);
        Ok(fetched)
    }

    async fn save(&self, request: &SaveRequest) -> Result<u64, SaveError> {
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.inner.entries.write();
        let stored = entries
            .get_mut(&request.entry_id)
            .ok_or_else(|| TransportError::NotFound(request.entry_id.clone()))?;
        if stored.metadata.revision != request.base_revision {
            return Err(SaveError::Conflict {
                current_revision: stored.metadata.revision,
            });
        }
        stored.metadata.revision += 1;
        stored.archive = request.archive.clone();
        Ok(stored.metadata.revision)
    }
}

//! Document store
//!
//! Fetches whole archives through an [`ArchiveSource`] and keeps them in a
//! moka cache keyed by entry and field selection. Concurrent requests for the
//! same key join the same in-flight fetch and receive the same
//! [`ArchiveEntry`] instance.

use crate::entry::ArchiveEntry;
use crate::error::{SaveError, StoreError, StoreResult, TransportError};
use crate::source::{ArchiveSource, FetchRequest, Fields, SaveRequest};
use moka::future::Cache;
use nav_address::Address;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of cached archives
pub const DEFAULT_DOCUMENT_CACHE_CAPACITY: u64 = 1_000;

/// Cache key; the upload is not part of it so both address spellings of an
/// entry share one document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DocumentKey {
    deployment: String,
    entry_id: String,
    fields: Fields,
}

impl DocumentKey {
    fn new(address: &Address, fields: &Fields) -> StoreResult<Self> {
        address.require_archive()?;
        Ok(Self {
            deployment: address.deployment().unwrap_or_default().to_string(),
            entry_id: address.entry_id().unwrap_or_default().to_string(),
            fields: fields.clone(),
        })
    }
}

/// Shared cache of fetched archives
#[derive(Clone)]
pub struct DocumentStore {
    source: Arc<dyn ArchiveSource>,
    cache: Cache<DocumentKey, Arc<ArchiveEntry>>,
}

impl Debug for DocumentStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new(source: Arc<dyn ArchiveSource>) -> Self {
        Self::with_capacity(source, DEFAULT_DOCUMENT_CACHE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(source: Arc<dyn ArchiveSource>, capacity: u64) -> Self {
        Self {
            source,
            cache: Cache::new(capacity),
        }
    }

    /// Get the archive containing `address`
    ///
    /// The path of `address` is ignored; the whole archive is fetched.
    ///
    /// # Errors
    /// [`StoreError::Address`] for unresolved or non-archive addresses,
    /// [`StoreError::Transport`] if the fetch fails. Failures are not cached.
    pub async fn get_document(
        &self,
        address: &Address,
        fields: &Fields,
    ) -> StoreResult<Arc<ArchiveEntry>> {
        let key = DocumentKey::new(address, fields)?;
        self.cache
            .try_get_with(key.clone(), async {
                debug!(entry_id = %key.entry_id, fields = %key.fields, "Fetching archive");
                let request = FetchRequest {
                    deployment: key.deployment.clone(),
                    entry_id: key.entry_id.clone(),
                    include_raw_file: false,
                    fields: key.fields.clone(),
                };
                let fetched = self.source.fetch(&request).await?;
                Ok::<_, TransportError>(Arc::new(ArchiveEntry::new(
                    address,
                    key.fields.clone(),
                    fetched,
                )))
            })
            .await
            .map_err(|e| StoreError::Transport((*e).clone()))
    }

    /// Cached archive, without fetching
    pub async fn cached(&self, address: &Address, fields: &Fields) -> Option<Arc<ArchiveEntry>> {
        let key = DocumentKey::new(address, fields).ok()?;
        self.cache.get(&key).await
    }

    /// Persist local edits of `entry`
    ///
    /// Clean entries are not sent. On conflict the local edits stay in place
    /// and the caller is expected to [`DocumentStore::invalidate`] and refetch.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the archive changed upstream,
    /// [`StoreError::Transport`] on backend failure.
    pub async fn save(&self, entry: &ArchiveEntry) -> StoreResult<()> {
        if !entry.is_dirty() {
            debug!(entry_id = entry.entry_id(), "Nothing to save");
            return Ok(());
        }
        let base_revision = entry.revision();
        let (archive, generation) = entry.snapshot_with_generation();
        let request = SaveRequest {
            deployment: entry.deployment().to_string(),
            entry_id: entry.entry_id().to_string(),
            archive,
            base_revision,
        };
        match self.source.save(&request).await {
            Ok(revision) => {
                entry.saved(revision, generation);
                info!(entry_id = entry.entry_id(), revision, "Saved archive");
                Ok(())
            }
            Err(SaveError::Conflict { current_revision }) => {
                warn!(
                    entry_id = entry.entry_id(),
                    base_revision, current_revision, "Archive changed upstream"
                );
                Err(StoreError::Conflict {
                    entry_id: request.entry_id,
                    base_revision,
                    current_revision,
                })
            }
            Err(SaveError::Transport(e)) => Err(e.into()),
        }
    }

    /// Drop the cached archive so the next request refetches it
    ///
    /// # Errors
    /// [`StoreError::Address`] for addresses that do not name an archive.
    pub async fn invalidate(&self, address: &Address, fields: &Fields) -> StoreResult<()> {
        let key = DocumentKey::new(address, fields)?;
        self.cache.invalidate(&key).await;
        Ok(())
    }

    /// Drop every cached archive
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

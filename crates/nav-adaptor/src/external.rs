//! Entries referencing a node ("referenced by")
//!
//! Back-references are found through the search collaborator on first
//! access and kept for the lifetime of the session. Only the result window
//! is kept, as summaries keyed by synthetic `_external_ref_<n>` keys; no
//! adaptor nodes of other entries are held.

use crate::adaptor::Adaptor;
use crate::error::{NavError, NavResult};
use crate::key::{external_ref_key, ItemKey, ReservedKey};
use crate::session::Session;
use dashmap::DashMap;
use nav_address::Address;
use nav_store::{ReferencingEntry, SearchRequest};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Target of a back-reference query: entry id and slash path
pub(crate) type TargetKey = (String, String);

/// Per session memo of back-reference queries
///
/// A failed query leaves its cell empty, so the next access retries.
pub(crate) type BackReferenceCache = DashMap<TargetKey, Arc<OnceCell<Arc<BackReferences>>>>;

/// Entries referencing one archive location
#[derive(Debug, Clone, PartialEq)]
pub struct BackReferences {
    entries: Vec<ReferencingEntry>,
    truncated: bool,
}

impl BackReferences {
    /// Keep only the references of each entry that point at the target
    #[must_use]
    pub fn new(
        mut entries: Vec<ReferencingEntry>,
        target_entry_id: &str,
        target_path: &str,
        page_size: usize,
    ) -> Self {
        let truncated = entries.len() >= page_size;
        for entry in &mut entries {
            entry.entry_references.retain(|reference| {
                reference.target_entry_id == target_entry_id && reference.target_path == target_path
            });
        }
        Self { entries, truncated }
    }

    /// Referencing entries, most recently created first
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ReferencingEntry] {
        &self.entries
    }

    /// More matches exist than were fetched
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synthetic child keys, one per entry
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.entries.len()).map(external_ref_key)
    }

    /// Entry behind a synthetic key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ReferencingEntry> {
        match ItemKey::parse(key).reserved()? {
            ReservedKey::ExternalRef(index) => self.entries.get(index),
            _ => None,
        }
    }
}

fn target_key(address: &Address) -> TargetKey {
    (
        address.entry_id().unwrap_or_default().to_string(),
        address.path().to_slash_path(),
    )
}

impl Session {
    /// Back-references already loaded for `address`
    #[must_use]
    pub fn cached_back_references(&self, address: &Address) -> Option<Arc<BackReferences>> {
        let cell = self.back_reference_cache().get(&target_key(address))?;
        cell.value().get().cloned()
    }

    /// Entries referencing `address`, queried once per session
    ///
    /// # Errors
    /// [`NavError::SearchUnavailable`] without a search collaborator,
    /// [`NavError::Search`] if the query fails.
    pub async fn back_references(&self, address: &Address) -> NavResult<Arc<BackReferences>> {
        let search = self.search().ok_or(NavError::SearchUnavailable)?;
        let key = target_key(address);
        let cell = Arc::clone(self.back_reference_cache().entry(key.clone()).or_default().value());

        let references = cell
            .get_or_try_init(|| async {
                let (entry_id, path) = &key;
                let page_size = self.config().back_reference_page_size;
                debug!(%entry_id, %path, "Querying back-references");
                let request = SearchRequest::referencing(entry_id, path, page_size);
                let response = search.query(&request).await.map_err(NavError::Search)?;
                let references = BackReferences::new(response.data, entry_id, path, page_size);
                info!(
                    %entry_id,
                    %path,
                    found = references.len(),
                    truncated = references.is_truncated(),
                    "Loaded back-references"
                );
                Ok::<_, NavError>(Arc::new(references))
            })
            .await?;
        Ok(Arc::clone(references))
    }

    /// Forget loaded back-references of the entry `address` lives in
    pub(crate) fn forget_back_references(&self, address: &Address) {
        let entry_id = address.entry_id().unwrap_or_default();
        self.back_reference_cache()
            .retain(|(cached_entry, _), _| cached_entry != entry_id);
    }
}

impl Adaptor {
    /// Entries referencing this node
    ///
    /// Afterwards, `_external_ref_<n>` keys resolve to the root of the n-th
    /// referencing entry.
    ///
    /// # Errors
    /// As [`Session::back_references`].
    pub async fn back_references(&self) -> NavResult<Arc<BackReferences>> {
        self.session.back_references(&self.address).await
    }
}

//! Cached archive documents
//!
//! An [`ArchiveEntry`] is the single, shared, mutable copy of a fetched
//! archive. Adaptor nodes point into it instead of owning data, so in-place
//! edits are visible to every node and to later cache hits.

use crate::metadata::EntryMetadata;
use crate::source::{FetchedArchive, Fields};
use nav_address::{Address, DataPath};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Archive document with metadata and edit state
#[derive(Debug)]
pub struct ArchiveEntry {
    address: Address,
    fields: Fields,
    archive: RwLock<Value>,
    metadata: RwLock<EntryMetadata>,
    dirty: AtomicBool,
    /// Bumped by every applied edit, under the archive write lock
    generation: AtomicU64,
}

impl ArchiveEntry {
    /// Wrap a fetched archive; `address` is reduced to the entry root
    #[must_use]
    pub fn new(address: &Address, fields: Fields, fetched: FetchedArchive) -> Self {
        Self {
            address: address.entry_root(),
            fields,
            archive: RwLock::new(fetched.archive),
            metadata: RwLock::new(fetched.metadata),
            dirty: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Address of the archive root
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[inline]
    #[must_use]
    pub fn entry_id(&self) -> &str {
        self.address.entry_id().unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn deployment(&self) -> &str {
        self.address.deployment().unwrap_or_default()
    }

    /// Field selection this entry was fetched with
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Read access to the whole archive
    ///
    /// Do not hold the guard across an await point.
    pub fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.archive.read()
    }

    /// Read access to the fragment at `path`
    pub fn fragment(&self, path: &DataPath) -> Option<MappedRwLockReadGuard<'_, Value>> {
        RwLockReadGuard::try_map(self.archive.read(), |archive| path.locate(archive)).ok()
    }

    /// Copy of the fragment at `path`
    #[must_use]
    pub fn locate(&self, path: &DataPath) -> Option<Value> {
        path.locate(&self.archive.read()).cloned()
    }

    /// Copy of the whole archive
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.archive.read().clone()
    }

    /// Copy of the whole archive with the edit generation it reflects
    pub(crate) fn snapshot_with_generation(&self) -> (Value, u64) {
        let archive = self.archive.read();
        (archive.clone(), self.generation.load(Ordering::Acquire))
    }

    /// Edit the archive in place and mark it dirty
    pub fn edit<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut archive = self.archive.write();
        let result = f(&mut archive);
        self.applied();
        result
    }

    /// Edit the fragment at `path` in place
    ///
    /// `f` returns `None` to decline the edit. The entry is only marked
    /// dirty when the path exists and `f` applied a change; `f` must leave
    /// the fragment untouched when it declines.
    pub fn edit_at<R>(
        &self,
        path: &DataPath,
        f: impl FnOnce(&mut Value) -> Option<R>,
    ) -> Option<R> {
        let mut archive = self.archive.write();
        let result = f(path.locate_mut(&mut archive)?)?;
        self.applied();
        Some(result)
    }

    /// Must be called with the archive write lock held
    fn applied(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.mark_dirty();
    }

    #[must_use]
    pub fn metadata(&self) -> EntryMetadata {
        self.metadata.read().clone()
    }

    /// Upstream revision the local copy is based on
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.metadata.read().revision
    }

    /// Whether the backend allows editing this entry
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.metadata.read().editable
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Check for unsaved local edits
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Record a successful save of the snapshot taken at `generation`
    ///
    /// Edits applied after that snapshot keep the entry dirty.
    pub(crate) fn saved(&self, revision: u64, generation: u64) {
        // holding the read lock keeps edits out between the check and the store
        let _archive = self.archive.read();
        self.metadata.write().revision = revision;
        if self.generation.load(Ordering::Acquire) == generation {
            self.dirty.store(false, Ordering::Release);
        }
    }
}

//! Navigation sessions
//!
//! A [`Session`] bundles the collaborators every adaptor node needs: the
//! document store, the schema store, the optional back-reference search and
//! the configuration. It is cheap to clone; nodes keep a clone.

use crate::adaptor::{Adaptor, AdaptorKind, ATTRIBUTES_FIELD};
use crate::config::NavConfig;
use crate::error::NavResult;
use crate::external::BackReferenceCache;
use crate::fragment::Fragment;
use crate::packages::ArchivePackageSource;
use nav_address::{Address, DataPath, Segment};
use nav_metainfo::{Property, SchemaSource, SchemaStore};
use nav_store::{ArchiveSource, DocumentStore, SearchClient};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

struct SessionInner {
    documents: DocumentStore,
    schemas: Arc<SchemaStore>,
    search: Option<Arc<dyn SearchClient>>,
    config: NavConfig,
    back_references: BackReferenceCache,
}

/// Shared context of one navigation session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start building a session over `archives` and system `schemas`
    #[must_use]
    pub fn builder(
        archives: Arc<dyn ArchiveSource>,
        schemas: Arc<dyn SchemaSource>,
    ) -> SessionBuilder {
        SessionBuilder {
            archives,
            schemas,
            config: NavConfig::default(),
            search: None,
            schema_store: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.inner.documents
    }

    #[inline]
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaStore> {
        &self.inner.schemas
    }

    #[inline]
    #[must_use]
    pub fn search(&self) -> Option<&Arc<dyn SearchClient>> {
        self.inner.search.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &NavConfig {
        &self.inner.config
    }

    pub(crate) fn back_reference_cache(&self) -> &BackReferenceCache {
        &self.inner.back_references
    }

    /// Open the node at `address`
    ///
    /// The archive root is described by the configured root section; path
    /// segments are resolved as child keys from there.
    ///
    /// # Errors
    /// [`AddressError`](nav_address::AddressError) for unresolved or
    /// non-archive addresses, store and schema errors, and anything
    /// [`Adaptor::resolve_child`] reports along the path.
    pub async fn open(&self, address: &Address) -> NavResult<Adaptor> {
        let mut node = self.open_root(address).await?;
        let segments = address.path().segments();
        let mut position = 0;
        while position < segments.len() {
            let (key, used) = path_key(&node, &segments[position..]);
            node = node.resolve_child(&key).await?;
            position += used;
        }
        Ok(node)
    }

    /// Open the archive root of the entry `address` lives in
    ///
    /// # Errors
    /// As [`Session::open`].
    pub async fn open_root(&self, address: &Address) -> NavResult<Adaptor> {
        address.require_archive()?;
        let root = address.entry_root();
        let entry = self.documents().get_document(&root, &self.config().fields).await?;
        let fragment = Fragment::located(entry, DataPath::root());
        let expected = self
            .schemas()
            .section(&self.config().root_section, Some(&root))
            .await?;
        let section = self.effective_section(expected, &fragment, &root).await?;
        debug!(address = %root, section = section.qualified_name(), "Opened archive root");

        let in_eln = section.is_editable();
        let mut node = Adaptor::new(self.clone(), root, fragment, AdaptorKind::Section(section));
        node.in_eln = in_eln;
        Ok(node)
    }

    /// Persist local edits of the entry `address` lives in
    ///
    /// Clean or uncached entries are left alone.
    ///
    /// # Errors
    /// [`StoreError::Conflict`](nav_store::StoreError::Conflict) if the entry
    /// changed upstream; reload to discard local edits.
    pub async fn save(&self, address: &Address) -> NavResult<()> {
        if let Some(entry) = self.documents().cached(address, &self.config().fields).await {
            self.documents().save(&entry).await?;
        }
        Ok(())
    }

    /// Drop the cached entry, discarding local edits, and reopen `address`
    ///
    /// # Errors
    /// As [`Session::open`].
    pub async fn reload(&self, address: &Address) -> NavResult<Adaptor> {
        self.documents().invalidate(address, &self.config().fields).await?;
        self.forget_back_references(address);
        info!(address = %address, "Reloading entry");
        self.open(address).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("documents", &self.inner.documents)
            .field("schemas", &self.inner.schemas)
            .field("search", &self.inner.search.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    archives: Arc<dyn ArchiveSource>,
    schemas: Arc<dyn SchemaSource>,
    config: NavConfig,
    search: Option<Arc<dyn SearchClient>>,
    schema_store: Option<Arc<SchemaStore>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn config(mut self, config: NavConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable back-reference lookups
    #[must_use]
    pub fn search(mut self, search: Arc<dyn SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    /// Share an existing schema store instead of creating one
    ///
    /// The store should be able to serve packages embedded in archives, see
    /// [`ArchivePackageSource`].
    #[must_use]
    pub fn schema_store(mut self, schemas: Arc<SchemaStore>) -> Self {
        self.schema_store = Some(schemas);
        self
    }

    #[must_use]
    pub fn build(self) -> Session {
        let documents =
            DocumentStore::with_capacity(self.archives, self.config.document_cache_capacity);
        let schemas = self.schema_store.unwrap_or_else(|| {
            let source = ArchivePackageSource::new(
                documents.clone(),
                self.config.fields.clone(),
                self.schemas,
            );
            Arc::new(SchemaStore::with_capacity(
                Arc::new(source),
                self.config.schema_cache_capacity,
            ))
        });
        Session {
            inner: Arc::new(SessionInner {
                documents,
                schemas,
                search: self.search,
                config: self.config,
                back_references: BackReferenceCache::default(),
            }),
        }
    }
}

/// Child key for the next path segments below `node`, and how many it uses
///
/// Indices, variant names and attribute names occupy their own segment in
/// addresses but belong to the key of the preceding name.
fn path_key(node: &Adaptor, segments: &[Segment]) -> (String, usize) {
    let name = segments[0].to_string();
    let next = segments.get(1);
    let joined = |next: &Segment| (format!("{name}:{next}"), 2);

    match (node.kind(), next) {
        (_, None) => (name, 1),
        (AdaptorKind::Section(_), Some(next)) if name == ATTRIBUTES_FIELD => joined(next),
        (AdaptorKind::Quantity { .. }, Some(next)) if name == ATTRIBUTES_FIELD => (next.to_string(), 2),
        (AdaptorKind::Section(section), Some(next)) => match section.property(&name) {
            Some(Property::SubSection(sub_section)) if sub_section.repeats() && next.is_index() => {
                joined(next)
            }
            Some(Property::Quantity(quantity))
                if quantity.uses_variant_storage()
                    || (quantity.is_reference() && quantity.dimensions() == 1 && next.is_index()) =>
            {
                joined(next)
            }
            _ => (name, 1),
        },
        _ => (name, 1),
    }
}

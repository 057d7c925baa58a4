//! Schema packages embedded in archives
//!
//! Archives may carry their own schema under `definitions`. Section
//! definitions there are addressed as `entry_id:<entry>.<Section>` or through
//! archive addresses, and are served from the document store.

use async_trait::async_trait;
use nav_address::{Address, DataPath};
use nav_metainfo::{PackageLocator, PackageSpec, SchemaError, SchemaResult, SchemaSource};
use nav_store::{DocumentStore, Fields};
use std::sync::Arc;
use tracing::debug;

/// Archive field holding an embedded package
pub const DEFINITIONS_FIELD: &str = "definitions";

/// Serves entry packages from archives and delegates system packages
pub struct ArchivePackageSource {
    documents: DocumentStore,
    fields: Fields,
    system: Arc<dyn SchemaSource>,
}

impl ArchivePackageSource {
    /// `fields` is the selection archives are fetched with elsewhere, so the
    /// package fetch can share that cache entry when it includes definitions
    #[must_use]
    pub fn new(documents: DocumentStore, fields: Fields, system: Arc<dyn SchemaSource>) -> Self {
        let fields = if fields.includes(DEFINITIONS_FIELD) {
            fields
        } else {
            Fields::only([DEFINITIONS_FIELD])
        };
        Self {
            documents,
            fields,
            system,
        }
    }
}

#[async_trait]
impl SchemaSource for ArchivePackageSource {
    async fn fetch_package(&self, locator: &PackageLocator) -> SchemaResult<PackageSpec> {
        let PackageLocator::Entry {
            deployment,
            entry_id,
        } = locator
        else {
            return self.system.fetch_package(locator).await;
        };

        debug!(%locator, "Reading package from archive");
        let address = Address::archive(deployment.as_str(), None, entry_id.as_str(), DataPath::root());
        let entry = self
            .documents
            .get_document(&address, &self.fields)
            .await
            .map_err(|e| SchemaError::source(locator.clone(), e))?;
        let definitions = entry
            .locate(&DataPath::root().child(DEFINITIONS_FIELD))
            .ok_or_else(|| SchemaError::source(locator.clone(), "archive has no definitions"))?;
        serde_json::from_value(definitions).map_err(|e| SchemaError::source(locator.clone(), e))
    }
}

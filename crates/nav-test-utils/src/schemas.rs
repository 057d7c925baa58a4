use async_trait::async_trait;
use nav_metainfo::{PackageLocator, PackageSpec, SchemaError, SchemaResult, SchemaSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    packages: RwLock<HashMap<String, PackageSpec>>,
    fetches: AtomicUsize,
}

/// System packages held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaSource {
    inner: Arc<Inner>,
}

impl MemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(self, spec: PackageSpec) -> Self {
        self.insert(spec);
        self
    }

    pub fn insert(&self, spec: PackageSpec) {
        let name = spec.name.clone().unwrap_or_default();
        self.inner.packages.write().insert(name, spec);
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaSource for MemorySchemaSource {
    async fn fetch_package(&self, locator: &PackageLocator) -> SchemaResult<PackageSpec> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        match locator {
            PackageLocator::System(name) => self
                .inner
                .packages
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::source(locator.clone(), "no such package")),
            PackageLocator::Entry { .. } => Err(SchemaError::source(
                locator.clone(),
                "entry packages are not held here",
            )),
        }
    }
}

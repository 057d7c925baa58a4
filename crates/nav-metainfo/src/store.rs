//! Schema store
//!
//! Resolves definitions by address or qualified name. Packages are loaded
//! from a [`SchemaSource`] on first use; concurrent identical lookups share
//! a single in-flight resolution through moka.

use crate::definition::{Definition, PackageDef, PackageOrigin, SectionDef};
use crate::error::{SchemaError, SchemaResult};
use crate::registry::DefinitionIndex;
use crate::spec::PackageSpec;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use moka::future::Cache;
use nav_address::{Address, AddressError, AddressKind, Segment};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of memoized definition lookups
pub const DEFAULT_SCHEMA_CACHE_CAPACITY: u64 = 10_000;

const ENTRY_PACKAGE_PREFIX: &str = "entry_id:";

/// Identifies a package for a [`SchemaSource`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageLocator {
    /// Package shipped with the deployment, by name
    System(String),
    /// Package embedded in an archive
    Entry { deployment: String, entry_id: String },
}

impl Display for PackageLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::System(name) => write!(f, "'{name}'"),
            Self::Entry {
                deployment,
                entry_id,
            } => write!(f, "of entry '{entry_id}' at {deployment}"),
        }
    }
}

/// Provider of serialized schema packages
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the package identified by `locator`
    ///
    /// # Errors
    /// [`SchemaError::Source`] if the package cannot be delivered.
    async fn fetch_package(&self, locator: &PackageLocator) -> SchemaResult<PackageSpec>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DefinitionKey {
    address: Address,
    /// Deployment used to locate `entry_id:` qualified names
    deployment: Option<String>,
}

/// Process wide schema store
pub struct SchemaStore {
    index: DefinitionIndex,
    source: Arc<dyn SchemaSource>,
    definitions: Cache<DefinitionKey, Definition>,
    specs: Cache<PackageLocator, Arc<PackageSpec>>,
}

impl Debug for SchemaStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaStore")
            .field("sections", &self.index.section_count())
            .field("memoized", &self.definitions.entry_count())
            .finish_non_exhaustive()
    }
}

impl SchemaStore {
    /// Create store over `source` with the default capacity
    #[must_use]
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self::with_capacity(source, DEFAULT_SCHEMA_CACHE_CAPACITY)
    }

    /// Create store with a bounded number of memoized lookups
    #[must_use]
    pub fn with_capacity(source: Arc<dyn SchemaSource>, capacity: u64) -> Self {
        Self {
            index: DefinitionIndex::new(),
            source,
            definitions: Cache::new(capacity),
            specs: Cache::new(capacity),
        }
    }

    /// Resolve the definition at a resolved address
    ///
    /// Accepts metainfo addresses (qualified names, optionally with an
    /// `@definition_id` qualifier) and archive addresses into a
    /// `definitions` package.
    ///
    /// # Errors
    /// [`SchemaError::UnknownDefinition`] on a lookup miss,
    /// [`SchemaError::Address`] for unresolved or unsupported addresses,
    /// [`SchemaError::Source`] if a package fails to load.
    pub async fn get_definition(&self, address: &Address) -> SchemaResult<Definition> {
        self.memoized(DefinitionKey {
            address: address.clone(),
            deployment: address.deployment().map(str::to_string),
        })
        .await
    }

    /// Resolve a definition reference as it appears in data (`m_def`)
    ///
    /// Relative references are anchored at `context`.
    ///
    /// # Errors
    /// As [`SchemaStore::get_definition`]; [`AddressError::Malformed`] if
    /// `name` is not a valid reference.
    pub async fn get_definition_by_qualified_name(
        &self,
        name: &str,
        context: Option<&Address>,
    ) -> SchemaResult<Definition> {
        let address = Address::parse(name)?;
        let address = match context {
            Some(context) if !address.is_resolved() => address.resolve(context)?,
            _ => address,
        };
        let deployment = match address.kind() {
            AddressKind::Metainfo => context.and_then(Address::deployment).map(str::to_string),
            _ => address.deployment().map(str::to_string),
        };
        self.memoized(DefinitionKey {
            address,
            deployment,
        })
        .await
    }

    /// Resolve a reference that must name a section
    ///
    /// # Errors
    /// [`SchemaError::NotASection`] if it resolves to something else.
    pub async fn section(
        &self,
        name: &str,
        context: Option<&Address>,
    ) -> SchemaResult<Arc<SectionDef>> {
        if let Some(section) = self.index.section(name) {
            return Ok(section);
        }
        match self.get_definition_by_qualified_name(name, context).await? {
            Definition::Section(section) => Ok(section),
            _ => Err(SchemaError::NotASection(name.to_string())),
        }
    }

    /// Already registered section, without loading anything
    #[must_use]
    pub fn cached_section(&self, qualified_name: &str) -> Option<Arc<SectionDef>> {
        self.index.section(qualified_name)
    }

    /// `section` first, then every registered section specializing it
    #[must_use]
    pub fn get_inheriting_sections(&self, section: &Arc<SectionDef>) -> Vec<Arc<SectionDef>> {
        self.index.inheriting(section)
    }

    /// Register a package found embedded in a fetched document
    ///
    /// System packages its sections build on are loaded first.
    ///
    /// # Errors
    /// [`SchemaError::InvalidPackage`] for unnamed system packages.
    pub async fn register_package(
        &self,
        spec: &PackageSpec,
        origin: PackageOrigin,
    ) -> SchemaResult<Arc<PackageDef>> {
        let name = match &origin {
            PackageOrigin::System => spec.name.clone().unwrap_or_default(),
            PackageOrigin::Entry { entry_id, .. } => format!("{ENTRY_PACKAGE_PREFIX}{entry_id}"),
        };
        let mut loading = vec![name];
        self.load_dependencies(spec, &mut loading).await;
        self.index.register(spec, origin)
    }

    /// Load and register a package unless it is already known
    ///
    /// # Errors
    /// [`SchemaError::Source`] if the source fails.
    pub async fn load_package(&self, locator: &PackageLocator) -> SchemaResult<Arc<PackageDef>> {
        self.load_guarded(locator, &mut Vec::new()).await
    }

    fn load_guarded<'a>(
        &'a self,
        locator: &'a PackageLocator,
        loading: &'a mut Vec<String>,
    ) -> BoxFuture<'a, SchemaResult<Arc<PackageDef>>> {
        async move {
            let (name, origin) = match locator {
                PackageLocator::System(name) => (name.clone(), PackageOrigin::System),
                PackageLocator::Entry {
                    deployment,
                    entry_id,
                } => (
                    format!("{ENTRY_PACKAGE_PREFIX}{entry_id}"),
                    PackageOrigin::Entry {
                        deployment: deployment.clone(),
                        entry_id: entry_id.clone(),
                    },
                ),
            };
            if let Some(package) = self.index.package(&name) {
                return Ok(package);
            }

            let spec = self
                .specs
                .try_get_with(locator.clone(), async {
                    debug!(%locator, "Fetching schema package");
                    self.source.fetch_package(locator).await.map(Arc::new)
                })
                .await
                .map_err(|e| (*e).clone())?;

            loading.push(name);
            self.load_dependencies(&spec, loading).await;
            self.index.register(&spec, origin)
        }
        .boxed()
    }

    /// Load the system packages that base sections of `spec` live in
    async fn load_dependencies(&self, spec: &PackageSpec, loading: &mut Vec<String>) {
        for package in base_packages(spec) {
            if loading.contains(&package) || self.index.package(&package).is_some() {
                continue;
            }
            let locator = PackageLocator::System(package);
            if let Err(e) = self.load_guarded(&locator, loading).await {
                warn!(%locator, error = %e, "Failed to load base section package");
            }
        }
    }

    async fn memoized(&self, key: DefinitionKey) -> SchemaResult<Definition> {
        if !key.address.is_resolved() {
            return Err(AddressError::Unresolvable {
                input: key.address.to_string(),
                reason: "definitions are looked up by resolved address".to_string(),
            }
            .into());
        }
        self.definitions
            .try_get_with(key.clone(), self.resolve(key))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn resolve(&self, key: DefinitionKey) -> SchemaResult<Definition> {
        debug!(address = %key.address, "Resolving definition");
        let address = &key.address;
        match address.kind() {
            AddressKind::Metainfo => {
                let name = address.qualified_name().unwrap_or_default();
                self.resolve_qualified(name, address.version(), key.deployment.as_deref())
                    .await
            }
            AddressKind::Archive => self.resolve_archive(address).await,
            AddressKind::Upload | AddressKind::Raw => Err(AddressError::WrongKind {
                input: address.to_string(),
                expected: AddressKind::Metainfo,
            }
            .into()),
        }
    }

    async fn resolve_qualified(
        &self,
        name: &str,
        version: Option<&str>,
        deployment: Option<&str>,
    ) -> SchemaResult<Definition> {
        if let Some(version) = version {
            if let Some(section) = self.index.section_by_definition_id(version) {
                return Ok(Definition::Section(section));
            }
            warn!(%name, %version, "Unknown definition version, falling back to name");
        }
        if let Some(found) = self.lookup(name) {
            return Ok(found);
        }

        let locator = if let Some(rest) = name.strip_prefix(ENTRY_PACKAGE_PREFIX) {
            let entry_id = rest.split_once('.').map_or(rest, |(entry, _)| entry);
            let deployment = deployment
                .ok_or_else(|| SchemaError::UnknownDefinition(name.to_string()))?;
            PackageLocator::Entry {
                deployment: deployment.to_string(),
                entry_id: entry_id.to_string(),
            }
        } else {
            let (package, _) = name
                .rsplit_once('.')
                .ok_or_else(|| SchemaError::UnknownDefinition(name.to_string()))?;
            PackageLocator::System(package.to_string())
        };
        self.load_package(&locator).await?;

        if let Some(section) = version.and_then(|v| self.index.section_by_definition_id(v)) {
            return Ok(Definition::Section(section));
        }
        self.lookup(name)
            .ok_or_else(|| SchemaError::UnknownDefinition(name.to_string()))
    }

    fn lookup(&self, name: &str) -> Option<Definition> {
        if let Some(section) = self.index.section(name) {
            return Some(Definition::Section(section));
        }
        self.index.package(name).map(Definition::Package)
    }

    /// `definitions/section_definitions/<i|name>[/<kind>/<i|name>]` inside an archive
    async fn resolve_archive(&self, address: &Address) -> SchemaResult<Definition> {
        let unknown = || SchemaError::UnknownDefinition(address.to_string());
        let segments = address.path().segments();
        if segments.first().and_then(Segment::as_name) != Some("definitions") {
            return Err(unknown());
        }
        let (Some(deployment), Some(entry_id)) = (address.deployment(), address.entry_id()) else {
            return Err(unknown());
        };
        let package = self
            .load_package(&PackageLocator::Entry {
                deployment: deployment.to_string(),
                entry_id: entry_id.to_string(),
            })
            .await?;
        if let Some(section) = address.version().and_then(|v| self.index.section_by_definition_id(v)) {
            return Ok(Definition::Section(section));
        }

        match &segments[1..] {
            [] => Ok(Definition::Package(package)),
            [Segment::Name(kind), token, rest @ ..] if kind == "section_definitions" => {
                let name = match token {
                    Segment::Index(i) => package.sections().get(*i).cloned(),
                    Segment::Name(name) => Some(format!("{}.{name}", package.name())),
                }
                .ok_or_else(unknown)?;
                let section = self.index.section(&name).ok_or_else(unknown)?;
                match rest {
                    [] => Ok(Definition::Section(section)),
                    [Segment::Name(kind), token] => {
                        property_definition(&section, kind, token).ok_or_else(unknown)
                    }
                    _ => Err(unknown()),
                }
            }
            _ => Err(unknown()),
        }
    }
}

/// Packages of base sections referenced by qualified name
fn base_packages(spec: &PackageSpec) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    let references = spec
        .section_definitions
        .iter()
        .flat_map(|section| &section.base_sections);
    for reference in references {
        let subject = reference.split_once('@').map_or(reference.as_str(), |(s, _)| s);
        if subject.starts_with(['#', '/', '.']) || subject.starts_with(ENTRY_PACKAGE_PREFIX) {
            continue;
        }
        if let Some((package, _)) = subject.rsplit_once('.') {
            if !packages.iter().any(|p| p == package) {
                packages.push(package.to_string());
            }
        }
    }
    packages
}

fn property_definition(section: &SectionDef, kind: &str, token: &Segment) -> Option<Definition> {
    let own = &section.own;
    let pick = |names: &[String]| match token {
        Segment::Index(i) => names.get(*i).cloned(),
        Segment::Name(name) => Some(name.clone()),
    };
    match kind {
        "quantities" => {
            let name = pick(&own.quantities)?;
            section.quantity(&name).cloned().map(Definition::Quantity)
        }
        "sub_sections" => {
            let name = pick(&own.sub_sections)?;
            section.sub_section(&name).cloned().map(Definition::SubSection)
        }
        "attributes" => {
            let name = pick(&own.attributes)?;
            section.attribute(&name).cloned().map(Definition::Attribute)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Packages {
        specs: HashMap<PackageLocator, PackageSpec>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SchemaSource for Packages {
        async fn fetch_package(&self, locator: &PackageLocator) -> SchemaResult<PackageSpec> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.specs
                .get(locator)
                .cloned()
                .ok_or_else(|| SchemaError::source(locator.clone(), "not found"))
        }
    }

    const DEPLOYMENT: &str = "https://nomad.example/api/v1";

    fn source() -> Arc<Packages> {
        let mut specs = HashMap::new();
        specs.insert(
            PackageLocator::System("nomad.datamodel".into()),
            serde_json::from_value(json!({
                "name": "nomad.datamodel",
                "section_definitions": [
                    {"name": "EntryArchive", "sub_sections": [{"name": "data", "sub_section": "EntryData"}]},
                    {"name": "EntryData", "definition_id": "ed-1"}
                ]
            }))
            .unwrap(),
        );
        specs.insert(
            PackageLocator::Entry {
                deployment: DEPLOYMENT.into(),
                entry_id: "E1".into(),
            },
            serde_json::from_value(json!({
                "section_definitions": [{
                    "name": "Experiment",
                    "base_sections": ["nomad.datamodel.EntryData"],
                    "quantities": [{"name": "title", "type": {"kind": "plain", "data": "str"}}]
                }]
            }))
            .unwrap(),
        );
        Arc::new(Packages {
            specs,
            fetches: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn qualified_name_loads_package_once() {
        let source = source();
        let store = SchemaStore::new(source.clone());

        let (a, b) = tokio::join!(
            store.get_definition_by_qualified_name("nomad.datamodel.EntryArchive", None),
            store.get_definition_by_qualified_name("nomad.datamodel.EntryArchive", None),
        );
        assert!(a.unwrap().same_as(&b.unwrap()));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        let data = store.section("nomad.datamodel.EntryData", None).await.unwrap();
        assert_eq!(data.definition_id(), Some("ed-1"));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_names_fail() {
        let store = SchemaStore::new(source());
        let err = store
            .get_definition_by_qualified_name("nomad.datamodel.Missing", None)
            .await
            .unwrap_err();
        assert!(err.is_unknown());

        let err = store
            .get_definition_by_qualified_name("other.Thing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Source { .. }));
    }

    #[tokio::test]
    async fn archive_definition_paths() {
        let store = SchemaStore::new(source());
        store.load_package(&PackageLocator::System("nomad.datamodel".into())).await.unwrap();
        let context = Address::parse(&format!("{DEPLOYMENT}/uploads/U1/archive/E1#/data")).unwrap();

        let section = store
            .get_definition_by_qualified_name("#/definitions/section_definitions/0", Some(&context))
            .await
            .unwrap();
        assert_eq!(section.as_section().unwrap().qualified_name(), "entry_id:E1.Experiment");

        let quantity = store
            .get_definition_by_qualified_name(
                "#/definitions/section_definitions/Experiment/quantities/0",
                Some(&context),
            )
            .await
            .unwrap();
        assert_eq!(quantity.as_quantity().unwrap().name(), "title");

        let by_name = store
            .get_definition_by_qualified_name("entry_id:E1.Experiment", Some(&context))
            .await
            .unwrap();
        assert!(by_name.same_as(&section));

        let package = store
            .get_definition_by_qualified_name("#/definitions", Some(&context))
            .await
            .unwrap();
        assert_eq!(package.name(), "entry_id:E1");
    }

    #[tokio::test]
    async fn version_qualifier_selects_by_definition_id() {
        let store = SchemaStore::new(source());
        let found = store
            .get_definition_by_qualified_name("nomad.datamodel.EntryData@ed-1", None)
            .await
            .unwrap();
        assert_eq!(found.name(), "EntryData");

        let by_version = store
            .get_definition_by_qualified_name("nomad.datamodel.Renamed@ed-1", None)
            .await
            .unwrap();
        assert!(by_version.same_as(&found));

        // unknown versions fall back to the name
        let stale = store
            .get_definition_by_qualified_name("nomad.datamodel.EntryArchive@stale", None)
            .await
            .unwrap();
        assert_eq!(stale.name(), "EntryArchive");
    }

    #[tokio::test]
    async fn inheriting_sections_include_embedded_packages() {
        let store = SchemaStore::new(source());
        let context = Address::parse(&format!("{DEPLOYMENT}/entries/E1/archive")).unwrap();
        store.section("entry_id:E1.Experiment", Some(&context)).await.unwrap();

        let base = store.cached_section("nomad.datamodel.EntryData").unwrap();
        let names: Vec<_> = store
            .get_inheriting_sections(&base)
            .iter()
            .map(|s| s.qualified_name().to_string())
            .collect();
        assert_eq!(names, vec!["nomad.datamodel.EntryData", "entry_id:E1.Experiment"]);
    }

    #[tokio::test]
    async fn relative_reference_without_context_is_unresolvable() {
        let store = SchemaStore::new(source());
        let err = store
            .get_definition_by_qualified_name("#/definitions/section_definitions/0", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Address(AddressError::Unresolvable { .. })));
    }
}

//! Adaptor nodes and child key resolution
//!
//! An [`Adaptor`] combines an archive address, the data fragment found there
//! and the effective definition of that data. Children are resolved lazily
//! with [`Adaptor::resolve_child`]; every step may fetch documents or schema
//! packages.

use crate::error::{NavError, NavResult};
use crate::fragment::Fragment;
use crate::key::{ItemKey, KeyIndex, ReservedKey};
use crate::reference::UnresolvedReason;
use crate::session::Session;
use nav_address::{Address, DataPath, Segment};
use nav_metainfo::{
    AttributeDef, Definition, PackageOrigin, PackageSpec, Property, QuantityDef, SchemaError,
    SectionDef, SubSectionDef, PACKAGE_DEFINITION,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Data field holding attribute values
pub const ATTRIBUTES_FIELD: &str = "m_attributes";

/// Data field declaring the concrete section definition
pub const M_DEF_FIELD: &str = "m_def";

/// Data field qualifying [`M_DEF_FIELD`] with a definition version
pub const M_DEF_ID_FIELD: &str = "m_def_id";

/// What a node shows
#[derive(Debug, Clone)]
pub enum AdaptorKind {
    /// Section data with its effective definition
    Section(Arc<SectionDef>),
    /// Quantity value, optionally bound to one variant of variant storage
    Quantity {
        definition: Arc<QuantityDef>,
        variant: Option<String>,
    },
    Attribute(Arc<AttributeDef>),
    /// Reference that could not be followed
    UnresolvedReference {
        value: Value,
        expected: Arc<QuantityDef>,
        reason: UnresolvedReason,
    },
    /// Schema introspection
    Metainfo(Definition),
    /// Handed over to the raw file viewer
    RawFile(RawFileHandle),
}

/// Location of a raw file shown instead of a quantity value
#[derive(Debug, Clone)]
pub struct RawFileHandle {
    /// Raw address inside the upload
    pub address: Address,
    pub index: Option<KeyIndex>,
    pub quantity: Arc<QuantityDef>,
}

/// Link from a subsection node back to the section holding it
#[derive(Debug, Clone)]
pub struct ParentLink {
    pub parent: Fragment,
    pub sub_section: Arc<SubSectionDef>,
    /// Position for repeating subsections
    pub index: Option<usize>,
}

/// Navigable view of one archive location
#[derive(Clone)]
pub struct Adaptor {
    pub(crate) session: Session,
    pub(crate) address: Address,
    pub(crate) fragment: Fragment,
    pub(crate) kind: AdaptorKind,
    pub(crate) property: Option<Definition>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) in_eln: bool,
}

impl Adaptor {
    pub(crate) fn new(
        session: Session,
        address: Address,
        fragment: Fragment,
        kind: AdaptorKind,
    ) -> Self {
        debug_assert!(address.is_resolved());
        Self {
            session,
            address,
            fragment,
            kind,
            property: None,
            parent: None,
            in_eln: false,
        }
    }

    /// Node sharing session and ELN state with `self`
    pub(crate) fn derive(&self, address: Address, fragment: Fragment, kind: AdaptorKind) -> Self {
        Self {
            in_eln: self.in_eln,
            ..Self::new(self.session.clone(), address, fragment, kind)
        }
    }

    fn with_property(mut self, property: Definition) -> Self {
        self.property = Some(property);
        self
    }

    #[inline]
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[inline]
    #[must_use]
    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &AdaptorKind {
        &self.kind
    }

    /// Property this node was reached through
    #[inline]
    #[must_use]
    pub fn property(&self) -> Option<&Definition> {
        self.property.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Node lies in an electronic lab notebook region of the schema
    #[inline]
    #[must_use]
    pub fn is_in_eln(&self) -> bool {
        self.in_eln
    }

    /// Node lies in an ELN region of an entry the backend allows editing
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.in_eln && self.fragment.entry().is_some_and(|entry| entry.is_editable())
    }

    /// Current data value
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.fragment.value()
    }

    /// Effective section definition, for section nodes
    #[must_use]
    pub fn section(&self) -> Option<&Arc<SectionDef>> {
        match &self.kind {
            AdaptorKind::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Definition describing this node
    #[must_use]
    pub fn definition(&self) -> Definition {
        match &self.kind {
            AdaptorKind::Section(section) => Definition::Section(Arc::clone(section)),
            AdaptorKind::Quantity { definition, .. } => Definition::Quantity(Arc::clone(definition)),
            AdaptorKind::Attribute(attribute) => Definition::Attribute(Arc::clone(attribute)),
            AdaptorKind::UnresolvedReference { expected, .. } => {
                Definition::Quantity(Arc::clone(expected))
            }
            AdaptorKind::Metainfo(definition) => definition.clone(),
            AdaptorKind::RawFile(handle) => Definition::Quantity(Arc::clone(&handle.quantity)),
        }
    }

    /// Both nodes view the same data through the same definition
    #[must_use]
    pub fn same_node(&self, other: &Self) -> bool {
        self.address == other.address
            && self.fragment.same_as(&other.fragment)
            && self.definition().same_as(&other.definition())
    }

    /// Resolve the child reached by `key`
    ///
    /// # Errors
    /// [`NavError::UnknownKey`] if nothing answers to `key`,
    /// [`NavError::IndexOutOfRange`] for positions outside a repeating
    /// subsection, schema and store errors while loading what the child
    /// needs. Unfollowable references are not errors.
    pub async fn resolve_child(&self, key: &str) -> NavResult<Self> {
        let key = ItemKey::parse(key);
        if let Some(reserved) = key.reserved() {
            return self.resolve_reserved(reserved, &key).await;
        }
        match &self.kind {
            AdaptorKind::Section(section) => self.section_child(section, &key).await,
            AdaptorKind::Quantity { definition, .. } => self.quantity_attribute(definition, &key),
            AdaptorKind::Metainfo(definition) => self.metainfo_child(definition, &key).await,
            _ => Err(self.unknown(&key)),
        }
    }

    /// Resolve a chain of keys starting at this node
    ///
    /// # Errors
    /// The first error of [`Adaptor::resolve_child`].
    pub async fn resolve_path<I, S>(&self, keys: I) -> NavResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node = self.clone();
        for key in keys {
            node = node.resolve_child(key.as_ref()).await?;
        }
        Ok(node)
    }

    pub(crate) fn unknown(&self, key: &ItemKey) -> NavError {
        NavError::unknown_key(key.to_string(), &self.address)
    }

    async fn resolve_reserved(&self, reserved: ReservedKey, key: &ItemKey) -> NavResult<Self> {
        match reserved {
            ReservedKey::Metainfo => Ok(self.metainfo_node(self.definition())),
            ReservedKey::SubSectionMetainfo => self
                .property
                .clone()
                .map(|property| self.metainfo_node(property))
                .ok_or_else(|| self.unknown(key)),
            ReservedKey::ExternalRef(index) => {
                let referencing = self
                    .session
                    .cached_back_references(&self.address)
                    .and_then(|refs| refs.entries().get(index).cloned())
                    .ok_or_else(|| self.unknown(key))?;
                let deployment = self.address.deployment().unwrap_or_default();
                let address = Address::archive(
                    deployment,
                    referencing.upload_id.clone(),
                    referencing.entry_id.clone(),
                    DataPath::root(),
                );
                self.session.open_root(&address).await
            }
        }
    }

    fn metainfo_node(&self, definition: Definition) -> Self {
        Self::new(
            self.session.clone(),
            self.address.clone(),
            Fragment::detached(Value::Null),
            AdaptorKind::Metainfo(definition),
        )
    }

    /// Value of property `name` inside this node, falling back to `default`
    fn property_value(&self, name: &str, default: Option<&Value>) -> Fragment {
        let located = self.fragment.descend(name);
        match default {
            Some(default) if !located.is_present() => Fragment::detached(default.clone()),
            _ => located,
        }
    }

    async fn section_child(&self, section: &Arc<SectionDef>, key: &ItemKey) -> NavResult<Self> {
        let name = key.name();
        if name == ATTRIBUTES_FIELD {
            let attribute = key
                .index()
                .and_then(|index| section.attribute(&index.as_text()))
                .ok_or_else(|| self.unknown(key))?;
            return Ok(self.attribute_node(attribute));
        }

        match section.property(name).ok_or_else(|| self.unknown(key))? {
            Property::SubSection(sub_section) => self.sub_section_child(sub_section, key).await,
            Property::Quantity(quantity) => {
                let value = self.property_value(name, quantity.default());
                Ok(self.quantity_child(quantity, key, value).await)
            }
        }
    }

    async fn sub_section_child(
        &self,
        sub_section: Arc<SubSectionDef>,
        key: &ItemKey,
    ) -> NavResult<Self> {
        let name = sub_section.name().to_string();
        let value = self.fragment.descend(name.as_str());

        let (address, fragment, index) = if sub_section.repeats() {
            let len = value.len().unwrap_or(0);
            let requested = match key.index() {
                None => KeyIndex::Position(0),
                Some(KeyIndex::Variant(_)) => return Err(self.unknown(key)),
                Some(position) => position.clone(),
            };
            let position = requested.position(len).ok_or_else(|| NavError::IndexOutOfRange {
                key: key.to_string(),
                index: match requested {
                    KeyIndex::Position(index) => index,
                    KeyIndex::Variant(_) => 0,
                },
                len,
            })?;
            (
                self.address.append([Segment::Name(name), Segment::Index(position)]),
                value.descend(position),
                Some(position),
            )
        } else {
            (self.address.append([name]), value, None)
        };

        if fragment.string_field(M_DEF_FIELD).as_deref() == Some(PACKAGE_DEFINITION) {
            return self.package_node(address, &fragment).await;
        }

        let target = self
            .session
            .schemas()
            .section(sub_section.target(), Some(&address))
            .await?;
        let section = self
            .session
            .effective_section(target, &fragment, &address)
            .await?;

        let mut node = self.derive(address, fragment, AdaptorKind::Section(Arc::clone(&section)));
        node.in_eln = self.in_eln || section.is_editable();
        node.property = Some(Definition::SubSection(Arc::clone(&sub_section)));
        node.parent = Some(ParentLink {
            parent: self.fragment.clone(),
            sub_section,
            index,
        });
        Ok(node)
    }

    /// Register a package embedded in the archive and show its definitions
    async fn package_node(&self, address: Address, fragment: &Fragment) -> NavResult<Self> {
        let spec: PackageSpec = serde_json::from_value(fragment.value().unwrap_or_default())
            .map_err(|e| SchemaError::InvalidPackage {
                package: address.to_string(),
                reason: e.to_string(),
            })?;
        let origin = PackageOrigin::Entry {
            deployment: address.deployment().unwrap_or_default().to_string(),
            entry_id: address.entry_id().unwrap_or_default().to_string(),
        };
        let package = self.session.schemas().register_package(&spec, origin).await?;
        debug!(package = package.name(), "Showing embedded package");
        Ok(Self::new(
            self.session.clone(),
            address,
            fragment.clone(),
            AdaptorKind::Metainfo(Definition::Package(package)),
        ))
    }

    async fn quantity_child(&self, quantity: Arc<QuantityDef>, key: &ItemKey, value: Fragment) -> Self {
        if quantity.is_reference() {
            return self.reference_child(quantity, key, value).await;
        }
        if quantity.raw_file_adaptor() {
            if let Some(node) = self.raw_file_child(&quantity, key, &value) {
                return node;
            }
        }

        let name = quantity.name().to_string();
        let property = Definition::Quantity(Arc::clone(&quantity));
        let (address, fragment, variant) = match key.index() {
            Some(index) if quantity.uses_variant_storage() => {
                let variant = index.as_text();
                let segment = Segment::parse(&variant);
                (
                    self.address.append([Segment::Name(name), segment.clone()]),
                    value.descend(segment),
                    Some(variant),
                )
            }
            _ => (self.address.append([name]), value, None),
        };
        self.derive(
            address,
            fragment,
            AdaptorKind::Quantity {
                definition: quantity,
                variant,
            },
        )
        .with_property(property)
    }

    fn raw_file_child(&self, quantity: &Arc<QuantityDef>, key: &ItemKey, value: &Fragment) -> Option<Self> {
        let path = value.with(|v| v.and_then(Value::as_str).map(str::to_string))?;
        let upload_id = self.address.upload_id().map(str::to_string).or_else(|| {
            self.fragment
                .entry()
                .and_then(|entry| entry.metadata().upload_id)
        });
        let Some(upload_id) = upload_id else {
            warn!(address = %self.address, quantity = quantity.name(), "Raw file without known upload");
            return None;
        };
        let deployment = self.address.deployment()?;
        let raw = Address::raw(
            deployment,
            upload_id,
            DataPath::new(
                path.split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(Segment::parse)
                    .collect(),
            ),
        );
        let handle = RawFileHandle {
            address: raw,
            index: key.index().cloned(),
            quantity: Arc::clone(quantity),
        };
        Some(
            self.derive(
                self.address.append([quantity.name()]),
                value.clone(),
                AdaptorKind::RawFile(handle),
            )
            .with_property(Definition::Quantity(Arc::clone(quantity))),
        )
    }

    fn attribute_node(&self, attribute: &Arc<AttributeDef>) -> Self {
        let name = attribute.name();
        self.derive(
            self.address.append([ATTRIBUTES_FIELD, name]),
            self.fragment.descend(ATTRIBUTES_FIELD).descend(name),
            AdaptorKind::Attribute(Arc::clone(attribute)),
        )
        .with_property(Definition::Attribute(Arc::clone(attribute)))
    }

    fn quantity_attribute(&self, quantity: &Arc<QuantityDef>, key: &ItemKey) -> NavResult<Self> {
        match (quantity.attribute(key.name()), key.index()) {
            (Some(attribute), None) => Ok(self.attribute_node(attribute)),
            _ => Err(self.unknown(key)),
        }
    }

    /// Browse the schema graph from a metainfo node
    async fn metainfo_child(&self, definition: &Definition, key: &ItemKey) -> NavResult<Self> {
        let name = key.name();
        let schemas = self.session.schemas();
        let context = Some(&self.address);
        let child: Option<Definition> = match definition {
            Definition::Package(package) => {
                match package
                    .sections()
                    .iter()
                    .find(|qualified| qualified.rsplit_once('.').map(|(_, short)| short) == Some(name))
                {
                    Some(qualified) => Some(schemas.section(qualified, context).await?.into()),
                    None => None,
                }
            }
            Definition::Section(section) => match (name, key.index()) {
                ("base_sections", Some(index)) => {
                    let bases = section.base_sections();
                    match index.position(bases.len()).and_then(|p| bases.get(p)) {
                        Some(base) => Some(schemas.section(base, context).await?.into()),
                        None => None,
                    }
                }
                (ATTRIBUTES_FIELD, Some(index)) => section
                    .attribute(&index.as_text())
                    .cloned()
                    .map(Definition::Attribute),
                (_, None) => section.property(name).map(|property| property.definition()),
                _ => None,
            },
            Definition::SubSection(sub_section) if name == "sub_section" => {
                Some(schemas.section(sub_section.target(), context).await?.into())
            }
            Definition::Quantity(quantity) => match quantity.referenced_section() {
                Some(target) if name == "type" => Some(schemas.section(target, context).await?.into()),
                _ => quantity.attribute(name).cloned().map(Definition::Attribute),
            },
            _ => None,
        };
        child
            .map(|definition| self.metainfo_node(definition))
            .ok_or_else(|| self.unknown(key))
    }
}

impl fmt::Debug for Adaptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adaptor")
            .field("address", &self.address.to_string())
            .field("fragment", &self.fragment)
            .field("kind", &self.kind)
            .field("in_eln", &self.in_eln)
            .finish_non_exhaustive()
    }
}

//! Reference following
//!
//! Resolving a reference quantity never fails. Anything that prevents
//! following the reference turns into an
//! [`AdaptorKind::UnresolvedReference`] node that carries the raw value and
//! the expected definition, so sibling resolution continues unaffected.

use crate::adaptor::{Adaptor, AdaptorKind, M_DEF_FIELD};
use crate::error::NavResult;
use crate::fragment::Fragment;
use crate::key::ItemKey;
use nav_address::{Address, AddressKind, Segment};
use nav_metainfo::{Definition, Property, QuantityDef, SchemaError, SectionDef};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a reference was not followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// No reference value stored
    Missing,
    /// Stored value is not a reference string
    NotAString,
    /// More than one array dimension
    UnsupportedShape(usize),
    /// Value does not parse or cannot be anchored
    InvalidAddress(String),
    /// Target is not inside an archive
    UnsupportedKind(AddressKind),
    /// Target document could not be fetched
    Fetch(String),
    /// Target path does not exist in the target document
    BrokenPath(String),
    /// Target definition could not be determined
    UnknownDefinition(String),
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("no reference value"),
            Self::NotAString => f.write_str("reference value is not a string"),
            Self::UnsupportedShape(dimensions) => {
                write!(f, "references with {dimensions} dimensions are not followed")
            }
            Self::InvalidAddress(reason) => write!(f, "invalid reference: {reason}"),
            Self::UnsupportedKind(kind) => write!(f, "{kind} references are not followed"),
            Self::Fetch(reason) => write!(f, "target not available: {reason}"),
            Self::BrokenPath(path) => write!(f, "no data at {path}"),
            Self::UnknownDefinition(reason) => write!(f, "target definition unknown: {reason}"),
        }
    }
}

/// Definition found by walking the static archive schema
enum StaticTarget {
    Section(Arc<SectionDef>),
    Quantity(Arc<QuantityDef>),
}

impl Adaptor {
    pub(crate) async fn reference_child(
        &self,
        quantity: Arc<QuantityDef>,
        key: &ItemKey,
        value: Fragment,
    ) -> Self {
        let name = quantity.name().to_string();
        let (address, reference) = match quantity.dimensions() {
            0 => (self.address.append([name]), value.clone()),
            1 => {
                let len = value.len().unwrap_or(0);
                match key.index().and_then(|index| index.position(len)) {
                    Some(position) => (
                        self.address.append([Segment::Name(name), Segment::Index(position)]),
                        value.descend(position),
                    ),
                    None => (self.address.append([name]), Fragment::detached(Value::Null)),
                }
            }
            dimensions => {
                let raw = value.value().unwrap_or_default();
                return self.unresolved(
                    self.address.append([name]),
                    raw,
                    quantity,
                    UnresolvedReason::UnsupportedShape(dimensions),
                );
            }
        };

        match reference.value() {
            Some(Value::String(target)) if !target.is_empty() => {
                self.follow_reference(&target, quantity, address).await
            }
            Some(Value::Null | Value::String(_)) | None => {
                let raw = value.value().unwrap_or_default();
                self.unresolved(address, raw, quantity, UnresolvedReason::Missing)
            }
            Some(other) => self.unresolved(address, other, quantity, UnresolvedReason::NotAString),
        }
    }

    /// Follow `reference`, anchored at this node
    async fn follow_reference(
        &self,
        reference: &str,
        quantity: Arc<QuantityDef>,
        address: Address,
    ) -> Self {
        let raw = Value::String(reference.to_string());
        let target = match Address::parse(reference).and_then(|parsed| parsed.resolve(&self.address)) {
            Ok(target) => target,
            Err(e) => {
                return self.unresolved(address, raw, quantity, UnresolvedReason::InvalidAddress(e.to_string()))
            }
        };
        if target.kind() != AddressKind::Archive {
            let reason = UnresolvedReason::UnsupportedKind(target.kind());
            return self.unresolved(address, raw, quantity, reason);
        }

        let documents = self.session.documents();
        let entry = match documents.get_document(&target, &self.session.config().fields).await {
            Ok(entry) => entry,
            Err(e) => return self.unresolved(address, raw, quantity, UnresolvedReason::Fetch(e.to_string())),
        };
        let fragment = Fragment::located(entry, target.path().clone());
        if !fragment.is_present() {
            let reason = UnresolvedReason::BrokenPath(target.path().to_slash_path());
            return self.unresolved(address, raw, quantity, reason);
        }

        match self.reference_target(&quantity, &target, &fragment).await {
            Ok(StaticTarget::Section(section)) => {
                debug!(reference, target = %target, section = section.qualified_name(), "Followed reference");
                let in_eln = self.in_eln || section.is_editable();
                let mut node = self.derive(target, fragment, AdaptorKind::Section(section));
                node.in_eln = in_eln;
                node.property = Some(Definition::Quantity(quantity));
                node
            }
            Ok(StaticTarget::Quantity(definition)) => {
                let property = Definition::Quantity(Arc::clone(&quantity));
                let mut node = self.derive(
                    target,
                    fragment,
                    AdaptorKind::Quantity {
                        definition,
                        variant: None,
                    },
                );
                node.property = Some(property);
                node
            }
            Err(e) => self.unresolved(address, raw, quantity, UnresolvedReason::UnknownDefinition(e.to_string())),
        }
    }

    /// Definition of the referenced data
    ///
    /// Data declaring its own `m_def` starts from the referenced section of
    /// the quantity. Other data is described by the static archive schema at
    /// the target path, or by the referenced section if that walk fails.
    async fn reference_target(
        &self,
        quantity: &QuantityDef,
        target: &Address,
        fragment: &Fragment,
    ) -> NavResult<StaticTarget> {
        if fragment.string_field(M_DEF_FIELD).is_none() {
            match self.walk_static_schema(target).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    warn!(target = %target, error = %e, "Static schema walk failed, using referenced section");
                }
            }
        }
        let referenced = quantity
            .referenced_section()
            .ok_or_else(|| SchemaError::NotASection(quantity.name().to_string()))?;
        let section = self.session.schemas().section(referenced, Some(target)).await?;
        let section = self.session.effective_section(section, fragment, target).await?;
        Ok(StaticTarget::Section(section))
    }

    /// Walk the root schema along the target path
    ///
    /// Index segments are skipped. A quantity ends the walk and must be the
    /// last named segment.
    async fn walk_static_schema(&self, target: &Address) -> NavResult<StaticTarget> {
        let schemas = self.session.schemas();
        let mut section = schemas
            .section(&self.session.config().root_section, Some(target))
            .await?;
        let names: Vec<&str> = target
            .path()
            .segments()
            .iter()
            .filter_map(Segment::as_name)
            .filter(|name| !name.is_empty())
            .collect();

        for (position, name) in names.iter().enumerate() {
            match section.property(name) {
                Some(Property::SubSection(sub_section)) => {
                    section = schemas.section(sub_section.target(), Some(target)).await?;
                }
                Some(Property::Quantity(quantity)) if position + 1 == names.len() => {
                    return Ok(StaticTarget::Quantity(quantity));
                }
                _ => {
                    return Err(SchemaError::UnknownDefinition(format!(
                        "{}/{}",
                        section.qualified_name(),
                        name
                    ))
                    .into())
                }
            }
        }
        Ok(StaticTarget::Section(section))
    }

    pub(crate) fn unresolved(
        &self,
        address: Address,
        value: Value,
        expected: Arc<QuantityDef>,
        reason: UnresolvedReason,
    ) -> Self {
        warn!(address = %address, quantity = expected.name(), %reason, "Reference not followed");
        let property = Definition::Quantity(Arc::clone(&expected));
        let mut node = self.derive(
            address,
            Fragment::detached(value.clone()),
            AdaptorKind::UnresolvedReference {
                value,
                expected,
                reason,
            },
        );
        node.property = Some(property);
        node
    }
}

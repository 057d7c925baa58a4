//! Resolved schema definitions
//!
//! Definitions are immutable once registered and shared behind [`Arc`].
//! Cross links between sections (subsection targets, reference targets,
//! base sections) are kept as qualified names and looked up through the
//! [`SchemaStore`](crate::SchemaStore), so the schema graph may be cyclic
//! without creating reference cycles in memory.

use crate::spec::{
    BrowserAnnotation, Dimension, ElnAnnotation, QuantityAnnotations, QuantityType,
    SectionAnnotations,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// `m_def` of an archive fragment holding an embedded package
pub const PACKAGE_DEFINITION: &str = "nomad.metainfo.metainfo.Package";

/// Browser adaptor name redirecting a quantity to the raw file viewer
pub const RAW_FILE_ADAPTOR: &str = "RawFileAdaptor";

/// Kind of a [`Definition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Section,
    Quantity,
    SubSection,
    Attribute,
    Package,
}

impl Display for DefinitionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Section => "section",
            Self::Quantity => "quantity",
            Self::SubSection => "sub_section",
            Self::Attribute => "attribute",
            Self::Package => "package",
        })
    }
}

/// Node in the schema graph
#[derive(Debug, Clone)]
pub enum Definition {
    Section(Arc<SectionDef>),
    Quantity(Arc<QuantityDef>),
    SubSection(Arc<SubSectionDef>),
    Attribute(Arc<AttributeDef>),
    Package(Arc<PackageDef>),
}

impl Definition {
    /// Kind of this definition
    #[must_use]
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Self::Section(_) => DefinitionKind::Section,
            Self::Quantity(_) => DefinitionKind::Quantity,
            Self::SubSection(_) => DefinitionKind::SubSection,
            Self::Attribute(_) => DefinitionKind::Attribute,
            Self::Package(_) => DefinitionKind::Package,
        }
    }

    /// Short name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Section(def) => &def.name,
            Self::Quantity(def) => &def.name,
            Self::SubSection(def) => &def.name,
            Self::Attribute(def) => &def.name,
            Self::Package(def) => &def.name,
        }
    }

    /// Section definition, if this is one
    #[inline]
    #[must_use]
    pub fn as_section(&self) -> Option<&Arc<SectionDef>> {
        match self {
            Self::Section(def) => Some(def),
            _ => None,
        }
    }

    /// Quantity definition, if this is one
    #[inline]
    #[must_use]
    pub fn as_quantity(&self) -> Option<&Arc<QuantityDef>> {
        match self {
            Self::Quantity(def) => Some(def),
            _ => None,
        }
    }

    /// Identity comparison: both handles point at the same registered node
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Section(a), Self::Section(b)) => Arc::ptr_eq(a, b),
            (Self::Quantity(a), Self::Quantity(b)) => Arc::ptr_eq(a, b),
            (Self::SubSection(a), Self::SubSection(b)) => Arc::ptr_eq(a, b),
            (Self::Attribute(a), Self::Attribute(b)) => Arc::ptr_eq(a, b),
            (Self::Package(a), Self::Package(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Arc<SectionDef>> for Definition {
    fn from(def: Arc<SectionDef>) -> Self {
        Self::Section(def)
    }
}

/// A named property of a section
#[derive(Debug, Clone)]
pub enum Property {
    Quantity(Arc<QuantityDef>),
    SubSection(Arc<SubSectionDef>),
}

impl Property {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Quantity(def) => &def.name,
            Self::SubSection(def) => &def.name,
        }
    }

    #[must_use]
    pub fn definition(&self) -> Definition {
        match self {
            Self::Quantity(def) => Definition::Quantity(Arc::clone(def)),
            Self::SubSection(def) => Definition::SubSection(Arc::clone(def)),
        }
    }
}

/// Section definition with its properties flattened over all base sections
#[derive(Debug, Clone)]
pub struct SectionDef {
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) description: Option<String>,
    pub(crate) definition_id: Option<String>,
    pub(crate) package: String,
    pub(crate) base_sections: Vec<String>,
    pub(crate) ancestors: Vec<String>,
    pub(crate) quantities: IndexMap<String, Arc<QuantityDef>>,
    pub(crate) sub_sections: IndexMap<String, Arc<SubSectionDef>>,
    pub(crate) attributes: IndexMap<String, Arc<AttributeDef>>,
    pub(crate) own: OwnProperties,
    pub(crate) annotations: SectionAnnotations,
}

/// Names of the properties a section declares itself, in declaration order
///
/// Positional definition paths (`quantities/1`) index into these lists.
#[derive(Debug, Clone, Default)]
pub(crate) struct OwnProperties {
    pub(crate) quantities: Vec<String>,
    pub(crate) sub_sections: Vec<String>,
    pub(crate) attributes: Vec<String>,
}

impl SectionDef {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Globally unique name, e.g. `nomad.datamodel.EntryArchive`
    #[inline]
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn definition_id(&self) -> Option<&str> {
        self.definition_id.as_deref()
    }

    /// Qualified name of the owning package
    #[inline]
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Direct base sections, in declaration order
    #[inline]
    #[must_use]
    pub fn base_sections(&self) -> &[String] {
        &self.base_sections
    }

    /// Every section in the base chain, nearest first
    #[inline]
    #[must_use]
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Check if this section is `qualified_name` or specializes it
    #[must_use]
    pub fn extends(&self, qualified_name: &str) -> bool {
        self.qualified_name == qualified_name || self.ancestors.iter().any(|a| a == qualified_name)
    }

    /// Look up a quantity or subsection by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Property> {
        if let Some(quantity) = self.quantities.get(name) {
            return Some(Property::Quantity(Arc::clone(quantity)));
        }
        self.sub_sections
            .get(name)
            .map(|sub_section| Property::SubSection(Arc::clone(sub_section)))
    }

    #[inline]
    #[must_use]
    pub fn quantity(&self, name: &str) -> Option<&Arc<QuantityDef>> {
        self.quantities.get(name)
    }

    #[inline]
    #[must_use]
    pub fn sub_section(&self, name: &str) -> Option<&Arc<SubSectionDef>> {
        self.sub_sections.get(name)
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Arc<AttributeDef>> {
        self.attributes.get(name)
    }

    pub fn quantities(&self) -> impl Iterator<Item = &Arc<QuantityDef>> {
        self.quantities.values()
    }

    pub fn sub_sections(&self) -> impl Iterator<Item = &Arc<SubSectionDef>> {
        self.sub_sections.values()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Arc<AttributeDef>> {
        self.attributes.values()
    }

    /// All properties, quantities before subsections
    #[must_use]
    pub fn all_properties(&self) -> Vec<Property> {
        self.quantities
            .values()
            .map(|q| Property::Quantity(Arc::clone(q)))
            .chain(
                self.sub_sections
                    .values()
                    .map(|s| Property::SubSection(Arc::clone(s))),
            )
            .collect()
    }

    /// Properties to display, after the `eln` visibility annotations
    ///
    /// Ordered names from `properties.order` come first, the rest keep
    /// their declaration order.
    #[must_use]
    pub fn visible_properties(&self) -> Vec<Property> {
        let eln = self.annotations.eln.as_ref();
        let hidden = |name: &str| {
            eln.is_some_and(|eln| {
                eln.hide.iter().any(|h| h == name)
                    || eln
                        .properties
                        .as_ref()
                        .and_then(|p| p.visible.as_ref())
                        .is_some_and(|filter| !filter.allows(name))
            })
        };

        let mut visible: Vec<Property> = self
            .all_properties()
            .into_iter()
            .filter(|p| !hidden(p.name()))
            .collect();

        let order = eln
            .and_then(|eln| eln.properties.as_ref())
            .map(|p| p.order.as_slice())
            .unwrap_or_default();
        if !order.is_empty() {
            // stable sort keeps declaration order for unordered names
            visible.sort_by_key(|p| {
                order
                    .iter()
                    .position(|name| name == p.name())
                    .unwrap_or(order.len())
            });
        }
        visible
    }

    /// Check if `name` may be edited in a notebook view of this section
    #[must_use]
    pub fn is_property_editable(&self, name: &str) -> bool {
        self.eln().is_some_and(|eln| {
            eln.properties
                .as_ref()
                .and_then(|p| p.editable.as_ref())
                .map_or(true, |filter| filter.allows(name))
        })
    }

    /// Section is editable as an electronic lab notebook
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.annotations.eln.is_some()
    }

    #[inline]
    #[must_use]
    pub fn eln(&self) -> Option<&ElnAnnotation> {
        self.annotations.eln.as_ref()
    }

    /// Plot annotation, passed through to renderers
    #[inline]
    #[must_use]
    pub fn plot(&self) -> Option<&Value> {
        self.annotations.plot.as_ref()
    }

    /// Preferred lane width of the browser
    #[must_use]
    pub fn lane_width(&self) -> Option<&str> {
        self.annotations
            .browser
            .as_ref()
            .and_then(|b| b.lane_width.as_deref())
    }
}

/// Quantity definition
#[derive(Debug, Clone)]
pub struct QuantityDef {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) section: String,
    pub(crate) quantity_type: QuantityType,
    pub(crate) shape: Vec<Dimension>,
    pub(crate) unit: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) variable: bool,
    pub(crate) attributes: IndexMap<String, Arc<AttributeDef>>,
    pub(crate) annotations: QuantityAnnotations,
}

impl QuantityDef {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Qualified name of the declaring section
    #[inline]
    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    #[inline]
    #[must_use]
    pub fn quantity_type(&self) -> &QuantityType {
        &self.quantity_type
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[Dimension] {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.variable
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Arc<AttributeDef>> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Arc<AttributeDef>> {
        self.attributes.values()
    }

    /// Values are stored as `{variant: {m_value, m_unit, m_attributes}}`
    #[inline]
    #[must_use]
    pub fn uses_variant_storage(&self) -> bool {
        self.variable || !self.attributes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.quantity_type.is_reference()
    }

    /// Qualified name of the referenced section, for reference quantities
    #[must_use]
    pub fn referenced_section(&self) -> Option<&str> {
        match &self.quantity_type {
            QuantityType::Reference(target) => Some(target),
            _ => None,
        }
    }

    /// Number of array dimensions, 0 for scalars
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Quantity is displayed by the raw file viewer
    #[must_use]
    pub fn raw_file_adaptor(&self) -> bool {
        self.annotations
            .browser
            .as_ref()
            .and_then(|b: &BrowserAnnotation| b.adaptor.as_deref())
            == Some(RAW_FILE_ADAPTOR)
    }
}

/// Subsection slot definition
#[derive(Debug, Clone)]
pub struct SubSectionDef {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) section: String,
    pub(crate) target: String,
    pub(crate) repeats: bool,
}

impl SubSectionDef {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Qualified name of the declaring section
    #[inline]
    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Qualified name of the statically expected child section
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn repeats(&self) -> bool {
        self.repeats
    }
}

/// What an attribute is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOwner {
    /// Section, by qualified name
    Section(String),
    /// Quantity of a section
    Quantity { section: String, quantity: String },
}

/// Attribute definition
#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) owner: AttributeOwner,
    pub(crate) quantity_type: QuantityType,
    pub(crate) shape: Vec<Dimension>,
    pub(crate) default: Option<Value>,
}

impl AttributeDef {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &AttributeOwner {
        &self.owner
    }

    #[inline]
    #[must_use]
    pub fn quantity_type(&self) -> &QuantityType {
        &self.quantity_type
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[Dimension] {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Where a package comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageOrigin {
    /// Shipped with the deployment
    System,
    /// Embedded in the `definitions` of an archive
    Entry { deployment: String, entry_id: String },
}

/// Registered package
#[derive(Debug, Clone)]
pub struct PackageDef {
    pub(crate) name: String,
    pub(crate) origin: PackageOrigin,
    pub(crate) sections: Vec<String>,
}

impl PackageDef {
    /// Qualified package name (`entry_id:<entry>` for embedded packages)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn origin(&self) -> &PackageOrigin {
        &self.origin
    }

    /// Qualified names of the declared sections, in declaration order
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ElnProperties, PropertyFilter};

    fn quantity(name: &str) -> Arc<QuantityDef> {
        Arc::new(QuantityDef {
            name: name.to_string(),
            description: None,
            section: "pkg.S".into(),
            quantity_type: QuantityType::Plain("str".into()),
            shape: Vec::new(),
            unit: None,
            default: None,
            variable: false,
            attributes: IndexMap::new(),
            annotations: QuantityAnnotations::default(),
        })
    }

    fn section(eln: Option<ElnAnnotation>) -> SectionDef {
        let mut quantities = IndexMap::new();
        for name in ["a", "b", "c"] {
            quantities.insert(name.to_string(), quantity(name));
        }
        let mut sub_sections = IndexMap::new();
        sub_sections.insert(
            "child".to_string(),
            Arc::new(SubSectionDef {
                name: "child".into(),
                description: None,
                section: "pkg.S".into(),
                target: "pkg.C".into(),
                repeats: true,
            }),
        );
        SectionDef {
            name: "S".into(),
            qualified_name: "pkg.S".into(),
            description: None,
            definition_id: None,
            package: "pkg".into(),
            base_sections: Vec::new(),
            ancestors: vec!["pkg.Base".into()],
            quantities,
            sub_sections,
            attributes: IndexMap::new(),
            own: OwnProperties::default(),
            annotations: SectionAnnotations {
                eln,
                ..SectionAnnotations::default()
            },
        }
    }

    fn names(properties: &[Property]) -> Vec<&str> {
        properties.iter().map(Property::name).collect()
    }

    #[test]
    fn all_properties_lists_quantities_first() {
        let def = section(None);
        assert_eq!(names(&def.all_properties()), vec!["a", "b", "c", "child"]);
        assert!(!def.is_editable());
        assert!(def.extends("pkg.Base"));
        assert!(def.extends("pkg.S"));
        assert!(!def.extends("pkg.Other"));
    }

    #[test]
    fn visible_properties_apply_hide_filter_and_order() {
        let def = section(Some(ElnAnnotation {
            properties: Some(ElnProperties {
                visible: Some(PropertyFilter {
                    include: None,
                    exclude: Some(vec!["b".into()]),
                }),
                editable: Some(PropertyFilter {
                    include: Some(vec!["a".into()]),
                    exclude: None,
                }),
                order: vec!["child".into(), "c".into()],
            }),
            hide: vec!["a".into()],
        }));

        assert_eq!(names(&def.visible_properties()), vec!["child", "c"]);
        assert!(def.is_editable());
        assert!(def.is_property_editable("a"));
        assert!(!def.is_property_editable("c"));
    }

    #[test]
    fn variant_storage_when_variable_or_attributed() {
        let plain = quantity("x");
        assert!(!plain.uses_variant_storage());

        let mut variable = (*plain).clone();
        variable.variable = true;
        assert!(variable.uses_variant_storage());

        let mut attributed = (*plain).clone();
        attributed.attributes.insert(
            "note".into(),
            Arc::new(AttributeDef {
                name: "note".into(),
                description: None,
                owner: AttributeOwner::Quantity {
                    section: "pkg.S".into(),
                    quantity: "x".into(),
                },
                quantity_type: QuantityType::Plain("str".into()),
                shape: Vec::new(),
                default: None,
            }),
        );
        assert!(attributed.uses_variant_storage());
    }

    #[test]
    fn raw_file_annotation() {
        let mut q = (*quantity("file")).clone();
        assert!(!q.raw_file_adaptor());
        q.annotations.browser = Some(BrowserAnnotation {
            adaptor: Some(RAW_FILE_ADAPTOR.into()),
            ..BrowserAnnotation::default()
        });
        assert!(q.raw_file_adaptor());
    }
}

//! Serialized schema packages
//!
//! The JSON form packages are fetched in, before registration resolves them
//! into immutable [`Definition`](crate::Definition)s. Packages embedded in an
//! archive (its `definitions` field) use the same shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A package of section definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name; required for system packages
    #[serde(default)]
    pub name: Option<String>,
    /// Marker set when the package is embedded in an archive
    #[serde(default)]
    pub m_def: Option<String>,
    /// Sections declared by this package
    #[serde(default)]
    pub section_definitions: Vec<SectionSpec>,
}

/// A section as declared in a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Content based identifier, matched by `@version` qualifiers
    #[serde(default)]
    pub definition_id: Option<String>,
    /// References to base sections, in inheritance order
    #[serde(default)]
    pub base_sections: Vec<String>,
    #[serde(default)]
    pub quantities: Vec<QuantitySpec>,
    #[serde(default)]
    pub sub_sections: Vec<SubSectionSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub m_annotations: SectionAnnotations,
}

/// A quantity as declared in a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub quantity_type: QuantityType,
    #[serde(default)]
    pub shape: Vec<Dimension>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    /// Values are keyed by a caller chosen variant name
    #[serde(default)]
    pub variable: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub m_annotations: QuantityAnnotations,
}

/// A subsection slot as declared in a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Reference to the target section
    pub sub_section: String,
    #[serde(default)]
    pub repeats: bool,
}

/// An attribute of a section or quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub quantity_type: QuantityType,
    #[serde(default)]
    pub shape: Vec<Dimension>,
    #[serde(default)]
    pub default: Option<Value>,
}

/// Value type of a quantity or attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QuantityType {
    /// Plain scalar value (`str`, `int`, `bool`, ...)
    Plain(String),
    /// Numeric scalar or array with the given dtype
    Numeric(String),
    /// Reference to a section; data names the referenced section
    Reference(String),
    /// Timestamp
    Datetime,
    /// Free form JSON
    Json,
    /// Dataset stored in an HDF5 file
    Hdf5Dataset,
    /// Complex number(s) stored as `{re, im}`
    Complex(String),
}

impl QuantityType {
    /// Check if values of this type are references
    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

/// One dimension of a quantity shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// Fixed size
    Fixed(usize),
    /// Named or open dimension, e.g. `n_atoms` or `*`
    Symbolic(String),
}

/// Annotations on a section definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAnnotations {
    /// Present on sections that are editable as electronic lab notebook
    #[serde(default)]
    pub eln: Option<ElnAnnotation>,
    /// Plot configuration, passed through untouched
    #[serde(default)]
    pub plot: Option<Value>,
    #[serde(default)]
    pub browser: Option<BrowserAnnotation>,
}

/// Editing and visibility configuration of a section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElnAnnotation {
    #[serde(default)]
    pub properties: Option<ElnProperties>,
    /// Property names never shown
    #[serde(default)]
    pub hide: Vec<String>,
}

/// Property level editing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElnProperties {
    #[serde(default)]
    pub visible: Option<PropertyFilter>,
    #[serde(default)]
    pub editable: Option<PropertyFilter>,
    /// Property names shown first, in this order
    #[serde(default)]
    pub order: Vec<String>,
}

/// Include/exclude selection over property names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

impl PropertyFilter {
    /// Check if `name` passes the filter
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |include| include.iter().any(|n| n == name));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.iter().any(|n| n == name));
        included && !excluded
    }
}

/// Browser specific annotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserAnnotation {
    /// Alternative adaptor, e.g. `RawFileAdaptor`
    #[serde(default)]
    pub adaptor: Option<String>,
    #[serde(default)]
    pub render_value: Option<String>,
    #[serde(default)]
    pub lane_width: Option<String>,
}

/// Annotations on a quantity definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityAnnotations {
    #[serde(default)]
    pub browser: Option<BrowserAnnotation>,
    #[serde(default)]
    pub eln: Option<Value>,
}

//! Index of registered packages and sections
//!
//! Sections are kept in registration order so inheritance enumeration is
//! deterministic. Reads are concurrent; registration takes the write lock
//! once per package.

use crate::definition::{
    AttributeDef, AttributeOwner, OwnProperties, PackageDef, PackageOrigin, QuantityDef,
    SectionDef, SubSectionDef,
};
use crate::error::{SchemaError, SchemaResult};
use crate::spec::{AttributeSpec, PackageSpec, QuantityType, SectionSpec};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

const LOCAL_SECTION_PREFIX: &str = "/definitions/section_definitions/";

/// Registry of resolved definitions
#[derive(Debug, Default)]
pub(crate) struct DefinitionIndex {
    /// Qualified name -> section
    sections: RwLock<IndexMap<String, Arc<SectionDef>>>,

    /// definition_id -> qualified name
    by_definition_id: DashMap<String, String>,

    /// Qualified package name -> package
    packages: DashMap<String, Arc<PackageDef>>,
}

impl DefinitionIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn section(&self, qualified_name: &str) -> Option<Arc<SectionDef>> {
        self.sections.read().get(qualified_name).cloned()
    }

    pub(crate) fn section_by_definition_id(&self, definition_id: &str) -> Option<Arc<SectionDef>> {
        let name = self.by_definition_id.get(definition_id)?.clone();
        self.section(&name)
    }

    pub(crate) fn package(&self, name: &str) -> Option<Arc<PackageDef>> {
        self.packages.get(name).map(|p| Arc::clone(&p))
    }

    pub(crate) fn section_count(&self) -> usize {
        self.sections.read().len()
    }

    /// `base` first, then every registered section that extends it
    pub(crate) fn inheriting(&self, base: &Arc<SectionDef>) -> Vec<Arc<SectionDef>> {
        let sections = self.sections.read();
        let mut result = vec![Arc::clone(base)];
        result.extend(
            sections
                .values()
                .filter(|s| s.ancestors.iter().any(|a| a == base.qualified_name()))
                .cloned(),
        );
        result
    }

    /// Resolve and register a package
    ///
    /// Registering the same package twice returns the first registration.
    pub(crate) fn register(
        &self,
        spec: &PackageSpec,
        origin: PackageOrigin,
    ) -> SchemaResult<Arc<PackageDef>> {
        let name = match &origin {
            PackageOrigin::System => spec.name.clone().ok_or_else(|| SchemaError::InvalidPackage {
                package: "<unnamed>".to_string(),
                reason: "system packages must be named".to_string(),
            })?,
            PackageOrigin::Entry { entry_id, .. } => format!("entry_id:{entry_id}"),
        };
        if let Some(existing) = self.package(&name) {
            return Ok(existing);
        }

        let mut builder = PackageBuilder::new(self, &name, spec);
        let sections: Vec<Arc<SectionDef>> = (0..spec.section_definitions.len())
            .filter_map(|i| builder.build(i))
            .collect();

        let mut registered = self.sections.write();
        // lost a registration race, keep the first one
        if let Some(existing) = self.package(&name) {
            return Ok(existing);
        }
        for section in &sections {
            if let Some(definition_id) = &section.definition_id {
                self.by_definition_id
                    .insert(definition_id.clone(), section.qualified_name.clone());
            }
            registered.insert(section.qualified_name.clone(), Arc::clone(section));
        }
        let package = Arc::new(PackageDef {
            name: name.clone(),
            origin,
            sections: sections.iter().map(|s| s.qualified_name.clone()).collect(),
        });
        self.packages.insert(name.clone(), Arc::clone(&package));
        drop(registered);

        info!(package = %name, sections = sections.len(), "Registered schema package");
        Ok(package)
    }
}

/// Builds the sections of one package, bases before specializations
struct PackageBuilder<'a> {
    index: &'a DefinitionIndex,
    package: &'a str,
    spec: &'a PackageSpec,
    built: Vec<Option<Arc<SectionDef>>>,
    visiting: Vec<bool>,
}

impl<'a> PackageBuilder<'a> {
    fn new(index: &'a DefinitionIndex, package: &'a str, spec: &'a PackageSpec) -> Self {
        let count = spec.section_definitions.len();
        Self {
            index,
            package,
            spec,
            built: vec![None; count],
            visiting: vec![false; count],
        }
    }

    fn qualified(&self, local: usize) -> String {
        format!("{}.{}", self.package, self.spec.section_definitions[local].name)
    }

    fn local_index(&self, token: &str) -> Option<usize> {
        match token.parse::<usize>() {
            Ok(i) if i < self.spec.section_definitions.len() => Some(i),
            Ok(_) => None,
            Err(_) => self
                .spec
                .section_definitions
                .iter()
                .position(|s| s.name == token),
        }
    }

    /// Turn a section reference into a qualified name
    ///
    /// In-package references (`#/definitions/section_definitions/<i|name>` or
    /// a bare section name) resolve to this package; everything else is
    /// taken as already qualified.
    fn normalize(&self, reference: &str) -> String {
        let reference = reference.trim();
        let subject = reference.split_once('@').map_or(reference, |(s, _)| s);
        let local = subject.strip_prefix('#').unwrap_or(subject);
        if let Some(token) = local.strip_prefix(LOCAL_SECTION_PREFIX) {
            if let Some(i) = self.local_index(token) {
                return self.qualified(i);
            }
        } else if !subject.contains(['.', '/', ':']) {
            if let Some(i) = self.local_index(subject) {
                return self.qualified(i);
            }
        }
        reference.to_string()
    }

    fn resolve_base(&mut self, qualified_name: &str) -> Option<Arc<SectionDef>> {
        let local = qualified_name
            .strip_prefix(self.package)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|name| self.spec.section_definitions.iter().position(|s| s.name == name));
        match local {
            Some(i) => self.build(i),
            None => self.index.section(qualified_name),
        }
    }

    fn build(&mut self, i: usize) -> Option<Arc<SectionDef>> {
        if let Some(def) = &self.built[i] {
            return Some(Arc::clone(def));
        }
        let qualified_name = self.qualified(i);
        if self.visiting[i] {
            warn!(section = %qualified_name, "Cyclic base sections, ignoring cycle");
            return None;
        }
        self.visiting[i] = true;

        let spec = self.spec;
        let section: &SectionSpec = &spec.section_definitions[i];

        let mut quantities = IndexMap::new();
        let mut sub_sections = IndexMap::new();
        let mut attributes = IndexMap::new();
        let mut base_sections = Vec::with_capacity(section.base_sections.len());
        let mut ancestors: Vec<String> = Vec::new();

        for reference in &section.base_sections {
            let base_name = self.normalize(reference);
            let Some(base) = self.resolve_base(&base_name) else {
                warn!(section = %qualified_name, base = %base_name, "Unknown base section");
                continue;
            };
            for (name, quantity) in &base.quantities {
                quantities.insert(name.clone(), Arc::clone(quantity));
            }
            for (name, sub_section) in &base.sub_sections {
                sub_sections.insert(name.clone(), Arc::clone(sub_section));
            }
            for (name, attribute) in &base.attributes {
                attributes.insert(name.clone(), Arc::clone(attribute));
            }
            for ancestor in std::iter::once(&base.qualified_name).chain(&base.ancestors) {
                if !ancestors.contains(ancestor) {
                    ancestors.push(ancestor.clone());
                }
            }
            base_sections.push(base_name);
        }

        let mut own = OwnProperties::default();
        for quantity in &section.quantities {
            let owner = AttributeOwner::Quantity {
                section: qualified_name.clone(),
                quantity: quantity.name.clone(),
            };
            let def = QuantityDef {
                name: quantity.name.clone(),
                description: quantity.description.clone(),
                section: qualified_name.clone(),
                quantity_type: self.normalize_type(&quantity.quantity_type),
                shape: quantity.shape.clone(),
                unit: quantity.unit.clone(),
                default: quantity.default.clone(),
                variable: quantity.variable,
                attributes: quantity
                    .attributes
                    .iter()
                    .map(|a| (a.name.clone(), Arc::new(self.attribute(a, owner.clone()))))
                    .collect(),
                annotations: quantity.m_annotations.clone(),
            };
            own.quantities.push(def.name.clone());
            quantities.insert(def.name.clone(), Arc::new(def));
        }
        for sub_section in &section.sub_sections {
            let def = SubSectionDef {
                name: sub_section.name.clone(),
                description: sub_section.description.clone(),
                section: qualified_name.clone(),
                target: self.normalize(&sub_section.sub_section),
                repeats: sub_section.repeats,
            };
            own.sub_sections.push(def.name.clone());
            sub_sections.insert(def.name.clone(), Arc::new(def));
        }
        for attribute in &section.attributes {
            let def = self.attribute(attribute, AttributeOwner::Section(qualified_name.clone()));
            own.attributes.push(def.name.clone());
            attributes.insert(def.name.clone(), Arc::new(def));
        }

        let def = Arc::new(SectionDef {
            name: section.name.clone(),
            qualified_name,
            description: section.description.clone(),
            definition_id: section.definition_id.clone(),
            package: self.package.to_string(),
            base_sections,
            ancestors,
            quantities,
            sub_sections,
            attributes,
            own,
            annotations: section.m_annotations.clone(),
        });
        self.visiting[i] = false;
        self.built[i] = Some(Arc::clone(&def));
        Some(def)
    }

    fn normalize_type(&self, quantity_type: &QuantityType) -> QuantityType {
        match quantity_type {
            QuantityType::Reference(target) => QuantityType::Reference(self.normalize(target)),
            other => other.clone(),
        }
    }

    fn attribute(&self, spec: &AttributeSpec, owner: AttributeOwner) -> AttributeDef {
        AttributeDef {
            name: spec.name.clone(),
            description: spec.description.clone(),
            owner,
            quantity_type: self.normalize_type(&spec.quantity_type),
            shape: spec.shape.clone(),
            default: spec.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn package(value: serde_json::Value) -> PackageSpec {
        serde_json::from_value(value).unwrap()
    }

    fn base_package() -> PackageSpec {
        package(json!({
            "name": "pkg",
            "section_definitions": [
                {
                    "name": "Base",
                    "definition_id": "base-v1",
                    "quantities": [{"name": "name", "type": {"kind": "plain", "data": "str"}}]
                },
                {
                    "name": "Sample",
                    "base_sections": ["#/definitions/section_definitions/0"],
                    "quantities": [
                        {"name": "name", "type": {"kind": "plain", "data": "str"}, "description": "override"},
                        {"name": "ref", "type": {"kind": "reference", "data": "Base"}}
                    ],
                    "sub_sections": [{"name": "children", "sub_section": "Child", "repeats": true}]
                },
                {"name": "Child", "base_sections": ["Sample"]}
            ]
        }))
    }

    #[test]
    fn register_flattens_bases() {
        let index = DefinitionIndex::new();
        let pkg = index.register(&base_package(), PackageOrigin::System).unwrap();
        assert_eq!(pkg.sections(), &["pkg.Base", "pkg.Sample", "pkg.Child"]);

        let sample = index.section("pkg.Sample").unwrap();
        assert_eq!(sample.base_sections(), &["pkg.Base"]);
        assert_eq!(sample.quantity("name").unwrap().description(), Some("override"));
        assert_eq!(sample.quantity("ref").unwrap().referenced_section(), Some("pkg.Base"));
        assert_eq!(sample.sub_section("children").unwrap().target(), "pkg.Child");

        let child = index.section("pkg.Child").unwrap();
        assert_eq!(child.ancestors(), &["pkg.Sample", "pkg.Base"]);
        assert!(child.sub_section("children").is_some());
    }

    #[test]
    fn register_is_idempotent() {
        let index = DefinitionIndex::new();
        let first = index.register(&base_package(), PackageOrigin::System).unwrap();
        let second = index.register(&base_package(), PackageOrigin::System).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(index.section_count(), 3);
    }

    #[test]
    fn inheriting_lists_base_first() {
        let index = DefinitionIndex::new();
        index.register(&base_package(), PackageOrigin::System).unwrap();
        let base = index.section("pkg.Base").unwrap();
        let names: Vec<_> = index
            .inheriting(&base)
            .iter()
            .map(|s| s.qualified_name().to_string())
            .collect();
        assert_eq!(names, vec!["pkg.Base", "pkg.Sample", "pkg.Child"]);
    }

    #[test]
    fn entry_packages_are_named_by_entry() {
        let index = DefinitionIndex::new();
        let spec = package(json!({"section_definitions": [{"name": "Custom", "base_sections": ["pkg.Base"]}]}));
        index.register(&base_package(), PackageOrigin::System).unwrap();
        let origin = PackageOrigin::Entry {
            deployment: "https://nomad.example/api/v1".into(),
            entry_id: "E1".into(),
        };
        let pkg = index.register(&spec, origin).unwrap();
        assert_eq!(pkg.name(), "entry_id:E1");

        let custom = index.section("entry_id:E1.Custom").unwrap();
        assert!(custom.extends("pkg.Base"));
        assert!(custom.quantity("name").is_some());
    }

    #[test]
    fn definition_id_lookup() {
        let index = DefinitionIndex::new();
        index.register(&base_package(), PackageOrigin::System).unwrap();
        assert_eq!(
            index.section_by_definition_id("base-v1").unwrap().qualified_name(),
            "pkg.Base"
        );
        assert!(index.section_by_definition_id("missing").is_none());
    }

    #[test]
    fn unknown_and_cyclic_bases_are_skipped() {
        let index = DefinitionIndex::new();
        let spec = package(json!({
            "name": "odd",
            "section_definitions": [
                {"name": "A", "base_sections": ["B", "missing.Section"]},
                {"name": "B", "base_sections": ["A"]}
            ]
        }));
        index.register(&spec, PackageOrigin::System).unwrap();
        assert!(index.section("odd.A").is_some());
        assert!(index.section("odd.B").is_some());
    }

    #[test]
    fn system_packages_need_a_name() {
        let index = DefinitionIndex::new();
        let err = index
            .register(&PackageSpec::default(), PackageOrigin::System)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPackage { .. }));
    }
}

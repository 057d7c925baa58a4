use crate::schemas::MemorySchemaSource;
use nav_metainfo::PackageSpec;
use serde_json::{json, Value};

/// Deployment every fixture address lives in
pub const DEPLOYMENT: &str = "http://local/api/v1";

fn package(spec: Value) -> PackageSpec {
    serde_json::from_value(spec).unwrap()
}

fn plain(dtype: &str) -> Value {
    json!({"kind": "plain", "data": dtype})
}

fn numeric(dtype: &str) -> Value {
    json!({"kind": "numeric", "data": dtype})
}

fn reference(section: &str) -> Value {
    json!({"kind": "reference", "data": section})
}

/// Archive root and the data model sections it is built from
pub fn nomad_datamodel_package() -> PackageSpec {
    package(json!({
        "name": "nomad.datamodel",
        "section_definitions": [
            {
                "name": "EntryArchive",
                "sub_sections": [
                    {"name": "metadata", "sub_section": "EntryMetadata"},
                    {"name": "data", "sub_section": "EntryData"},
                    {"name": "results", "sub_section": "Results"},
                    {"name": "definitions", "sub_section": "nomad.metainfo.metainfo.Package"}
                ]
            },
            {
                "name": "EntryMetadata",
                "quantities": [
                    {"name": "entry_id", "type": plain("str")},
                    {"name": "upload_id", "type": plain("str")},
                    {"name": "mainfile", "type": plain("str")}
                ]
            },
            {"name": "EntryData", "description": "Base of all user data sections"},
            {
                "name": "Results",
                "sub_sections": [
                    {"name": "material", "sub_section": "Material"}
                ]
            },
            {
                "name": "Material",
                "quantities": [
                    {"name": "formula", "type": plain("str")},
                    {"name": "elements", "type": plain("str"), "shape": ["*"]}
                ]
            }
        ]
    }))
}

/// The schema language package; archives embed packages as its `Package`
pub fn metainfo_package() -> PackageSpec {
    package(json!({
        "name": "nomad.metainfo.metainfo",
        "section_definitions": [
            {"name": "Package"}
        ]
    }))
}

/// A small lab notebook schema with references, specializations and an
/// editable root
pub fn lab_package() -> PackageSpec {
    package(json!({
        "name": "lab",
        "section_definitions": [
            {
                "name": "Experiment",
                "base_sections": ["nomad.datamodel.EntryData"],
                "m_annotations": {"eln": {}},
                "attributes": [
                    {"name": "operator", "type": plain("str")}
                ],
                "quantities": [
                    {"name": "title", "type": plain("str"), "default": "untitled"},
                    {"name": "sample_ref", "type": reference("lab.Sample")},
                    {"name": "inputs", "type": reference("lab.Sample"), "shape": ["*"]},
                    {
                        "name": "energy",
                        "type": numeric("float64"),
                        "unit": "J",
                        "variable": true,
                        "attributes": [
                            {"name": "method", "type": plain("str")}
                        ]
                    },
                    {
                        "name": "raw_file",
                        "type": plain("str"),
                        "m_annotations": {"browser": {"adaptor": "RawFileAdaptor"}}
                    }
                ],
                "sub_sections": [
                    {"name": "samples", "sub_section": "Sample", "repeats": true},
                    {"name": "instrument", "sub_section": "Instrument"},
                    {"name": "steps", "sub_section": "Step", "repeats": true}
                ]
            },
            {
                "name": "Sample",
                "quantities": [
                    {"name": "name", "type": plain("str")},
                    {"name": "mass", "type": numeric("float64"), "unit": "kg"}
                ]
            },
            {
                "name": "Step",
                "quantities": [
                    {"name": "label", "type": plain("str")}
                ]
            },
            {
                "name": "Heating",
                "base_sections": ["Step"],
                "quantities": [
                    {"name": "temperature", "type": numeric("float64"), "unit": "K"}
                ]
            },
            {
                "name": "Cooling",
                "base_sections": ["#/definitions/section_definitions/2"],
                "quantities": [
                    {"name": "rate", "type": numeric("float64"), "unit": "K/s"}
                ]
            },
            {
                "name": "Instrument",
                "quantities": [
                    {"name": "name", "type": plain("str")}
                ]
            }
        ]
    }))
}

/// Schema source serving every fixture package
pub fn system_schemas() -> MemorySchemaSource {
    MemorySchemaSource::new()
        .with_package(nomad_datamodel_package())
        .with_package(metainfo_package())
        .with_package(lab_package())
}

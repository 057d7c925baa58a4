//! Section polymorphism
//!
//! Section data may declare a more specific definition in `m_def` than the
//! schema expects at its position. The declared definition wins whenever a
//! section node is built. Selection switches an empty section to another
//! specialization of its expected definition.

use crate::adaptor::{Adaptor, M_DEF_FIELD, M_DEF_ID_FIELD};
use crate::error::{NavError, NavResult};
use crate::fragment::Fragment;
use crate::session::Session;
use nav_address::Address;
use nav_metainfo::{Definition, SchemaError, SectionDef};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// `m_def` of a section fragment, qualified with `m_def_id` when present
#[must_use]
pub fn declared_definition(fragment: &Fragment) -> Option<String> {
    let m_def = fragment.string_field(M_DEF_FIELD)?;
    Some(match fragment.string_field(M_DEF_ID_FIELD) {
        Some(version) => format!("{m_def}@{version}"),
        None => m_def,
    })
}

impl Session {
    /// Definition describing `fragment`, given the expected one
    ///
    /// # Errors
    /// Schema errors resolving the declared definition.
    pub async fn effective_section(
        &self,
        expected: Arc<SectionDef>,
        fragment: &Fragment,
        address: &Address,
    ) -> NavResult<Arc<SectionDef>> {
        let Some(declared) = declared_definition(fragment) else {
            return Ok(expected);
        };
        if declared == expected.qualified_name() {
            return Ok(expected);
        }
        let section = self.schemas().section(&declared, Some(address)).await?;
        debug!(
            address = %address,
            expected = expected.qualified_name(),
            declared = section.qualified_name(),
            "Using declared section definition"
        );
        Ok(section)
    }
}

impl Adaptor {
    /// Definition this section was expected to have before `m_def` applied
    async fn expected_section(&self) -> NavResult<Arc<SectionDef>> {
        match (&self.property, self.section()) {
            (Some(Definition::SubSection(sub_section)), Some(_)) => Ok(self
                .session
                .schemas()
                .section(sub_section.target(), Some(&self.address))
                .await?),
            (_, Some(section)) => Ok(Arc::clone(section)),
            (_, None) => Err(SchemaError::NotASection(self.address.to_string()).into()),
        }
    }

    /// Every known definition this section may be switched to
    ///
    /// The expected definition comes first.
    ///
    /// # Errors
    /// [`SchemaError::NotASection`] for nodes that are not sections.
    pub async fn inheriting_sections(&self) -> NavResult<Vec<Arc<SectionDef>>> {
        let expected = self.expected_section().await?;
        Ok(self.session.schemas().get_inheriting_sections(&expected))
    }

    /// Declare `candidate` as the definition of this section's data
    ///
    /// Only sections without data besides `m_def` can be switched, and only
    /// to the expected definition or one of its specializations. Nodes
    /// resolved below this one are stale afterwards.
    ///
    /// # Errors
    /// [`NavError::SectionPopulated`] if the section holds data,
    /// [`NavError::NotASpecialization`] for unrelated candidates,
    /// [`NavError::NotEditable`] if it is not part of an editable entry.
    pub async fn select_section(&self, candidate: &SectionDef) -> NavResult<()> {
        if self.section().is_none() {
            return Err(SchemaError::NotASection(self.address.to_string()).into());
        }
        let (entry, path) = self.editable_location(&self.fragment)?;

        let populated: Vec<String> = self
            .fragment
            .keys()
            .into_iter()
            .filter(|key| key != M_DEF_FIELD && key != M_DEF_ID_FIELD)
            .collect();
        if !populated.is_empty() {
            return Err(NavError::SectionPopulated {
                address: self.address.to_string(),
                fields: populated,
            });
        }

        let expected = self.expected_section().await?;
        if !candidate.extends(expected.qualified_name()) {
            return Err(NavError::NotASpecialization {
                address: self.address.to_string(),
                expected: expected.qualified_name().to_string(),
                candidate: candidate.qualified_name().to_string(),
            });
        }

        let qualified_name = candidate.qualified_name().to_string();
        entry
            .edit_at(path, |fragment| match fragment {
                Value::Object(map) => {
                    map.insert(M_DEF_FIELD.to_string(), Value::String(qualified_name.clone()));
                    map.remove(M_DEF_ID_FIELD);
                    Some(())
                }
                Value::Null => {
                    *fragment = json!({ M_DEF_FIELD: qualified_name.clone() });
                    Some(())
                }
                _ => None,
            })
            .ok_or_else(|| NavError::NotEditable(self.address.to_string()))?;
        info!(address = %self.address, section = %qualified_name, "Selected section definition");
        Ok(())
    }
}

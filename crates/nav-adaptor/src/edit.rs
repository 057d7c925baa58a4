//! Structural edits on cached archives
//!
//! Edits apply synchronously to the shared [`ArchiveEntry`] and mark it
//! dirty. Persisting them is a separate step, see
//! [`Session::save`](crate::Session::save).

use crate::adaptor::Adaptor;
use crate::error::{NavError, NavResult};
use crate::fragment::Fragment;
use nav_address::DataPath;
use nav_store::ArchiveEntry;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

impl Adaptor {
    /// Entry and path behind `fragment`, if the entry may be edited
    pub(crate) fn editable_location<'a>(
        &self,
        fragment: &'a Fragment,
    ) -> NavResult<(&'a Arc<ArchiveEntry>, &'a DataPath)> {
        match fragment {
            Fragment::Located { entry, path } if entry.is_editable() => Ok((entry, path)),
            _ => Err(NavError::NotEditable(self.address.to_string())),
        }
    }

    /// Add an empty entry to subsection `name` of this section
    ///
    /// Returns the key of the new entry.
    ///
    /// # Errors
    /// [`NavError::UnknownKey`] if the section has no such subsection,
    /// [`NavError::NotEditable`] if the section data cannot be edited.
    pub fn add_sub_section(&self, name: &str) -> NavResult<String> {
        let sub_section = self
            .section()
            .and_then(|section| section.sub_section(name))
            .cloned()
            .ok_or_else(|| NavError::unknown_key(name, &self.address))?;
        let (entry, path) = self.editable_location(&self.fragment)?;

        let key = entry
            .edit_at(path, |section| {
                let map = section.as_object_mut()?;
                if !sub_section.repeats() {
                    map.insert(name.to_string(), json!({}));
                    return Some(name.to_string());
                }
                let len = match map.entry(name).or_insert_with(|| json!([])) {
                    Value::Array(items) => {
                        items.push(json!({}));
                        items.len()
                    }
                    other => {
                        *other = json!([{}]);
                        1
                    }
                };
                Some(if len == 1 {
                    name.to_string()
                } else {
                    format!("{name}:{}", len - 1)
                })
            })
            .ok_or_else(|| NavError::NotEditable(self.address.to_string()))?;
        debug!(address = %self.address, %key, "Added subsection");
        Ok(key)
    }

    /// Remove the subsection entry this node shows from its parent
    ///
    /// Later entries of a repeating subsection move down by one.
    ///
    /// # Errors
    /// [`NavError::NotEditable`] if the node was not reached through a
    /// subsection, or the parent data is gone or not editable.
    pub fn remove_sub_section(&self) -> NavResult<()> {
        let link = self
            .parent
            .as_ref()
            .ok_or_else(|| NavError::NotEditable(self.address.to_string()))?;
        let (entry, path) = self.editable_location(&link.parent)?;
        let name = link.sub_section.name();

        entry
            .edit_at(path, |parent| {
                let map = parent.as_object_mut()?;
                match link.index {
                    Some(index) => {
                        let items = map.get_mut(name)?.as_array_mut()?;
                        (index < items.len()).then(|| {
                            items.remove(index);
                        })
                    }
                    None => map.remove(name).map(drop),
                }
            })
            .ok_or_else(|| NavError::NotEditable(self.address.to_string()))?;
        debug!(address = %self.address, "Removed subsection");
        Ok(())
    }
}

//! Data fragments viewed by adaptor nodes
//!
//! Nodes never own archive data. A located fragment is a path into a cached
//! [`ArchiveEntry`] and is read on access, so in-place edits are visible to
//! every node pointing at the same entry. Values that do not live in an
//! archive (schema defaults, raw reference values) are detached copies.

use nav_address::{DataPath, Segment};
use nav_store::ArchiveEntry;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub enum Fragment {
    /// Location inside a cached archive
    Located {
        entry: Arc<ArchiveEntry>,
        path: DataPath,
    },
    /// Value outside any archive
    Detached(Arc<Value>),
}

impl Fragment {
    #[must_use]
    pub fn located(entry: Arc<ArchiveEntry>, path: DataPath) -> Self {
        Self::Located { entry, path }
    }

    #[must_use]
    pub fn detached(value: Value) -> Self {
        Self::Detached(Arc::new(value))
    }

    /// Run `f` on the current value, `None` if the location no longer exists
    pub fn with<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        match self {
            Self::Located { entry, path } => f(entry.fragment(path).as_deref()),
            Self::Detached(value) => f(Some(value)),
        }
    }

    /// Copy of the current value
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.with(|value| value.cloned())
    }

    /// Check whether the value exists and is not null
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.with(|value| value.is_some_and(|v| !v.is_null()))
    }

    /// Child at `segment`, if present and not null
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Option<Self> {
        let segment = segment.into();
        match self {
            Self::Located { entry, path } => {
                let path = path.child(segment);
                let present = entry.fragment(&path).is_some_and(|v| !v.is_null());
                present.then(|| Self::Located {
                    entry: Arc::clone(entry),
                    path,
                })
            }
            Self::Detached(value) => DataPath::new(vec![segment])
                .locate(value)
                .filter(|v| !v.is_null())
                .map(|v| Self::detached(v.clone())),
        }
    }

    /// Fragment at `segment`, whether or not a value exists there yet
    ///
    /// A located result reads as absent until an edit creates the value.
    #[must_use]
    pub fn descend(&self, segment: impl Into<Segment>) -> Self {
        let segment = segment.into();
        match self {
            Self::Located { entry, path } => Self::Located {
                entry: Arc::clone(entry),
                path: path.child(segment),
            },
            Self::Detached(value) => Self::detached(
                DataPath::new(vec![segment])
                    .locate(value)
                    .cloned()
                    .unwrap_or(Value::Null),
            ),
        }
    }

    /// Number of items, if the value is a sequence
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.with(|value| value.and_then(Value::as_array).map(Vec::len))
    }

    /// String value of field `name`, if the value is a mapping holding one
    #[must_use]
    pub fn string_field(&self, name: &str) -> Option<String> {
        self.with(|value| {
            value
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Field names of a mapping value
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.with(|value| {
            value
                .and_then(Value::as_object)
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Entry this fragment lives in
    #[must_use]
    pub fn entry(&self) -> Option<&Arc<ArchiveEntry>> {
        match self {
            Self::Located { entry, .. } => Some(entry),
            Self::Detached(_) => None,
        }
    }

    /// Path inside the entry
    #[must_use]
    pub fn path(&self) -> Option<&DataPath> {
        match self {
            Self::Located { path, .. } => Some(path),
            Self::Detached(_) => None,
        }
    }

    /// Both fragments view the same data
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Located { entry: a, path: p },
                Self::Located { entry: b, path: q },
            ) => Arc::ptr_eq(a, b) && p == q,
            (Self::Detached(a), Self::Detached(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Located { entry, path } => f
                .debug_struct("Located")
                .field("entry_id", &entry.entry_id())
                .field("path", &path.to_slash_path())
                .finish(),
            Self::Detached(value) => f.debug_tuple("Detached").field(value).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_address::Address;
    use nav_store::{EntryMetadata, FetchedArchive, Fields};
    use serde_json::json;

    fn entry() -> Arc<ArchiveEntry> {
        let address = Address::archive("http://local/api/v1", None, "E1", DataPath::root());
        Arc::new(ArchiveEntry::new(
            &address,
            Fields::All,
            FetchedArchive {
                metadata: EntryMetadata::new("E1"),
                archive: json!({"data": {"items": [1, 2, 3], "gone": null}}),
            },
        ))
    }

    #[test]
    fn located_children_follow_edits() {
        let entry = entry();
        let root = Fragment::located(Arc::clone(&entry), DataPath::root());
        let data = root.child("data").unwrap();
        assert_eq!(data.child("items").unwrap().len(), Some(3));
        assert!(data.child("gone").is_none());
        assert!(data.child("missing").is_none());

        let items = data.child("items").unwrap();
        entry.edit(|archive| archive["data"]["items"] = json!([1]));
        assert_eq!(items.len(), Some(1));
        assert!(items.child(2usize).is_none());

        let later = data.descend("later");
        assert!(!later.is_present());
        entry.edit(|archive| archive["data"]["later"] = json!({"x": 1}));
        assert_eq!(later.string_field("x"), None);
        assert!(later.is_present());
    }

    #[test]
    fn detached_children_copy() {
        let fragment = Fragment::detached(json!({"a": {"b": 1}, "n": null}));
        assert_eq!(fragment.child("a").unwrap().value(), Some(json!({"b": 1})));
        assert!(fragment.child("n").is_none());
        assert!(fragment.entry().is_none());
        assert_eq!(fragment.keys(), vec!["a".to_string(), "n".to_string()]);
    }

    #[test]
    fn identity() {
        let entry = entry();
        let a = Fragment::located(Arc::clone(&entry), DataPath::root().child("data"));
        let b = Fragment::located(entry, DataPath::root().child("data"));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&Fragment::detached(json!({}))));
    }
}

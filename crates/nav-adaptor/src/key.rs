//! Child keys
//!
//! A key is `name` or `name:index`. The index is a position (negative values
//! count from the end) or, for variant storage quantities, a variant name.

use std::fmt::{self, Display, Formatter};

/// Key of the node's own definition
pub const METAINFO_KEY: &str = "_metainfo";

/// Key of the owning property's definition
pub const SUB_SECTION_METAINFO_KEY: &str = "_subsectionmetainfo";

/// Prefix of cached back-reference keys
pub const EXTERNAL_REF_PREFIX: &str = "_external_ref_";

/// Index part of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyIndex {
    /// Position; negative values wrap around
    Position(i64),
    /// Non-numeric discriminator
    Variant(String),
}

impl KeyIndex {
    /// Index into a sequence of `len` items, after wrap-around
    #[must_use]
    pub fn position(&self, len: usize) -> Option<usize> {
        match self {
            Self::Position(index) => wrap(*index, len),
            Self::Variant(_) => None,
        }
    }

    /// Text used as object key or path segment
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Position(index) => index.to_string(),
            Self::Variant(variant) => variant.clone(),
        }
    }
}

fn wrap(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let effective = if index < 0 { len + index } else { index };
    if (0..len).contains(&effective) {
        usize::try_from(effective).ok()
    } else {
        None
    }
}

/// Parsed child key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    name: String,
    index: Option<KeyIndex>,
}

impl ItemKey {
    /// Parse `name` or `name:index`
    ///
    /// Only the first `:` separates; variant names may contain more.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((name, index)) => Self {
                name: name.to_string(),
                index: Some(match index.parse::<i64>() {
                    Ok(position) => KeyIndex::Position(position),
                    Err(_) => KeyIndex::Variant(index.to_string()),
                }),
            },
            None => Self {
                name: raw.to_string(),
                index: None,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<&KeyIndex> {
        self.index.as_ref()
    }

    /// Fixed behavior bound to this key, if it is reserved
    #[must_use]
    pub fn reserved(&self) -> Option<ReservedKey> {
        if self.index.is_some() {
            return None;
        }
        match self.name.as_str() {
            METAINFO_KEY => Some(ReservedKey::Metainfo),
            SUB_SECTION_METAINFO_KEY => Some(ReservedKey::SubSectionMetainfo),
            name => name
                .strip_prefix(EXTERNAL_REF_PREFIX)
                .and_then(|n| n.parse().ok())
                .map(ReservedKey::ExternalRef),
        }
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}:{}", self.name, index.as_text()),
            None => f.write_str(&self.name),
        }
    }
}

/// Keys routed to fixed behaviors instead of property lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedKey {
    /// Definition of the node itself
    Metainfo,
    /// Definition of the property owning the node
    SubSectionMetainfo,
    /// Previously loaded back-reference, by position
    ExternalRef(usize),
}

/// Key of the back-reference at `index`
#[must_use]
pub fn external_ref_key(index: usize) -> String {
    format!("{EXTERNAL_REF_PREFIX}{index}")
}

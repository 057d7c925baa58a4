//! Data paths for addressing within archive documents
//!
//! Provides [`DataPath`] for hierarchical addressing of fragments inside a
//! JSON archive document. Segments are either field names or array indices.

use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a [`DataPath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Field name (or variant key)
    Name(String),
    /// Position within a sequence
    Index(usize),
}

impl Segment {
    /// Parse a single textual segment
    ///
    /// Purely numeric segments become [`Segment::Index`], everything else is a
    /// [`Segment::Name`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse() {
                return Self::Index(index);
            }
        }
        Self::Name(raw.to_string())
    }

    /// Field name, if this is a name segment
    #[inline]
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Check if this segment is a sequence index
    #[inline]
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Segment {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Path within an archive document
///
/// Used to address specific fragments of a document, e.g.
/// `["run", 0, "system", 1]` → `run/0/system/1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPath(Vec<Segment>);

impl DataPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Extend with multiple segments
    #[must_use]
    pub fn extend<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        let mut new = self.clone();
        new.0.extend(segments.into_iter().map(Into::into));
        new
    }

    /// Render as an absolute slash path, `/` for the root
    ///
    /// This is the form the back-reference index stores target paths in.
    #[must_use]
    pub fn to_slash_path(&self) -> String {
        format!("/{self}")
    }

    /// Locate the fragment this path points to inside `root`
    #[must_use]
    pub fn locate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |current, segment| step(current, segment))
    }

    /// Mutable variant of [`DataPath::locate`]
    pub fn locate_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match (current, segment) {
                (Value::Object(map), Segment::Name(name)) => map.get_mut(name)?,
                (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string())?,
                (Value::Array(items), Segment::Index(index)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Name(name)) => map.get(name),
        // numeric variant keys are stored as object keys
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for DataPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split('/')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else if seg.contains(['#', '@']) {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(Segment::parse(seg))
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl From<Vec<Segment>> for DataPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

/// Errors related to data paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must not contain '#' or '@')")]
    InvalidSegment(String),
}

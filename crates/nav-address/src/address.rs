//! Archive addresses
//!
//! An [`Address`] identifies a location inside some archive: which
//! deployment, which upload/entry, and which path inside the document. Relative
//! addresses (as found in reference values) are anchored with
//! [`Address::resolve`] against the address of the fragment holding them.
//!
//! # Accepted forms
//!
//! ```text
//! https://host/api/v1/uploads/<upload>/archive/<entry>#/data/x   absolute archive
//! https://host/api/v1/entries/<entry>/archive#/data/x            absolute archive, no upload
//! https://host/api/v1/uploads/<upload>/raw/dir/file.h5           absolute raw file
//! https://host/api/v1/uploads/<upload>                           absolute upload
//! ../uploads/<upload>/archive/<entry>#/data                      same deployment
//! ../upload/archive/<entry>#/data  or  ../<entry>#/data          same upload
//! ../upload/raw/dir/file.h5                                      raw file, same upload
//! #/data/x  or  /data/x                                          same entry
//! nomad.datamodel.EntryArchive                                   metainfo definition
//! <any of the above>@<version>                                   version qualifier
//! ```

use crate::path::{DataPath, Segment};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// What an address points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// A location inside an archive document
    Archive,
    /// A whole upload
    Upload,
    /// A raw file inside an upload
    Raw,
    /// A schema definition by qualified name
    Metainfo,
}

impl Display for AddressKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Archive => "archive",
            Self::Upload => "upload",
            Self::Raw => "raw",
            Self::Metainfo => "metainfo",
        };
        f.write_str(name)
    }
}

/// Which parts of an address still have to be taken from a context address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Anchor {
    /// Fully specified
    Absolute,
    /// Inherits the deployment
    Deployment,
    /// Inherits deployment and upload
    Upload,
    /// Inherits deployment, upload and entry
    Entry,
}

/// Location inside some archive
///
/// Immutable; all composition operations return new values. Equality compares
/// the canonical parsed form, so textually different spellings of the same
/// location (`../<entry>` vs `../upload/archive/<entry>`, `/x` vs `#/x`) are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    anchor: Anchor,
    kind: AddressKind,
    deployment: Option<String>,
    upload_id: Option<String>,
    entry_id: Option<String>,
    qualified_name: Option<String>,
    path: DataPath,
    version: Option<String>,
}

impl Address {
    /// Parse an address from its textual form
    ///
    /// # Errors
    /// [`AddressError::Malformed`] if the input matches none of the accepted forms.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(AddressError::malformed(raw, "empty address"));
        }

        let (subject, version) = split_version(input)?;
        let (base, fragment) = match subject.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (subject, None),
        };

        let path = match fragment {
            Some(fragment) if !fragment.is_empty() && !fragment.starts_with('/') => {
                return Err(AddressError::malformed(raw, "fragment must start with '/'"));
            }
            Some(fragment) => Some(parse_path(raw, fragment)?),
            None => None,
        };

        let mut address = if base.is_empty() {
            let Some(path) = path else {
                return Err(AddressError::malformed(raw, "missing location"));
            };
            Self::local(Anchor::Entry, path)
        } else if let Some(rest) = base.strip_prefix("../") {
            let location = parse_location(raw, rest, true)?;
            location.into_address(Anchor::Deployment, None, path, raw)?
        } else if base.contains("://") {
            let (deployment, rest) = split_deployment(raw, base)?;
            let location = parse_location(raw, rest, false)?;
            location.into_address(Anchor::Absolute, Some(deployment), path, raw)?
        } else if base.starts_with('/') {
            if path.is_some() {
                return Err(AddressError::malformed(raw, "unexpected fragment"));
            }
            Self::local(Anchor::Entry, parse_path(raw, base)?)
        } else if base.contains('/') || base.chars().any(char::is_whitespace) {
            return Err(AddressError::malformed(raw, "unrecognised location"));
        } else {
            if path.is_some() {
                return Err(AddressError::malformed(
                    raw,
                    "definition names cannot carry a fragment",
                ));
            }
            Self {
                anchor: Anchor::Absolute,
                kind: AddressKind::Metainfo,
                deployment: None,
                upload_id: None,
                entry_id: None,
                qualified_name: Some(base.to_string()),
                path: DataPath::root(),
                version: None,
            }
        };

        address.version = version.map(str::to_string);
        Ok(address)
    }

    /// Absolute address of a location inside an archive
    #[must_use]
    pub fn archive(
        deployment: impl Into<String>,
        upload_id: Option<String>,
        entry_id: impl Into<String>,
        path: DataPath,
    ) -> Self {
        Self {
            anchor: Anchor::Absolute,
            kind: AddressKind::Archive,
            deployment: Some(normalize_deployment(&deployment.into())),
            upload_id,
            entry_id: Some(entry_id.into()),
            qualified_name: None,
            path,
            version: None,
        }
    }

    /// Absolute address of a raw file inside an upload
    #[must_use]
    pub fn raw(deployment: impl Into<String>, upload_id: impl Into<String>, path: DataPath) -> Self {
        Self {
            anchor: Anchor::Absolute,
            kind: AddressKind::Raw,
            deployment: Some(normalize_deployment(&deployment.into())),
            upload_id: Some(upload_id.into()),
            entry_id: None,
            qualified_name: None,
            path,
            version: None,
        }
    }

    /// Address of a schema definition by qualified name
    #[must_use]
    pub fn metainfo(qualified_name: impl Into<String>) -> Self {
        Self {
            anchor: Anchor::Absolute,
            kind: AddressKind::Metainfo,
            deployment: None,
            upload_id: None,
            entry_id: None,
            qualified_name: Some(qualified_name.into()),
            path: DataPath::root(),
            version: None,
        }
    }

    fn local(anchor: Anchor, path: DataPath) -> Self {
        Self {
            anchor,
            kind: AddressKind::Archive,
            deployment: None,
            upload_id: None,
            entry_id: None,
            qualified_name: None,
            path,
            version: None,
        }
    }

    /// Anchor relative parts of this address at `context`
    ///
    /// Already resolved addresses are returned unchanged.
    ///
    /// # Errors
    /// [`AddressError::Unresolvable`] if the context lacks the parts this
    /// address inherits (deployment, upload or entry).
    pub fn resolve(&self, context: &Self) -> Result<Self, AddressError> {
        if self.is_resolved() {
            return Ok(self.clone());
        }

        let missing = |what: &str| AddressError::Unresolvable {
            input: self.to_string(),
            reason: format!("context '{context}' has no {what}"),
        };

        let deployment = context.deployment.clone().ok_or_else(|| missing("deployment"))?;
        if !context.is_resolved() {
            return Err(missing("resolved location"));
        }

        let mut resolved = self.clone();
        resolved.anchor = Anchor::Absolute;
        resolved.deployment = Some(deployment);
        match self.anchor {
            Anchor::Absolute | Anchor::Deployment => {}
            Anchor::Upload => {
                resolved.upload_id = Some(context.upload_id.clone().ok_or_else(|| missing("upload"))?);
            }
            Anchor::Entry => {
                resolved.upload_id.clone_from(&context.upload_id);
                resolved.entry_id = Some(context.entry_id.clone().ok_or_else(|| missing("entry"))?);
            }
        }
        Ok(resolved)
    }

    /// Append path segments, returning a new address
    #[must_use]
    pub fn append<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        let mut new = self.clone();
        new.path = self.path.extend(segments);
        new
    }

    /// Replace the path, returning a new address
    #[must_use]
    pub fn with_path(&self, path: DataPath) -> Self {
        let mut new = self.clone();
        new.path = path;
        new
    }

    /// Replace the version qualifier, returning a new address
    #[must_use]
    pub fn with_version(&self, version: Option<String>) -> Self {
        let mut new = self.clone();
        new.version = version;
        new
    }

    /// Address of the archive root this address lives in
    #[must_use]
    pub fn entry_root(&self) -> Self {
        let mut new = self.with_path(DataPath::root());
        new.version = None;
        new
    }

    /// Check whether all location parts are known
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.kind == AddressKind::Metainfo || self.anchor == Anchor::Absolute
    }

    /// What this address points at
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Deployment location (base API url)
    #[inline]
    #[must_use]
    pub fn deployment(&self) -> Option<&str> {
        self.deployment.as_deref()
    }

    /// Upload identifier
    #[inline]
    #[must_use]
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Entry identifier
    #[inline]
    #[must_use]
    pub fn entry_id(&self) -> Option<&str> {
        self.entry_id.as_deref()
    }

    /// Qualified definition name (metainfo addresses only)
    #[inline]
    #[must_use]
    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    /// Path inside the document (archive) or upload (raw)
    #[inline]
    #[must_use]
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    /// Version qualifier (`subject@version`)
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Check that this is a resolved archive address
    ///
    /// # Errors
    /// [`AddressError::Unresolvable`] for relative addresses,
    /// [`AddressError::WrongKind`] for non-archive addresses.
    pub fn require_archive(&self) -> Result<(), AddressError> {
        if !self.is_resolved() {
            return Err(AddressError::Unresolvable {
                input: self.to_string(),
                reason: "a resolved address is required".to_string(),
            });
        }
        if self.kind != AddressKind::Archive {
            return Err(AddressError::WrongKind {
                input: self.to_string(),
                expected: AddressKind::Archive,
            });
        }
        Ok(())
    }
}

fn split_version(input: &str) -> Result<(&str, Option<&str>), AddressError> {
    match input.rsplit_once('@') {
        Some((subject, version)) if !version.contains(['/', '#']) => {
            if version.is_empty() {
                Err(AddressError::malformed(input, "empty version qualifier"))
            } else if subject.is_empty() {
                Err(AddressError::malformed(input, "version qualifier without subject"))
            } else {
                Ok((subject, Some(version)))
            }
        }
        _ => Ok((input, None)),
    }
}

fn split_deployment<'a>(raw: &str, base: &'a str) -> Result<(String, &'a str), AddressError> {
    let marker = ["/uploads/", "/entries/"]
        .iter()
        .filter_map(|marker| base.find(marker))
        .min()
        .ok_or_else(|| AddressError::malformed(raw, "no upload or entry in absolute address"))?;
    let deployment = normalize_deployment(&base[..marker]);
    if deployment.ends_with(':') {
        return Err(AddressError::malformed(raw, "missing deployment host"));
    }
    Ok((deployment, &base[marker + 1..]))
}

fn normalize_deployment(deployment: &str) -> String {
    deployment.trim_end_matches('/').to_string()
}

fn parse_path(raw: &str, text: &str) -> Result<DataPath, AddressError> {
    text.parse()
        .map_err(|e| AddressError::malformed(raw, format!("invalid path: {e}")))
}

/// Location part of an address, between the deployment and the fragment
struct Location {
    kind: AddressKind,
    upload_id: Option<String>,
    entry_id: Option<String>,
    raw_path: Option<DataPath>,
    /// Whether the upload has to be inherited
    inherits_upload: bool,
}

impl Location {
    fn into_address(
        self,
        anchor: Anchor,
        deployment: Option<String>,
        path: Option<DataPath>,
        raw: &str,
    ) -> Result<Address, AddressError> {
        let path = match (self.kind, path) {
            (AddressKind::Archive, path) => path.unwrap_or_default(),
            (_, Some(_)) => {
                return Err(AddressError::malformed(
                    raw,
                    format!("{} addresses cannot carry a fragment", self.kind),
                ));
            }
            (_, None) => self.raw_path.unwrap_or_default(),
        };
        let anchor = if self.inherits_upload { Anchor::Upload } else { anchor };
        Ok(Address {
            anchor,
            kind: self.kind,
            deployment,
            upload_id: self.upload_id,
            entry_id: self.entry_id,
            qualified_name: None,
            path,
            version: None,
        })
    }
}

fn parse_location(raw: &str, rest: &str, relative: bool) -> Result<Location, AddressError> {
    let malformed = |reason: &str| AddressError::malformed(raw, reason);
    let non_empty = |part: Option<&str>, what: &str| match part {
        Some(part) if !part.is_empty() && !part.contains('/') => Ok(part.to_string()),
        _ => Err(AddressError::malformed(raw, format!("missing {what}"))),
    };

    let (head, tail) = match rest.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rest, None),
    };

    match head {
        "uploads" => {
            let tail = tail.ok_or_else(|| malformed("missing upload id"))?;
            let (upload_id, tail) = match tail.split_once('/') {
                Some((upload_id, tail)) => (upload_id, Some(tail)),
                None => (tail, None),
            };
            let upload_id = non_empty(Some(upload_id), "upload id")?;
            match tail.map(|t| t.split_once('/').unwrap_or((t, ""))) {
                None => Ok(Location {
                    kind: AddressKind::Upload,
                    upload_id: Some(upload_id),
                    entry_id: None,
                    raw_path: None,
                    inherits_upload: false,
                }),
                Some(("archive", entry_id)) => Ok(Location {
                    kind: AddressKind::Archive,
                    upload_id: Some(upload_id),
                    entry_id: Some(non_empty(Some(entry_id), "entry id")?),
                    raw_path: None,
                    inherits_upload: false,
                }),
                Some(("raw", file)) => Ok(Location {
                    kind: AddressKind::Raw,
                    upload_id: Some(upload_id),
                    entry_id: None,
                    raw_path: Some(parse_path(raw, file)?),
                    inherits_upload: false,
                }),
                Some(_) => Err(malformed("expected 'archive' or 'raw' after upload id")),
            }
        }
        "upload" if relative => {
            let (kind, remainder) = tail
                .map(|t| t.split_once('/').unwrap_or((t, "")))
                .ok_or_else(|| malformed("expected 'archive' or 'raw' after 'upload'"))?;
            match kind {
                "archive" => Ok(Location {
                    kind: AddressKind::Archive,
                    upload_id: None,
                    entry_id: Some(non_empty(Some(remainder), "entry id")?),
                    raw_path: None,
                    inherits_upload: true,
                }),
                "raw" => Ok(Location {
                    kind: AddressKind::Raw,
                    upload_id: None,
                    entry_id: None,
                    raw_path: Some(parse_path(raw, remainder)?),
                    inherits_upload: true,
                }),
                _ => Err(malformed("expected 'archive' or 'raw' after 'upload'")),
            }
        }
        "entries" => {
            let (entry_id, suffix) = tail
                .map(|t| t.split_once('/').unwrap_or((t, "")))
                .ok_or_else(|| malformed("missing entry id"))?;
            if suffix != "archive" {
                return Err(malformed("expected 'archive' after entry id"));
            }
            Ok(Location {
                kind: AddressKind::Archive,
                upload_id: None,
                entry_id: Some(non_empty(Some(entry_id), "entry id")?),
                raw_path: None,
                inherits_upload: false,
            })
        }
        entry_id if relative && tail.is_none() && !entry_id.is_empty() && entry_id != ".." => {
            Ok(Location {
                kind: AddressKind::Archive,
                upload_id: None,
                entry_id: Some(entry_id.to_string()),
                raw_path: None,
                inherits_upload: true,
            })
        }
        _ => Err(malformed("unrecognised location")),
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let prefix = match self.anchor {
            Anchor::Absolute => self.deployment.clone().unwrap_or_default(),
            Anchor::Deployment | Anchor::Upload => "..".to_string(),
            Anchor::Entry => String::new(),
        };
        let upload = self.upload_id.as_deref().unwrap_or_default();
        let entry = self.entry_id.as_deref().unwrap_or_default();

        match self.kind {
            AddressKind::Metainfo => {
                f.write_str(self.qualified_name.as_deref().unwrap_or_default())?;
            }
            AddressKind::Upload => write!(f, "{prefix}/uploads/{upload}")?,
            AddressKind::Raw => {
                if self.anchor == Anchor::Upload {
                    write!(f, "{prefix}/upload/raw/{}", self.path)?;
                } else {
                    write!(f, "{prefix}/uploads/{upload}/raw/{}", self.path)?;
                }
            }
            AddressKind::Archive => {
                match self.anchor {
                    Anchor::Entry => {}
                    Anchor::Upload => write!(f, "{prefix}/upload/archive/{entry}")?,
                    Anchor::Absolute | Anchor::Deployment => match &self.upload_id {
                        Some(upload) => write!(f, "{prefix}/uploads/{upload}/archive/{entry}")?,
                        None => write!(f, "{prefix}/entries/{entry}/archive")?,
                    },
                }
                if self.anchor == Anchor::Entry || !self.path.is_empty() {
                    write!(f, "#/{}", self.path)?;
                }
            }
        }

        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Errors related to addresses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Input could not be parsed
    #[error("malformed address '{input}': {reason}")]
    Malformed { input: String, reason: String },

    /// Relative parts could not be anchored
    #[error("cannot resolve address '{input}': {reason}")]
    Unresolvable { input: String, reason: String },

    /// Address points at the wrong kind of thing
    #[error("expected {expected} address, got '{input}'")]
    WrongKind { input: String, expected: AddressKind },
}

impl AddressError {
    fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

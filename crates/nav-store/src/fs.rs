//! Filesystem archive source
//!
//! Archives live in `<root>/<entry_id>.json` as
//! `{"metadata": {...}, "archive": {...}}`. The deployment part of a request
//! is ignored.

use crate::error::{SaveError, TransportError};
use crate::source::{ArchiveSource, FetchRequest, FetchedArchive, SaveRequest};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves archives from a directory of JSON files
#[derive(Debug, Clone)]
pub struct FsArchiveSource {
    root: PathBuf,
}

impl FsArchiveSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, entry_id: &str) -> PathBuf {
        self.root.join(format!("{entry_id}.json"))
    }

    async fn read(&self, entry_id: &str) -> Result<FetchedArchive, TransportError> {
        let path = self.path_of(entry_id);
        debug!(path = %path.display(), "Reading archive");
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => TransportError::NotFound(entry_id.to_string()),
            _ => TransportError::Unavailable(format!("{}: {e}", path.display())),
        })?;
        let mut fetched: FetchedArchive =
            serde_json::from_str(&text).map_err(|e| TransportError::Decode {
                entry_id: entry_id.to_string(),
                message: e.to_string(),
            })?;
        if fetched.metadata.entry_id.is_empty() {
            fetched.metadata.entry_id = entry_id.to_string();
        }
        Ok(fetched)
    }
}

#[async_trait]
impl ArchiveSource for FsArchiveSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedArchive, TransportError> {
        let mut fetched = self.read(&request.entry_id).await?;
        fetched.archive = request.fields.select(fetched.archive);
        Ok(fetched)
    }

    async fn save(&self, request: &SaveRequest) -> Result<u64, SaveError> {
        let mut current = self.read(&request.entry_id).await?;
        if current.metadata.revision != request.base_revision {
            return Err(SaveError::Conflict {
                current_revision: current.metadata.revision,
            });
        }
        current.metadata.revision += 1;
        current.archive = request.archive.clone();

        let text = serde_json::to_string_pretty(&current).map_err(|e| TransportError::Decode {
            entry_id: request.entry_id.clone(),
            message: e.to_string(),
        })?;
        tokio::fs::write(self.path_of(&request.entry_id), text)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(current.metadata.revision)
    }
}

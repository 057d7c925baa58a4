//! Store error types

use nav_address::AddressError;

/// Failure talking to the archive backend
///
/// Propagated to callers unchanged; the store never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Entry does not exist
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Backend unreachable or failing
    #[error("archive backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with something that is not an archive
    #[error("cannot decode archive of entry {entry_id}: {message}")]
    Decode { entry_id: String, message: String },
}

/// Failure persisting an archive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    /// Archive changed upstream since it was fetched
    #[error("entry changed upstream (revision {current_revision})")]
    Conflict { current_revision: u64 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from the document store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Address does not name an archive
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Save rejected; local edits must be discarded and the entry reloaded
    #[error("conflict saving entry {entry_id}: fetched revision {base_revision}, upstream revision {current_revision}")]
    Conflict {
        entry_id: String,
        base_revision: u64,
        current_revision: u64,
    },
}

impl StoreError {
    /// Check if this is a save conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

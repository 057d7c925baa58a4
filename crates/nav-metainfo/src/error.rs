//! Schema error types

use crate::store::PackageLocator;
use nav_address::AddressError;

/// Errors from schema resolution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// No definition is known under this name or address
    #[error("unknown definition: {0}")]
    UnknownDefinition(String),

    /// Definition exists but is not a section
    #[error("definition '{0}' is not a section")]
    NotASection(String),

    /// Package could not be registered
    #[error("invalid package '{package}': {reason}")]
    InvalidPackage { package: String, reason: String },

    /// Schema source failed to deliver a package
    #[error("failed to load package {locator}: {message}")]
    Source {
        locator: PackageLocator,
        message: String,
    },

    /// Address of the definition is not usable
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl SchemaError {
    /// Create source error from any displayable failure
    pub fn source(locator: PackageLocator, error: impl std::fmt::Display) -> Self {
        Self::Source {
            locator,
            message: error.to_string(),
        }
    }

    /// Check if this is a lookup miss (as opposed to a load failure)
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownDefinition(_))
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

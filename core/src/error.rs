//! Errors returned by inventory operations.

use crate::images::ImageError;
use crate::resolver::UpdateConflict;
use crate::store::StoreError;
use crate::transfer::{ExportError, ImportError};
use thiserror::Error;

/// Outcome of a failed inventory operation.
///
/// Validation, not-found, conflict, authorization and import-format errors
/// are shown to the caller as-is. Storage and export failures roll back
/// the transaction and are reported with a generic message.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Empty, negative or malformed input.
    #[error("{0}")]
    Validation(String),

    /// The referenced row does not exist. Carries the role of the missing
    /// row, e.g. `Item` or `Source item`.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An update would give a row the name and category of another row.
    #[error("{0}")]
    Conflict(Box<UpdateConflict>),

    /// The caller lacks the required role, or re-authentication failed.
    #[error("{0}")]
    Authorization(String),

    /// The import file could not be interpreted.
    #[error("{0}")]
    ImportFormat(#[from] ImportError),

    /// Serialising an export failed.
    #[error("{0}")]
    Export(#[from] ExportError),

    /// The storage backend failed; nothing was applied.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl InventoryError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-readable label, used for metrics and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Authorization(_) => "authorization",
            Self::ImportFormat(_) => "import_format",
            Self::Export(_) => "export",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<UpdateConflict> for InventoryError {
    fn from(conflict: UpdateConflict) -> Self {
        Self::Conflict(Box::new(conflict))
    }
}

impl From<ImageError> for InventoryError {
    fn from(error: ImageError) -> Self {
        match error {
            ImageError::Io(io) => {
                Self::Storage(StoreError::DatabaseError(format!("Image storage failed: {io}")))
            }
            other => Self::Validation(other.to_string()),
        }
    }
}

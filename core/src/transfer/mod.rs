//! Bulk transfer: CSV/JSON import parsing and export serialisation.
//!
//! Parsers turn a file into [`ImportCandidate`]s without touching storage;
//! the service then feeds every candidate through the same accumulation
//! policy as a single add.

mod export;
mod fields;
mod import_csv;
mod import_json;

pub use export::{CSV_HEADER, ExportError, ExportFile, ExportFormat, export_csv, export_json};
pub use fields::{ColumnMap, FIELD_SYNONYMS, ImportField, locate, normalize_key, parse_lenient_int};
pub use import_csv::parse_csv;
pub use import_json::parse_json;

use serde::Serialize;
use thiserror::Error;

/// Errors that reject a whole import file.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The file extension is neither `.csv` nor `.json`.
    #[error("Error: Only CSV and JSON files are supported")]
    UnsupportedFormat,

    /// The CSV header has no recognisable item-name column.
    #[error("Error: Failed to parse file. No item name column found")]
    MissingNameColumn,

    /// The JSON document could not be parsed.
    #[error("Error: Failed to parse file. Please check the file format")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON document is neither an item array nor `{"inventory": [...]}`.
    #[error("Error: Failed to parse file. Please check the file format")]
    UnsupportedShape,

    /// The CSV reader failed.
    #[error("Error: Failed to parse file. Please check the file format")]
    Csv(#[from] csv::Error),

    /// The file parsed but contained no usable rows.
    #[error("Warning: No valid items found in the file")]
    NoValidItems,
}

/// Format of an import file, chosen by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array or `{"inventory": [...]}` document.
    Json,
}

impl ImportFormat {
    /// Pick the format from a file name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::UnsupportedFormat`] for other extensions.
    pub fn from_file_name(file_name: &str) -> Result<Self, ImportError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(ImportError::UnsupportedFormat),
        }
    }

    /// Upper-case label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
        }
    }
}

/// An uploaded import file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportFile {
    /// Client-side file name; only its extension matters.
    pub file_name: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

/// One item read from an import file, names already trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportCandidate {
    /// Item name, never empty.
    pub item_name: String,
    /// Category, possibly empty.
    pub category: String,
    /// Quantity as written in the file; may be negative.
    pub quantity: i64,
    /// Picture path as written in the file.
    pub item_image: Option<String>,
}

/// Parse an import file into candidates.
///
/// # Errors
///
/// Returns error if the extension is unsupported, the contents cannot be
/// parsed, or no row has a name.
pub fn parse_import(file: &ImportFile) -> Result<(ImportFormat, Vec<ImportCandidate>), ImportError> {
    let format = ImportFormat::from_file_name(&file.file_name)?;
    let candidates = match format {
        ImportFormat::Csv => parse_csv(&file.bytes)?,
        ImportFormat::Json => parse_json(&file.bytes)?,
    };
    if candidates.is_empty() {
        return Err(ImportError::NoValidItems);
    }
    Ok((format, candidates))
}

/// Per-row results of an import.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows inserted as new items.
    pub added: usize,
    /// Rows folded into existing items.
    pub updated: usize,
    /// Rows that could not be stored.
    pub failed: usize,
    /// One message per failed row.
    pub errors: Vec<String>,
    /// Rows read from the file.
    pub total: usize,
}

impl ImportReport {
    /// Summary line shown to the administrator.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = format!(
            "Import complete: {} items added, {} items updated",
            self.added, self.updated
        );
        if self.failed > 0 {
            message.push_str(&format!(", {} failed", self.failed));
        }
        message
    }
}

/// Strip a UTF-8 byte-order mark.
pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

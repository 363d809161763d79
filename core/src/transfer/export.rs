use crate::types::ItemRecord;
use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};
use serde::Serialize;

/// Header row of CSV exports.
pub const CSV_HEADER: [&str; 5] = ["ID", "Item Name", "Category", "Quantity", "Image Path"];

/// Export file format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// CSV with a byte-order mark, readable by spreadsheet tools.
    #[default]
    Csv,
    /// Pretty-printed JSON document.
    Json,
}

impl ExportFormat {
    /// Interpret the `format` parameter. Anything unknown exports CSV.
    #[must_use]
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }

    /// File extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// `Content-Type` of the download.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json; charset=utf-8",
        }
    }
}

/// A finished export, ready to be sent as a download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    /// Suggested download name, `inventory_<timestamp>.<ext>`.
    pub file_name: String,
    /// Format of `body`.
    pub format: ExportFormat,
    /// File contents.
    pub body: Vec<u8>,
}

impl ExportFile {
    /// Serialise `records` taken at `exported_at`.
    ///
    /// # Errors
    ///
    /// Returns error if serialisation fails.
    pub fn build(
        format: ExportFormat,
        records: &[ItemRecord],
        exported_at: DateTime<Utc>,
    ) -> Result<Self, ExportError> {
        let body = match format {
            ExportFormat::Csv => export_csv(records)?,
            ExportFormat::Json => export_json(records, exported_at)?,
        };
        Ok(Self {
            file_name: format!(
                "inventory_{}.{}",
                exported_at.format("%Y-%m-%d_%H-%M-%S"),
                format.extension()
            ),
            format,
            body,
        })
    }
}

/// Serialisation failure while exporting.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// CSV writer failure.
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    /// Flushing the CSV buffer failed.
    #[error("CSV export failed: {0}")]
    Buffer(String),
    /// JSON serialisation failure.
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// CSV export: byte-order mark, header, one row per record.
///
/// # Errors
///
/// Returns error if the CSV writer fails.
pub fn export_csv(records: &[ItemRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(b"\xEF\xBB\xBF".to_vec());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        let image = record
            .item_image
            .as_ref()
            .map(|image| image.path())
            .unwrap_or_default();
        writer.write_record([
            record.id.to_string(),
            record.item_name.clone(),
            record.category.clone(),
            record.quantity.to_string(),
            image,
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.error().to_string()))
}

#[derive(Serialize)]
struct JsonExport<'a> {
    exported_at: String,
    total_items: usize,
    inventory: &'a [ItemRecord],
}

/// JSON export: timestamp, count and the records.
///
/// # Errors
///
/// Returns error if serialisation fails.
pub fn export_json(records: &[ItemRecord], exported_at: DateTime<Utc>) -> Result<Vec<u8>, ExportError> {
    let document = JsonExport {
        exported_at: exported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        total_items: records.len(),
        inventory: records,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ItemId, ItemImage};

    fn records() -> Vec<ItemRecord> {
        vec![
            ItemRecord {
                id: ItemId::new(1),
                item_name: "Wire, red".into(),
                category: "Cables".into(),
                quantity: 3,
                item_image: None,
            },
            ItemRecord {
                id: ItemId::new(2),
                item_name: "Servo".into(),
                category: String::new(),
                quantity: 0,
                item_image: Some(ItemImage::Default("servo.webp".into())),
            },
        ]
    }

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap()
    }

    #[test]
    fn csv_has_bom_header_and_quoted_fields() {
        let bytes = export_csv(&records()).unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(
            text,
            "ID,Item Name,Category,Quantity,Image Path\n\
             1,\"Wire, red\",Cables,3,\n\
             2,Servo,,0,/assets/res/material/servo.webp\n"
        );
    }

    #[test]
    fn json_carries_timestamp_count_and_rows() {
        let bytes = export_json(&records(), at()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["exported_at"], "2025-01-01 00:00:00");
        assert_eq!(value["total_items"], 2);
        assert_eq!(value["inventory"][0]["item_name"], "Wire, red");
        assert!(value["inventory"][0]["item_image"].is_null());
        assert_eq!(
            value["inventory"][1]["item_image"],
            "/assets/res/material/servo.webp"
        );
    }

    #[test]
    fn download_name_uses_the_export_time() {
        let file = ExportFile::build(ExportFormat::Json, &records(), at()).unwrap();
        assert_eq!(file.file_name, "inventory_2025-01-01_00-00-00.json");
    }

    #[test]
    fn unknown_format_falls_back_to_csv() {
        assert_eq!(ExportFormat::from_param(Some("JSON")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_param(Some("xml")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_param(None), ExportFormat::Csv);
    }
}

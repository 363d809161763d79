use super::fields::{ColumnMap, normalize_key, parse_lenient_int};
use super::{ImportCandidate, ImportError, strip_bom};
use csv::{ByteRecord, ReaderBuilder};

/// Parse a CSV import file.
///
/// The first non-blank record is the header. Rows shorter than the header
/// and rows without a name are skipped. A file without data rows yields no
/// candidates; a header without a name column is an error.
///
/// # Errors
///
/// Returns [`ImportError::MissingNameColumn`] or [`ImportError::Csv`].
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<ImportCandidate>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(strip_bom(bytes));

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let row: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if row.iter().any(|field| !field.trim().is_empty()) {
            rows.push(row);
        }
    }

    if rows.len() < 2 {
        return Ok(Vec::new());
    }

    let header: Vec<String> = rows[0].iter().map(|cell| normalize_key(cell)).collect();
    let columns = ColumnMap::from_header(&header);
    let Some(name_column) = columns.item_name else {
        return Err(ImportError::MissingNameColumn);
    };

    let cell = |row: &[String], column: Option<usize>| -> Option<String> {
        column.and_then(|c| row.get(c)).map(|value| value.trim().to_string())
    };

    let candidates = rows[1..]
        .iter()
        .filter(|row| row.len() >= header.len())
        .filter_map(|row| {
            let item_name = row.get(name_column)?.trim().to_string();
            if item_name.is_empty() {
                return None;
            }
            Some(ImportCandidate {
                item_name,
                category: cell(row, columns.category).unwrap_or_default(),
                quantity: cell(row, columns.quantity)
                    .map_or(0, |text| parse_lenient_int(&text)),
                item_image: cell(row, columns.item_image).filter(|path| !path.is_empty()),
            })
        })
        .collect();

    Ok(candidates)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn names(candidates: &[ImportCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.item_name.as_str()).collect()
    }

    #[test]
    fn exported_layout_is_understood() {
        let csv = "\u{feff}ID,Item Name,Category,Quantity,Image Path\n\
                   1,Resistor 220R,Passives,40,/assets/res/material/resistor.webp\n\
                   2,\"Wire, red\",Cables,3,\n";
        let candidates = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            candidates,
            vec![
                ImportCandidate {
                    item_name: "Resistor 220R".into(),
                    category: "Passives".into(),
                    quantity: 40,
                    item_image: Some("/assets/res/material/resistor.webp".into()),
                },
                ImportCandidate {
                    item_name: "Wire, red".into(),
                    category: "Cables".into(),
                    quantity: 3,
                    item_image: None,
                },
            ]
        );
    }

    #[test]
    fn synonyms_blank_lines_and_short_rows() {
        let csv = "\n  \nNAME,cat,qty\r\n\r\nServo,Motors, 4 \nShort,Row\n ,Empty,1\nLED,,-2\n";
        let candidates = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(names(&candidates), vec!["Servo", "LED"]);
        assert_eq!(candidates[0].quantity, 4);
        assert_eq!(candidates[0].category, "Motors");
        assert_eq!(candidates[1].quantity, -2);
        assert_eq!(candidates[1].category, "");
    }

    #[test]
    fn missing_optional_columns_default() {
        let candidates = parse_csv(b"item_name\nSolder\n").unwrap();
        assert_eq!(candidates[0].category, "");
        assert_eq!(candidates[0].quantity, 0);
        assert_eq!(candidates[0].item_image, None);
    }

    #[test]
    fn non_numeric_quantity_is_zero() {
        let candidates = parse_csv(b"name,quantity\nFan,many\n").unwrap();
        assert_eq!(candidates[0].quantity, 0);
    }

    #[test]
    fn header_without_name_column_is_rejected() {
        let result = parse_csv(b"sku,qty\nA-1,3\n");
        assert!(matches!(result, Err(ImportError::MissingNameColumn)));
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_csv(b"name,qty\n").unwrap().is_empty());
        assert!(parse_csv(b"").unwrap().is_empty());
    }
}

use super::fields::{ImportField, locate, parse_lenient_int};
use super::{ImportCandidate, ImportError, strip_bom};
use serde_json::{Map, Value};

/// Parse a JSON import file.
///
/// Accepts a bare array of items or an object with an `inventory` array.
/// An empty object holds no items.
/// Keys are matched against the synonym table ignoring case; elements
/// without a usable name are skipped.
///
/// # Errors
///
/// Returns [`ImportError::InvalidJson`] for malformed documents and
/// [`ImportError::UnsupportedShape`] for any other top-level layout.
pub fn parse_json(bytes: &[u8]) -> Result<Vec<ImportCandidate>, ImportError> {
    let document: Value = serde_json::from_slice(strip_bom(bytes))?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(object) if object.is_empty() => Vec::new(),
        Value::Object(mut object) => match object.remove("inventory") {
            Some(Value::Array(items)) => items,
            _ => return Err(ImportError::UnsupportedShape),
        },
        _ => return Err(ImportError::UnsupportedShape),
    };

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(candidate_from_object)
        .collect())
}

fn candidate_from_object(object: &Map<String, Value>) -> Option<ImportCandidate> {
    let item_name = field(object, ImportField::ItemName)
        .and_then(text)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())?;

    Some(ImportCandidate {
        item_name,
        category: field(object, ImportField::Category)
            .and_then(text)
            .map(|category| category.trim().to_string())
            .unwrap_or_default(),
        quantity: field(object, ImportField::Quantity).map_or(0, quantity),
        item_image: field(object, ImportField::ItemImage)
            .and_then(text)
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty()),
    })
}

/// Value of the first present, non-null key naming `field`.
fn field(object: &Map<String, Value>, field: ImportField) -> Option<&Value> {
    let present: Vec<(&str, &Value)> = object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.as_str(), value))
        .collect();
    let index = locate(field, present.iter().map(|(key, _)| *key))?;
    present.get(index).map(|(_, value)| *value)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn quantity(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(saturating_truncate))
            .unwrap_or(0),
        Value::String(s) => parse_lenient_int(s),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn saturating_truncate(value: f64) -> i64 {
    // `as` saturates at the bounds and maps NaN to 0.
    value.trunc() as i64
}

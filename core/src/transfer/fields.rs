//! Column and key synonyms shared by the CSV and JSON importers.

/// Fields an import row can populate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportField {
    /// Item name (mandatory).
    ItemName,
    /// Category.
    Category,
    /// Quantity.
    Quantity,
    /// Picture path.
    ItemImage,
}

/// Accepted spellings per field, consulted in order. Keys are compared
/// after trimming and lower-casing.
pub const FIELD_SYNONYMS: &[(ImportField, &[&str])] = &[
    (
        ImportField::ItemName,
        &["item_name", "item name", "name", "itemname"],
    ),
    (ImportField::Category, &["category", "cat", "type"]),
    (ImportField::Quantity, &["quantity", "qty", "count", "amount"]),
    (
        ImportField::ItemImage,
        &[
            "item_image",
            "item image",
            "image",
            "image_path",
            "image path",
            "imagepath",
        ],
    ),
];

/// Normalised form of a header cell or object key.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Find the first key that names `field`.
///
/// Synonyms are tried in table order; for each synonym the first matching
/// key wins. Returns the position of that key in `keys`.
pub fn locate<'k, I>(field: ImportField, keys: I) -> Option<usize>
where
    I: IntoIterator<Item = &'k str>,
    I::IntoIter: Clone,
{
    let keys = keys.into_iter();
    let (_, synonyms) = FIELD_SYNONYMS.iter().find(|(f, _)| *f == field)?;
    synonyms.iter().find_map(|synonym| {
        keys.clone()
            .position(|key| normalize_key(key) == *synonym)
    })
}

/// Column positions resolved from a CSV header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    /// Name column.
    pub item_name: Option<usize>,
    /// Category column.
    pub category: Option<usize>,
    /// Quantity column.
    pub quantity: Option<usize>,
    /// Picture column.
    pub item_image: Option<usize>,
}

impl ColumnMap {
    /// Resolve every field against a header row.
    #[must_use]
    pub fn from_header(header: &[String]) -> Self {
        let keys = || header.iter().map(String::as_str);
        Self {
            item_name: locate(ImportField::ItemName, keys()),
            category: locate(ImportField::Category, keys()),
            quantity: locate(ImportField::Quantity, keys()),
            item_image: locate(ImportField::ItemImage, keys()),
        }
    }
}

/// Lenient integer parsing for spreadsheet input.
///
/// Leading whitespace and an optional sign are accepted, then as many
/// digits as follow; anything unparseable is 0. Values outside `i64` are
/// saturated.
///
/// ```
/// use stockroom_core::transfer::parse_lenient_int;
///
/// assert_eq!(parse_lenient_int(" 12 pcs"), 12);
/// assert_eq!(parse_lenient_int("-3"), -3);
/// assert_eq!(parse_lenient_int("lots"), 0);
/// ```
#[must_use]
pub fn parse_lenient_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        let d = i64::from(digit - b'0');
        value = value.saturating_mul(10).saturating_add(d);
    }
    if negative { value.saturating_neg() } else { value }
}

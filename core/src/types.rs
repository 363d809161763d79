//! Inventory record types.
//!
//! An [`ItemRecord`] is one row of the inventory. Identifiers are dense:
//! after every structural change (delete, merge, clear) the rows are
//! renumbered so that ids form `1..=N` in their previous relative order.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for [`ItemId`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid item ID: {0}")]
pub struct ParseItemIdError(String);

/// Identifier of an inventory row.
///
/// Valid identifiers are strictly positive. Parsing through [`FromStr`]
/// rejects zero, negatives and non-numeric input, which is how action
/// parameters are validated.
///
/// # Examples
///
/// ```
/// use stockroom_core::types::ItemId;
///
/// let id: ItemId = "7".parse().unwrap();
/// assert_eq!(id.get(), 7);
/// assert!("0".parse::<ItemId>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    /// The first identifier handed out by an empty inventory.
    pub const FIRST: Self = Self(1);

    /// Wrap a raw identifier without validation.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether the identifier could name a stored row.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ParseItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|_| ParseItemIdError(s.to_string()))?;
        if id <= 0 {
            return Err(ParseItemIdError(s.to_string()));
        }
        Ok(Self(id))
    }
}

/// Public URL prefix of the curated default picture library.
pub const DEFAULT_IMAGE_PREFIX: &str = "/assets/res/material/";

/// Public URL prefix of administrator uploads.
pub const UPLOAD_IMAGE_PREFIX: &str = "/assets/res/material/uploads/";

/// Picture attached to an item.
///
/// Pictures come from one of two libraries. Only uploaded pictures are
/// owned by the item they belong to and get removed from disk when the
/// item goes away or its picture is replaced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemImage {
    /// A file from the curated default library.
    Default(String),
    /// A file uploaded by an administrator.
    Uploaded(String),
}

impl ItemImage {
    /// Public path of the picture, as stored and served.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Default(name) => format!("{DEFAULT_IMAGE_PREFIX}{name}"),
            Self::Uploaded(name) => format!("{UPLOAD_IMAGE_PREFIX}{name}"),
        }
    }

    /// Bare file name inside its library.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Default(name) | Self::Uploaded(name) => name,
        }
    }

    /// Whether the picture lives in the upload library.
    #[must_use]
    pub const fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded(_))
    }

    /// Recognise a stored path.
    ///
    /// Returns `None` for anything outside the two libraries, for nested
    /// paths and for names that try to climb out of their directory.
    ///
    /// ```
    /// use stockroom_core::types::ItemImage;
    ///
    /// assert_eq!(
    ///     ItemImage::from_path("/assets/res/material/uploads/item_1_ab.png"),
    ///     Some(ItemImage::Uploaded("item_1_ab.png".into()))
    /// );
    /// assert_eq!(ItemImage::from_path("https://example.com/x.png"), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim();
        if let Some(name) = path.strip_prefix(UPLOAD_IMAGE_PREFIX) {
            return is_plain_file_name(name).then(|| Self::Uploaded(name.to_string()));
        }
        if let Some(name) = path.strip_prefix(DEFAULT_IMAGE_PREFIX) {
            return is_plain_file_name(name).then(|| Self::Default(name.to_string()));
        }
        None
    }
}

/// A single path component without traversal or hidden-file tricks.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

impl fmt::Display for ItemImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl Serialize for ItemImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}

impl<'de> Deserialize<'de> for ItemImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Self::from_path(&path)
            .ok_or_else(|| de::Error::custom(format!("unrecognised image path: {path}")))
    }
}

/// One row of the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Dense identifier, `1..=N`.
    pub id: ItemId,
    /// Display name, trimmed and non-empty.
    pub item_name: String,
    /// Category, possibly empty.
    pub category: String,
    /// Units on hand, never negative.
    pub quantity: i64,
    /// Optional picture.
    pub item_image: Option<ItemImage>,
}

impl ItemRecord {
    /// Category for display, with empty categories shown as `Uncategorized`.
    #[must_use]
    pub fn category_label(&self) -> &str {
        if self.category.is_empty() {
            "Uncategorized"
        } else {
            &self.category
        }
    }

    /// Short form used in conflict reports.
    #[must_use]
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            item_name: self.item_name.clone(),
            category: self.category.clone(),
            quantity: self.quantity,
        }
    }
}

/// Identifying fields of a record, without its picture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    /// Identifier at the time of the report.
    pub id: ItemId,
    /// Item name.
    pub item_name: String,
    /// Item category.
    pub category: String,
    /// Units on hand.
    pub quantity: i64,
}

/// Validated fields for a row that does not exist yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewItem {
    /// Item name.
    pub item_name: String,
    /// Item category.
    pub category: String,
    /// Initial quantity.
    pub quantity: i64,
    /// Optional picture.
    pub item_image: Option<ItemImage>,
}

/// Replacement values for every mutable field of an existing row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemChanges {
    /// New name.
    pub item_name: String,
    /// New category.
    pub category: String,
    /// New quantity.
    pub quantity: i64,
    /// Picture after the update.
    pub item_image: Option<ItemImage>,
}

/// Aggregate figures shown above the member inventory list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    /// Number of rows.
    pub total_items: usize,
    /// Rows with at least one unit.
    pub available_items: usize,
    /// Rows with no units.
    pub unavailable_items: usize,
    /// Sum of all quantities.
    pub total_quantity: i64,
}

impl InventorySummary {
    /// Compute the summary of a list of records.
    #[must_use]
    pub fn of(records: &[ItemRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            acc.total_items += 1;
            if record.quantity > 0 {
                acc.available_items += 1;
            } else {
                acc.unavailable_items += 1;
            }
            acc.total_quantity = acc.total_quantity.saturating_add(record.quantity);
            acc
        })
    }
}

//! Duplicate detection and quantity reconciliation.
//!
//! Two rows are the same item when their names and categories match
//! ignoring case. Adds and imports fold a duplicate into the existing row
//! by adding quantities. Updates never fold silently: a collision is
//! reported as an [`UpdateConflict`] so the caller can decide to merge.

use crate::store::{InventoryTx, StoreError};
use crate::types::{ItemId, ItemRecord, ItemSummary};
use serde::Serialize;
use std::fmt;

/// Case-insensitive equality used for names and categories.
///
/// ```
/// use stockroom_core::resolver::same_text;
///
/// assert!(same_text("Jumper Wires", "jumper wires"));
/// assert!(!same_text("Wire", "Wires"));
/// ```
#[must_use]
pub fn same_text(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Whether a row carries the given name and category.
#[must_use]
pub fn is_same_item(record: &ItemRecord, item_name: &str, category: &str) -> bool {
    same_text(&record.item_name, item_name) && same_text(&record.category, category)
}

/// Look up the row that an incoming `(name, category)` would collide with.
///
/// # Errors
///
/// Returns error if the store query fails.
pub async fn find_duplicate(
    tx: &mut dyn InventoryTx,
    item_name: &str,
    category: &str,
    exclude: Option<ItemId>,
) -> Result<Option<ItemRecord>, StoreError> {
    tx.find_by_name_and_category(item_name, category, exclude)
        .await
}

/// What to do with an incoming add or import row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Top up an existing row to `quantity`.
    Accumulate {
        /// Row being topped up.
        existing: ItemRecord,
        /// Quantity after the top-up.
        quantity: i64,
    },
    /// No duplicate: insert a new row.
    Insert,
}

/// Decide how an incoming row of `incoming_quantity` units is stored.
#[must_use]
pub fn reconcile(duplicate: Option<ItemRecord>, incoming_quantity: i64) -> Reconciliation {
    match duplicate {
        Some(existing) => {
            let quantity = existing.quantity.saturating_add(incoming_quantity);
            Reconciliation::Accumulate { existing, quantity }
        }
        None => Reconciliation::Insert,
    }
}

/// An update that would duplicate another row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConflict {
    /// Row being updated.
    pub source_item: ItemSummary,
    /// Row that already has the requested name and category.
    pub target_item: ItemSummary,
    /// Quantity the target would have after a merge.
    pub combined_quantity: i64,
}

impl UpdateConflict {
    /// Build the conflict between the row being edited and its duplicate.
    ///
    /// The combined quantity is the sum of the stored quantities, which is
    /// what merging the two rows produces.
    #[must_use]
    pub fn between(source: &ItemRecord, target: &ItemRecord) -> Self {
        Self {
            source_item: source.summary(),
            target_item: target.summary(),
            combined_quantity: source.quantity.saturating_add(target.quantity),
        }
    }
}

impl fmt::Display for UpdateConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = if self.target_item.category.is_empty() {
            "Uncategorized"
        } else {
            &self.target_item.category
        };
        write!(
            f,
            "An item '{}' already exists in '{}' with quantity {}.",
            self.target_item.item_name, category, self.target_item.quantity
        )
    }
}

//! Member-facing reservation rule.
//!
//! A member may reserve between one unit and the whole current stock of an
//! item; items without stock cannot be reserved. Reservations themselves
//! are not recorded here, only validated.

use crate::error::InventoryError;
use crate::identity::Principal;
use crate::operations::{InventoryService, require_valid_id};
use crate::types::{ItemId, ItemRecord};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Amounts that may be reserved for `record`, or `None` when it is out of
/// stock.
///
/// ```
/// use stockroom_core::reservation::reservable_range;
/// # use stockroom_core::types::{ItemId, ItemRecord};
/// # let mut record = ItemRecord { id: ItemId::new(1), item_name: "Fan".into(),
/// #     category: String::new(), quantity: 3, item_image: None };
/// assert_eq!(reservable_range(&record), Some(1..=3));
/// record.quantity = 0;
/// assert_eq!(reservable_range(&record), None);
/// ```
#[must_use]
pub fn reservable_range(record: &ItemRecord) -> Option<RangeInclusive<i64>> {
    (record.quantity > 0).then(|| 1..=record.quantity)
}

/// Check a requested amount against the current stock.
///
/// # Errors
///
/// Returns [`InventoryError::Validation`] when the item is out of stock or
/// `amount` lies outside `1..=quantity`.
pub fn validate_reservation(record: &ItemRecord, amount: i64) -> Result<i64, InventoryError> {
    let Some(range) = reservable_range(record) else {
        return Err(InventoryError::validation(format!(
            "Warning: '{}' is out of stock",
            record.item_name
        )));
    };
    if range.contains(&amount) {
        Ok(amount)
    } else {
        Err(InventoryError::validation(format!(
            "Warning: Reservation amount must be between {} and {}",
            range.start(),
            range.end()
        )))
    }
}

/// A reservation amount that is currently satisfiable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCheck {
    /// The item as currently stored.
    pub item: ItemRecord,
    /// Accepted amount.
    pub amount: i64,
    /// Largest amount that could be requested right now.
    pub max_amount: i64,
}

impl InventoryService {
    /// Validate a reservation request against current stock. Open to
    /// members.
    ///
    /// # Errors
    ///
    /// Returns error if the caller is a visitor, the item does not exist,
    /// the amount is out of range, or storage fails.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn check_reservation(
        &self,
        principal: &Principal,
        id: ItemId,
        amount: i64,
    ) -> Result<ReservationCheck, InventoryError> {
        principal.require_member()?;
        require_valid_id(id)?;

        let item = self
            .read_item(id)
            .await?
            .ok_or(InventoryError::NotFound("Item"))?;
        let amount = validate_reservation(&item, amount)?;
        let max_amount = item.quantity;
        Ok(ReservationCheck {
            item,
            amount,
            max_amount,
        })
    }
}

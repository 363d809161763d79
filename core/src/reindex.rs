//! Dense identifier maintenance.
//!
//! After a structural change the surviving rows are renumbered to
//! `1..=N` in their previous ascending order, and the insert counter is
//! reset to `N + 1`. The mapping is computed as a pure [`ReindexPlan`] and
//! then applied inside the caller's transaction.
//!
//! Moves are listed in ascending order of their source id. Because the
//! target of every move is never greater than its source, applying them in
//! that order never collides with a row that has not been moved yet.

use crate::store::{InventoryTx, StoreError};
use crate::types::ItemId;
use tracing::debug;

/// A single identifier change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdMove {
    /// Identifier before the reindex.
    pub from: ItemId,
    /// Identifier after the reindex.
    pub to: ItemId,
}

/// Mapping from current identifiers to dense ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReindexPlan {
    ids: Vec<ItemId>,
    moves: Vec<IdMove>,
}

impl ReindexPlan {
    /// Build the plan for a set of identifiers. Order of the input does
    /// not matter; duplicates are ignored.
    ///
    /// ```
    /// use stockroom_core::reindex::ReindexPlan;
    /// use stockroom_core::types::ItemId;
    ///
    /// let plan = ReindexPlan::for_ids([1, 3, 4].map(ItemId::new));
    /// assert_eq!(plan.new_id_for(ItemId::new(3)), Some(ItemId::new(2)));
    /// assert_eq!(plan.next_id(), ItemId::new(4));
    /// ```
    #[must_use]
    pub fn for_ids(ids: impl IntoIterator<Item = ItemId>) -> Self {
        let mut ids: Vec<ItemId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let moves = ids
            .iter()
            .zip(1_i64..)
            .filter(|(old, new)| old.get() != *new)
            .map(|(old, new)| IdMove {
                from: *old,
                to: ItemId::new(new),
            })
            .collect();

        Self { ids, moves }
    }

    /// Moves to apply, ascending by source id.
    #[must_use]
    pub fn moves(&self) -> &[IdMove] {
        &self.moves
    }

    /// Whether the identifiers are already dense.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.moves.is_empty()
    }

    /// Number of rows covered by the plan.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.ids.len()
    }

    /// Identifier the counter is reset to.
    #[must_use]
    pub fn next_id(&self) -> ItemId {
        let count = i64::try_from(self.ids.len()).unwrap_or(i64::MAX);
        ItemId::new(count.saturating_add(1))
    }

    /// Where `old` ends up, or `None` when it was not part of the plan.
    #[must_use]
    pub fn new_id_for(&self, old: ItemId) -> Option<ItemId> {
        let position = self.ids.binary_search(&old).ok()?;
        let position = i64::try_from(position).ok()?;
        Some(ItemId::new(position + 1))
    }
}

/// Renumber every row in `tx` to `1..=N` and reset the insert counter.
///
/// Must run inside a [`crate::store::TxMode::Structural`] transaction.
///
/// # Errors
///
/// Returns error if listing, moving, or resetting the counter fails. The
/// caller must then roll back.
pub async fn reindex(tx: &mut dyn InventoryTx) -> Result<ReindexPlan, StoreError> {
    let rows = tx.list().await?;
    let plan = ReindexPlan::for_ids(rows.iter().map(|row| row.id));

    if !plan.is_identity() {
        tx.renumber(&plan).await?;
        metrics::counter!("inventory_reindex_total").increment(1);
    }
    tx.set_next_id(plan.next_id()).await?;

    debug!(
        rows = plan.row_count(),
        moved = plan.moves().len(),
        "Reindexed inventory"
    );
    Ok(plan)
}

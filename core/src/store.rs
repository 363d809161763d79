//! Transactional storage for inventory rows.
//!
//! Every inventory operation runs inside one [`InventoryTx`]. A transaction
//! either commits every change it made or none of them; dropping a
//! transaction without committing rolls it back.
//!
//! Operations that change the id layout (delete, merge, clear) begin their
//! transaction in [`TxMode::Structural`], which excludes every other writer
//! until commit. Add, update and import rows use [`TxMode::Shared`]: they may
//! run concurrently with each other but never interleave with a reindex.
//!
//! # Implementations
//!
//! - `PostgresInventoryStore` (in `stockroom-postgres`): production store
//! - `InMemoryInventoryStore` (in `stockroom-testing`): fast, deterministic tests

use crate::reindex::ReindexPlan;
use crate::types::{ItemChanges, ItemId, ItemRecord, NewItem};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Two rows would end up sharing an identifier or a name and category.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The transaction was already finished or the backend refused to
    /// continue it.
    #[error("Transaction aborted: {0}")]
    Aborted(String),
}

/// Boxed future returned by storage traits.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Isolation requested when a transaction begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    /// Reads only. Sees a consistent snapshot and takes no lock.
    ReadOnly,
    /// Row writes that never renumber ids.
    Shared,
    /// Writes that renumber ids. Exclusive against every other writer.
    Structural,
}

/// Entry point of a storage backend.
pub trait InventoryStore: Send + Sync {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or the lock for `mode`
    /// cannot be acquired.
    fn begin(&self, mode: TxMode) -> StoreFuture<'_, Box<dyn InventoryTx>>;
}

/// An open transaction.
///
/// All reads observe the writes made earlier in the same transaction.
pub trait InventoryTx: Send {
    /// Fetch one row.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>>;

    /// Every row, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn list(&mut self) -> StoreFuture<'_, Vec<ItemRecord>>;

    /// The row whose name and category equal the given ones ignoring case,
    /// skipping `exclude`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn find_by_name_and_category<'a>(
        &'a mut self,
        item_name: &'a str,
        category: &'a str,
        exclude: Option<ItemId>,
    ) -> StoreFuture<'a, Option<ItemRecord>>;

    /// Insert a row under the next free identifier and advance the counter.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    fn insert<'a>(&'a mut self, item: &'a NewItem) -> StoreFuture<'a, ItemRecord>;

    /// Replace every mutable field of a row. `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn update<'a>(
        &'a mut self,
        id: ItemId,
        changes: &'a ItemChanges,
    ) -> StoreFuture<'a, Option<ItemRecord>>;

    /// Overwrite the quantity of a row. `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn set_quantity(&mut self, id: ItemId, quantity: i64) -> StoreFuture<'_, Option<ItemRecord>>;

    /// Remove a row, returning it. `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    fn delete(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>>;

    /// Remove every row, returning them ascending by id.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    fn delete_all(&mut self) -> StoreFuture<'_, Vec<ItemRecord>>;

    /// Move rows to new identifiers as described by `plan`.
    ///
    /// # Errors
    ///
    /// Returns error if a move fails or would collide with an existing row.
    fn renumber<'a>(&'a mut self, plan: &'a ReindexPlan) -> StoreFuture<'a, ()>;

    /// Identifier the next insert will receive.
    ///
    /// # Errors
    ///
    /// Returns error if the counter cannot be read.
    fn next_id(&mut self) -> StoreFuture<'_, ItemId>;

    /// Reset the identifier counter.
    ///
    /// # Errors
    ///
    /// Returns error if the counter cannot be written.
    fn set_next_id(&mut self, next: ItemId) -> StoreFuture<'_, ()>;

    /// Make every change visible to other transactions.
    ///
    /// # Errors
    ///
    /// Returns error if the commit fails, in which case nothing was applied.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;

    /// Discard every change.
    ///
    /// # Errors
    ///
    /// Returns error if the backend reports a failure while rolling back.
    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()>;
}

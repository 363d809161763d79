//! In-memory inventory storage.
//!
//! Transactions are fully serialised: `begin` takes the table lock and
//! works on a private copy that replaces the table on commit. Dropping a
//! transaction discards the copy, which is exactly a rollback.

#![allow(clippy::missing_panics_doc)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::unwrap_used)]

use stockroom_core::reindex::ReindexPlan;
use stockroom_core::resolver::is_same_item;
use stockroom_core::store::{InventoryStore, InventoryTx, StoreError, StoreFuture, TxMode};
use stockroom_core::types::{ItemChanges, ItemId, ItemRecord, NewItem};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Step at which a transaction can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Opening a transaction.
    Begin,
    /// Inserting a row.
    Insert,
    /// Replacing the fields of a row.
    Update,
    /// Overwriting a quantity.
    SetQuantity,
    /// Removing a single row.
    Delete,
    /// Removing every row.
    DeleteAll,
    /// Renumbering rows.
    Renumber,
    /// Committing.
    Commit,
}

#[derive(Clone, Debug)]
struct Table {
    rows: BTreeMap<ItemId, ItemRecord>,
    next_id: ItemId,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: ItemId::FIRST,
        }
    }
}

impl Table {
    fn check_unique(&self, item_name: &str, category: &str, except: Option<ItemId>) -> Result<(), StoreError> {
        let clash = self
            .rows
            .values()
            .any(|row| Some(row.id) != except && is_same_item(row, item_name, category));
        if clash {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate item name and category: {item_name} / {category}"
            )));
        }
        Ok(())
    }
}

/// Failures armed by a test. Each fires once.
#[derive(Debug, Default)]
struct FailPoints(StdMutex<Vec<FailPoint>>);

impl FailPoints {
    fn arm(&self, point: FailPoint) {
        self.0.lock().unwrap().push(point);
    }

    fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut armed = self.0.lock().unwrap();
        match armed.iter().position(|p| *p == point) {
            Some(index) => {
                armed.remove(index);
                Err(StoreError::DatabaseError(format!(
                    "injected failure at {point:?}"
                )))
            }
            None => Ok(()),
        }
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Inventory store backed by a `BTreeMap`.
///
/// # Example
///
/// ```
/// use stockroom_testing::InMemoryInventoryStore;
/// use stockroom_core::store::{InventoryStore, TxMode};
/// use stockroom_core::types::NewItem;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryInventoryStore::new();
/// let mut tx = store.begin(TxMode::Shared).await.unwrap();
/// tx.insert(&NewItem {
///     item_name: "Breadboard".into(),
///     category: "Prototyping".into(),
///     quantity: 5,
///     item_image: None,
/// })
/// .await
/// .unwrap();
/// tx.commit().await.unwrap();
///
/// assert_eq!(store.len().await, 1);
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryInventoryStore {
    table: Arc<Mutex<Table>>,
    failures: Arc<FailPoints>,
}

impl InMemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `items` under ids `1..=N`.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = NewItem>) -> Self {
        let mut table = Table::default();
        for item in items {
            let id = table.next_id;
            table.rows.insert(id, record(id, item));
            table.next_id = id.next();
        }
        Self {
            table: Arc::new(Mutex::new(table)),
            failures: Arc::default(),
        }
    }

    /// Make the next transaction that reaches `point` fail there.
    pub fn fail_at(&self, point: FailPoint) {
        self.failures.arm(point);
    }

    /// Disarm every pending failure.
    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Committed rows, ascending by id.
    pub async fn snapshot(&self) -> Vec<ItemRecord> {
        self.table.lock().await.rows.values().cloned().collect()
    }

    /// Committed row ids, ascending.
    pub async fn ids(&self) -> Vec<i64> {
        self.table.lock().await.rows.keys().map(|id| id.get()).collect()
    }

    /// Identifier the next insert will receive.
    pub async fn next_id(&self) -> ItemId {
        self.table.lock().await.next_id
    }

    /// Number of committed rows.
    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    /// Whether no rows are committed.
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.rows.is_empty()
    }
}

fn record(id: ItemId, item: NewItem) -> ItemRecord {
    ItemRecord {
        id,
        item_name: item.item_name,
        category: item.category,
        quantity: item.quantity,
        item_image: item.item_image,
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn begin(&self, _mode: TxMode) -> StoreFuture<'_, Box<dyn InventoryTx>> {
        Box::pin(async move {
            self.failures.trip(FailPoint::Begin)?;
            let guard = Arc::clone(&self.table).lock_owned().await;
            let working = guard.clone();
            let tx: Box<dyn InventoryTx> = Box::new(InMemoryTx {
                guard,
                working,
                failures: Arc::clone(&self.failures),
            });
            Ok(tx)
        })
    }
}

/// Open transaction over [`InMemoryInventoryStore`].
struct InMemoryTx {
    guard: OwnedMutexGuard<Table>,
    working: Table,
    failures: Arc<FailPoints>,
}

impl InventoryTx for InMemoryTx {
    fn get(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move { Ok(self.working.rows.get(&id).cloned()) })
    }

    fn list(&mut self) -> StoreFuture<'_, Vec<ItemRecord>> {
        Box::pin(async move { Ok(self.working.rows.values().cloned().collect()) })
    }

    fn find_by_name_and_category<'a>(
        &'a mut self,
        item_name: &'a str,
        category: &'a str,
        exclude: Option<ItemId>,
    ) -> StoreFuture<'a, Option<ItemRecord>> {
        Box::pin(async move {
            Ok(self
                .working
                .rows
                .values()
                .find(|row| Some(row.id) != exclude && is_same_item(row, item_name, category))
                .cloned())
        })
    }

    fn insert<'a>(&'a mut self, item: &'a NewItem) -> StoreFuture<'a, ItemRecord> {
        Box::pin(async move {
            self.failures.trip(FailPoint::Insert)?;
            self.working.check_unique(&item.item_name, &item.category, None)?;

            let id = self.working.next_id;
            if self.working.rows.contains_key(&id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate item id {id}"
                )));
            }
            let row = record(id, item.clone());
            self.working.rows.insert(id, row.clone());
            self.working.next_id = id.next();
            Ok(row)
        })
    }

    fn update<'a>(
        &'a mut self,
        id: ItemId,
        changes: &'a ItemChanges,
    ) -> StoreFuture<'a, Option<ItemRecord>> {
        Box::pin(async move {
            self.failures.trip(FailPoint::Update)?;
            if !self.working.rows.contains_key(&id) {
                return Ok(None);
            }
            self.working
                .check_unique(&changes.item_name, &changes.category, Some(id))?;

            let row = ItemRecord {
                id,
                item_name: changes.item_name.clone(),
                category: changes.category.clone(),
                quantity: changes.quantity,
                item_image: changes.item_image.clone(),
            };
            self.working.rows.insert(id, row.clone());
            Ok(Some(row))
        })
    }

    fn set_quantity(&mut self, id: ItemId, quantity: i64) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move {
            self.failures.trip(FailPoint::SetQuantity)?;
            Ok(self.working.rows.get_mut(&id).map(|row| {
                row.quantity = quantity;
                row.clone()
            }))
        })
    }

    fn delete(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move {
            self.failures.trip(FailPoint::Delete)?;
            Ok(self.working.rows.remove(&id))
        })
    }

    fn delete_all(&mut self) -> StoreFuture<'_, Vec<ItemRecord>> {
        Box::pin(async move {
            self.failures.trip(FailPoint::DeleteAll)?;
            let rows = std::mem::take(&mut self.working.rows);
            Ok(rows.into_values().collect())
        })
    }

    fn renumber<'a>(&'a mut self, plan: &'a ReindexPlan) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.failures.trip(FailPoint::Renumber)?;
            for step in plan.moves() {
                if self.working.rows.contains_key(&step.to) {
                    return Err(StoreError::ConstraintViolation(format!(
                        "item id {} is taken",
                        step.to
                    )));
                }
                let mut row = self.working.rows.remove(&step.from).ok_or_else(|| {
                    StoreError::Aborted(format!("item {} vanished during reindex", step.from))
                })?;
                row.id = step.to;
                self.working.rows.insert(step.to, row);
            }
            Ok(())
        })
    }

    fn next_id(&mut self) -> StoreFuture<'_, ItemId> {
        Box::pin(async move { Ok(self.working.next_id) })
    }

    fn set_next_id(&mut self, next: ItemId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.working.next_id = next;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let Self {
                mut guard,
                working,
                failures,
            } = *self;
            failures.trip(FailPoint::Commit)?;
            *guard = working;
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            drop(self);
            Ok(())
        })
    }
}

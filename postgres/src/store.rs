//! `PostgreSQL` inventory store.

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use stockroom_core::reindex::ReindexPlan;
use stockroom_core::store::{InventoryStore, InventoryTx, StoreError, StoreFuture, TxMode};
use stockroom_core::types::{ItemChanges, ItemId, ItemImage, ItemRecord, NewItem};
use tracing::warn;

/// Advisory lock guarding the identifier layout of the inventory table.
///
/// Shared writers take it in shared mode, renumbering operations take it
/// exclusively.
pub const INVENTORY_LOCK_KEY: i64 = 0x0005_7c0c_4100;

const COLUMNS: &str = "id, item_name, category, quantity, item_image";

/// `PostgreSQL`-backed [`InventoryStore`].
///
/// # Example
///
/// ```no_run
/// use stockroom_postgres::PostgresInventoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresInventoryStore::connect("postgres://localhost/stockroom", 5).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))
    }
}

/// Translate a driver error, keeping constraint violations apart.
pub(crate) fn db_error(context: &str, error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
            StoreError::ConstraintViolation(format!("{context}: {db}"))
        }
        other => StoreError::DatabaseError(format!("{context}: {other}")),
    }
}

fn record_from_row(row: &PgRow) -> Result<ItemRecord, StoreError> {
    let decode = |e: sqlx::Error| db_error("Failed to decode inventory row", &e);
    let image_path: Option<String> = row.try_get("item_image").map_err(decode)?;
    let item_image = image_path.as_deref().and_then(|path| {
        let image = ItemImage::from_path(path);
        if image.is_none() {
            warn!(path, "Ignoring unrecognised image path");
        }
        image
    });

    Ok(ItemRecord {
        id: ItemId::new(row.try_get("id").map_err(decode)?),
        item_name: row.try_get("item_name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        item_image,
    })
}

const fn mode_label(mode: TxMode) -> &'static str {
    match mode {
        TxMode::ReadOnly => "read_only",
        TxMode::Shared => "shared",
        TxMode::Structural => "structural",
    }
}

impl InventoryStore for PostgresInventoryStore {
    fn begin(&self, mode: TxMode) -> StoreFuture<'_, Box<dyn InventoryTx>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("Failed to begin transaction", &e))?;

            let lock = match mode {
                TxMode::ReadOnly => {
                    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| db_error("Failed to start read-only transaction", &e))?;
                    None
                }
                TxMode::Shared => Some("SELECT pg_advisory_xact_lock_shared($1)"),
                TxMode::Structural => Some("SELECT pg_advisory_xact_lock($1)"),
            };
            if let Some(statement) = lock {
                sqlx::query(statement)
                    .bind(INVENTORY_LOCK_KEY)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("Failed to acquire inventory lock", &e))?;
            }

            metrics::counter!("inventory_store_transactions_total", "mode" => mode_label(mode))
                .increment(1);

            let tx: Box<dyn InventoryTx> = Box::new(PgInventoryTx { tx, mode });
            Ok(tx)
        })
    }
}

/// Open transaction on [`PostgresInventoryStore`].
struct PgInventoryTx {
    tx: Transaction<'static, Postgres>,
    mode: TxMode,
}

impl PgInventoryTx {
    /// Row lock suffix for reads that precede a write.
    const fn lock_clause(&self) -> &'static str {
        match self.mode {
            TxMode::ReadOnly => "",
            TxMode::Shared | TxMode::Structural => " FOR UPDATE",
        }
    }
}

impl InventoryTx for PgInventoryTx {
    fn get(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {COLUMNS} FROM inventory WHERE id = $1{}",
                self.lock_clause()
            );
            let row = sqlx::query(&sql)
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to load item", &e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn list(&mut self) -> StoreFuture<'_, Vec<ItemRecord>> {
        Box::pin(async move {
            let sql = format!("SELECT {COLUMNS} FROM inventory ORDER BY id ASC");
            let rows = sqlx::query(&sql)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to list inventory", &e))?;
            rows.iter().map(record_from_row).collect()
        })
    }

    fn find_by_name_and_category<'a>(
        &'a mut self,
        item_name: &'a str,
        category: &'a str,
        exclude: Option<ItemId>,
    ) -> StoreFuture<'a, Option<ItemRecord>> {
        Box::pin(async move {
            let sql = format!(
                r"
                SELECT {COLUMNS} FROM inventory
                WHERE lower(item_name) = lower($1)
                  AND lower(category) = lower($2)
                  AND ($3::BIGINT IS NULL OR id <> $3)
                ORDER BY id ASC
                LIMIT 1{}
                ",
                self.lock_clause()
            );
            let row = sqlx::query(&sql)
                .bind(item_name)
                .bind(category)
                .bind(exclude.map(ItemId::get))
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to look up duplicate", &e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn insert<'a>(&'a mut self, item: &'a NewItem) -> StoreFuture<'a, ItemRecord> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                "UPDATE inventory_sequence SET next_id = next_id + 1 WHERE singleton RETURNING next_id - 1",
            )
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to allocate item id", &e))?;

            let sql = format!(
                r"
                INSERT INTO inventory (id, item_name, category, quantity, item_image)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {COLUMNS}
                "
            );
            let row = sqlx::query(&sql)
                .bind(id)
                .bind(&item.item_name)
                .bind(&item.category)
                .bind(item.quantity)
                .bind(item.item_image.as_ref().map(ItemImage::path))
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to insert item", &e))?;
            record_from_row(&row)
        })
    }

    fn update<'a>(
        &'a mut self,
        id: ItemId,
        changes: &'a ItemChanges,
    ) -> StoreFuture<'a, Option<ItemRecord>> {
        Box::pin(async move {
            let sql = format!(
                r"
                UPDATE inventory
                SET item_name = $2, category = $3, quantity = $4, item_image = $5, updated_at = now()
                WHERE id = $1
                RETURNING {COLUMNS}
                "
            );
            let row = sqlx::query(&sql)
                .bind(id.get())
                .bind(&changes.item_name)
                .bind(&changes.category)
                .bind(changes.quantity)
                .bind(changes.item_image.as_ref().map(ItemImage::path))
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to update item", &e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn set_quantity(&mut self, id: ItemId, quantity: i64) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move {
            let sql = format!(
                "UPDATE inventory SET quantity = $2, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}"
            );
            let row = sqlx::query(&sql)
                .bind(id.get())
                .bind(quantity)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to update quantity", &e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn delete(&mut self, id: ItemId) -> StoreFuture<'_, Option<ItemRecord>> {
        Box::pin(async move {
            let sql = format!("DELETE FROM inventory WHERE id = $1 RETURNING {COLUMNS}");
            let row = sqlx::query(&sql)
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to delete item", &e))?;
            row.as_ref().map(record_from_row).transpose()
        })
    }

    fn delete_all(&mut self) -> StoreFuture<'_, Vec<ItemRecord>> {
        Box::pin(async move {
            let sql = format!("DELETE FROM inventory RETURNING {COLUMNS}");
            let rows = sqlx::query(&sql)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to clear inventory", &e))?;
            let mut records = rows
                .iter()
                .map(record_from_row)
                .collect::<Result<Vec<_>, _>>()?;
            records.sort_by_key(|record| record.id);
            Ok(records)
        })
    }

    fn renumber<'a>(&'a mut self, plan: &'a ReindexPlan) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            // Ascending order keeps every target free when it is written.
            for step in plan.moves() {
                sqlx::query("UPDATE inventory SET id = $2 WHERE id = $1")
                    .bind(step.from.get())
                    .bind(step.to.get())
                    .execute(&mut *self.tx)
                    .await
                    .map_err(|e| db_error("Failed to renumber item", &e))?;
            }
            Ok(())
        })
    }

    fn next_id(&mut self) -> StoreFuture<'_, ItemId> {
        Box::pin(async move {
            let (next,): (i64,) =
                sqlx::query_as("SELECT next_id FROM inventory_sequence WHERE singleton")
                    .fetch_one(&mut *self.tx)
                    .await
                    .map_err(|e| db_error("Failed to read id counter", &e))?;
            Ok(ItemId::new(next))
        })
    }

    fn set_next_id(&mut self, next: ItemId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("UPDATE inventory_sequence SET next_id = $1 WHERE singleton")
                .bind(next.get())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| db_error("Failed to reset id counter", &e))?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            self.tx
                .commit()
                .await
                .map_err(|e| db_error("Failed to commit transaction", &e))
        })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            self.tx
                .rollback()
                .await
                .map_err(|e| db_error("Failed to roll back transaction", &e))
        })
    }
}

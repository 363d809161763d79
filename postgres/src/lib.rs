//! `PostgreSQL` storage for the Stockroom inventory.
//!
//! This crate provides the production implementations of the storage
//! traits from `stockroom-core`:
//!
//! - [`PostgresInventoryStore`]: transactional inventory rows with dense ids
//! - [`PostgresIdentityDirectory`]: roles and bcrypt password checks
//!
//! Renumbering is serialised with a transaction-scoped advisory lock:
//! delete, merge and clear take it exclusively, adds and updates take it
//! shared. The id counter lives in the single-row `inventory_sequence`
//! table so it rolls back together with the rows.
//!
//! # Example
//!
//! ```ignore
//! use stockroom_postgres::{PostgresIdentityDirectory, PostgresInventoryStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresInventoryStore::connect("postgres://localhost/stockroom", 5).await?;
//!     store.migrate().await?;
//!     let identities = PostgresIdentityDirectory::new(store.pool().clone());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod identity;
mod store;

pub use identity::PostgresIdentityDirectory;
pub use store::{INVENTORY_LOCK_KEY, PostgresInventoryStore};

//! # Stockroom Core
//!
//! Inventory records for a club workshop: administrators add, edit, merge,
//! delete, import and export items; members browse stock and check
//! reservation amounts.
//!
//! ## Core Concepts
//!
//! - **`ItemRecord`**: one inventory row with a dense id in `1..=N`
//! - **`InventoryStore` / `InventoryTx`**: transactional storage behind a trait
//! - **Reindexing**: after every delete, merge or clear the ids are renumbered
//!   inside the same transaction
//! - **Duplicate resolution**: same name and category (ignoring case) means
//!   the same item; adds accumulate, updates report a conflict
//! - **`InventoryService`**: every operation, taking an explicit `Principal`
//!
//! ## Example
//!
//! ```ignore
//! use stockroom_core::operations::{AddImage, AddItem, InventoryService, ItemFields};
//!
//! let service = InventoryService::new(store, identities, images, clock);
//! let outcome = service
//!     .add(&admin, AddItem {
//!         fields: ItemFields::new("Servo", "Motors", 4),
//!         image: AddImage::None,
//!     })
//!     .await?;
//! assert!(!outcome.updated);
//! ```

pub mod environment;
pub mod error;
pub mod identity;
pub mod images;
pub mod operations;
pub mod reindex;
pub mod reservation;
pub mod resolver;
pub mod store;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::InventoryError;
pub use identity::{Principal, Role, UserId};
pub use operations::InventoryService;
pub use store::{InventoryStore, InventoryTx, StoreError, TxMode};
pub use types::{ItemId, ItemImage, ItemRecord};

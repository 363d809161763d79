//! # Stockroom Testing
//!
//! Testing utilities for the Stockroom inventory.
//!
//! This crate provides:
//! - In-memory implementations of the storage, identity and picture traits
//! - A deterministic clock
//! - Ready-made principals and a wired-up [`TestInventory`]
//! - proptest strategies for inventory operations
//!
//! ## Example
//!
//! ```ignore
//! use stockroom_testing::{TestInventory, admin};
//!
//! #[tokio::test]
//! async fn adding_twice_accumulates() {
//!     let inventory = TestInventory::new();
//!     inventory.service.add(&admin(), servo(2)).await.unwrap();
//!     inventory.service.add(&admin(), servo(3)).await.unwrap();
//!     assert_eq!(inventory.store.snapshot().await[0].quantity, 5);
//! }
//! ```

mod identity;
mod images;
mod store;

pub use identity::InMemoryIdentityDirectory;
pub use images::InMemoryImageLibrary;
pub use store::{FailPoint, InMemoryInventoryStore};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stockroom_core::environment::Clock;
use stockroom_core::identity::{Principal, Role, UserId};
use stockroom_core::operations::InventoryService;
use stockroom_core::types::NewItem;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making upload names and export file
    /// names reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use stockroom_testing::mocks::FixedClock;
    /// use stockroom_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Principals and sample rows shared by tests.
pub mod fixtures {
    use super::{NewItem, Principal, Role, UserId};

    /// Password of the [`admin`] user in [`crate::TestInventory`].
    pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

    /// Pictures in the default library of [`crate::TestInventory`].
    pub const DEFAULT_IMAGES: [&str; 3] = ["resistor.webp", "rgbLed.webp", "servoMotor.png"];

    /// Administrator with user id 1.
    #[must_use]
    pub const fn admin() -> Principal {
        Principal::new(UserId::new(1), Role::Admin)
    }

    /// Member with user id 2.
    #[must_use]
    pub const fn member() -> Principal {
        Principal::new(UserId::new(2), Role::Member)
    }

    /// Visitor with user id 3.
    #[must_use]
    pub const fn visitor() -> Principal {
        Principal::new(UserId::new(3), Role::Visitor)
    }

    /// A row without a picture.
    #[must_use]
    pub fn new_item(item_name: &str, category: &str, quantity: i64) -> NewItem {
        NewItem {
            item_name: item_name.to_string(),
            category: category.to_string(),
            quantity,
            item_image: None,
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    const NAMES: [&str; 6] = ["Servo", "servo", "Fan", "LED", "Relay", "Buzzer"];
    const CATEGORIES: [&str; 4] = ["Motors", "motors", "", "Lighting"];

    /// One step of a generated operation sequence. Ids are raw so that
    /// sequences can refer to rows that no longer exist.
    #[derive(Clone, Debug)]
    pub enum InventoryOp {
        /// Add an item from a small pool of names, so duplicates are common.
        Add {
            /// Item name.
            item_name: String,
            /// Category.
            category: String,
            /// Quantity to add.
            quantity: i64,
        },
        /// Delete by id.
        Delete {
            /// Raw id.
            id: i64,
        },
        /// Merge `source` into `target`.
        Merge {
            /// Raw id of the absorbed row.
            source: i64,
            /// Raw id of the surviving row.
            target: i64,
        },
    }

    /// Strategy for a single [`InventoryOp`].
    pub fn inventory_op() -> impl Strategy<Value = InventoryOp> {
        prop_oneof![
            3 => (
                prop::sample::select(NAMES.to_vec()),
                prop::sample::select(CATEGORIES.to_vec()),
                0_i64..20,
            )
                .prop_map(|(item_name, category, quantity)| InventoryOp::Add {
                    item_name: item_name.to_string(),
                    category: category.to_string(),
                    quantity,
                }),
            1 => (0_i64..8).prop_map(|id| InventoryOp::Delete { id }),
            1 => (0_i64..8, 0_i64..8).prop_map(|(source, target)| InventoryOp::Merge { source, target }),
        ]
    }

    /// Strategy for a sequence of up to `max_len` operations.
    pub fn inventory_ops(max_len: usize) -> impl Strategy<Value = Vec<InventoryOp>> {
        prop::collection::vec(inventory_op(), 0..=max_len)
    }
}

pub use fixtures::{admin, member, new_item, visitor};
pub use mocks::{FixedClock, test_clock};

/// An [`InventoryService`] wired to in-memory backends, with handles to
/// inspect them.
///
/// The directory knows [`admin`], [`member`] and [`visitor`]; the admin's
/// password is [`fixtures::ADMIN_PASSWORD`]. The picture library holds
/// [`fixtures::DEFAULT_IMAGES`].
#[derive(Clone, Debug)]
pub struct TestInventory {
    /// Service under test.
    pub service: InventoryService,
    /// Backing store.
    pub store: InMemoryInventoryStore,
    /// Backing identity directory.
    pub identities: InMemoryIdentityDirectory,
    /// Backing picture library.
    pub images: InMemoryImageLibrary,
}

impl TestInventory {
    /// Empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(InMemoryInventoryStore::new())
    }

    /// Inventory holding `items` under ids `1..=N`.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = NewItem>) -> Self {
        Self::with_store(InMemoryInventoryStore::with_items(items))
    }

    fn with_store(store: InMemoryInventoryStore) -> Self {
        let identities = InMemoryIdentityDirectory::new()
            .with_user(admin().user_id, Role::Admin, fixtures::ADMIN_PASSWORD)
            .with_user(member().user_id, Role::Member, "member password")
            .with_user(visitor().user_id, Role::Visitor, "visitor password");
        let images = InMemoryImageLibrary::with_defaults(fixtures::DEFAULT_IMAGES);
        let service = InventoryService::new(
            Arc::new(store.clone()),
            Arc::new(identities.clone()),
            Arc::new(images.clone()),
            Arc::new(test_clock()),
        );
        Self {
            service,
            store,
            identities,
            images,
        }
    }
}

impl Default for TestInventory {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

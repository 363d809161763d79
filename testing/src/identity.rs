//! In-memory identity directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use stockroom_core::identity::{IdentityDirectory, Role, UserId};
use stockroom_core::store::StoreFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug)]
struct Account {
    role: Role,
    password: String,
}

/// Users with plain-text passwords, for tests only.
///
/// # Example
///
/// ```
/// use stockroom_testing::InMemoryIdentityDirectory;
/// use stockroom_core::identity::{IdentityDirectory, Role, UserId};
///
/// # tokio_test::block_on(async {
/// let directory = InMemoryIdentityDirectory::new().with_user(UserId::new(1), Role::Admin, "hunter2");
/// assert!(directory.verify_password(UserId::new(1), "hunter2").await.unwrap());
/// assert!(!directory.verify_password(UserId::new(1), "hunter3").await.unwrap());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryIdentityDirectory {
    accounts: Arc<RwLock<HashMap<UserId, Account>>>,
}

impl InMemoryIdentityDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user.
    #[must_use]
    pub fn with_user(self, user_id: UserId, role: Role, password: &str) -> Self {
        self.set_user(user_id, role, password);
        self
    }

    /// Register or replace a user.
    pub fn set_user(&self, user_id: UserId, role: Role, password: &str) {
        self.accounts.write().unwrap().insert(
            user_id,
            Account {
                role,
                password: password.to_string(),
            },
        );
    }

    /// Remove a user.
    pub fn remove_user(&self, user_id: UserId) {
        self.accounts.write().unwrap().remove(&user_id);
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn role_of(&self, user_id: UserId) -> StoreFuture<'_, Option<Role>> {
        let role = self
            .accounts
            .read()
            .unwrap()
            .get(&user_id)
            .map(|account| account.role);
        Box::pin(async move { Ok(role) })
    }

    fn verify_password<'a>(&'a self, user_id: UserId, password: &'a str) -> StoreFuture<'a, bool> {
        let matches = self
            .accounts
            .read()
            .unwrap()
            .get(&user_id)
            .is_some_and(|account| account.password == password);
        Box::pin(async move { Ok(matches) })
    }
}

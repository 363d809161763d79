//! Roles and password checks read from the `identity` table.

use crate::store::db_error;
use sqlx::PgPool;
use stockroom_core::identity::{IdentityDirectory, Role, UserId};
use stockroom_core::store::{StoreError, StoreFuture};
use tracing::warn;

/// Read-only view of the account table.
#[derive(Clone, Debug)]
pub struct PostgresIdentityDirectory {
    pool: PgPool,
}

impl PostgresIdentityDirectory {
    /// Create a directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityDirectory for PostgresIdentityDirectory {
    fn role_of(&self, user_id: UserId) -> StoreFuture<'_, Option<Role>> {
        Box::pin(async move {
            let role: Option<(String,)> = sqlx::query_as("SELECT role FROM identity WHERE id = $1")
                .bind(user_id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load role", &e))?;
            Ok(role.map(|(role,)| Role::from_stored(&role)))
        })
    }

    fn verify_password<'a>(&'a self, user_id: UserId, password: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let hash: Option<(Option<String>,)> =
                sqlx::query_as("SELECT password FROM identity WHERE id = $1")
                    .bind(user_id.get())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("Failed to load password hash", &e))?;
            let Some((Some(hash),)) = hash else {
                return Ok(false);
            };

            // bcrypt is CPU-bound.
            let password = password.to_string();
            let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
                .await
                .map_err(|e| StoreError::DatabaseError(format!("Password check aborted: {e}")))?;

            match verified {
                Ok(matches) => Ok(matches),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Stored password hash is unreadable");
                    Ok(false)
                }
            }
        })
    }
}

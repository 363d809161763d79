//! Callers and their roles.
//!
//! Authentication happens upstream. By the time a request reaches the
//! inventory, the caller is known by a [`UserId`]; the role and the
//! password hash are read from an [`IdentityDirectory`].

use crate::error::InventoryError;
use crate::store::StoreFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw user identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access level of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full inventory management.
    Admin,
    /// Can browse the inventory and reserve items.
    Member,
    /// Read-only guest without inventory access.
    Visitor,
}

impl Role {
    /// Interpret the role column of the identity directory. Unknown values
    /// grant no inventory access.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "member" => Self::Member,
            _ => Self::Visitor,
        }
    }

    /// Lower-case name, as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Visitor => "visitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of an inventory operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role at the time of the request.
    pub role: Role,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Reject anyone but administrators.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Authorization`] for members and visitors.
    pub fn require_admin(&self) -> Result<(), InventoryError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Member | Role::Visitor => Err(InventoryError::Authorization(
                "Forbidden: Admin access required".to_string(),
            )),
        }
    }

    /// Reject visitors.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Authorization`] for visitors.
    pub fn require_member(&self) -> Result<(), InventoryError> {
        match self.role {
            Role::Admin | Role::Member => Ok(()),
            Role::Visitor => Err(InventoryError::Authorization(
                "Forbidden: Member access required".to_string(),
            )),
        }
    }
}

/// Read access to the user directory owned by the authentication
/// subsystem.
pub trait IdentityDirectory: Send + Sync {
    /// Role of a user, or `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be queried.
    fn role_of(&self, user_id: UserId) -> StoreFuture<'_, Option<Role>>;

    /// Whether `password` matches the stored hash of `user_id`. Unknown
    /// users never match.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be queried.
    fn verify_password<'a>(&'a self, user_id: UserId, password: &'a str) -> StoreFuture<'a, bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_roles_are_parsed_leniently() {
        assert_eq!(Role::from_stored("admin"), Role::Admin);
        assert_eq!(Role::from_stored(" Member "), Role::Member);
        assert_eq!(Role::from_stored("visitor"), Role::Visitor);
        assert_eq!(Role::from_stored("superuser"), Role::Visitor);
    }

    #[test]
    fn admin_passes_every_check() {
        let admin = Principal::new(UserId::new(1), Role::Admin);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_member().is_ok());
    }

    #[test]
    fn member_cannot_manage() {
        let member = Principal::new(UserId::new(2), Role::Member);
        assert!(member.require_member().is_ok());
        assert!(matches!(
            member.require_admin(),
            Err(InventoryError::Authorization(message)) if message == "Forbidden: Admin access required"
        ));
    }

    #[test]
    fn visitor_is_rejected_everywhere() {
        let visitor = Principal::new(UserId::new(3), Role::Visitor);
        assert!(visitor.require_member().is_err());
        assert!(visitor.require_admin().is_err());
    }
}

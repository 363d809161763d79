//! HTTP request handlers.

pub mod health;
pub mod inventory;

pub use health::{health_check, readiness};
pub use inventory::{Action, get_action, post_action};

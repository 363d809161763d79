//! Stockroom server: configuration, telemetry and wiring.

pub mod config;
pub mod telemetry;

pub use config::{Config, ConfigError};

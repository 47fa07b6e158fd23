//! Shared building blocks for the broker client crates: client configuration
//! and small JSON/time helpers.

pub mod config;
pub mod types;

pub use config::{ClientConfig, ConfigError};
pub use types::{merge_fields, now_millis};

//! Persistent key-value storage for client-side session data.
//!
//! Values are opaque bytes at the [`KVStore`] level; the [`codec`] helpers
//! store typed values as JSON.

pub mod codec;
pub mod error;
pub mod memory;
pub mod redb;
pub mod traits;

pub use codec::{get_json, set_json};
pub use error::KVError;
pub use memory::MemoryStore;
pub use redb::RedbStore;
pub use traits::KVStore;

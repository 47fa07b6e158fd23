use thiserror::Error;

/// Store failure, carrying the backend's message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KVError {
    /// Backend read/write or transaction failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored value did not decode as the requested type.
    #[error("serialization error: {0}")]
    Serialization(String),
}

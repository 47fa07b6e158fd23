//! JSON encoding for typed values stored in a [`KVStore`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::KVError;
use crate::traits::KVStore;

/// Read and decode a JSON value. Missing keys yield `Ok(None)`.
pub fn get_json<T: DeserializeOwned>(kv: &dyn KVStore, key: &str) -> Result<Option<T>, KVError> {
    match kv.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KVError::Serialization(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}

/// Encode a value as JSON and store it under `key`.
pub fn set_json<T: Serialize + ?Sized>(kv: &dyn KVStore, key: &str, value: &T) -> Result<(), KVError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| KVError::Serialization(format!("{}: {}", key, e)))?;
    kv.set(key, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn string_is_stored_as_json() {
        let kv = MemoryStore::new();
        set_json(&kv, "access_token", "T1").unwrap();

        assert_eq!(kv.get("access_token").unwrap(), Some(b"\"T1\"".to_vec()));
        assert_eq!(get_json::<String>(&kv, "access_token").unwrap(), Some("T1".to_string()));
    }

    #[test]
    fn missing_key_is_none() {
        let kv = MemoryStore::new();
        assert_eq!(get_json::<String>(&kv, "nope").unwrap(), None);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let kv = MemoryStore::new();
        kv.set("user_info", b"{not json").unwrap();

        let err = get_json::<serde_json::Value>(&kv, "user_info").unwrap_err();
        assert!(matches!(err, KVError::Serialization(ref m) if m.starts_with("user_info")));
    }
}

use crate::error::KVError;

/// KVStore provides a synchronous key-value storage interface.
///
/// Keys are flat names (`access_token`, `user_info`, ...). Implementations
/// must apply batch operations in slice order.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Set several entries in order. Stops at the first failing write.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Delete several keys in order.
    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Check whether a key is present.
    fn contains(&self, key: &str) -> Result<bool, KVError> {
        Ok(self.get(key)?.is_some())
    }
}

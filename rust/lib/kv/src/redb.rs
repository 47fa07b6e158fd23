use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database. Batch operations commit in a single write transaction,
/// so a failed batch leaves no partial writes behind.
pub struct RedbStore {
    db: Arc<Database>,
}

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage)?;
            }
        }
        let db = Database::create(path).map_err(storage)?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.batch_set(&[(key, value)])
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.batch_delete(&[key])
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            for key in keys {
                table.remove(*key).map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kv = RedbStore::open(&dir.path().join("session.redb")).unwrap();

        kv.set("access_token", b"\"T1\"").unwrap();
        assert_eq!(kv.get("access_token").unwrap(), Some(b"\"T1\"".to_vec()));

        kv.delete("access_token").unwrap();
        assert_eq!(kv.get("access_token").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.redb");
        {
            let kv = RedbStore::open(&path).unwrap();
            kv.batch_set(&[("access_token", b"t"), ("last_login_time", b"now")]).unwrap();
        }

        let kv = RedbStore::open(&path).unwrap();
        assert_eq!(kv.get("access_token").unwrap(), Some(b"t".to_vec()));
        assert_eq!(kv.get("last_login_time").unwrap(), Some(b"now".to_vec()));
    }

    #[test]
    fn batch_delete_ignores_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let kv = RedbStore::open(&dir.path().join("session.redb")).unwrap();

        kv.set("user_info", b"{}").unwrap();
        kv.batch_delete(&["access_token", "user_info", "openid"]).unwrap();
        assert!(!kv.contains("user_info").unwrap());
    }
}

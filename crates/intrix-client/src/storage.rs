//! Durable storage for the download cooldown record.
//!
//! # Design
//! - One record, one key: the expiry timestamp in epoch milliseconds.
//! - The file store keeps a flat JSON object so unrelated keys written by other
//!   tools survive a rewrite.
//! - Writes go to a sibling temp file first and are renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::error;

use crate::error::{ClientError, ClientResult};

/// Key under which the cooldown expiry is persisted.
pub const DOWNLOAD_COOLDOWN_KEY: &str = "downloadDisabledUntil";

/// Persistence for the batch download cooldown expiry.
pub trait CooldownStore: Send + Sync {
    /// Read the persisted expiry, if any.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be read.
    fn load(&self) -> ClientResult<Option<i64>>;

    /// Persist a new expiry, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn save(&self, expires_at_ms: i64) -> ClientResult<()>;

    /// Remove the persisted expiry.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn clear(&self) -> ClientResult<()>;
}

/// In-process store used by tests and one-shot sessions.
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    value: Mutex<Option<i64>>,
}

impl MemoryCooldownStore {
    /// Create a store pre-populated with `expires_at_ms`.
    #[must_use]
    pub const fn with_value(expires_at_ms: i64) -> Self {
        Self {
            value: Mutex::new(Some(expires_at_ms)),
        }
    }

    /// Inspect the stored value without going through the trait.
    #[must_use]
    pub fn peek(&self) -> Option<i64> {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Option<i64>> {
        match self.value.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("cooldown store mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn load(&self) -> ClientResult<Option<i64>> {
        Ok(*self.lock())
    }

    fn save(&self, expires_at_ms: i64) -> ClientResult<()> {
        *self.lock() = Some(expires_at_ms);
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.lock() = None;
        Ok(())
    }
}

/// JSON-file backed store that survives process restarts.
#[derive(Debug)]
pub struct FileCooldownStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCooldownStore {
    /// Store rooted at `path`; the file and its parent are created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(
        &self,
        operation: &'static str,
    ) -> ClientResult<BTreeMap<String, serde_json::Value>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(ClientError::StorageIo {
                    operation,
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw).map_err(|source| ClientError::StorageJson {
            operation,
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(
        &self,
        operation: &'static str,
        map: &BTreeMap<String, serde_json::Value>,
    ) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ClientError::StorageIo {
                operation,
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body = serde_json::to_vec_pretty(map).map_err(|source| ClientError::StorageJson {
            operation,
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|source| ClientError::StorageIo {
            operation,
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ClientError::StorageIo {
            operation,
            path: self.path.clone(),
            source,
        })
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("cooldown file lock poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl CooldownStore for FileCooldownStore {
    fn load(&self) -> ClientResult<Option<i64>> {
        let map = self.read_map("load")?;
        Ok(map.get(DOWNLOAD_COOLDOWN_KEY).and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
        }))
    }

    fn save(&self, expires_at_ms: i64) -> ClientResult<()> {
        let _guard = self.lock_writes();
        let mut map = self.read_map("save")?;
        map.insert(DOWNLOAD_COOLDOWN_KEY.to_string(), expires_at_ms.into());
        self.write_map("save", &map)
    }

    fn clear(&self) -> ClientResult<()> {
        let _guard = self.lock_writes();
        let mut map = self.read_map("clear")?;
        if map.remove(DOWNLOAD_COOLDOWN_KEY).is_none() {
            return Ok(());
        }
        self.write_map("clear", &map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips_and_clears() -> Result<()> {
        let store = MemoryCooldownStore::default();
        assert_eq!(store.load()?, None);
        store.save(42)?;
        assert_eq!(store.peek(), Some(42));
        store.clear()?;
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[test]
    fn file_store_persists_across_instances() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("state.json");
        FileCooldownStore::new(&path).save(1_700_000_600_000)?;

        let reopened = FileCooldownStore::new(&path);
        assert_eq!(reopened.load()?, Some(1_700_000_600_000));
        reopened.clear()?;
        assert_eq!(FileCooldownStore::new(&path).load()?, None);
        Ok(())
    }

    #[test]
    fn file_store_preserves_unrelated_keys_and_accepts_string_values() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            serde_json::to_vec(&json!({"theme": "dark", "downloadDisabledUntil": "1234"}))?,
        )?;

        let store = FileCooldownStore::new(&path);
        assert_eq!(store.load()?, Some(1234));
        store.clear()?;

        let remaining: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(remaining, json!({"theme": "dark"}));
        Ok(())
    }

    #[test]
    fn file_store_reports_corrupt_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json")?;
        let err = FileCooldownStore::new(&path)
            .load()
            .expect_err("corrupt file should fail");
        assert!(matches!(err, ClientError::StorageJson { operation: "load", .. }));
        Ok(())
    }

    #[test]
    fn missing_or_blank_file_reads_as_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        assert_eq!(FileCooldownStore::new(&path).load()?, None);
        fs::write(&path, b"  \n")?;
        assert_eq!(FileCooldownStore::new(&path).load()?, None);
        Ok(())
    }
}

//! Persistent key/value collaborator.
//!
//! The engine never assumes a concrete persistence mechanism; anything that
//! can round-trip bytes by key works. [`FileStore`] is the default
//! file-per-key implementation, [`MemoryStore`] backs tests and ephemeral
//! setups.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// File-per-key store rooted at a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the store, ensuring the directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).context("Failed to create store directory")?;
        Ok(Self { dir })
    }

    /// Keys may contain coordinate tokens and dates; map them to safe
    /// filenames.
    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("missing").unwrap().is_none());

        store.set("k", b"value").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"value");

        store.set("k", b"updated").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"updated");

        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.set("prayer_times_45.502_-73.567_21-6-2024_2_0", b"{}").unwrap();
        assert_eq!(
            store
                .get("prayer_times_45.502_-73.567_21-6-2024_2_0")
                .unwrap()
                .unwrap(),
            b"{}"
        );

        store.remove("prayer_times_45.502_-73.567_21-6-2024_2_0").unwrap();
        assert!(store
            .get("prayer_times_45.502_-73.567_21-6-2024_2_0")
            .unwrap()
            .is_none());
        // Removing a missing key is not an error
        store.remove("never_existed").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path()).unwrap();
            store.set("flag", b"true").unwrap();
        }
        let store = FileStore::new(dir.path()).unwrap();
        assert_eq!(store.get("flag").unwrap().unwrap(), b"true");
    }
}

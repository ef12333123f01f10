//! Key-value backends for draft snapshots

use async_trait::async_trait;
use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Persistent string key-value store, the only thing drafts need from storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, used in tests and when no data directory exists
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `drafts/` under the platform data directory
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("dev", "formflow", "formflow")
            .map(|dirs| Self::new(dirs.data_dir().join("drafts")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod memory_store {
        use super::*;

        #[tokio::test]
        async fn test_set_get_remove() {
            let store = MemoryStore::new();
            assert!(store.get("k").await.unwrap().is_none());
            store.set("k", "v1".to_string()).await.unwrap();
            store.set("k", "v2".to_string()).await.unwrap();
            assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
            assert_eq!(store.len(), 1);
            store.remove("k").await.unwrap();
            store.remove("k").await.unwrap();
            assert!(store.is_empty());
        }
    }

    mod file_store {
        use super::*;

        #[tokio::test]
        async fn test_round_trip_on_disk() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileStore::new(dir.path().join("drafts"));

            assert!(store.get("form_contact_autosave").await.unwrap().is_none());
            store
                .set("form_contact_autosave", r#"{"a":1}"#.to_string())
                .await
                .unwrap();
            assert_eq!(
                store.get("form_contact_autosave").await.unwrap().as_deref(),
                Some(r#"{"a":1}"#)
            );
            assert!(dir.path().join("drafts/form_contact_autosave.json").exists());

            store.remove("form_contact_autosave").await.unwrap();
            assert!(store.get("form_contact_autosave").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_remove_missing_key_is_ok() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileStore::new(dir.path());
            assert!(store.remove("nothing").await.is_ok());
        }

        #[test]
        fn test_keys_cannot_escape_directory() {
            let store = FileStore::new("/tmp/drafts");
            assert_eq!(
                store.path_for("../etc/passwd"),
                PathBuf::from("/tmp/drafts/___etc_passwd.json")
            );
        }
    }
}

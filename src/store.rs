use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{Error, Result};

#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, key: &str, value: &[u8]) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

pub fn internal_settings_key(namespace: &str) -> String {
    format!("{namespace}.internal_settings_storage")
}

pub fn device_key(namespace: &str, device_id: &str) -> String {
    format!("{namespace}.device.{device_id}")
}

pub fn selfdiag_key(namespace: &str, device_id: &str) -> String {
    format!("{namespace}.device.{device_id}.selfdiag")
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
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
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn load_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    let Some(bytes) = store.load(key).await? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!(key, "discarding unreadable stored value: {e}");
            Ok(None)
        }
    }
}

pub async fn save_json<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Storage(e.to_string()))?;
    store.save(key, &bytes).await
}

/// Read-modify-write of a JSON value. Concurrent writers race at
/// last-writer-wins granularity.
pub async fn update_json<T, F>(store: &dyn Store, key: &str, f: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T),
{
    let mut value: T = load_json(store, key).await?.unwrap_or_default();
    f(&mut value);
    save_json(store, key, &value).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn memory_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load("a").await.unwrap().is_none());
        store.save("a", b"1").await.unwrap();
        assert_eq!(store.load("a").await.unwrap().unwrap(), b"1");
        store.remove("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = device_key("tcl_hvac", "dev/1");
        FileStore::new(dir.path())
            .save(&key, br#"{"x":1}"#)
            .await
            .unwrap();
        let again = FileStore::new(dir.path());
        let v: Value = load_json(&again, &key).await.unwrap().unwrap();
        assert_eq!(v, json!({"x": 1}));
        again.remove(&key).await.unwrap();
        again.remove(&key).await.unwrap();
        assert!(again.load(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_json_starts_from_default() {
        let store = MemoryStore::new();
        let v: Value = update_json(&store, "k", |v: &mut Value| {
            *v = json!({"count": 1});
        })
        .await
        .unwrap();
        assert_eq!(v["count"], 1);
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_absent() {
        let store = MemoryStore::new();
        store.save("k", b"{not json").await.unwrap();
        let v: Option<Value> = load_json(&store, "k").await.unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn key_layout() {
        assert_eq!(internal_settings_key("ns"), "ns.internal_settings_storage");
        assert_eq!(device_key("ns", "d1"), "ns.device.d1");
        assert_eq!(selfdiag_key("ns", "d1"), "ns.device.d1.selfdiag");
    }
}

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::DriverError;

/// Integer preferences that survive process restarts.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<i64>, DriverError>;

    async fn set(&self, key: &str, value: i64) -> Result<(), DriverError>;

    async fn remove(&self, key: &str) -> Result<(), DriverError>;
}

#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    values: Arc<Mutex<HashMap<String, i64>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, DriverError> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), DriverError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DriverError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Keeps all values in a single JSON document. Every write rewrites the file.
#[derive(Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
    values: Arc<Mutex<HashMap<String, i64>>>,
}

impl FileKeyValueStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| DriverError::Storage(format!("Failed to create directory {:?}: {err}", parent)))?;
            }
        }

        let values = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| DriverError::Storage(format!("Corrupt store file {:?}: {err}", path)))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(DriverError::Storage(format!("Failed to read store file {:?}: {err}", path))),
        };

        Ok(Self {
            path,
            values: Arc::new(Mutex::new(values)),
        })
    }

    async fn flush(&self, values: &HashMap<String, i64>) -> Result<(), DriverError> {
        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|err| DriverError::Storage(format!("Failed to serialize store: {err}")))?;

        // Write next to the target, then rename over it.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| DriverError::Storage(format!("Failed to write store file {:?}: {err}", tmp)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| DriverError::Storage(format!("Failed to replace store file {:?}: {err}", self.path)))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, DriverError> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), DriverError> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.flush(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), DriverError> {
        let mut values = self.values.lock().await;
        if values.remove(key).is_some() {
            self.flush(&values).await?;
        }
        Ok(())
    }
}

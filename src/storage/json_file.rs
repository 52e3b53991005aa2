// src/storage/json_file.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::StoreError;
use crate::storage::{LifecycleStore, MemoryStore};
use crate::types::TradeLifecycle;

/// Lifecycle map persisted as one pretty-printed JSON document, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store, loading existing records if the file is present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records: BTreeMap<String, TradeLifecycle> = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Opened lifecycle store {} ({} records)", path.display(), records.len());

        Ok(Self {
            path,
            inner: MemoryStore::from_records(records),
            write_lock: Mutex::new(()),
        })
    }

    async fn save(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let data = serde_json::to_string_pretty(&self.inner.records().await)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write beside the store, then rename over it.
        let tmp = self.tmp_path();
        let written = match tokio::fs::write(&tmp, data).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            error!("Failed to save lifecycle store {}: {}", self.path.display(), e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LifecycleStore for JsonFileStore {
    async fn upsert(&self, lifecycle: &TradeLifecycle) -> Result<(), StoreError> {
        self.inner.upsert(lifecycle).await?;
        self.save().await
    }

    async fn get(&self, lifecycle_id: &str) -> Result<Option<TradeLifecycle>, StoreError> {
        self.inner.get(lifecycle_id).await
    }

    async fn delete(&self, lifecycle_id: &str) -> Result<bool, StoreError> {
        let removed = self.inner.delete(lifecycle_id).await?;
        if removed {
            self.save().await?;
        }
        Ok(removed)
    }

    async fn all(&self) -> Result<Vec<TradeLifecycle>, StoreError> {
        self.inner.all().await
    }
}

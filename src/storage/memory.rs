// src/storage/memory.rs
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::storage::LifecycleStore;
use crate::types::TradeLifecycle;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, TradeLifecycle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: BTreeMap<String, TradeLifecycle>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub(crate) async fn records(&self) -> BTreeMap<String, TradeLifecycle> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn upsert(&self, lifecycle: &TradeLifecycle) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(lifecycle.lifecycle_id.clone(), lifecycle.clone());
        Ok(())
    }

    async fn get(&self, lifecycle_id: &str) -> Result<Option<TradeLifecycle>, StoreError> {
        Ok(self.records.read().await.get(lifecycle_id).cloned())
    }

    async fn delete(&self, lifecycle_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(lifecycle_id).is_some())
    }

    async fn all(&self) -> Result<Vec<TradeLifecycle>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

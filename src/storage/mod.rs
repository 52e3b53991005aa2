// src/storage/mod.rs
pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::TradeLifecycle;

/// Lifecycle persistence keyed by `lifecycle_id`.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Inserts or replaces the record with the same id.
    async fn upsert(&self, lifecycle: &TradeLifecycle) -> Result<(), StoreError>;

    async fn get(&self, lifecycle_id: &str) -> Result<Option<TradeLifecycle>, StoreError>;

    /// Returns true if a record was removed.
    async fn delete(&self, lifecycle_id: &str) -> Result<bool, StoreError>;

    async fn all(&self) -> Result<Vec<TradeLifecycle>, StoreError>;

    /// Lifecycles with at least one fill in `[start, end)`, ordered by entry time then id.
    async fn with_activity_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TradeLifecycle>, StoreError> {
        let mut out: Vec<TradeLifecycle> = self
            .all()
            .await?
            .into_iter()
            .filter(|lc| lc.has_activity_between(start, end))
            .collect();
        out.sort_by(|a, b| {
            a.metrics
                .entry_ts
                .cmp(&b.metrics.entry_ts)
                .then_with(|| a.lifecycle_id.cmp(&b.lifecycle_id))
        });
        Ok(out)
    }
}

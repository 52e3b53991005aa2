// src/connectors/traits.rs
use crate::error::IngestError;
use crate::types::ExecutionFill;
use async_trait::async_trait;

/// Supplies validated, deduplicated, time-ordered fills per symbol.
#[async_trait]
pub trait FillSource: Send + Sync {
    async fn symbols(&self) -> Result<Vec<String>, IngestError>;

    async fn fetch_fills(&self, symbol: &str) -> Result<Vec<ExecutionFill>, IngestError>;
}

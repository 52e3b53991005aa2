// src/connectors/json_file.rs
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

use crate::connectors::messages::{prepare_fills, RawFill};
use crate::connectors::traits::FillSource;
use crate::error::IngestError;
use crate::types::ExecutionFill;

/// Reads an exported JSON array of exchange fill records.
pub struct JsonFileFillSource {
    exchange: String,
    path: PathBuf,
}

impl JsonFileFillSource {
    pub fn new(exchange: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            exchange: exchange.to_string(),
            path: path.into(),
        }
    }

    async fn load(&self) -> Result<Vec<RawFill>, IngestError> {
        let data = tokio::fs::read_to_string(&self.path).await?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&data)?;
        let records = values
            .into_iter()
            .map(RawFill::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        info!("Loaded {} fill records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

#[async_trait]
impl FillSource for JsonFileFillSource {
    async fn symbols(&self) -> Result<Vec<String>, IngestError> {
        let symbols: BTreeSet<String> = self.load().await?.into_iter().map(|r| r.symbol).collect();
        Ok(symbols.into_iter().collect())
    }

    async fn fetch_fills(&self, symbol: &str) -> Result<Vec<ExecutionFill>, IngestError> {
        let records: Vec<RawFill> = self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.symbol == symbol)
            .collect();
        prepare_fills(&self.exchange, &records)
    }
}

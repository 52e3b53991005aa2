// src/error.rs
use thiserror::Error;

/// Rejections at the fill ingestion boundary. Nothing past this point re-validates.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Fill {index}: negative {field} ({value})")]
    Negative {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("Fill {index}: unrecognized side '{side}'")]
    UnknownSide { index: usize, side: String },

    #[error("Fill {index}: timestamp {ts} out of range")]
    BadTimestamp { index: usize, ts: String },

    #[error("Failed to read fills: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse fills: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CoachError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize review: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoachError>;

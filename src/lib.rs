// src/lib.rs
//! Rebuilds position lifecycles from exchange fills and reviews them against deterministic rules.

pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod logging;
pub mod rules;
pub mod scoring;
pub mod storage;
pub mod types;
pub mod utils;

pub use crate::config::{AppConfig, DetectionConfig, NightWindow};
pub use crate::core::aggregator::{aggregate_fills, AggregationResult};
pub use crate::core::engine::{run_pipeline, PipelineOutput, ReviewEngine, ReviewOutcome};
pub use crate::core::metrics::recompute;
pub use crate::rules::detect_events;
pub use crate::rules::events::{EventType, Evidence, Severity, TradeEvent};
pub use crate::scoring::{compute_discipline_score, DisciplineScore};
pub use crate::types::{
    AccountSnapshot, ExecutionFill, FundingPayment, LifecycleStatus, PositionSide, Side, TradeLifecycle,
    TradeMetrics, TradePlan, TradeSide,
};

// src/core/mod.rs
pub mod aggregator;
pub mod engine;
pub mod metrics;

// src/core/engine.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::DetectionConfig;
use crate::connectors::traits::FillSource;
use crate::core::aggregator::aggregate_fills;
use crate::error::{Result, StoreError};
use crate::rules::events::TradeEvent;
use crate::rules::RuleSet;
use crate::scoring::{compute_discipline_score, DisciplineScore};
use crate::storage::LifecycleStore;
use crate::types::{AccountSnapshot, ExecutionFill, TradeLifecycle};

/// Everything one in-memory pass produces for a single (exchange, symbol) stream.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub lifecycles: Vec<TradeLifecycle>,
    pub warnings: Vec<String>,
    pub events: Vec<TradeEvent>,
    pub score: DisciplineScore,
}

/// fills -> lifecycles -> metrics -> events -> score, with no I/O.
pub fn run_pipeline(
    exchange: &str,
    symbol: &str,
    fills: Vec<ExecutionFill>,
    snapshot: Option<AccountSnapshot>,
    config: &DetectionConfig,
) -> PipelineOutput {
    let aggregated = aggregate_fills(exchange, symbol, fills);
    let mut lifecycles = aggregated.lifecycles;
    if let Some(snapshot) = snapshot {
        for lc in lifecycles.iter_mut() {
            lc.attach_snapshot(snapshot);
        }
    }
    for lc in lifecycles.iter_mut() {
        lc.recompute();
    }

    let events = RuleSet::new(config).detect(&lifecycles);
    let score = compute_discipline_score(&events);
    PipelineOutput {
        lifecycles,
        warnings: aggregated.warnings,
        events,
        score,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub symbol: String,
    pub lifecycles_upserted: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub lifecycle_ids: Vec<String>,
    pub events: Vec<TradeEvent>,
    pub score: DisciplineScore,
    /// SHA-256 over the serialized events and score; equal inputs give equal fingerprints.
    pub fingerprint: String,
}

/// Start of the `days`-long window ending at `end`, or None if it overflows.
pub fn lookback_start(end: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|lookback| end.checked_sub_signed(lookback))
}

pub fn fingerprint(events: &[TradeEvent], score: &DisciplineScore) -> Result<String> {
    let payload = serde_json::to_vec(&(events, score))?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

pub struct ReviewEngine<S> {
    rules: RuleSet,
    store: S,
}

impl<S> ReviewEngine<S>
where
    S: LifecycleStore,
{
    pub fn new(config: &DetectionConfig, store: S) -> Self {
        Self {
            rules: RuleSet::new(config),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Aggregates one symbol's fills and upserts the lifecycles.
    /// Plans and annotations already stored under the same id are kept.
    pub async fn ingest(
        &self,
        exchange: &str,
        symbol: &str,
        fills: Vec<ExecutionFill>,
        snapshot: Option<AccountSnapshot>,
    ) -> std::result::Result<IngestSummary, StoreError> {
        info!("Ingesting {} fills for {}:{}", fills.len(), exchange, symbol);
        let aggregated = aggregate_fills(exchange, symbol, fills);

        let mut upserted = 0;
        for mut lc in aggregated.lifecycles {
            if let Some(previous) = self.store.get(&lc.lifecycle_id).await? {
                lc.carry_annotations_from(&previous);
            }
            if let Some(snapshot) = snapshot {
                lc.attach_snapshot(snapshot);
            }
            lc.recompute();
            self.store.upsert(&lc).await?;
            upserted += 1;
        }

        if !aggregated.warnings.is_empty() {
            warn!("{} aggregation warnings for {}", aggregated.warnings.len(), symbol);
        }
        Ok(IngestSummary {
            symbol: symbol.to_string(),
            lifecycles_upserted: upserted,
            warnings: aggregated.warnings,
        })
    }

    /// Pulls one symbol from `source` and ingests it.
    pub async fn ingest_from<F>(
        &self,
        source: &F,
        exchange: &str,
        symbol: &str,
        snapshot: Option<AccountSnapshot>,
    ) -> Result<IngestSummary>
    where
        F: FillSource + ?Sized,
    {
        let fills = source.fetch_fills(symbol).await?;
        Ok(self.ingest(exchange, symbol, fills, snapshot).await?)
    }

    /// Evaluates every lifecycle with a fill inside `[start, end)`.
    pub async fn review(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ReviewOutcome> {
        let mut lifecycles = self.store.with_activity_between(start, end).await?;
        for lc in lifecycles.iter_mut() {
            lc.recompute();
        }

        let events = self.rules.detect(&lifecycles);
        let score = compute_discipline_score(&events);
        let fingerprint = fingerprint(&events, &score)?;
        info!(
            "Reviewed {} lifecycles: {} events, score {}",
            lifecycles.len(),
            events.len(),
            score.score
        );

        Ok(ReviewOutcome {
            window_start: start,
            window_end: end,
            lifecycle_ids: lifecycles.into_iter().map(|lc| lc.lifecycle_id).collect(),
            events,
            score,
            fingerprint,
        })
    }
}

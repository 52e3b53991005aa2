// src/rules/mod.rs
pub mod events;
pub mod lifecycle;
pub mod streak;
pub mod traits;

use tracing::debug;

use crate::config::DetectionConfig;
use crate::rules::events::TradeEvent;
use crate::rules::lifecycle::{
    BigLossPctEquity, CloseCompleted, HighLeverageUsed, NightTrading, OpenCompleted, StopLossTriggered,
};
use crate::rules::streak::ConsecutiveLosses;
use crate::rules::traits::{BatchRule, LifecycleRule};
use crate::types::TradeLifecycle;

/// Ordered rule list built from one immutable config.
pub struct RuleSet {
    per_lifecycle: Vec<Box<dyn LifecycleRule>>,
    batch: Vec<Box<dyn BatchRule>>,
}

impl RuleSet {
    pub fn new(config: &DetectionConfig) -> Self {
        // Output order follows this list.
        let per_lifecycle: Vec<Box<dyn LifecycleRule>> = vec![
            Box::new(OpenCompleted),
            Box::new(CloseCompleted),
            Box::new(StopLossTriggered),
            Box::new(BigLossPctEquity {
                threshold_pct: config.big_loss_threshold_pct,
            }),
            Box::new(HighLeverageUsed {
                threshold: config.high_leverage_threshold,
            }),
            Box::new(NightTrading {
                window: config.night_window.clone(),
            }),
        ];
        let batch: Vec<Box<dyn BatchRule>> = vec![Box::new(ConsecutiveLosses {
            n: config.consecutive_losses_n,
        })];
        Self { per_lifecycle, batch }
    }

    /// Per-lifecycle rules only. Reads metrics as they are; call `recompute` first.
    pub fn detect_for_lifecycle(&self, lc: &TradeLifecycle) -> Vec<TradeEvent> {
        if lc.fills.is_empty() {
            return Vec::new();
        }
        let fills = lc.sorted_fills();
        self.per_lifecycle
            .iter()
            .filter_map(|rule| {
                let event = rule.evaluate(lc, &fills);
                if event.is_none() {
                    debug!("{}: {} not fired", lc.lifecycle_id, rule.event_type());
                }
                event
            })
            .collect()
    }

    /// Every lifecycle's events in input order, then the batch rules.
    pub fn detect(&self, lifecycles: &[TradeLifecycle]) -> Vec<TradeEvent> {
        let mut events: Vec<TradeEvent> = lifecycles
            .iter()
            .flat_map(|lc| self.detect_for_lifecycle(lc))
            .collect();
        // Batch rules see the whole set only after all per-lifecycle work is done.
        events.extend(self.batch.iter().filter_map(|rule| rule.evaluate(lifecycles)));
        events
    }
}

/// Runs every rule over a batch of lifecycles with finalized metrics.
pub fn detect_events(lifecycles: &[TradeLifecycle], config: &DetectionConfig) -> Vec<TradeEvent> {
    RuleSet::new(config).detect(lifecycles)
}

// src/rules/traits.rs
use crate::rules::events::{EventType, TradeEvent};
use crate::types::{ExecutionFill, TradeLifecycle};

/// A deterministic check over one lifecycle.
///
/// Either returns one fully evidenced event or nothing. Missing inputs mean no event.
pub trait LifecycleRule: Send + Sync {
    fn event_type(&self) -> EventType;

    /// `fills` are the lifecycle's fills in chronological order.
    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent>;
}

/// A check over a whole batch of lifecycles. Runs after every per-lifecycle rule.
pub trait BatchRule: Send + Sync {
    fn event_type(&self) -> EventType;

    fn evaluate(&self, lifecycles: &[TradeLifecycle]) -> Option<TradeEvent>;
}

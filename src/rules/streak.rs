// src/rules/streak.rs
use rust_decimal::Decimal;

use crate::rules::events::{EventType, Evidence, LossRef, Severity, TradeEvent};
use crate::rules::traits::BatchRule;
use crate::types::TradeLifecycle;

/// Fires once per batch when the latest `n` finished lifecycles, by exit time, all lost money.
pub struct ConsecutiveLosses {
    pub n: usize,
}

impl BatchRule for ConsecutiveLosses {
    fn event_type(&self) -> EventType {
        EventType::ConsecutiveLosses
    }

    fn evaluate(&self, lifecycles: &[TradeLifecycle]) -> Option<TradeEvent> {
        if self.n < 2 {
            return None;
        }

        let mut finished: Vec<LossRef> = lifecycles
            .iter()
            .filter_map(|lc| {
                Some(LossRef {
                    lifecycle_id: lc.lifecycle_id.clone(),
                    symbol: lc.symbol.clone(),
                    position_side: lc.position_side,
                    exit_ts: lc.metrics.exit_ts?,
                    realized_pnl_usdt: lc.metrics.realized_pnl_usdt?,
                })
            })
            .collect();
        if finished.len() < self.n {
            return None;
        }
        finished.sort_by(|a, b| {
            a.exit_ts
                .cmp(&b.exit_ts)
                .then_with(|| a.lifecycle_id.cmp(&b.lifecycle_id))
        });

        let window = finished.split_off(finished.len() - self.n);
        if !window.iter().all(|w| w.realized_pnl_usdt < Decimal::ZERO) {
            return None;
        }

        let last = window.last()?;
        let anchor = lifecycles.iter().find(|lc| lc.lifecycle_id == last.lifecycle_id)?;
        let occurred_at = last.exit_ts;

        let mut event = TradeEvent::for_lifecycle(
            anchor,
            self.event_type(),
            Severity::P0,
            occurred_at,
            Evidence::ConsecutiveLosses {
                n: self.n,
                window,
                comparison: "last_n_realized_pnl_usdt_all < 0".to_string(),
            },
        );
        event.event_id = format!("{}:{}", event.event_id, self.n);
        Some(event)
    }
}

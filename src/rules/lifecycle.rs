// src/rules/lifecycle.rs
//! Rules that look at a single lifecycle.

use chrono::{Offset, Timelike};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::NightWindow;
use crate::rules::events::{EventType, Evidence, FillRef, NightWindowRef, Severity, TradeEvent};
use crate::rules::traits::LifecycleRule;
use crate::types::{ExecutionFill, PositionSide, TradeLifecycle};
use crate::utils::precision::pct_of;

pub struct OpenCompleted;

impl LifecycleRule for OpenCompleted {
    fn event_type(&self) -> EventType {
        EventType::OpenCompleted
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        let first = fills.first()?;
        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P2,
            first.ts,
            Evidence::Fill {
                fill: FillRef::from(*first),
            },
        ))
    }
}

pub struct CloseCompleted;

impl LifecycleRule for CloseCompleted {
    fn event_type(&self) -> EventType {
        EventType::CloseCompleted
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        if !lc.is_closed() {
            return None;
        }
        let last = fills.last()?;
        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P2,
            last.ts,
            Evidence::Fill {
                fill: FillRef::from(*last),
            },
        ))
    }
}

/// Fires on the first exit-side fill that reaches the planned stop.
pub struct StopLossTriggered;

impl LifecycleRule for StopLossTriggered {
    fn event_type(&self) -> EventType {
        EventType::StopLossTriggered
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        let stop = lc.plan.planned_stop_loss?;
        let exit_side = lc.position_side.exit_side()?;

        let comparison = match lc.position_side {
            PositionSide::Long => "price <= planned_stop_loss",
            PositionSide::Short => "price >= planned_stop_loss",
            PositionSide::Unknown => return None,
        };
        let crossed = |price: Decimal| match lc.position_side {
            PositionSide::Short => price >= stop,
            _ => price <= stop,
        };

        let trigger = fills
            .iter()
            .find(|f| f.side == exit_side && crossed(f.price))?;

        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P0,
            trigger.ts,
            Evidence::StopLoss {
                planned_stop_loss: stop,
                trigger_fill: FillRef::from(*trigger),
                comparison: comparison.to_string(),
            },
        ))
    }
}

pub struct BigLossPctEquity {
    pub threshold_pct: Decimal,
}

impl LifecycleRule for BigLossPctEquity {
    fn event_type(&self) -> EventType {
        EventType::BigLossPctEquity
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        let pnl = lc.metrics.realized_pnl_usdt?;
        let (base, source) = lc.metrics.base_balance()?;
        if base <= Decimal::ZERO || pnl >= Decimal::ZERO {
            return None;
        }
        let loss_pct = pct_of(pnl.abs(), base)?;
        if loss_pct < self.threshold_pct {
            return None;
        }

        let occurred_at = lc.metrics.exit_ts.or_else(|| fills.last().map(|f| f.ts))?;
        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P0,
            occurred_at,
            Evidence::BigLoss {
                realized_pnl_usdt: pnl,
                base_balance_usdt_at_entry: base,
                base_balance_source: source.to_string(),
                loss_pct_of_base_balance: loss_pct,
                threshold_pct: self.threshold_pct,
                comparison: "loss_pct_of_base_balance >= threshold_pct AND realized_pnl_usdt < 0".to_string(),
            },
        ))
    }
}

/// Effective leverage is the largest single-fill notional over the base balance at entry.
pub struct HighLeverageUsed {
    pub threshold: Decimal,
}

impl LifecycleRule for HighLeverageUsed {
    fn event_type(&self) -> EventType {
        EventType::HighLeverageUsed
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        let notional = lc.metrics.max_abs_notional_usdt?;
        let (base, source) = lc.metrics.base_balance()?;
        if base <= Decimal::ZERO {
            return None;
        }
        let leverage = notional / base;
        if leverage < self.threshold {
            return None;
        }

        let occurred_at = lc.metrics.entry_ts.or_else(|| fills.first().map(|f| f.ts))?;
        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P1,
            occurred_at,
            Evidence::HighLeverage {
                max_abs_notional_usdt: notional,
                base_balance_usdt_at_entry: base,
                base_balance_source: source.to_string(),
                effective_leverage: leverage,
                threshold: self.threshold,
                comparison: "effective_leverage >= threshold".to_string(),
            },
        ))
    }
}

/// Entry inside the configured local night window, both bounds inclusive at minute resolution.
pub struct NightTrading {
    pub window: NightWindow,
}

impl NightTrading {
    fn contains(&self, minute_of_day: u32) -> bool {
        let start = self.window.start.hour() * 60 + self.window.start.minute();
        let end = self.window.end.hour() * 60 + self.window.end.minute();
        if start <= end {
            minute_of_day >= start && minute_of_day <= end
        } else {
            minute_of_day >= start || minute_of_day <= end
        }
    }
}

impl LifecycleRule for NightTrading {
    fn event_type(&self) -> EventType {
        EventType::NightTradingUsEastern
    }

    fn evaluate(&self, lc: &TradeLifecycle, fills: &[&ExecutionFill]) -> Option<TradeEvent> {
        let entry_ts = lc.metrics.entry_ts.or_else(|| fills.first().map(|f| f.ts))?;
        let tz: Tz = match self.window.timezone.parse() {
            Ok(tz) => tz,
            Err(e) => {
                debug!("Night trading check skipped, bad timezone {}: {}", self.window.timezone, e);
                return None;
            }
        };

        let local = entry_ts.with_timezone(&tz);
        if !self.contains(local.hour() * 60 + local.minute()) {
            return None;
        }

        let offset = local.offset().fix();
        Some(TradeEvent::for_lifecycle(
            lc,
            self.event_type(),
            Severity::P1,
            entry_ts,
            Evidence::NightTrading {
                entry_ts_utc: entry_ts,
                entry_ts_us_eastern: entry_ts.with_timezone(&offset),
                night_window_local: NightWindowRef {
                    start: self.window.start.format("%H:%M").to_string(),
                    end: self.window.end.format("%H:%M").to_string(),
                    timezone: self.window.timezone.clone(),
                },
                comparison: "local_time >= start OR local_time <= end (cross-day window, inclusive bounds)"
                    .to_string(),
            },
        ))
    }
}

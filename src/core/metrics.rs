// src/core/metrics.rs
//! Deterministic lifecycle metrics, rebuilt from fills on every call.

use crate::types::{
    AccountSnapshot, ExecutionFill, FundingPayment, LifecycleStatus, RiskMetrics, Side, TradeMetrics,
    TradePlan, TradeSide,
};
use crate::utils::precision::{pct_of, weighted_average};
use rust_decimal::Decimal;

/// Running signed position with a volume-weighted entry price.
///
/// Positive quantity is long, negative is short. Works off execution sides only,
/// so it also covers fills the exchange did not tag as open/close.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionTracker {
    pub quantity: Decimal,
    pub avg_entry: Decimal,
    pub realized: Decimal,
    pub max_abs_quantity: Decimal,
}

impl PositionTracker {
    /// Applies one execution and returns the PnL realized by it.
    pub fn apply(&mut self, side: Side, price: Decimal, amount: Decimal) -> Decimal {
        let delta = match side {
            Side::Buy => amount,
            Side::Sell => -amount,
        };
        let prev = self.quantity;
        let mut realized = Decimal::ZERO;

        let extends = prev.is_zero()
            || (prev.is_sign_positive() && delta.is_sign_positive() && !delta.is_zero())
            || (prev.is_sign_negative() && delta.is_sign_negative() && !delta.is_zero());

        if extends {
            let next = prev + delta;
            self.avg_entry = if prev.is_zero() {
                price
            } else {
                (self.avg_entry * prev.abs() + price * delta.abs()) / next.abs()
            };
            self.quantity = next;
        } else {
            let close_qty = prev.abs().min(delta.abs());
            realized = if prev > Decimal::ZERO {
                (price - self.avg_entry) * close_qty
            } else {
                (self.avg_entry - price) * close_qty
            };
            self.quantity = if prev > Decimal::ZERO {
                prev - close_qty
            } else {
                prev + close_qty
            };

            let remaining = delta.abs() - close_qty;
            if remaining > Decimal::ZERO {
                // Overshoot flips the position; the remainder enters at this fill's price.
                self.quantity = if delta > Decimal::ZERO { remaining } else { -remaining };
                self.avg_entry = price;
            }
        }

        self.realized += realized;
        self.max_abs_quantity = self.max_abs_quantity.max(self.quantity.abs());
        realized
    }
}

/// Recomputes metrics from empty state. The snapshot is passed through untouched.
pub fn recompute(
    fills: &[ExecutionFill],
    funding: &[FundingPayment],
    status: LifecycleStatus,
    snapshot: AccountSnapshot,
) -> TradeMetrics {
    let mut out = TradeMetrics {
        available_margin_usdt_at_entry: snapshot.available_margin_usdt,
        equity_usdt_at_entry: snapshot.equity_usdt,
        ..Default::default()
    };
    if fills.is_empty() {
        return out;
    }

    let mut sorted: Vec<&ExecutionFill> = fills.iter().collect();
    sorted.sort_by_key(|f| f.ts);
    let closed = status == LifecycleStatus::Closed;

    let entry_ts = sorted[0].ts;
    let exit_ts = if closed { sorted.last().map(|f| f.ts) } else { None };

    let total_fees: Decimal = sorted.iter().map(|f| f.fee_cost).sum();
    let total_funding: Decimal = funding.iter().map(|p| p.amount_usdt).sum();
    let max_notional = sorted.iter().map(|f| f.notional()).max();

    let mut tracker = PositionTracker::default();
    let mut reported: Option<Decimal> = None;
    for f in &sorted {
        if let Some(profit) = f.reported_profit_usdt {
            reported = Some(reported.unwrap_or(Decimal::ZERO) + profit);
        }
        tracker.apply(f.side, f.price, f.amount);
    }

    let tagged = |tag: TradeSide| {
        sorted
            .iter()
            .filter(move |f| f.trade_side == tag)
            .map(|f| (f.price, f.amount))
    };

    out.entry_ts = Some(entry_ts);
    out.exit_ts = exit_ts;
    out.holding_seconds = exit_ts.map(|exit| (exit - entry_ts).num_seconds());
    out.entry_avg_price = weighted_average(tagged(TradeSide::Open));
    out.exit_avg_price = if closed {
        weighted_average(tagged(TradeSide::Close))
    } else {
        None
    };
    out.max_abs_position_amount = Some(tracker.max_abs_quantity).filter(|q| !q.is_zero());
    out.max_abs_notional_usdt = max_notional;
    out.total_fees_usdt = Some(total_fees);
    out.total_funding_usdt = Some(total_funding);

    if closed {
        // Exchange-reported profit replaces the internal figure wholesale, never blended.
        let base_realized = reported.unwrap_or(tracker.realized);
        let pnl = base_realized - total_fees + total_funding;
        out.realized_pnl_usdt = Some(pnl);
        out.realized_pnl_pct = max_notional.and_then(|notional| pct_of(pnl, notional));
        out.realized_pnl_pct_of_available_margin = snapshot
            .available_margin_usdt
            .filter(|m| !m.is_zero())
            .or(snapshot.equity_usdt)
            .and_then(|base| pct_of(pnl, base));
    }

    out.fills_count = sorted.len();
    out.adds_count = sorted.iter().filter(|f| f.trade_side == TradeSide::Open).count();
    out.reductions_count = sorted.iter().filter(|f| f.trade_side == TradeSide::Close).count();
    out
}

/// Ties the plan's stop into risk numbers. Market-dependent excursions carry over as-is.
pub fn risk_metrics(plan: &TradePlan, metrics: &TradeMetrics, previous: &RiskMetrics) -> RiskMetrics {
    let initial_risk = match (plan.planned_stop_loss, metrics.entry_avg_price, metrics.max_abs_position_amount) {
        (Some(stop), Some(entry), Some(size)) => Some((entry - stop).abs() * size),
        _ => None,
    };
    let r_multiple = match (metrics.realized_pnl_usdt, initial_risk) {
        (Some(pnl), Some(risk)) if !risk.is_zero() => Some(pnl / risk),
        _ => None,
    };

    RiskMetrics {
        planned_stop_loss: plan.planned_stop_loss,
        initial_risk_usdt: initial_risk,
        r_multiple,
        ..previous.clone()
    }
}

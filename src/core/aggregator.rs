// src/core/aggregator.rs
//! Groups a symbol's fills into position lifecycles, one in-flight lifecycle per side bucket.

use crate::types::{ExecutionFill, LifecycleStatus, PositionSide, TradeLifecycle, TradeSide};
use rust_decimal::Decimal;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    pub lifecycles: Vec<TradeLifecycle>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct Bucket {
    quantity: Decimal,
    current: Option<TradeLifecycle>,
}

struct Aggregator<'a> {
    exchange: &'a str,
    symbol: &'a str,
    buckets: [Bucket; 3],
    out: AggregationResult,
}

impl<'a> Aggregator<'a> {
    fn new(exchange: &'a str, symbol: &'a str) -> Self {
        Self {
            exchange,
            symbol,
            buckets: Default::default(),
            out: AggregationResult::default(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.out.warnings.push(message);
    }

    fn flush(&mut self, mut lifecycle: TradeLifecycle, status: LifecycleStatus) {
        lifecycle.status = status;
        lifecycle.recompute();
        debug!(
            "Flushed lifecycle {} ({:?}, {} fills)",
            lifecycle.lifecycle_id,
            status,
            lifecycle.fills.len()
        );
        self.out.lifecycles.push(lifecycle);
    }

    fn push(&mut self, fill: ExecutionFill) {
        let side = fill.hold_side;
        let delta = match fill.trade_side {
            TradeSide::Open => fill.amount,
            TradeSide::Close => -fill.amount,
            TradeSide::Unknown => {
                self.warn(format!(
                    "Symbol {} ({}): fill at {} has no trade side; treated as open.",
                    self.symbol,
                    side,
                    fill.ts.to_rfc3339()
                ));
                fill.amount
            }
        };

        let idx = side.index();
        let prev = self.buckets[idx].quantity;
        let next = prev + delta;
        self.buckets[idx].quantity = next;

        match self.buckets[idx].current.take() {
            Some(mut lifecycle) => {
                lifecycle.fills.push(fill);
                if next <= Decimal::ZERO {
                    self.buckets[idx].quantity = Decimal::ZERO;
                    self.flush(lifecycle, LifecycleStatus::Closed);
                } else {
                    self.buckets[idx].current = Some(lifecycle);
                }
            }
            None if delta < Decimal::ZERO => {
                // The opening fills predate the observed window.
                self.warn(format!(
                    "Symbol {} ({}): saw close before open at {} (window incomplete).",
                    self.symbol,
                    side,
                    fill.ts.to_rfc3339()
                ));
                let lifecycle = TradeLifecycle::start(self.exchange, self.symbol, side, fill);
                self.buckets[idx].quantity = Decimal::ZERO;
                self.flush(lifecycle, LifecycleStatus::Closed);
            }
            None => {
                if !(prev.is_zero() && next > Decimal::ZERO) {
                    self.warn(format!(
                        "Symbol {} ({}): lifecycle started mid-position at {}.",
                        self.symbol,
                        side,
                        fill.ts.to_rfc3339()
                    ));
                }
                self.buckets[idx].current =
                    Some(TradeLifecycle::start(self.exchange, self.symbol, side, fill));
            }
        }
    }

    fn finish(mut self) -> AggregationResult {
        for side in PositionSide::ALL {
            if let Some(lifecycle) = self.buckets[side.index()].current.take() {
                self.flush(lifecycle, LifecycleStatus::Open);
            }
        }
        self.out
    }
}

/// Aggregates one (exchange, symbol) fill stream into lifecycles.
///
/// Fills are bucketed by `hold_side`; within a bucket `trade_side` drives the signed quantity.
/// A lifecycle closes on the fill that takes its bucket to zero or below. An overshoot does
/// not open a new lifecycle; the closing lifecycle keeps the whole fill and the metrics engine
/// accounts for the reversal. Lifecycles still holding quantity at the end are emitted open.
pub fn aggregate_fills<I>(exchange: &str, symbol: &str, fills: I) -> AggregationResult
where
    I: IntoIterator<Item = ExecutionFill>,
{
    let mut sorted: Vec<ExecutionFill> = fills.into_iter().collect();
    sorted.sort_by_key(|f| f.ts);

    let mut aggregator = Aggregator::new(exchange, symbol);
    for fill in sorted {
        aggregator.push(fill);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const SYMBOL: &str = "BTC/USDT:USDT";

    fn fill(secs: i64, side: Side, amount: Decimal, tag: TradeSide, hold: PositionSide) -> ExecutionFill {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        ExecutionFill::new(ts, SYMBOL, side, dec!(100), amount)
            .with_trade_side(tag)
            .with_hold_side(hold)
    }

    fn open_long(secs: i64, amount: Decimal) -> ExecutionFill {
        fill(secs, Side::Buy, amount, TradeSide::Open, PositionSide::Long)
    }

    fn close_long(secs: i64, amount: Decimal) -> ExecutionFill {
        fill(secs, Side::Sell, amount, TradeSide::Close, PositionSide::Long)
    }

    #[test]
    fn scale_in_and_out_forms_one_closed_lifecycle() {
        let fills = vec![
            open_long(0, dec!(1)),
            open_long(10, dec!(2)),
            close_long(20, dec!(1.5)),
            close_long(30, dec!(1.5)),
        ];

        let result = aggregate_fills("bitget", SYMBOL, fills);

        assert!(result.warnings.is_empty());
        assert_eq!(result.lifecycles.len(), 1);
        let lc = &result.lifecycles[0];
        assert_eq!(lc.status, LifecycleStatus::Closed);
        assert_eq!(lc.fills.len(), 4);
        assert_eq!(lc.metrics.adds_count, 2);
        assert_eq!(lc.metrics.reductions_count, 2);
        assert_eq!(lc.metrics.max_abs_position_amount, Some(dec!(3)));
    }

    #[test]
    fn long_and_short_buckets_are_independent() {
        let fills = vec![
            open_long(0, dec!(1)),
            fill(5, Side::Sell, dec!(2), TradeSide::Open, PositionSide::Short),
            close_long(10, dec!(1)),
        ];

        let result = aggregate_fills("bitget", SYMBOL, fills);

        assert_eq!(result.lifecycles.len(), 2);
        assert_eq!(result.lifecycles[0].position_side, PositionSide::Long);
        assert_eq!(result.lifecycles[0].status, LifecycleStatus::Closed);
        assert_eq!(result.lifecycles[1].position_side, PositionSide::Short);
        assert_eq!(result.lifecycles[1].status, LifecycleStatus::Open);
    }

    #[test]
    fn close_before_open_is_synthesized_and_warned() {
        let result = aggregate_fills("bitget", SYMBOL, vec![close_long(0, dec!(1)), open_long(10, dec!(1))]);

        assert_eq!(result.lifecycles.len(), 2);
        let orphan = &result.lifecycles[0];
        assert_eq!(orphan.status, LifecycleStatus::Closed);
        assert_eq!(orphan.fills.len(), 1);
        assert!(orphan.metrics.exit_ts.is_some());
        assert_eq!(result.lifecycles[1].status, LifecycleStatus::Open);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("close before open"));
    }

    #[test]
    fn untagged_fill_counts_as_open_with_warning() {
        let fills = vec![
            fill(0, Side::Buy, dec!(1), TradeSide::Unknown, PositionSide::Unknown),
            fill(10, Side::Sell, dec!(1), TradeSide::Close, PositionSide::Unknown),
        ];

        let result = aggregate_fills("bitget", SYMBOL, fills);

        assert_eq!(result.lifecycles.len(), 1);
        assert_eq!(result.lifecycles[0].position_side, PositionSide::Unknown);
        assert_eq!(result.lifecycles[0].status, LifecycleStatus::Closed);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("no trade side"));
    }

    #[test]
    fn overshooting_close_ends_lifecycle_without_spawning_another() {
        let fills = vec![
            fill(0, Side::Buy, dec!(10), TradeSide::Open, PositionSide::Long),
            fill(10, Side::Sell, dec!(15), TradeSide::Close, PositionSide::Long),
            open_long(20, dec!(1)),
        ];

        let result = aggregate_fills("bitget", SYMBOL, fills);

        assert_eq!(result.lifecycles.len(), 2);
        let first = &result.lifecycles[0];
        assert_eq!(first.status, LifecycleStatus::Closed);
        assert_eq!(first.fills.len(), 2);
        // Bucket reset to zero, so the next open starts a clean lifecycle.
        assert_eq!(result.lifecycles[1].fills.len(), 1);
        assert_eq!(result.lifecycles[1].status, LifecycleStatus::Open);
    }

    #[test]
    fn fills_are_processed_in_time_order() {
        let result = aggregate_fills("bitget", SYMBOL, vec![close_long(10, dec!(1)), open_long(0, dec!(1))]);
        assert!(result.warnings.is_empty());
        assert_eq!(result.lifecycles.len(), 1);
        assert_eq!(result.lifecycles[0].fills[0].trade_side, TradeSide::Open);
    }
}

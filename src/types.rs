// src/types.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Exchange-reported open/close tag of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Open,
    Close,
    #[default]
    Unknown,
}

/// Direction of a position, also used as the aggregation bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    #[default]
    Unknown,
}

impl PositionSide {
    pub const ALL: [PositionSide; 3] = [PositionSide::Long, PositionSide::Short, PositionSide::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
            PositionSide::Unknown => "unknown",
        }
    }

    /// Execution side that reduces a position of this direction.
    pub fn exit_side(&self) -> Option<Side> {
        match self {
            PositionSide::Long => Some(Side::Sell),
            PositionSide::Short => Some(Side::Buy),
            PositionSide::Unknown => None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            PositionSide::Long => 0,
            PositionSide::Short => 1,
            PositionSide::Unknown => 2,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MakerTaker {
    Maker,
    Taker,
    #[default]
    Unknown,
}

/// A single exchange execution. Validated at the ingestion boundary, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFill {
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub fee_cost: Decimal,
    #[serde(default)]
    pub fee_currency: Option<String>,
    #[serde(default)]
    pub maker_taker: MakerTaker,
    #[serde(default)]
    pub trade_side: TradeSide,
    #[serde(default)]
    pub hold_side: PositionSide,
    #[serde(default)]
    pub reported_profit_usdt: Option<Decimal>,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

impl ExecutionFill {
    pub fn new(ts: DateTime<Utc>, symbol: &str, side: Side, price: Decimal, amount: Decimal) -> Self {
        Self {
            ts,
            symbol: symbol.to_string(),
            side,
            price,
            amount,
            fee_cost: Decimal::ZERO,
            fee_currency: None,
            maker_taker: MakerTaker::Unknown,
            trade_side: TradeSide::Unknown,
            hold_side: PositionSide::Unknown,
            reported_profit_usdt: None,
            exchange: String::new(),
            trade_id: None,
            order_id: None,
            raw: None,
        }
    }

    pub fn with_trade_side(mut self, trade_side: TradeSide) -> Self {
        self.trade_side = trade_side;
        self
    }

    pub fn with_hold_side(mut self, hold_side: PositionSide) -> Self {
        self.hold_side = hold_side;
        self
    }

    pub fn with_fee(mut self, fee_cost: Decimal) -> Self {
        self.fee_cost = fee_cost;
        self
    }

    pub fn with_reported_profit(mut self, profit: Decimal) -> Self {
        self.reported_profit_usdt = Some(profit);
        self
    }

    pub fn with_trade_id(mut self, trade_id: &str) -> Self {
        self.trade_id = Some(trade_id.to_string());
        self
    }

    pub fn notional(&self) -> Decimal {
        (self.price * self.amount).abs()
    }
}

/// Funding settlement in USDT; negative means paid, positive received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingPayment {
    pub ts: DateTime<Utc>,
    pub amount_usdt: Decimal,
}

/// Trader-authored intent. Read-only for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub thesis: Option<String>,
    pub setup: Option<String>,
    pub planned_entry: Option<Decimal>,
    pub planned_stop_loss: Option<Decimal>,
    pub planned_take_profit: Option<Decimal>,
    pub planned_risk_usdt: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub max_position_notional_usdt: Option<Decimal>,
    pub intended_holding: Option<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    pub note: Option<String>,
}

/// Externally asserted account balances at entry. Never derived from fills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub available_margin_usdt: Option<Decimal>,
    pub equity_usdt: Option<Decimal>,
}

impl AccountSnapshot {
    pub fn is_empty(&self) -> bool {
        self.available_margin_usdt.is_none() && self.equity_usdt.is_none()
    }
}

/// Derived numbers. Every field is reproducible from fills, funding and the attached snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub entry_ts: Option<DateTime<Utc>>,
    pub exit_ts: Option<DateTime<Utc>>,
    pub holding_seconds: Option<i64>,

    pub entry_avg_price: Option<Decimal>,
    pub exit_avg_price: Option<Decimal>,

    pub max_abs_position_amount: Option<Decimal>,
    pub max_abs_notional_usdt: Option<Decimal>,

    pub realized_pnl_usdt: Option<Decimal>,
    pub realized_pnl_pct: Option<Decimal>,
    pub realized_pnl_pct_of_available_margin: Option<Decimal>,
    pub total_fees_usdt: Option<Decimal>,
    pub total_funding_usdt: Option<Decimal>,

    pub available_margin_usdt_at_entry: Option<Decimal>,
    pub equity_usdt_at_entry: Option<Decimal>,

    pub fills_count: usize,
    pub adds_count: usize,
    pub reductions_count: usize,
}

impl TradeMetrics {
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            available_margin_usdt: self.available_margin_usdt_at_entry,
            equity_usdt: self.equity_usdt_at_entry,
        }
    }

    /// Balance used by margin-dependent rules: available margin first, equity as fallback.
    /// Zero balances are treated as absent. Returns the value and the field it came from.
    pub fn base_balance(&self) -> Option<(Decimal, &'static str)> {
        match (self.available_margin_usdt_at_entry, self.equity_usdt_at_entry) {
            (Some(margin), _) if !margin.is_zero() => Some((margin, "available_margin_usdt_at_entry")),
            (_, Some(equity)) if !equity.is_zero() => Some((equity, "equity_usdt_at_entry")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub planned_stop_loss: Option<Decimal>,
    pub actual_stop_loss: Option<Decimal>,
    pub initial_risk_usdt: Option<Decimal>,
    pub r_multiple: Option<Decimal>,
    // Excursions need OHLCV data and are filled by a market-data collaborator.
    pub mae_usdt: Option<Decimal>,
    pub mfe_usdt: Option<Decimal>,
    pub mae_pct: Option<Decimal>,
    pub mfe_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    #[default]
    Open,
    Closed,
}

/// One position episode, from the first opening fill to the fill that flattens it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLifecycle {
    pub lifecycle_id: String,
    pub exchange: String,
    pub symbol: String,
    pub position_side: PositionSide,
    #[serde(default = "default_margin_currency")]
    pub margin_currency: String,
    #[serde(default)]
    pub leverage: Option<Decimal>,

    #[serde(default)]
    pub fills: Vec<ExecutionFill>,
    #[serde(default)]
    pub funding_payments: Vec<FundingPayment>,

    #[serde(default)]
    pub plan: TradePlan,

    #[serde(default)]
    pub emotion_tags: Vec<String>,
    #[serde(default)]
    pub discipline_violations: Vec<String>,
    #[serde(default)]
    pub pattern_summary: Option<String>,

    #[serde(default)]
    pub metrics: TradeMetrics,
    #[serde(default)]
    pub risk: RiskMetrics,

    #[serde(default)]
    pub status: LifecycleStatus,
}

fn default_margin_currency() -> String {
    "USDT".to_string()
}

impl TradeLifecycle {
    /// Starts a lifecycle from its first fill. The id embeds the first fill timestamp.
    pub fn start(exchange: &str, symbol: &str, position_side: PositionSide, first: ExecutionFill) -> Self {
        let lifecycle_id = format!(
            "{}:{}:{}:{}",
            exchange,
            symbol,
            position_side,
            first.ts.to_rfc3339()
        );
        Self {
            lifecycle_id,
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            position_side,
            margin_currency: default_margin_currency(),
            leverage: None,
            fills: vec![first],
            funding_payments: Vec::new(),
            plan: TradePlan::default(),
            emotion_tags: Vec::new(),
            discipline_violations: Vec::new(),
            pattern_summary: None,
            metrics: TradeMetrics::default(),
            risk: RiskMetrics::default(),
            status: LifecycleStatus::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == LifecycleStatus::Closed
    }

    /// Fills in chronological order; ties keep insertion order.
    pub fn sorted_fills(&self) -> Vec<&ExecutionFill> {
        let mut fills: Vec<&ExecutionFill> = self.fills.iter().collect();
        fills.sort_by_key(|f| f.ts);
        fills
    }

    /// Rebuilds metrics and risk from scratch. Only the account snapshot carries over.
    pub fn recompute(&mut self) {
        self.metrics = metrics::recompute(
            &self.fills,
            &self.funding_payments,
            self.status,
            self.metrics.snapshot(),
        );
        self.risk = metrics::risk_metrics(&self.plan, &self.metrics, &self.risk);
    }

    /// Attaches externally supplied balances where none were recorded yet.
    /// Returns true if anything changed; callers recompute afterwards.
    pub fn attach_snapshot(&mut self, snapshot: AccountSnapshot) -> bool {
        let mut changed = false;
        if self.metrics.available_margin_usdt_at_entry.is_none() && snapshot.available_margin_usdt.is_some() {
            self.metrics.available_margin_usdt_at_entry = snapshot.available_margin_usdt;
            changed = true;
        }
        if self.metrics.equity_usdt_at_entry.is_none() && snapshot.equity_usdt.is_some() {
            self.metrics.equity_usdt_at_entry = snapshot.equity_usdt;
            changed = true;
        }
        changed
    }

    /// Keeps trader-authored data from a previously stored version of the same lifecycle.
    pub fn carry_annotations_from(&mut self, previous: &TradeLifecycle) {
        if self.plan == TradePlan::default() {
            self.plan = previous.plan.clone();
        }
        if self.emotion_tags.is_empty() {
            self.emotion_tags = previous.emotion_tags.clone();
        }
        if self.discipline_violations.is_empty() {
            self.discipline_violations = previous.discipline_violations.clone();
        }
        if self.pattern_summary.is_none() {
            self.pattern_summary = previous.pattern_summary.clone();
        }
        if self.funding_payments.is_empty() {
            self.funding_payments = previous.funding_payments.clone();
        }
        self.attach_snapshot(previous.metrics.snapshot());
    }

    /// True when at least one fill falls inside `[start, end)`.
    pub fn has_activity_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.fills.iter().any(|f| f.ts >= start && f.ts < end)
    }
}

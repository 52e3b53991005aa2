// src/rules/events.rs
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ExecutionFill, PositionSide, Side, TradeLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OpenCompleted,
    CloseCompleted,
    StopLossTriggered,
    BigLossPctEquity,
    ConsecutiveLosses,
    HighLeverageUsed,
    NightTradingUsEastern,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OpenCompleted => "open_completed",
            EventType::CloseCompleted => "close_completed",
            EventType::StopLossTriggered => "stop_loss_triggered",
            EventType::BigLossPctEquity => "big_loss_pct_equity",
            EventType::ConsecutiveLosses => "consecutive_losses",
            EventType::HighLeverageUsed => "high_leverage_used",
            EventType::NightTradingUsEastern => "night_trading_us_eastern",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// P0 must be reviewed, P1 should be reviewed, P2 is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    P0,
    P1,
    P2,
}

impl Severity {
    /// Points deducted from the discipline score per event.
    pub fn penalty(&self) -> u32 {
        match self {
            Severity::P0 => 20,
            Severity::P1 => 8,
            Severity::P2 => 0,
        }
    }
}

/// The fill facts quoted as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRef {
    pub ts: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub trade_id: Option<String>,
    pub order_id: Option<String>,
}

impl From<&ExecutionFill> for FillRef {
    fn from(f: &ExecutionFill) -> Self {
        Self {
            ts: f.ts,
            side: f.side,
            price: f.price,
            amount: f.amount,
            trade_id: f.trade_id.clone(),
            order_id: f.order_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRef {
    pub lifecycle_id: String,
    pub symbol: String,
    pub position_side: PositionSide,
    pub exit_ts: DateTime<Utc>,
    pub realized_pnl_usdt: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightWindowRef {
    pub start: String,
    pub end: String,
    pub timezone: String,
}

/// Per-rule evidence. Serialized untagged so the payload reads as a flat map of the compared values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Evidence {
    StopLoss {
        planned_stop_loss: Decimal,
        trigger_fill: FillRef,
        comparison: String,
    },
    BigLoss {
        realized_pnl_usdt: Decimal,
        base_balance_usdt_at_entry: Decimal,
        base_balance_source: String,
        loss_pct_of_base_balance: Decimal,
        threshold_pct: Decimal,
        comparison: String,
    },
    HighLeverage {
        max_abs_notional_usdt: Decimal,
        base_balance_usdt_at_entry: Decimal,
        base_balance_source: String,
        effective_leverage: Decimal,
        threshold: Decimal,
        comparison: String,
    },
    NightTrading {
        entry_ts_utc: DateTime<Utc>,
        entry_ts_us_eastern: DateTime<FixedOffset>,
        night_window_local: NightWindowRef,
        comparison: String,
    },
    ConsecutiveLosses {
        n: usize,
        window: Vec<LossRef>,
        comparison: String,
    },
    Fill {
        fill: FillRef,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub level: Severity,
    pub lifecycle_id: String,
    pub symbol: String,
    pub position_side: PositionSide,
    pub occurred_at: DateTime<Utc>,
    pub evidence: Evidence,
}

impl TradeEvent {
    /// Event scoped to one lifecycle; id is `<lifecycle_id>:<event_type>`.
    pub fn for_lifecycle(
        lc: &TradeLifecycle,
        event_type: EventType,
        level: Severity,
        occurred_at: DateTime<Utc>,
        evidence: Evidence,
    ) -> Self {
        Self {
            event_id: format!("{}:{}", lc.lifecycle_id, event_type),
            event_type,
            level,
            lifecycle_id: lc.lifecycle_id.clone(),
            symbol: lc.symbol.clone(),
            position_side: lc.position_side,
            occurred_at,
            evidence,
        }
    }
}

// src/connectors/messages.rs
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::IngestError;
use crate::types::{ExecutionFill, MakerTaker, PositionSide, Side, TradeSide};

/// Millisecond timestamp; Bitget sends it quoted, exports often as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Millis {
    Num(i64),
    Text(String),
}

impl Millis {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        let ms = match self {
            Millis::Num(ms) => *ms,
            Millis::Text(s) => s.trim().parse().ok()?,
        };
        Utc.timestamp_millis_opt(ms).single()
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Millis::Num(ms) => write!(f, "{}", ms),
            Millis::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeItem {
    #[serde(default)]
    pub total_fee: Option<Decimal>,
    #[serde(default)]
    pub fee_coin: Option<String>,
}

/// `feeDetail` arrives as a list of per-coin entries or as a single object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeeDetail {
    List(Vec<FeeItem>),
    One(FeeItem),
}

impl FeeDetail {
    fn first(&self) -> Option<&FeeItem> {
        match self {
            FeeDetail::List(items) => items.first(),
            FeeDetail::One(item) => Some(item),
        }
    }
}

/// Fill record as the exchange reports it (Bitget mix fill shape).
/// Field names follow the exchange JSON; free-text tags are normalized in `validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFill {
    #[serde(alias = "cTime")]
    pub ts: Millis,

    pub symbol: String,

    pub side: String,

    pub price: Decimal,

    #[serde(alias = "size", alias = "baseVolume")]
    pub amount: Decimal,

    /// Flat fee; used only when `feeDetail` is absent.
    #[serde(default)]
    pub fee: Option<Decimal>,

    #[serde(default)]
    pub fee_detail: Option<FeeDetail>,

    #[serde(default)]
    pub fee_currency: Option<String>,

    #[serde(default, alias = "tradeScope")]
    pub maker_taker: Option<String>,

    #[serde(default, alias = "openClose")]
    pub trade_side: Option<String>,

    #[serde(default, alias = "posSide")]
    pub hold_side: Option<String>,

    #[serde(default)]
    pub profit: Option<Decimal>,

    #[serde(default)]
    pub trade_id: Option<String>,

    #[serde(default)]
    pub order_id: Option<String>,

    /// The record exactly as received, including fields not modelled here.
    #[serde(skip)]
    pub raw: Option<Value>,
}

fn normalize_trade_side(tag: Option<&str>) -> TradeSide {
    let Some(tag) = tag else {
        return TradeSide::Unknown;
    };
    let tag = tag.to_lowercase();
    if tag.contains("open") {
        TradeSide::Open
    } else if tag.contains("close") {
        TradeSide::Close
    } else {
        TradeSide::Unknown
    }
}

fn normalize_hold_side(tag: Option<&str>) -> PositionSide {
    match tag.map(|t| t.to_lowercase()).as_deref() {
        Some("long") => PositionSide::Long,
        Some("short") => PositionSide::Short,
        _ => PositionSide::Unknown,
    }
}

fn normalize_maker_taker(tag: Option<&str>) -> MakerTaker {
    match tag.map(|t| t.to_lowercase()).as_deref() {
        Some("maker") => MakerTaker::Maker,
        Some("taker") => MakerTaker::Taker,
        _ => MakerTaker::Unknown,
    }
}

impl RawFill {
    /// Parses one exchange record and keeps the untouched payload alongside.
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        let mut fill: RawFill = serde_json::from_value(value.clone())?;
        fill.raw = Some(value);
        Ok(fill)
    }

    fn fee_item(&self) -> Option<&FeeItem> {
        self.fee_detail.as_ref().and_then(FeeDetail::first)
    }

    /// Converts into a validated fill. `index` is the record position, used in error messages.
    pub fn validate(&self, exchange: &str, index: usize) -> Result<ExecutionFill, IngestError> {
        let side = match self.side.to_lowercase().as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            _ => {
                return Err(IngestError::UnknownSide {
                    index,
                    side: self.side.clone(),
                })
            }
        };
        for (field, value) in [("price", self.price), ("amount", self.amount)] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(IngestError::Negative {
                    index,
                    field,
                    value: value.to_string(),
                });
            }
        }
        let ts = self.ts.to_utc().ok_or_else(|| IngestError::BadTimestamp {
            index,
            ts: self.ts.to_string(),
        })?;
        let fee = match self.fee_item() {
            Some(item) => item.total_fee,
            None => self.fee,
        };
        let fee_currency = self
            .fee_currency
            .clone()
            .or_else(|| self.fee_item().and_then(|item| item.fee_coin.clone()));

        Ok(ExecutionFill {
            ts,
            symbol: self.symbol.clone(),
            side,
            price: self.price,
            amount: self.amount,
            // Exchanges report fees as negative balance changes.
            fee_cost: fee.map(|f| f.abs()).unwrap_or(Decimal::ZERO),
            fee_currency,
            maker_taker: normalize_maker_taker(self.maker_taker.as_deref()),
            trade_side: normalize_trade_side(self.trade_side.as_deref()),
            hold_side: normalize_hold_side(self.hold_side.as_deref()),
            reported_profit_usdt: self.profit,
            exchange: exchange.to_string(),
            trade_id: self.trade_id.clone(),
            order_id: self.order_id.clone(),
            raw: self.raw.clone(),
        })
    }
}

/// Validates, drops repeated trade ids (first occurrence wins) and orders by time.
pub fn prepare_fills(exchange: &str, raw: &[RawFill]) -> Result<Vec<ExecutionFill>, IngestError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut fills = Vec::with_capacity(raw.len());
    for (index, record) in raw.iter().enumerate() {
        if let Some(id) = record.trade_id.as_deref() {
            if !seen.insert(id) {
                continue;
            }
        }
        fills.push(record.validate(exchange, index)?);
    }
    fills.sort_by_key(|f| f.ts);
    Ok(fills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(json: &str) -> RawFill {
        RawFill::from_value(serde_json::from_str(json).unwrap()).unwrap()
    }

    // Shape of a v2 mix `fill-history` entry: quoted numbers, fee only in `feeDetail`.
    const BITGET_V2_FILL: &str = r#"{
        "tradeId": "1111", "orderId": "2222", "userId": "42", "symbol": "BTCUSDT",
        "side": "buy", "price": "37000.5", "baseVolume": "0.01", "quoteVolume": "370.005",
        "profit": "0", "enterPointSource": "API", "tradeSide": "open", "posMode": "hedge_mode",
        "tradeScope": "taker",
        "feeDetail": [{"deduction": "no", "feeCoin": "USDT", "totalDeductionFee": "0", "totalFee": "-0.06"}],
        "cTime": "1700000000000"
    }"#;

    #[test]
    fn bitget_shape_is_normalized() {
        let r = raw(
            r#"{"cTime": 1700000000000, "symbol": "BTCUSDT", "side": "SELL", "price": "101.5",
                "baseVolume": "0.2", "fee": "-0.03", "tradeSide": "close_long", "posSide": "long",
                "profit": "1.2", "tradeId": "t1", "orderId": "o1"}"#,
        );

        let fill = r.validate("bitget", 0).unwrap();

        assert_eq!(fill.side, Side::Sell);
        assert_eq!(fill.amount, dec!(0.2));
        assert_eq!(fill.fee_cost, dec!(0.03));
        assert_eq!(fill.trade_side, TradeSide::Close);
        assert_eq!(fill.hold_side, PositionSide::Long);
        assert_eq!(fill.reported_profit_usdt, Some(dec!(1.2)));
        assert_eq!(fill.exchange, "bitget");
        assert!(fill.raw.is_some());
    }

    #[test]
    fn bitget_v2_record_loads_with_fee_detail() {
        let r = raw(BITGET_V2_FILL);

        let fill = r.validate("bitget", 0).unwrap();

        assert_eq!(fill.ts.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(fill.price, dec!(37000.5));
        assert_eq!(fill.amount, dec!(0.01));
        assert_eq!(fill.fee_cost, dec!(0.06));
        assert_eq!(fill.fee_currency.as_deref(), Some("USDT"));
        assert_eq!(fill.maker_taker, MakerTaker::Taker);
        assert_eq!(fill.trade_side, TradeSide::Open);

        let kept = fill.raw.unwrap();
        assert_eq!(kept["posMode"], "hedge_mode");
        assert_eq!(kept["quoteVolume"], "370.005");
    }

    #[test]
    fn fee_detail_object_wins_over_flat_fee() {
        let r = raw(
            r#"{"ts": "5", "symbol": "X", "side": "sell", "price": "1", "amount": "1",
                "fee": "-9", "feeDetail": {"totalFee": "-0.25", "feeCoin": "BGB"}}"#,
        );
        let fill = r.validate("bitget", 0).unwrap();
        assert_eq!(fill.fee_cost, dec!(0.25));
        assert_eq!(fill.fee_currency.as_deref(), Some("BGB"));
    }

    #[test]
    fn unparseable_timestamp_is_rejected() {
        let r = raw(r#"{"cTime": "yesterday", "symbol": "X", "side": "buy", "price": "1", "amount": "1"}"#);
        assert!(matches!(
            r.validate("bitget", 7),
            Err(IngestError::BadTimestamp { index: 7, .. })
        ));
    }

    #[test]
    fn negative_amount_and_bad_side_are_rejected() {
        let neg = raw(r#"{"ts": 1, "symbol": "X", "side": "buy", "price": "1", "amount": "-2"}"#);
        assert!(matches!(
            neg.validate("bitget", 3),
            Err(IngestError::Negative { index: 3, field: "amount", .. })
        ));

        let bad = raw(r#"{"ts": 1, "symbol": "X", "side": "hold", "price": "1", "amount": "2"}"#);
        assert!(matches!(bad.validate("bitget", 0), Err(IngestError::UnknownSide { .. })));
    }

    #[test]
    fn unknown_tags_are_not_errors() {
        let r = raw(r#"{"ts": 1, "symbol": "X", "side": "buy", "price": "1", "amount": "2", "tradeSide": "adjust"}"#);
        let fill = r.validate("bitget", 0).unwrap();
        assert_eq!(fill.trade_side, TradeSide::Unknown);
        assert_eq!(fill.hold_side, PositionSide::Unknown);
    }

    #[test]
    fn duplicates_dropped_and_sorted() {
        let records = vec![
            raw(r#"{"ts": 2000, "symbol": "X", "side": "sell", "price": "1", "amount": "1", "tradeId": "b"}"#),
            raw(r#"{"ts": 1000, "symbol": "X", "side": "buy", "price": "1", "amount": "1", "tradeId": "a"}"#),
            raw(r#"{"ts": 1000, "symbol": "X", "side": "buy", "price": "1", "amount": "1", "tradeId": "a"}"#),
        ];

        let fills = prepare_fills("bitget", &records).unwrap();

        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].trade_id.as_deref(), Some("a"));
        assert_eq!(fills[1].trade_id.as_deref(), Some("b"));
    }
}

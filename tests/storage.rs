//! Store persistence and the ingest/review flow.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::io::Write;

use trade_coach::connectors::json_file::JsonFileFillSource;
use trade_coach::connectors::traits::FillSource;
use trade_coach::error::{CoachError, IngestError};
use trade_coach::storage::{JsonFileStore, LifecycleStore, MemoryStore};
use trade_coach::{
    aggregate_fills, AccountSnapshot, DetectionConfig, EventType, ExecutionFill, PositionSide, ReviewEngine,
    Side, TradeSide,
};

const SYMBOL: &str = "ETH/USDT:USDT";

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 15, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn long_round_trip(start: i64, open_px: rust_decimal::Decimal, close_px: rust_decimal::Decimal) -> Vec<ExecutionFill> {
    vec![
        ExecutionFill::new(t(start), SYMBOL, Side::Buy, open_px, dec!(2))
            .with_trade_side(TradeSide::Open)
            .with_hold_side(PositionSide::Long)
            .with_trade_id(&format!("o{}", start)),
        ExecutionFill::new(t(start + 15), SYMBOL, Side::Sell, close_px, dec!(2))
            .with_trade_side(TradeSide::Close)
            .with_hold_side(PositionSide::Long)
            .with_trade_id(&format!("c{}", start)),
    ]
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

#[tokio::test]
async fn json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("lifecycles.json");

    let lifecycles = aggregate_fills("bitget", SYMBOL, long_round_trip(0, dec!(3000), dec!(3010.5))).lifecycles;
    let lc = lifecycles[0].clone();

    {
        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
        store.upsert(&lc).await.unwrap();
        store.upsert(&lc).await.unwrap();
    }

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let all = reopened.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], lc);

    assert!(reopened.delete(&lc.lifecycle_id).await.unwrap());
    assert!(!reopened.delete(&lc.lifecycle_id).await.unwrap());
    let again = JsonFileStore::open(&path).await.unwrap();
    assert!(again.get(&lc.lifecycle_id).await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_store_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(JsonFileStore::open(file.path()).await.is_err());
}

// ============================================================================
// INGEST AND REVIEW
// ============================================================================

#[tokio::test]
async fn review_is_idempotent_across_reingest() {
    let engine = ReviewEngine::new(&DetectionConfig::default(), MemoryStore::new());
    let mut fills = long_round_trip(0, dec!(3000), dec!(2990));
    fills.extend(long_round_trip(60, dec!(3000), dec!(2980)));
    let snapshot = Some(AccountSnapshot {
        available_margin_usdt: Some(dec!(500)),
        equity_usdt: None,
    });

    let summary = engine.ingest("bitget", SYMBOL, fills.clone(), snapshot).await.unwrap();
    assert_eq!(summary.lifecycles_upserted, 2);
    let first = engine.review(t(-60), t(240)).await.unwrap();

    engine.ingest("bitget", SYMBOL, fills, snapshot).await.unwrap();
    let second = engine.review(t(-60), t(240)).await.unwrap();

    assert_eq!(engine.store().len().await, 2);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.fingerprint.len(), 64);
    assert_eq!(first.events, second.events);
    assert_eq!(first.score, second.score);
}

#[tokio::test]
async fn reingest_keeps_trader_plan() {
    let engine = ReviewEngine::new(&DetectionConfig::default(), MemoryStore::new());
    let fills = long_round_trip(0, dec!(3000), dec!(2950));

    engine.ingest("bitget", SYMBOL, fills.clone(), None).await.unwrap();
    let id = engine.store().all().await.unwrap()[0].lifecycle_id.clone();

    let mut annotated = engine.store().get(&id).await.unwrap().unwrap();
    annotated.plan.planned_stop_loss = Some(dec!(2960));
    annotated.emotion_tags.push("fomo".to_string());
    engine.store().upsert(&annotated).await.unwrap();

    engine.ingest("bitget", SYMBOL, fills, None).await.unwrap();
    let stored = engine.store().get(&id).await.unwrap().unwrap();
    assert_eq!(stored.plan.planned_stop_loss, Some(dec!(2960)));
    assert_eq!(stored.emotion_tags, vec!["fomo".to_string()]);
    // |3000 - 2960| * 2
    assert_eq!(stored.risk.initial_risk_usdt, Some(dec!(80)));

    let outcome = engine.review(t(0), t(60)).await.unwrap();
    let stop = outcome
        .events
        .iter()
        .find(|e| e.event_type == EventType::StopLossTriggered)
        .unwrap();
    assert_eq!(stop.occurred_at, t(15));
    assert_eq!(outcome.score.score, 80);
}

#[tokio::test]
async fn review_window_is_half_open() {
    let engine = ReviewEngine::new(&DetectionConfig::default(), MemoryStore::new());
    let mut fills = long_round_trip(0, dec!(3000), dec!(3001));
    fills.extend(long_round_trip(120, dec!(3000), dec!(3002)));
    engine.ingest("bitget", SYMBOL, fills, None).await.unwrap();

    // Second lifecycle's first fill sits exactly on the end bound.
    let outcome = engine.review(t(0), t(120)).await.unwrap();
    assert_eq!(outcome.lifecycle_ids.len(), 1);
    assert!(outcome.lifecycle_ids[0].ends_with(&t(0).to_rfc3339()));

    // A window that only covers the exit fill still picks the lifecycle up.
    let outcome = engine.review(t(135), t(136)).await.unwrap();
    assert_eq!(outcome.lifecycle_ids.len(), 1);
    assert!(outcome.lifecycle_ids[0].ends_with(&t(120).to_rfc3339()));
}

#[tokio::test]
async fn file_source_feeds_persistent_review() {
    let dir = tempfile::tempdir().unwrap();
    let fills_path = dir.path().join("fills.json");
    let store_path = dir.path().join("lifecycles.json");

    let open_ms = t(0).timestamp_millis();
    let close_ms = t(20).timestamp_millis();
    std::fs::write(
        &fills_path,
        format!(
            r#"[
                {{"cTime": "{close_ms}", "symbol": "{SYMBOL}", "side": "sell", "price": "2900", "baseVolume": "1",
                  "feeDetail": [{{"feeCoin": "USDT", "totalFee": "-0.5"}}], "tradeSide": "close",
                  "posSide": "long", "tradeId": "2"}},
                {{"cTime": "{open_ms}", "symbol": "{SYMBOL}", "side": "buy", "price": "3000", "baseVolume": "1",
                  "feeDetail": [{{"feeCoin": "USDT", "totalFee": "-0.5"}}], "tradeSide": "open",
                  "posSide": "long", "tradeId": "1"}},
                {{"cTime": {open_ms}, "symbol": "{SYMBOL}", "side": "buy", "price": "3000", "size": "1",
                  "fee": "-0.5", "tradeSide": "open_long", "posSide": "long", "tradeId": "1"}}
            ]"#
        ),
    )
    .unwrap();

    let source = JsonFileFillSource::new("bitget", &fills_path);
    let fills = source.fetch_fills(SYMBOL).await.unwrap();
    assert_eq!(fills.len(), 2);
    assert!(fills.iter().all(|f| f.raw.as_ref().map(|r| r.get("feeDetail").is_some()) == Some(true)));

    let snapshot = Some(AccountSnapshot {
        available_margin_usdt: None,
        equity_usdt: Some(dec!(1000)),
    });
    {
        let engine = ReviewEngine::new(&DetectionConfig::default(), JsonFileStore::open(&store_path).await.unwrap());
        let summary = engine.ingest_from(&source, "bitget", SYMBOL, snapshot).await.unwrap();
        assert_eq!(summary.lifecycles_upserted, 1);
    }

    let engine = ReviewEngine::new(&DetectionConfig::default(), JsonFileStore::open(&store_path).await.unwrap());
    let outcome = engine.review(t(0), t(60)).await.unwrap();
    let lc = engine.store().get(&outcome.lifecycle_ids[0]).await.unwrap().unwrap();

    // -100 price move, 1 USDT in fees: -101 on 1000 equity is 10.1%.
    assert_eq!(lc.metrics.realized_pnl_usdt, Some(dec!(-101)));
    assert_eq!(lc.metrics.total_fees_usdt, Some(dec!(1)));
    let types: Vec<EventType> = outcome.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![EventType::OpenCompleted, EventType::CloseCompleted, EventType::BigLossPctEquity]
    );
    assert_eq!(outcome.score.score, 80);
}

#[tokio::test]
async fn ingest_from_missing_source_is_an_ingest_error() {
    let engine = ReviewEngine::new(&DetectionConfig::default(), MemoryStore::new());
    let source = JsonFileFillSource::new("bitget", "/nonexistent/fills.json");

    let result = engine.ingest_from(&source, "bitget", SYMBOL, None).await;

    assert!(matches!(result, Err(CoachError::Ingest(IngestError::Io(_)))));
    assert!(engine.store().is_empty().await);
}

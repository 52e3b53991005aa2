// src/main.rs
use anyhow::Context;
use chrono::Utc;
use dotenvy::dotenv;
use tracing::info;

use trade_coach::config::AppConfig;
use trade_coach::connectors::json_file::JsonFileFillSource;
use trade_coach::connectors::traits::FillSource;
use trade_coach::core::engine::{lookback_start, ReviewEngine};
use trade_coach::logging;
use trade_coach::storage::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let config = AppConfig::new().context("Failed to load configuration")?;
    let _log_guard = logging::init(&config.log_dir)?;

    info!("========================================");
    info!("       TRADE COACH - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Exchange: {}", config.exchange);
    info!("Fills:    {}", config.fills_path);
    info!("Store:    {}", config.store_path);

    // 2. Initialize Components
    let source = JsonFileFillSource::new(&config.exchange, &config.fills_path);
    let store = JsonFileStore::open(&config.store_path)
        .await
        .with_context(|| format!("Failed to open store {}", config.store_path))?;
    let engine = ReviewEngine::new(&config.rules, store);

    // 3. Ingest
    let symbols = if config.symbols.is_empty() {
        source.symbols().await?
    } else {
        config.symbols.clone()
    };
    let snapshot = config.snapshot.to_snapshot();

    for symbol in &symbols {
        let summary = engine
            .ingest_from(&source, &config.exchange, symbol, snapshot)
            .await
            .with_context(|| format!("Failed to ingest {}", symbol))?;
        info!(
            "{}: {} lifecycles upserted, {} warnings",
            symbol,
            summary.lifecycles_upserted,
            summary.warnings.len()
        );
    }

    // 4. Review
    let end = Utc::now();
    let start = lookback_start(end, config.review_lookback_days)
        .with_context(|| format!("review_lookback_days out of range: {}", config.review_lookback_days))?;
    let outcome = engine.review(start, end).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

// src/config.rs

use chrono::NaiveTime;
use config::{Config, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::AccountSnapshot;

/// Local-time window checked by the night trading rule. `start > end` means it crosses midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightWindow {
    #[serde(with = "hhmm", default = "default_night_start")]
    pub start: NaiveTime,
    #[serde(with = "hhmm", default = "default_night_end")]
    pub end: NaiveTime,
    #[serde(default = "default_night_timezone")]
    pub timezone: String,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start: default_night_start(),
            end: default_night_end(),
            timezone: default_night_timezone(),
        }
    }
}

fn default_night_start() -> NaiveTime {
    NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default()
}

fn default_night_end() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default()
}

fn default_night_timezone() -> String {
    "America/New_York".to_string()
}

/// Thresholds for the rule engine. Passed explicitly into detection, never read from the environment there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_big_loss_pct")]
    pub big_loss_threshold_pct: Decimal,
    #[serde(default = "default_consecutive_losses")]
    pub consecutive_losses_n: usize,
    #[serde(default = "default_high_leverage")]
    pub high_leverage_threshold: Decimal,
    #[serde(default)]
    pub night_window: NightWindow,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            big_loss_threshold_pct: default_big_loss_pct(),
            consecutive_losses_n: default_consecutive_losses(),
            high_leverage_threshold: default_high_leverage(),
            night_window: NightWindow::default(),
        }
    }
}

fn default_big_loss_pct() -> Decimal {
    Decimal::from(5)
}

fn default_consecutive_losses() -> usize {
    3
}

fn default_high_leverage() -> Decimal {
    Decimal::from(10)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotConfig {
    pub available_margin_usdt: Option<Decimal>,
    pub equity_usdt: Option<Decimal>,
}

impl SnapshotConfig {
    pub fn to_snapshot(&self) -> Option<AccountSnapshot> {
        let snapshot = AccountSnapshot {
            available_margin_usdt: self.available_margin_usdt,
            equity_usdt: self.equity_usdt,
        };
        (!snapshot.is_empty()).then_some(snapshot)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_fills_path")]
    pub fills_path: String,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_lookback_days")]
    pub review_lookback_days: i64,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub rules: DetectionConfig,
}

fn default_exchange() -> String {
    "bitget".to_string()
}

fn default_fills_path() -> String {
    "data/fills.json".to_string()
}

fn default_store_path() -> String {
    "data/lifecycles.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_lookback_days() -> i64 {
    1
}

impl AppConfig {
    pub fn new() -> crate::error::Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

/// "HH:MM" (de)serialization for window bounds.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

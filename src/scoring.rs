// src/scoring.rs
use serde::{Deserialize, Serialize};

use crate::rules::events::{Severity, TradeEvent};

const BASE_SCORE: i64 = 100;

/// Points per severity tier; deductions are stored as negative numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: i64,
    #[serde(rename = "P0")]
    pub p0: i64,
    #[serde(rename = "P1")]
    pub p1: i64,
    #[serde(rename = "P2")]
    pub p2: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineScore {
    pub score: u32,
    pub breakdown: ScoreBreakdown,
}

/// 100, minus 20 per P0 and 8 per P1, floored at 0. P2 is free.
pub fn compute_discipline_score(events: &[TradeEvent]) -> DisciplineScore {
    let mut breakdown = ScoreBreakdown {
        base: BASE_SCORE,
        p0: 0,
        p1: 0,
        p2: 0,
    };
    for event in events {
        let penalty = i64::from(event.level.penalty());
        match event.level {
            Severity::P0 => breakdown.p0 -= penalty,
            Severity::P1 => breakdown.p1 -= penalty,
            Severity::P2 => breakdown.p2 -= penalty,
        }
    }

    let total = breakdown.base + breakdown.p0 + breakdown.p1 + breakdown.p2;
    DisciplineScore {
        score: total.clamp(0, BASE_SCORE) as u32,
        breakdown,
    }
}

// src/scoring/trend.rs

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ScoreSnapshot;
use crate::scoring::monetization::{Factor, MonetizationFactors};
use crate::store::{StoreError, ThemeStore};

/// Percentage changes smaller than this (in either direction) count as stable.
const STABLE_BAND_PERCENT: f64 = 1.0;
/// Samples needed before sample size stops limiting confidence.
const FULL_CONFIDENCE_SAMPLES: usize = 10;
/// Standard deviation at which volatility halves confidence.
const VOLATILITY_CEILING: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FactorChange {
    pub factor: Factor,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTrend {
    pub theme_id: Uuid,
    pub current_score: u8,
    pub previous_score: Option<u8>,
    pub trend: TrendDirection,
    pub change_percentage: f64,
    pub confidence: f64,
    pub volatility: f64,
    pub sample_count: usize,
    pub strongest_factor: Option<Factor>,
    pub weakest_factor: Option<Factor>,
    pub most_improved: Option<FactorChange>,
    pub most_declined: Option<FactorChange>,
}

pub fn analyze_score_trend(
    theme_id: Uuid,
    current_score: u8,
    current_factors: Option<&MonetizationFactors>,
    history: &[ScoreSnapshot],
) -> ScoreTrend {
    let mut ordered: Vec<&ScoreSnapshot> = history
        .iter()
        .filter(|s| s.theme_id == theme_id)
        .collect();
    ordered.sort_by_key(|s| s.recorded_at);

    let previous = ordered.last().copied();
    let change_percentage = previous
        .map(|p| percent_change(p.score, current_score))
        .unwrap_or(0.0);

    let trend = if change_percentage >= STABLE_BAND_PERCENT {
        TrendDirection::Increasing
    } else if change_percentage <= -STABLE_BAND_PERCENT {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let mut samples: Vec<f64> = ordered.iter().map(|s| f64::from(s.score)).collect();
    samples.push(f64::from(current_score));
    let volatility = std_dev(&samples);
    let confidence = confidence(ordered.len(), volatility);

    let (strongest_factor, weakest_factor) = match current_factors {
        Some(f) => extremes(f),
        None => (None, None),
    };

    let previous_factors = ordered.iter().rev().find_map(|s| s.factors.as_ref());
    let (most_improved, most_declined) = match (current_factors, previous_factors) {
        (Some(current), Some(prev)) => factor_movers(prev, current),
        _ => (None, None),
    };

    ScoreTrend {
        theme_id,
        current_score,
        previous_score: previous.map(|p| p.score),
        trend,
        change_percentage,
        confidence,
        volatility,
        sample_count: ordered.len(),
        strongest_factor,
        weakest_factor,
        most_improved,
        most_declined,
    }
}

/// Reads the theme's history and analyzes it. A store failure is returned to
/// the caller, which shows a message instead of the trend panel.
pub async fn load_score_trend(
    store: &dyn ThemeStore,
    theme_id: Uuid,
    current_score: u8,
    current_factors: Option<&MonetizationFactors>,
) -> Result<ScoreTrend, StoreError> {
    let history = store.score_history(theme_id).await?;
    Ok(analyze_score_trend(
        theme_id,
        current_score,
        current_factors,
        &history,
    ))
}

fn percent_change(previous: u8, current: u8) -> f64 {
    let previous = f64::from(previous);
    let current = f64::from(current);
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

fn std_dev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn confidence(history_len: usize, volatility: f64) -> f64 {
    let sample_factor = history_len.min(FULL_CONFIDENCE_SAMPLES) as f64 / FULL_CONFIDENCE_SAMPLES as f64;
    let stability = 1.0 - (volatility / VOLATILITY_CEILING).min(1.0) / 2.0;
    (sample_factor * stability).clamp(0.0, 1.0)
}

fn extremes(factors: &MonetizationFactors) -> (Option<Factor>, Option<Factor>) {
    let mut strongest: Option<(Factor, f64)> = None;
    let mut weakest: Option<(Factor, f64)> = None;
    for factor in Factor::ALL {
        let value = factors.adjusted(factor);
        if strongest.map_or(true, |(_, best)| value > best) {
            strongest = Some((factor, value));
        }
        if weakest.map_or(true, |(_, worst)| value < worst) {
            weakest = Some((factor, value));
        }
    }
    (strongest.map(|(f, _)| f), weakest.map(|(f, _)| f))
}

fn factor_movers(
    previous: &MonetizationFactors,
    current: &MonetizationFactors,
) -> (Option<FactorChange>, Option<FactorChange>) {
    let changes: Vec<FactorChange> = Factor::ALL
        .iter()
        .map(|&factor| {
            let before = previous.adjusted(factor);
            let after = current.adjusted(factor);
            FactorChange {
                factor,
                previous: before,
                current: after,
                delta: after - before,
            }
        })
        .collect();

    let improved = changes
        .iter()
        .filter(|c| c.delta > 0.0)
        .max_by(|a, b| a.delta.total_cmp(&b.delta))
        .copied();
    let declined = changes
        .iter()
        .filter(|c| c.delta < 0.0)
        .min_by(|a, b| a.delta.total_cmp(&b.delta))
        .copied();
    (improved, declined)
}

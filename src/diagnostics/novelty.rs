//! Novelty and primacy effect detection
//!
//! Compares the lift in the first days of a test against the lift in the
//! most recent days. A lift that decays points to a novelty effect (users
//! poke at anything new); a lift that grows points to a primacy effect
//! (users need time to adapt).

use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::types::SampleSummary;
use serde::{Deserialize, Serialize};

/// Share of the observed days used for each comparison window
const WINDOW_SHARE: f64 = 0.3;
const MIN_WINDOW_DAYS: usize = 2;

/// One day of binary counts for both arms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: i64,
    pub control_visitors: i64,
    pub control_conversions: i64,
    pub variant_visitors: i64,
    pub variant_conversions: i64,
}

/// Novelty detection input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoveltyRequest {
    #[serde(alias = "daily_data")]
    pub daily_results: Vec<DailyRecord>,
}

/// Trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    InsufficientData,
    Stable,
    Novelty,
    Primacy,
}

/// Novelty detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoveltyResult {
    pub effect_type: EffectType,
    pub effect_detected: bool,
    pub days_analyzed: usize,
    pub window_days: Option<usize>,
    /// Lift of the early window, in percent
    pub initial_lift: Option<f64>,
    /// Lift of the most recent window, in percent
    pub current_lift: Option<f64>,
    /// current − initial, in percentage points of lift
    pub lift_change_points: Option<f64>,
    pub tolerance_points: f64,
    pub recommendation: String,
}

/// Classify a change in lift against the tolerance
pub fn classify_trend(change_points: f64, tolerance: f64) -> EffectType {
    if change_points.abs() < tolerance {
        EffectType::Stable
    } else if change_points < 0.0 {
        EffectType::Novelty
    } else {
        EffectType::Primacy
    }
}

/// Lift (percent) of summed counts over a window of days
fn window_lift(days: &[&DailyRecord], label: &str) -> Result<f64> {
    let (mut cv, mut cc, mut vv, mut vc) = (0i64, 0i64, 0i64, 0i64);
    for day in days {
        cv = cv.saturating_add(day.control_visitors);
        cc = cc.saturating_add(day.control_conversions);
        vv = vv.saturating_add(day.variant_visitors);
        vc = vc.saturating_add(day.variant_conversions);
    }
    let control = cc as f64 / cv as f64;
    let variant = vc as f64 / vv as f64;
    if control == 0.0 {
        return Err(AnalysisError::validation(
            format!("daily_results ({} window)", label),
            "control has no conversions, relative lift is undefined",
        ));
    }
    Ok((variant - control) / control * 100.0)
}

/// Compare early-window and current-window lift
pub fn detect_novelty(request: &NoveltyRequest, config: &EngineConfig) -> Result<NoveltyResult> {
    let mut seen = std::collections::HashSet::new();
    for (i, record) in request.daily_results.iter().enumerate() {
        let field = format!("daily_results[{}]", i);
        SampleSummary::binary(record.control_visitors, record.control_conversions)
            .validate(&format!("{}.control", field))?;
        SampleSummary::binary(record.variant_visitors, record.variant_conversions)
            .validate(&format!("{}.variant", field))?;
        if !seen.insert(record.day) {
            return Err(AnalysisError::validation(
                format!("{}.day", field),
                format!("duplicate day {}", record.day),
            ));
        }
    }

    let tolerance = config.novelty_tolerance_points;
    let days = request.daily_results.len();
    let min_days = config.novelty_min_days.max(MIN_WINDOW_DAYS);
    if days < min_days {
        return Ok(NoveltyResult {
            effect_type: EffectType::InsufficientData,
            effect_detected: false,
            days_analyzed: days,
            window_days: None,
            initial_lift: None,
            current_lift: None,
            lift_change_points: None,
            tolerance_points: tolerance,
            recommendation: format!(
                "Need at least {} days of data to assess novelty effects, have {}.",
                min_days, days
            ),
        });
    }

    let mut sorted: Vec<&DailyRecord> = request.daily_results.iter().collect();
    sorted.sort_by_key(|record| record.day);

    let window = ((WINDOW_SHARE * days as f64).round() as usize)
        .max(MIN_WINDOW_DAYS)
        .min(days);
    let initial = window_lift(&sorted[..window], "early")?;
    let current = window_lift(&sorted[days - window..], "current")?;
    let change = current - initial;
    let effect_type = classify_trend(change, tolerance);

    let recommendation = match effect_type {
        EffectType::Stable => format!(
            "Lift is stable over time ({:+.1}% early vs {:+.1}% now).",
            initial, current
        ),
        EffectType::Novelty => format!(
            "Lift fell from {:+.1}% to {:+.1}%: likely a novelty effect. Expect the long-run \
             lift to be closer to the recent value.",
            initial, current
        ),
        EffectType::Primacy => format!(
            "Lift grew from {:+.1}% to {:+.1}%: likely a primacy effect. Users may still be \
             adapting; consider running longer.",
            initial, current
        ),
        EffectType::InsufficientData => String::new(),
    };

    tracing::debug!(days, window, initial, current, change, "novelty trend");

    Ok(NoveltyResult {
        effect_type,
        effect_detected: matches!(effect_type, EffectType::Novelty | EffectType::Primacy),
        days_analyzed: days,
        window_days: Some(window),
        initial_lift: Some(initial),
        current_lift: Some(current),
        lift_change_points: Some(change),
        tolerance_points: tolerance,
        recommendation,
    })
}

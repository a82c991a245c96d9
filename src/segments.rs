//! Segment-level analysis
//!
//! Tests each segment (device, country, ...) as its own two-arm comparison,
//! corrects the segment p-values jointly, and looks for evidence that the
//! effect differs between segments or that the aggregate hides a reversal.
//!
//! Scientific Foundation:
//! - Cochran, W. G. (1954). The combination of estimates from different
//!   experiments. Biometrics 10(1). Q statistic for heterogeneity of
//!   inverse-variance weighted effects.
//! - Simpson, E. H. (1951). The interpretation of interaction in
//!   contingency tables. JRSS B 13(2).

use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::frequentist::{adjust_p_values, compare_arms, ComparisonResult};
use crate::primitives::chi2_sf;
use crate::types::{
    default_confidence, ConfidenceInterval, ConfidenceLevel, Correction, SampleSummary,
};
use serde::{Deserialize, Serialize};

fn default_min_sample() -> i64 {
    1000
}

/// One segment's arms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    pub segment_name: String,
    pub segment_value: String,
    pub control: SampleSummary,
    pub variant: SampleSummary,
}

/// Segment analysis input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentsRequest {
    pub segments: Vec<SegmentInput>,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
    #[serde(default, rename = "correction_method", alias = "correction")]
    pub correction: Correction,
    /// Combined visitors (control + variant) for a segment to be adequate
    #[serde(default = "default_min_sample")]
    pub min_sample_per_segment: i64,
}

/// Per-segment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segment_name: String,
    pub segment_value: String,
    pub visitors: i64,
    pub comparison: ComparisonResult,
    pub p_value_adjusted: f64,
    /// Significance after correction
    pub is_significant: bool,
    pub sample_size_adequate: bool,
    /// Interval on the difference, in percent of the segment's control value
    pub lift_ci: ConfidenceInterval,
}

impl SegmentResult {
    /// `"name=value"` label
    pub fn label(&self) -> String {
        format!("{}={}", self.segment_name, self.segment_value)
    }
}

/// Aggregate segment report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub segments: Vec<SegmentResult>,
    pub correction: Correction,
    pub confidence: u32,
    /// Lift of the pooled (traffic-weighted) arms, in percent
    pub overall_lift: f64,
    pub heterogeneity_detected: bool,
    /// Cochran's Q p-value over adequate segments
    pub heterogeneity_p_value: Option<f64>,
    pub simpsons_paradox_risk: bool,
    pub best_segment: Option<String>,
    pub worst_segment: Option<String>,
    pub recommendation: String,
}

/// Pool arm summaries across segments
fn pool(arms: &[&SampleSummary]) -> f64 {
    let mut size = 0.0;
    let mut weighted = 0.0;
    for arm in arms {
        let n = arm.size() as f64;
        size += n;
        weighted += n * arm.point();
    }
    weighted / size
}

/// Cochran's Q over inverse-variance weighted differences
///
/// Returns `None` with fewer than two segments of positive variance.
fn cochran_q(results: &[&SegmentResult]) -> Result<Option<f64>> {
    let effects: Vec<(f64, f64)> = results
        .iter()
        .filter(|r| r.comparison.standard_error > 0.0)
        .map(|r| {
            let se = r.comparison.standard_error;
            (r.comparison.lift_absolute, 1.0 / (se * se))
        })
        .collect();
    if effects.len() < 2 {
        return Ok(None);
    }

    let total_weight: f64 = effects.iter().map(|(_, w)| w).sum();
    let pooled = effects.iter().map(|(d, w)| d * w).sum::<f64>() / total_weight;
    let q: f64 = effects.iter().map(|(d, w)| w * (d - pooled).powi(2)).sum();
    Ok(Some(chi2_sf(q, (effects.len() - 1) as f64)?))
}

/// Analyze every segment and the relationships between them
pub fn analyze_segments(request: &SegmentsRequest, config: &EngineConfig) -> Result<SegmentReport> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    if request.segments.is_empty() {
        return Err(AnalysisError::validation(
            "segments",
            "at least one segment is required",
        ));
    }
    if request.min_sample_per_segment < 0 {
        return Err(AnalysisError::validation(
            "min_sample_per_segment",
            format!("cannot be negative, got {}", request.min_sample_per_segment),
        ));
    }

    let metric_type = request.segments[0].control.metric_type();
    let mut comparisons = Vec::with_capacity(request.segments.len());
    for (i, segment) in request.segments.iter().enumerate() {
        let control_label = format!("segments[{}].control", i);
        let variant_label = format!("segments[{}].variant", i);
        if segment.control.metric_type() != metric_type {
            return Err(AnalysisError::validation(
                control_label,
                format!("metric type does not match segments[0] ({:?})", metric_type),
            ));
        }
        comparisons.push(compare_arms(
            &segment.control,
            &segment.variant,
            confidence,
            (&control_label, &variant_label),
        )?);
    }

    let raw: Vec<f64> = comparisons.iter().map(|c| c.p_value).collect();
    let adjusted = adjust_p_values(&raw, request.correction);
    let alpha = confidence.alpha();

    let segments: Vec<SegmentResult> = request
        .segments
        .iter()
        .zip(comparisons)
        .zip(adjusted)
        .map(|((segment, comparison), p_adjusted)| {
            let visitors = segment.control.size().saturating_add(segment.variant.size());
            let lift_ci = comparison
                .confidence_interval
                .scaled(100.0 / comparison.control_value);
            SegmentResult {
                segment_name: segment.segment_name.clone(),
                segment_value: segment.segment_value.clone(),
                visitors,
                comparison,
                p_value_adjusted: p_adjusted,
                is_significant: p_adjusted < alpha,
                sample_size_adequate: visitors >= request.min_sample_per_segment,
                lift_ci,
            }
        })
        .collect();

    let controls: Vec<&SampleSummary> = request.segments.iter().map(|s| &s.control).collect();
    let variants: Vec<&SampleSummary> = request.segments.iter().map(|s| &s.variant).collect();
    let pooled_control = pool(&controls);
    let pooled_variant = pool(&variants);
    if pooled_control == 0.0 {
        return Err(AnalysisError::validation(
            "segments",
            "pooled control value is zero, relative lift is undefined",
        ));
    }
    let overall_lift = (pooled_variant - pooled_control) / pooled_control * 100.0;

    let adequate: Vec<&SegmentResult> = segments.iter().filter(|s| s.sample_size_adequate).collect();
    let (heterogeneity_detected, heterogeneity_p_value) = if adequate.len() >= 2 {
        let significant = || adequate.iter().filter(|s| s.is_significant);
        let sign_conflict = significant().any(|s| s.comparison.lift_absolute > 0.0)
            && significant().any(|s| s.comparison.lift_absolute < 0.0);
        let q_p = cochran_q(&adequate)?;
        let q_flag = q_p.is_some_and(|p| p < config.heterogeneity_alpha);
        (sign_conflict || q_flag, q_p)
    } else {
        (false, None)
    };

    let weighted_sign: f64 = segments
        .iter()
        .filter(|s| s.is_significant)
        .map(|s| s.visitors as f64 * s.comparison.lift_absolute.signum())
        .sum();
    let simpsons_paradox_risk = weighted_sign != 0.0
        && overall_lift != 0.0
        && weighted_sign.signum() != overall_lift.signum();

    let mut best: Option<&SegmentResult> = None;
    let mut worst: Option<&SegmentResult> = None;
    for segment in &adequate {
        let lift = segment.comparison.lift_percent;
        if best.map_or(true, |b| lift > b.comparison.lift_percent) {
            best = Some(segment);
        }
        if worst.map_or(true, |w| lift < w.comparison.lift_percent) {
            worst = Some(segment);
        }
    }

    let recommendation = if simpsons_paradox_risk {
        "Significant segments point the opposite way from the overall result: possible \
         Simpson's paradox. Check how traffic is distributed across segments."
            .to_string()
    } else if heterogeneity_detected {
        "The effect differs across segments. Consider a targeted rollout instead of a \
         single global decision."
            .to_string()
    } else if adequate.is_empty() {
        format!(
            "No segment reaches {} visitors; segment results are not reliable yet.",
            request.min_sample_per_segment
        )
    } else {
        "The effect is consistent across segments.".to_string()
    };

    tracing::debug!(
        segments = segments.len(),
        adequate = adequate.len(),
        overall_lift,
        heterogeneity_detected,
        simpsons_paradox_risk,
        metric = ?metric_type,
        "segment analysis"
    );

    Ok(SegmentReport {
        best_segment: best.map(|s| s.label()),
        worst_segment: worst.map(|s| s.label()),
        segments,
        correction: request.correction,
        confidence: confidence.percent(),
        overall_lift,
        heterogeneity_detected,
        heterogeneity_p_value,
        simpsons_paradox_risk,
        recommendation,
    })
}

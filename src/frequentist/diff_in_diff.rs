// Difference-in-differences
//
// Compares the pre→post change in a treatment group against the same change
// in a control group, netting out shared time trends. The four cells are
// independent samples, so the variance of the estimate is the sum of the
// four cell variances and a z-test applies.

use crate::error::{AnalysisError, Result};
use crate::primitives::{two_sided_p_from_z, z_critical};
use crate::types::{
    default_confidence, ConfidenceInterval, ConfidenceLevel, MetricType, SampleSummary,
};
use serde::{Deserialize, Serialize};

/// Pre/post × control/treatment cell summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffInDiffRequest {
    pub control_pre: SampleSummary,
    pub control_post: SampleSummary,
    pub treatment_pre: SampleSummary,
    pub treatment_post: SampleSummary,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
}

/// Difference-in-differences estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffInDiffResult {
    pub metric_type: MetricType,
    pub control_pre_value: f64,
    pub control_post_value: f64,
    pub treatment_pre_value: f64,
    pub treatment_post_value: f64,
    pub control_change: f64,
    pub treatment_change: f64,
    pub diff_in_diff: f64,
    pub standard_error: f64,
    pub z_statistic: f64,
    pub p_value: f64,
    pub confidence_interval: ConfidenceInterval,
    pub is_significant: bool,
    pub recommendation: String,
}

/// Estimate `(T_post − T_pre) − (C_post − C_pre)` with a z-test
pub fn analyze_diff_in_diff(request: &DiffInDiffRequest) -> Result<DiffInDiffResult> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    let cells = [
        ("control_pre", &request.control_pre),
        ("control_post", &request.control_post),
        ("treatment_pre", &request.treatment_pre),
        ("treatment_post", &request.treatment_post),
    ];

    let metric_type = request.control_pre.metric_type();
    for (field, cell) in cells {
        cell.validate(field)?;
        if cell.metric_type() != metric_type {
            return Err(AnalysisError::validation(
                field,
                format!("metric type does not match control_pre ({:?})", metric_type),
            ));
        }
    }

    let control_change = request.control_post.point() - request.control_pre.point();
    let treatment_change = request.treatment_post.point() - request.treatment_pre.point();
    let estimate = treatment_change - control_change;
    let se = cells
        .iter()
        .map(|(_, cell)| cell.estimate_variance())
        .sum::<f64>()
        .sqrt();

    let (z, p_value, interval) = if se > 0.0 {
        let z = estimate / se;
        let margin = z_critical(confidence.alpha()) * se;
        (
            z,
            two_sided_p_from_z(z),
            ConfidenceInterval::new(estimate - margin, estimate + margin, confidence.percent()),
        )
    } else {
        tracing::warn!("diff-in-diff cells have zero variance, reporting p = 1");
        (
            0.0,
            1.0,
            ConfidenceInterval::point(estimate, confidence.percent()),
        )
    };
    let is_significant = p_value < confidence.alpha();

    let effect = match metric_type {
        MetricType::Binary => format!("{:+.2} percentage points", estimate * 100.0),
        MetricType::Continuous => format!("{:+.2}", estimate),
    };
    let recommendation = if is_significant {
        format!(
            "The treatment changed the metric by {} beyond the control trend (p = {:.4}).",
            effect, p_value
        )
    } else {
        format!(
            "No significant effect beyond the control trend ({}, p = {:.4}).",
            effect, p_value
        )
    };

    Ok(DiffInDiffResult {
        metric_type,
        control_pre_value: request.control_pre.point(),
        control_post_value: request.control_post.point(),
        treatment_pre_value: request.treatment_pre.point(),
        treatment_post_value: request.treatment_post.point(),
        control_change,
        treatment_change,
        diff_in_diff: estimate,
        standard_error: se,
        z_statistic: z,
        p_value,
        confidence_interval: interval,
        is_significant,
        recommendation,
    })
}

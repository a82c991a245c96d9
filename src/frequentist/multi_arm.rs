// K-arm (multi-variant) testing
//
// Omnibus test first, then every pair compared with the two-arm machinery
// and the pairwise p-values corrected jointly.
//
// Binary metrics: chi-square test of independence on the k×2 table of
// conversions and non-conversions, with Yates' continuity correction when the
// table has a single degree of freedom.
// Continuous metrics: one-way ANOVA F-test reconstructed from per-arm n,
// mean and standard deviation.

use crate::error::{AnalysisError, Result};
use crate::frequentist::correction::adjust_p_values;
use crate::frequentist::two_arm::test_difference;
use crate::primitives::{chi2_sf, f_sf};
use crate::types::{
    default_confidence, ConfidenceInterval, ConfidenceLevel, Correction, MetricType,
    SampleSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named experiment arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArm {
    pub name: String,
    #[serde(flatten)]
    pub summary: SampleSummary,
}

impl NamedArm {
    pub fn new(name: impl Into<String>, summary: SampleSummary) -> Self {
        Self {
            name: name.into(),
            summary,
        }
    }
}

/// K-arm comparison input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KArmRequest {
    pub variants: Vec<NamedArm>,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
    #[serde(default)]
    pub correction: Correction,
}

/// Per-arm summary echoed in the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub name: String,
    pub size: i64,
    /// Rate or mean
    pub value: f64,
}

/// One pairwise comparison (lift relative to `variant_a`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub variant_a: String,
    pub variant_b: String,
    pub value_a: f64,
    pub value_b: f64,
    /// Absent when `value_a` is zero
    pub lift_percent: Option<f64>,
    pub lift_absolute: f64,
    pub p_value: f64,
    pub p_value_adjusted: f64,
    pub is_significant: bool,
    pub confidence_interval: ConfidenceInterval,
}

/// K-arm comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KArmResult {
    pub metric_type: MetricType,
    pub variants: Vec<VariantSummary>,
    pub confidence: u32,
    pub correction: Correction,
    /// Omnibus p-value (chi-square or ANOVA)
    pub p_value: f64,
    pub test_statistic: f64,
    pub degrees_of_freedom: f64,
    /// ANOVA within-group df; absent for chi-square
    pub denominator_degrees_of_freedom: Option<f64>,
    pub omnibus_significant: bool,
    /// Any adjusted pairwise p-value below alpha
    pub is_significant: bool,
    pub best_variant: String,
    pub worst_variant: String,
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub recommendation: String,
}

/// Omnibus statistic
struct Omnibus {
    statistic: f64,
    p_value: f64,
    df: f64,
    denominator_df: Option<f64>,
}

fn validate_arms(arms: &[NamedArm]) -> Result<MetricType> {
    if arms.len() < 2 {
        return Err(AnalysisError::validation(
            "variants",
            format!("at least 2 arms are required, got {}", arms.len()),
        ));
    }

    let mut seen = HashSet::new();
    for (i, arm) in arms.iter().enumerate() {
        let field = format!("variants[{}]", i);
        if arm.name.trim().is_empty() {
            return Err(AnalysisError::validation(
                format!("{}.name", field),
                "must not be empty",
            ));
        }
        if !seen.insert(arm.name.as_str()) {
            return Err(AnalysisError::validation(
                format!("{}.name", field),
                format!("duplicate arm name '{}'", arm.name),
            ));
        }
        arm.summary.validate(&field)?;
    }

    let metric_type = arms[0].summary.metric_type();
    for (i, arm) in arms.iter().enumerate().skip(1) {
        if arm.summary.metric_type() != metric_type {
            return Err(AnalysisError::validation(
                format!("variants[{}]", i),
                format!("metric type does not match variants[0] ({:?})", metric_type),
            ));
        }
    }
    Ok(metric_type)
}

/// Chi-square test of independence on the k×2 conversion table
fn chi_square_independence(arms: &[NamedArm]) -> Result<Omnibus> {
    let rows: Vec<[f64; 2]> = arms
        .iter()
        .filter_map(|arm| match arm.summary {
            SampleSummary::Binary {
                visitors,
                conversions,
            } => Some([conversions as f64, (visitors - conversions) as f64]),
            SampleSummary::Continuous { .. } => None,
        })
        .collect();

    let total: f64 = rows.iter().map(|r| r[0] + r[1]).sum();
    let col_totals = [
        rows.iter().map(|r| r[0]).sum::<f64>(),
        rows.iter().map(|r| r[1]).sum::<f64>(),
    ];
    let df = (arms.len() - 1) as f64;

    if col_totals[0] == 0.0 || col_totals[1] == 0.0 {
        tracing::warn!("conversion table has an empty column, reporting p = 1");
        return Ok(Omnibus {
            statistic: 0.0,
            p_value: 1.0,
            df,
            denominator_df: None,
        });
    }

    let yates = arms.len() == 2;
    let mut statistic = 0.0;
    for row in &rows {
        let row_total = row[0] + row[1];
        for (observed, col_total) in row.iter().zip(col_totals) {
            let expected = row_total * col_total / total;
            let mut deviation = (observed - expected).abs();
            if yates {
                deviation = (deviation - 0.5).max(0.0);
            }
            statistic += deviation * deviation / expected;
        }
    }

    Ok(Omnibus {
        statistic,
        p_value: chi2_sf(statistic, df)?,
        df,
        denominator_df: None,
    })
}

/// One-way ANOVA from summary statistics
fn one_way_anova(arms: &[NamedArm]) -> Result<Omnibus> {
    let k = arms.len() as f64;
    let mut total_n = 0.0;
    let mut weighted_sum = 0.0;
    let mut ss_within = 0.0;
    for arm in arms {
        if let SampleSummary::Continuous { n, mean, std } = arm.summary {
            total_n += n as f64;
            weighted_sum += n as f64 * mean;
            ss_within += (n - 1) as f64 * std * std;
        }
    }
    let grand_mean = weighted_sum / total_n;
    let ss_between: f64 = arms
        .iter()
        .map(|arm| arm.summary.size() as f64 * (arm.summary.point() - grand_mean).powi(2))
        .sum();

    let df_between = k - 1.0;
    let df_within = total_n - k;
    if ss_within == 0.0 {
        tracing::warn!("zero within-group variance, reporting p = 1");
        return Ok(Omnibus {
            statistic: 0.0,
            p_value: 1.0,
            df: df_between,
            denominator_df: Some(df_within),
        });
    }

    let statistic = (ss_between / df_between) / (ss_within / df_within);
    Ok(Omnibus {
        statistic,
        p_value: f_sf(statistic, df_between, df_within)?,
        df: df_between,
        denominator_df: Some(df_within),
    })
}

/// Index of the extreme arm; first one wins ties
fn extreme_index(arms: &[NamedArm], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, arm) in arms.iter().enumerate().skip(1) {
        if better(arm.summary.point(), arms[best].summary.point()) {
            best = i;
        }
    }
    best
}

/// Compare k ≥ 2 arms with an omnibus test and corrected pairwise tests
pub fn analyze_k_arm(request: &KArmRequest) -> Result<KArmResult> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    let metric_type = validate_arms(&request.variants)?;
    let arms = &request.variants;
    let alpha = confidence.alpha();

    let omnibus = match metric_type {
        MetricType::Binary => chi_square_independence(arms)?,
        MetricType::Continuous => one_way_anova(arms)?,
    };

    let mut pairwise = Vec::with_capacity(arms.len() * (arms.len() - 1) / 2);
    for i in 0..arms.len() {
        for j in (i + 1)..arms.len() {
            let label_a = format!("variants[{}]", i);
            let label_b = format!("variants[{}]", j);
            let result = test_difference(
                &arms[i].summary,
                &arms[j].summary,
                confidence,
                (&label_a, &label_b),
            )?;
            pairwise.push(PairwiseComparison {
                variant_a: arms[i].name.clone(),
                variant_b: arms[j].name.clone(),
                value_a: result.control_value,
                value_b: result.variant_value,
                lift_percent: result.lift_percent(),
                lift_absolute: result.difference,
                p_value: result.p_value,
                p_value_adjusted: result.p_value,
                is_significant: false,
                confidence_interval: result.confidence_interval,
            });
        }
    }

    let raw: Vec<f64> = pairwise.iter().map(|c| c.p_value).collect();
    for (comparison, adjusted) in pairwise
        .iter_mut()
        .zip(adjust_p_values(&raw, request.correction))
    {
        comparison.p_value_adjusted = adjusted;
        comparison.is_significant = adjusted < alpha;
    }

    let best = &arms[extreme_index(arms, |a, b| a > b)];
    let worst = &arms[extreme_index(arms, |a, b| a < b)];
    let is_significant = pairwise.iter().any(|c| c.is_significant);

    let recommendation = recommendation(
        metric_type,
        &best.name,
        best.summary.point(),
        is_significant,
        &pairwise,
        omnibus.p_value,
        confidence,
    );

    tracing::debug!(
        arms = arms.len(),
        statistic = omnibus.statistic,
        p_value = omnibus.p_value,
        significant_pairs = pairwise.iter().filter(|c| c.is_significant).count(),
        "k-arm comparison"
    );

    Ok(KArmResult {
        metric_type,
        variants: arms
            .iter()
            .map(|arm| VariantSummary {
                name: arm.name.clone(),
                size: arm.summary.size(),
                value: arm.summary.point(),
            })
            .collect(),
        confidence: confidence.percent(),
        correction: request.correction,
        p_value: omnibus.p_value,
        test_statistic: omnibus.statistic,
        degrees_of_freedom: omnibus.df,
        denominator_degrees_of_freedom: omnibus.denominator_df,
        omnibus_significant: omnibus.p_value < alpha,
        is_significant,
        best_variant: best.name.clone(),
        worst_variant: worst.name.clone(),
        pairwise_comparisons: pairwise,
        recommendation,
    })
}

fn recommendation(
    metric_type: MetricType,
    best_name: &str,
    best_value: f64,
    is_significant: bool,
    pairwise: &[PairwiseComparison],
    omnibus_p: f64,
    confidence: ConfidenceLevel,
) -> String {
    if !is_significant {
        return format!(
            "No significant differences between arms after correction (omnibus p = {:.4}). \
             Observed gaps could be random noise; keep collecting data.",
            omnibus_p
        );
    }

    let wins = pairwise
        .iter()
        .filter(|c| {
            c.is_significant
                && ((c.variant_b == best_name && c.lift_absolute > 0.0)
                    || (c.variant_a == best_name && c.lift_absolute < 0.0))
        })
        .count();
    let value = match metric_type {
        MetricType::Binary => format!("{:.2}%", best_value * 100.0),
        MetricType::Continuous => format!("{:.2}", best_value),
    };
    let detail = if wins > 0 {
        format!("It significantly beats {} other arm(s).", wins)
    } else {
        "Check the pairwise comparisons for which arms differ.".to_string()
    };
    format!(
        "Significant differences detected at {}% confidence (omnibus p = {:.4}). \
         '{}' has the highest value ({}). {}",
        confidence.percent(),
        omnibus_p,
        best_name,
        value,
        detail
    )
}

// Two-arm hypothesis testing
//
// Binary metrics: two-proportion z-test. The statistic uses the pooled
// standard error (H0: p1 = p2); the interval on the difference uses the
// unpooled standard error.
//
// Continuous metrics: Welch's t-test with Welch-Satterthwaite degrees of
// freedom, interval from the t quantile.

use crate::error::{AnalysisError, Result};
use crate::primitives::{
    pooled_se, t_quantile, two_sided_p_from_t, two_sided_p_from_z, unpooled_se, welch_df,
    welch_se, z_critical,
};
use crate::types::{
    default_confidence, ConfidenceInterval, ConfidenceLevel, MetricType, SampleSummary, Winner,
};
use serde::{Deserialize, Serialize};

/// Two-arm comparison input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoArmRequest {
    pub control: SampleSummary,
    pub variant: SampleSummary,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
}

/// Outcome of comparing a variant arm against a control arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub metric_type: MetricType,
    /// Control rate or mean
    pub control_value: f64,
    /// Variant rate or mean
    pub variant_value: f64,
    pub lift_percent: f64,
    pub lift_absolute: f64,
    pub p_value: f64,
    /// z (binary) or Welch t (continuous)
    pub test_statistic: f64,
    /// Welch-Satterthwaite df; absent for the z-test
    pub degrees_of_freedom: Option<f64>,
    /// Standard error of the difference used for the interval
    pub standard_error: f64,
    /// Interval on the absolute difference (variant − control)
    pub confidence_interval: ConfidenceInterval,
    pub is_significant: bool,
    pub winner: Winner,
    pub recommendation: String,
}

/// Test statistic and interval on the absolute difference of two arms
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceTest {
    pub metric_type: MetricType,
    pub control_value: f64,
    pub variant_value: f64,
    /// variant − control
    pub difference: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub standard_error: f64,
    pub degrees_of_freedom: Option<f64>,
    pub confidence_interval: ConfidenceInterval,
}

impl DifferenceTest {
    /// Relative lift in percent; `None` when the control value is zero
    pub fn lift_percent(&self) -> Option<f64> {
        (self.control_value != 0.0).then(|| self.difference / self.control_value * 100.0)
    }
}

/// Test the difference between two arms without requiring a defined lift
///
/// A zero control value is valid here; only the relative lift is undefined.
pub fn test_difference(
    control: &SampleSummary,
    variant: &SampleSummary,
    confidence: ConfidenceLevel,
    labels: (&str, &str),
) -> Result<DifferenceTest> {
    let (control_label, variant_label) = labels;
    control.validate(control_label)?;
    variant.validate(variant_label)?;
    if control.metric_type() != variant.metric_type() {
        return Err(AnalysisError::validation(
            variant_label,
            format!(
                "metric type {:?} does not match {} ({:?})",
                variant.metric_type(),
                control_label,
                control.metric_type()
            ),
        ));
    }

    let control_value = control.point();
    let variant_value = variant.point();
    let alpha = confidence.alpha();
    let diff = variant_value - control_value;

    let (statistic, p_value, se_diff, df, critical) = match (*control, *variant) {
        (
            SampleSummary::Binary {
                visitors: n1,
                conversions: c1,
            },
            SampleSummary::Binary {
                visitors: n2,
                conversions: c2,
            },
        ) => {
            let se_null = pooled_se(c1, n1, c2, n2);
            let (z, p) = if se_null > 0.0 {
                let z = diff / se_null;
                (z, two_sided_p_from_z(z))
            } else {
                tracing::warn!("zero pooled standard error, reporting p = 1");
                (0.0, 1.0)
            };
            let se = unpooled_se(control_value, n1, variant_value, n2);
            (z, p, se, None, z_critical(alpha))
        }
        (
            SampleSummary::Continuous {
                n: n1, std: s1, ..
            },
            SampleSummary::Continuous {
                n: n2, std: s2, ..
            },
        ) => {
            if s1 == 0.0 && s2 == 0.0 && diff == 0.0 {
                return Err(AnalysisError::validation(
                    format!("{}.std", variant_label),
                    "no detectable variance: both arms have zero spread and equal means",
                ));
            }
            let se = welch_se(s1, n1, s2, n2);
            let df = welch_df(s1, n1, s2, n2);
            let (t, p) = if se > 0.0 {
                let t = diff / se;
                (t, two_sided_p_from_t(t, df)?)
            } else {
                tracing::warn!("zero standard error, reporting p = 1");
                (0.0, 1.0)
            };
            let critical = t_quantile(1.0 - alpha / 2.0, df)?;
            (t, p, se, Some(df), critical)
        }
        _ => {
            return Err(AnalysisError::validation(
                variant_label,
                "metric type does not match control",
            ))
        }
    };

    let margin = critical * se_diff;
    let interval = if se_diff > 0.0 {
        ConfidenceInterval::new(diff - margin, diff + margin, confidence.percent())
    } else {
        ConfidenceInterval::point(diff, confidence.percent())
    };

    Ok(DifferenceTest {
        metric_type: control.metric_type(),
        control_value,
        variant_value,
        difference: diff,
        statistic,
        p_value,
        standard_error: se_diff,
        degrees_of_freedom: df,
        confidence_interval: interval,
    })
}

/// Compare two arms at a validated confidence level
///
/// `labels` name the arms in validation errors (e.g. `"segments[2].control"`).
pub fn compare_arms(
    control: &SampleSummary,
    variant: &SampleSummary,
    confidence: ConfidenceLevel,
    labels: (&str, &str),
) -> Result<ComparisonResult> {
    let test = test_difference(control, variant, confidence, labels)?;
    let Some(lift_percent) = test.lift_percent() else {
        return Err(AnalysisError::validation(
            labels.0,
            "control value is zero, relative lift is undefined",
        ));
    };

    let is_significant = test.p_value < confidence.alpha();
    let winner = if !is_significant {
        Winner::None
    } else if test.difference > 0.0 {
        Winner::Variant
    } else {
        Winner::Control
    };

    let mut result = ComparisonResult {
        metric_type: test.metric_type,
        control_value: test.control_value,
        variant_value: test.variant_value,
        lift_percent,
        lift_absolute: test.difference,
        p_value: test.p_value,
        test_statistic: test.statistic,
        degrees_of_freedom: test.degrees_of_freedom,
        standard_error: test.standard_error,
        confidence_interval: test.confidence_interval,
        is_significant,
        winner,
        recommendation: String::new(),
    };
    result.recommendation = recommendation(&result, confidence);

    tracing::debug!(
        metric = ?result.metric_type,
        statistic = result.test_statistic,
        p_value = result.p_value,
        significant = result.is_significant,
        "two-arm comparison"
    );
    Ok(result)
}

/// Run a two-arm comparison request
///
/// # Example
/// ```
/// use exptest::frequentist::{analyze_two_arm, TwoArmRequest};
/// use exptest::types::{SampleSummary, Winner};
///
/// let result = analyze_two_arm(&TwoArmRequest {
///     control: SampleSummary::binary(10_000, 500),
///     variant: SampleSummary::binary(10_000, 575),
///     confidence: 95,
/// })
/// .unwrap();
/// assert!(result.is_significant);
/// assert_eq!(result.winner, Winner::Variant);
/// ```
pub fn analyze_two_arm(request: &TwoArmRequest) -> Result<ComparisonResult> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    compare_arms(
        &request.control,
        &request.variant,
        confidence,
        ("control", "variant"),
    )
}

fn format_value(metric_type: MetricType, value: f64) -> String {
    match metric_type {
        MetricType::Binary => format!("{:.2}%", value * 100.0),
        MetricType::Continuous => format!("{:.2}", value),
    }
}

fn recommendation(result: &ComparisonResult, confidence: ConfidenceLevel) -> String {
    let variant = format_value(result.metric_type, result.variant_value);
    let control = format_value(result.metric_type, result.control_value);

    if result.is_significant {
        let direction = if result.lift_absolute > 0.0 {
            "higher"
        } else {
            "lower"
        };
        format!(
            "Variant is significantly {} than control (p = {:.4}). With {}% confidence the \
             difference between variant ({}) and control ({}) is not due to chance.",
            direction,
            result.p_value,
            confidence.percent(),
            variant,
            control
        )
    } else {
        format!(
            "No significant difference detected (p = {:.4}, threshold {:.2}). The gap between \
             variant ({}) and control ({}) could be random noise; keep collecting data.",
            result.p_value,
            confidence.alpha(),
            variant,
            control
        )
    }
}

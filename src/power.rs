//! Power analysis and sample size planning
//!
//! Answers "how many visitors do I need?" before a test starts and "how much
//! power did I actually have?" after it ran. Binary metrics use the unpooled
//! two-proportion normal approximation, continuous metrics use Cohen's d.
//! With more than two variants the significance level is Bonferroni-split
//! across the `k − 1` comparisons against control.

use crate::error::{AnalysisError, Result};
use crate::primitives::{normal_cdf, normal_quantile, z_critical};
use crate::types::{default_confidence, ConfidenceLevel, MetricType};
use serde::{Deserialize, Serialize};

/// Baseline the minimum detectable effect is measured against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Baseline {
    Rate { current_rate: f64 },
    Mean { current_mean: f64, current_std: f64 },
}

impl Baseline {
    pub fn metric_type(&self) -> MetricType {
        match self {
            Baseline::Rate { .. } => MetricType::Binary,
            Baseline::Mean { .. } => MetricType::Continuous,
        }
    }

    /// Validate the baseline and return `(current, expected)` for a relative lift
    fn current_and_expected(&self, lift_percent: f64) -> Result<(f64, f64)> {
        if !lift_percent.is_finite() || lift_percent == 0.0 {
            return Err(AnalysisError::validation(
                "lift_percent",
                format!("must be a non-zero finite number, got {}", lift_percent),
            ));
        }
        let factor = 1.0 + lift_percent / 100.0;

        match *self {
            Baseline::Rate { current_rate } => {
                if !(current_rate > 0.0 && current_rate < 1.0) {
                    return Err(AnalysisError::validation(
                        "current_rate",
                        format!("must be strictly between 0 and 1, got {}", current_rate),
                    ));
                }
                let expected = current_rate * factor;
                if !(expected > 0.0 && expected < 1.0) {
                    return Err(AnalysisError::validation(
                        "lift_percent",
                        format!(
                            "expected rate {:.4} falls outside (0, 1); lower the lift",
                            expected
                        ),
                    ));
                }
                Ok((current_rate, expected))
            }
            Baseline::Mean {
                current_mean,
                current_std,
            } => {
                if !current_mean.is_finite() {
                    return Err(AnalysisError::validation(
                        "current_mean",
                        "must be a finite number",
                    ));
                }
                if !(current_std.is_finite() && current_std > 0.0) {
                    return Err(AnalysisError::validation(
                        "current_std",
                        format!("must be positive, got {}", current_std),
                    ));
                }
                let expected = current_mean * factor;
                if expected == current_mean {
                    return Err(AnalysisError::validation(
                        "current_mean",
                        "a zero baseline mean gives no detectable effect",
                    ));
                }
                Ok((current_mean, expected))
            }
        }
    }
}

fn default_power() -> u32 {
    80
}

fn default_num_variants() -> usize {
    2
}

/// Sample size planning input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSizeRequest {
    #[serde(flatten)]
    pub baseline: Baseline,
    /// Minimum detectable relative lift, in percent
    pub lift_percent: f64,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
    /// Statistical power in percent (50..=99)
    #[serde(default = "default_power")]
    pub power: u32,
    #[serde(default)]
    pub daily_visitors: Option<i64>,
    #[serde(default = "default_num_variants")]
    pub num_variants: usize,
}

/// Sample size plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSizePlan {
    pub metric_type: MetricType,
    pub visitors_per_variant: u64,
    pub total_visitors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_deviation: Option<f64>,
    pub lift_percent: f64,
    pub confidence: u32,
    pub power: u32,
    pub num_variants: usize,
    pub test_duration_days: Option<u64>,
}

fn validate_power(power: u32) -> Result<()> {
    if (50..=99).contains(&power) {
        Ok(())
    } else {
        Err(AnalysisError::validation(
            "power",
            format!("must be between 50 and 99 percent, got {}", power),
        ))
    }
}

/// Significance level after splitting across `k − 1` comparisons
fn split_alpha(confidence: ConfidenceLevel, num_variants: usize) -> f64 {
    let alpha = confidence.alpha();
    if num_variants > 2 {
        alpha / (num_variants - 1) as f64
    } else {
        alpha
    }
}

/// Required visitors per variant
///
/// # Example
/// ```
/// use exptest::power::{sample_size, Baseline, SampleSizeRequest};
///
/// let plan = sample_size(&SampleSizeRequest {
///     baseline: Baseline::Rate { current_rate: 0.05 },
///     lift_percent: 10.0,
///     confidence: 95,
///     power: 80,
///     daily_visitors: Some(1000),
///     num_variants: 2,
/// })
/// .unwrap();
/// assert!(plan.visitors_per_variant > 30_000);
/// assert!(plan.test_duration_days.is_some());
/// ```
pub fn sample_size(request: &SampleSizeRequest) -> Result<SampleSizePlan> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    validate_power(request.power)?;
    if request.num_variants < 2 {
        return Err(AnalysisError::validation(
            "num_variants",
            format!("must be at least 2, got {}", request.num_variants),
        ));
    }
    if let Some(daily) = request.daily_visitors {
        if daily <= 0 {
            return Err(AnalysisError::validation(
                "daily_visitors",
                format!("must be positive, got {}", daily),
            ));
        }
    }

    let (current, expected) = request.baseline.current_and_expected(request.lift_percent)?;
    let z_alpha = z_critical(split_alpha(confidence, request.num_variants));
    let z_beta = normal_quantile(request.power as f64 / 100.0);
    let z_sum_sq = (z_alpha + z_beta).powi(2);

    let raw = match request.baseline {
        Baseline::Rate { .. } => {
            let variance = current * (1.0 - current) + expected * (1.0 - expected);
            z_sum_sq * variance / (expected - current).powi(2)
        }
        Baseline::Mean { current_std, .. } => {
            let d = (expected - current) / current_std;
            2.0 * z_sum_sq / (d * d)
        }
    };
    if !raw.is_finite() || raw > u64::MAX as f64 {
        return Err(AnalysisError::Numerical(format!(
            "required sample size is not representable ({})",
            raw
        )));
    }

    let per_variant = (raw.ceil() as u64).max(1);
    let total = per_variant
        .checked_mul(request.num_variants as u64)
        .ok_or_else(|| {
            AnalysisError::Numerical(format!(
                "total sample size overflows for {} variants",
                request.num_variants
            ))
        })?;
    let duration = request
        .daily_visitors
        .map(|daily| total.div_ceil(daily as u64));

    tracing::debug!(
        per_variant,
        total,
        z_alpha,
        z_beta,
        "sample size computed"
    );

    let (current_rate, expected_rate, current_mean, expected_mean, standard_deviation) =
        match request.baseline {
            Baseline::Rate { .. } => (Some(current), Some(expected), None, None, None),
            Baseline::Mean { current_std, .. } => {
                (None, None, Some(current), Some(expected), Some(current_std))
            }
        };

    Ok(SampleSizePlan {
        metric_type: request.baseline.metric_type(),
        visitors_per_variant: per_variant,
        total_visitors: total,
        current_rate,
        expected_rate,
        current_mean,
        expected_mean,
        standard_deviation,
        lift_percent: request.lift_percent,
        confidence: request.confidence,
        power: request.power,
        num_variants: request.num_variants,
        test_duration_days: duration,
    })
}

/// Achieved power input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerRequest {
    #[serde(flatten)]
    pub baseline: Baseline,
    pub lift_percent: f64,
    pub visitors_per_variant: i64,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
}

/// Achieved power for a given per-arm sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerAnalysis {
    pub metric_type: MetricType,
    pub power_percent: f64,
    pub effect_absolute: f64,
    pub standard_error: f64,
    pub visitors_per_variant: i64,
    pub lift_percent: f64,
    pub confidence: u32,
}

/// Power to detect a relative lift with the given visitors per arm
///
/// `power = 100·Φ(|Δ|/se − z_{α/2})`; the opposite rejection tail is ignored.
pub fn achieved_power(request: &PowerRequest) -> Result<PowerAnalysis> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    if request.visitors_per_variant < 2 {
        return Err(AnalysisError::validation(
            "visitors_per_variant",
            format!("must be at least 2, got {}", request.visitors_per_variant),
        ));
    }

    let (current, expected) = request.baseline.current_and_expected(request.lift_percent)?;
    let n = request.visitors_per_variant as f64;
    let se = match request.baseline {
        Baseline::Rate { .. } => {
            (current * (1.0 - current) / n + expected * (1.0 - expected) / n).sqrt()
        }
        Baseline::Mean { current_std, .. } => current_std * (2.0 / n).sqrt(),
    };

    let effect = expected - current;
    let z = z_critical(confidence.alpha());
    let power_percent = 100.0 * normal_cdf(effect.abs() / se - z);

    Ok(PowerAnalysis {
        metric_type: request.baseline.metric_type(),
        power_percent,
        effect_absolute: effect,
        standard_error: se,
        visitors_per_variant: request.visitors_per_variant,
        lift_percent: request.lift_percent,
        confidence: request.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_request(rate: f64, lift: f64) -> SampleSizeRequest {
        SampleSizeRequest {
            baseline: Baseline::Rate { current_rate: rate },
            lift_percent: lift,
            confidence: 95,
            power: 80,
            daily_visitors: None,
            num_variants: 2,
        }
    }

    #[test]
    fn test_binary_sample_size_reference() {
        // (1.959964 + 0.841621)² · (0.0475 + 0.051975) / 0.005² ≈ 31,231
        let plan = sample_size(&rate_request(0.05, 10.0)).unwrap();
        assert!(
            (31_100..=31_300).contains(&plan.visitors_per_variant),
            "got {}",
            plan.visitors_per_variant
        );
        assert_eq!(plan.total_visitors, plan.visitors_per_variant * 2);
        assert_eq!(plan.expected_rate, Some(0.05 * 1.1));
        assert_eq!(plan.test_duration_days, None);
    }

    #[test]
    fn test_duration_rounds_up() {
        let mut request = rate_request(0.05, 10.0);
        request.daily_visitors = Some(1000);
        let plan = sample_size(&request).unwrap();
        let expected = plan.total_visitors.div_ceil(1000);
        assert_eq!(plan.test_duration_days, Some(expected));
    }

    #[test]
    fn test_more_variants_need_more_visitors() {
        let two = sample_size(&rate_request(0.1, 5.0)).unwrap();
        let mut request = rate_request(0.1, 5.0);
        request.num_variants = 4;
        let four = sample_size(&request).unwrap();
        assert!(four.visitors_per_variant > two.visitors_per_variant);
        assert_eq!(four.total_visitors, four.visitors_per_variant * 4);
    }

    #[test]
    fn test_continuous_sample_size() {
        // d = 0.5 → 2·(2.8016)²/0.25 ≈ 62.8 → 63
        let plan = sample_size(&SampleSizeRequest {
            baseline: Baseline::Mean {
                current_mean: 100.0,
                current_std: 10.0,
            },
            lift_percent: 5.0,
            confidence: 95,
            power: 80,
            daily_visitors: None,
            num_variants: 2,
        })
        .unwrap();
        assert_eq!(plan.visitors_per_variant, 63);
        assert_eq!(plan.metric_type, MetricType::Continuous);
    }

    #[test]
    fn test_sample_size_rejections() {
        assert!(sample_size(&rate_request(0.0, 10.0)).is_err());
        assert!(sample_size(&rate_request(1.0, 10.0)).is_err());
        assert!(sample_size(&rate_request(0.6, 80.0)).is_err());
        assert!(sample_size(&rate_request(0.05, 0.0)).is_err());
        assert!(sample_size(&rate_request(0.05, -100.0)).is_err());

        let mut request = rate_request(0.05, 10.0);
        request.daily_visitors = Some(0);
        assert!(sample_size(&request).is_err());

        let mut request = rate_request(0.05, 10.0);
        request.power = 100;
        assert!(sample_size(&request).is_err());

        let mut request = rate_request(0.05, 10.0);
        request.num_variants = 1;
        assert!(sample_size(&request).is_err());

        let continuous = SampleSizeRequest {
            baseline: Baseline::Mean {
                current_mean: 10.0,
                current_std: 0.0,
            },
            ..rate_request(0.05, 10.0)
        };
        assert!(sample_size(&continuous).is_err());
    }

    #[test]
    fn test_sample_size_request_parses_both_baselines() {
        let request: SampleSizeRequest =
            serde_json::from_str(r#"{"current_rate": 0.05, "lift_percent": 10}"#).unwrap();
        assert_eq!(request.power, 80);
        assert_eq!(request.num_variants, 2);
        assert_eq!(request.baseline.metric_type(), MetricType::Binary);

        let request: SampleSizeRequest = serde_json::from_str(
            r#"{"current_mean": 50.0, "current_std": 15.0, "lift_percent": 5, "confidence": 99}"#,
        )
        .unwrap();
        assert_eq!(request.baseline.metric_type(), MetricType::Continuous);
    }

    #[test]
    fn test_achieved_power_matches_plan() {
        let plan = sample_size(&rate_request(0.05, 10.0)).unwrap();
        let analysis = achieved_power(&PowerRequest {
            baseline: Baseline::Rate { current_rate: 0.05 },
            lift_percent: 10.0,
            visitors_per_variant: plan.visitors_per_variant as i64,
            confidence: 95,
        })
        .unwrap();
        assert!((analysis.power_percent - 80.0).abs() < 0.5);
    }

    #[test]
    fn test_achieved_power_grows_with_sample() {
        let power_at = |n| {
            achieved_power(&PowerRequest {
                baseline: Baseline::Mean {
                    current_mean: 100.0,
                    current_std: 20.0,
                },
                lift_percent: 2.0,
                visitors_per_variant: n,
                confidence: 95,
            })
            .unwrap()
            .power_percent
        };
        assert!(power_at(100) < power_at(1000));
        assert!(power_at(100_000) > 99.0);
    }
}

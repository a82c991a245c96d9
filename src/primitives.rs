//! Statistical primitives shared by every analysis
//!
//! Distribution functions, standard errors, p-values and single-arm
//! confidence intervals. Normal functions go through `statrs`' erfc and its
//! inverse so tails stay accurate; Student-t, chi-square and F come from the
//! `statrs` distributions.
//!
//! Scientific Foundation:
//! - Wilson (1927): score interval for a binomial proportion, well-behaved
//!   when `n·p` is small where the Wald interval collapses.
//! - Welch (1947): unequal-variance t statistic with Satterthwaite df.
//!
//! Nothing here returns `NaN`: p-values are clamped into `[0, 1]` and
//! quantile inputs into the open unit interval.

use crate::error::{AnalysisError, Result};
use crate::types::{ConfidenceLevel, MetricType, SampleSummary};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Smallest probability passed to a quantile function
const QUANTILE_EPSILON: f64 = 1e-15;

/// Below this expected count the Wald interval is replaced by Wilson
const WALD_MIN_EXPECTED: f64 = 10.0;

/// Clamp a probability into `[0, 1]`, mapping NaN to 1 (no evidence)
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        1.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

fn clamp_open(p: f64) -> f64 {
    if p.is_nan() {
        0.5
    } else {
        p.clamp(QUANTILE_EPSILON, 1.0 - QUANTILE_EPSILON)
    }
}

/// Standard normal CDF Φ(x)
pub fn normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return 0.5;
    }
    clamp_probability(0.5 * erfc(-x / SQRT_2))
}

/// Standard normal survival function 1 − Φ(x), accurate in the upper tail
pub fn normal_sf(x: f64) -> f64 {
    if x.is_nan() {
        return 0.5;
    }
    clamp_probability(0.5 * erfc(x / SQRT_2))
}

/// Standard normal quantile Φ⁻¹(p)
pub fn normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * clamp_open(p))
}

/// Upper-tail quantile Φ⁻¹(1 − q), accurate for tiny `q`
///
/// Infinite when `q ≤ 0`: no finite statistic reaches that tail.
pub fn normal_upper_quantile(q: f64) -> f64 {
    if q.is_nan() || q <= 0.0 {
        return f64::INFINITY;
    }
    SQRT_2 * erfc_inv(2.0 * q.min(1.0 - QUANTILE_EPSILON))
}

/// Two-sided critical value z_{α/2}
pub fn z_critical(alpha: f64) -> f64 {
    normal_quantile(1.0 - alpha / 2.0)
}

fn students_t(df: f64) -> Result<StudentsT> {
    if !(df.is_finite() && df > 0.0) {
        return Err(AnalysisError::Numerical(format!(
            "Student-t degrees of freedom must be positive, got {}",
            df
        )));
    }
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalysisError::Numerical(format!("Student-t({}): {}", df, e)))
}

/// Student-t CDF with `df` degrees of freedom
pub fn t_cdf(t: f64, df: f64) -> Result<f64> {
    Ok(clamp_probability(students_t(df)?.cdf(t)))
}

/// Student-t quantile with `df` degrees of freedom
pub fn t_quantile(p: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.inverse_cdf(clamp_open(p)))
}

/// Chi-square survival function P(X ≥ x)
pub fn chi2_sf(x: f64, df: f64) -> Result<f64> {
    if x <= 0.0 || x.is_nan() {
        return Ok(1.0);
    }
    let dist = ChiSquared::new(df)
        .map_err(|e| AnalysisError::Numerical(format!("chi-square({}): {}", df, e)))?;
    Ok(clamp_probability(dist.sf(x)))
}

/// F-distribution survival function P(X ≥ x)
pub fn f_sf(x: f64, df1: f64, df2: f64) -> Result<f64> {
    if x <= 0.0 || x.is_nan() {
        return Ok(1.0);
    }
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|e| AnalysisError::Numerical(format!("F({}, {}): {}", df1, df2, e)))?;
    Ok(clamp_probability(dist.sf(x)))
}

/// Two-sided p-value for a z statistic
pub fn two_sided_p_from_z(z: f64) -> f64 {
    if z.is_nan() {
        return 1.0;
    }
    clamp_probability(erfc(z.abs() / SQRT_2))
}

/// Two-sided p-value for a t statistic
pub fn two_sided_p_from_t(t: f64, df: f64) -> Result<f64> {
    if t.is_nan() {
        return Ok(1.0);
    }
    let dist = students_t(df)?;
    Ok(clamp_probability(2.0 * dist.sf(t.abs())))
}

/// Pooled two-proportion standard error under H0 (p1 = p2)
pub fn pooled_se(conversions1: i64, n1: i64, conversions2: i64, n2: i64) -> f64 {
    let (n1, n2) = (n1 as f64, n2 as f64);
    let pooled = (conversions1 as f64 + conversions2 as f64) / (n1 + n2);
    (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).max(0.0).sqrt()
}

/// Unpooled standard error of p2 − p1
pub fn unpooled_se(p1: f64, n1: i64, p2: f64, n2: i64) -> f64 {
    (p1 * (1.0 - p1) / n1 as f64 + p2 * (1.0 - p2) / n2 as f64)
        .max(0.0)
        .sqrt()
}

/// Welch standard error of mean2 − mean1
pub fn welch_se(std1: f64, n1: i64, std2: f64, n2: i64) -> f64 {
    (std1 * std1 / n1 as f64 + std2 * std2 / n2 as f64).sqrt()
}

/// Welch–Satterthwaite degrees of freedom
///
/// Falls back to `n1 + n2 − 2` when both variances are zero.
pub fn welch_df(std1: f64, n1: i64, std2: f64, n2: i64) -> f64 {
    let v1 = std1 * std1 / n1 as f64;
    let v2 = std2 * std2 / n2 as f64;
    let numerator = (v1 + v2).powi(2);
    let denominator = v1 * v1 / (n1 - 1) as f64 + v2 * v2 / (n2 - 1) as f64;
    if denominator > 0.0 {
        numerator / denominator
    } else {
        (n1 + n2 - 2) as f64
    }
}

/// Interval construction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    Wald,
    Wilson,
    T,
}

/// Single-arm interval estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalEstimate {
    pub metric_type: MetricType,
    /// Conversion rate (binary arms only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Sample mean (continuous arms only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    pub lower: f64,
    pub upper: f64,
    pub margin_of_error: f64,
    pub confidence: u32,
    pub method: IntervalMethod,
}

impl IntervalEstimate {
    /// Point estimate regardless of metric type
    pub fn estimate(&self) -> f64 {
        self.rate.or(self.mean).unwrap_or(0.0)
    }
}

/// Interval for a proportion (Wald, or Wilson for small expected counts)
///
/// Returns `(lower, upper, method)`; bounds are clamped into `[0, 1]`.
pub fn proportion_interval(
    successes: i64,
    n: i64,
    confidence: ConfidenceLevel,
) -> (f64, f64, IntervalMethod) {
    let n_f = n as f64;
    let p = successes as f64 / n_f;
    let z = z_critical(confidence.alpha());

    if n_f * p < WALD_MIN_EXPECTED || n_f * (1.0 - p) < WALD_MIN_EXPECTED {
        let z2 = z * z;
        let denominator = 1.0 + z2 / n_f;
        let center = (p + z2 / (2.0 * n_f)) / denominator;
        let half = z * ((p * (1.0 - p) + z2 / (4.0 * n_f)) / n_f).sqrt() / denominator;
        (
            (center - half).max(0.0).min(p),
            (center + half).min(1.0).max(p),
            IntervalMethod::Wilson,
        )
    } else {
        let half = z * (p * (1.0 - p) / n_f).sqrt();
        ((p - half).max(0.0), (p + half).min(1.0), IntervalMethod::Wald)
    }
}

/// t-based interval for a mean with `n − 1` degrees of freedom
pub fn mean_interval(n: i64, mean: f64, std: f64, confidence: ConfidenceLevel) -> Result<(f64, f64)> {
    let t = t_quantile(1.0 - confidence.alpha() / 2.0, (n - 1) as f64)?;
    let half = t * std / (n as f64).sqrt();
    Ok((mean - half, mean + half))
}

/// Confidence interval for a single arm
///
/// # Example
/// ```
/// use exptest::primitives::{confidence_interval, IntervalMethod};
/// use exptest::types::SampleSummary;
///
/// let ci = confidence_interval(&SampleSummary::binary(1000, 50), 95).unwrap();
/// assert_eq!(ci.method, IntervalMethod::Wald);
/// assert!(ci.lower < 0.05 && 0.05 < ci.upper);
/// ```
pub fn confidence_interval(sample: &SampleSummary, confidence: u32) -> Result<IntervalEstimate> {
    sample.validate("sample")?;
    let level = ConfidenceLevel::new("confidence", confidence)?;

    let estimate = match *sample {
        SampleSummary::Binary {
            visitors,
            conversions,
        } => {
            let (lower, upper, method) = proportion_interval(conversions, visitors, level);
            IntervalEstimate {
                metric_type: MetricType::Binary,
                rate: Some(sample.point()),
                mean: None,
                lower,
                upper,
                margin_of_error: (upper - lower) / 2.0,
                confidence,
                method,
            }
        }
        SampleSummary::Continuous { n, mean, std } => {
            let (lower, upper) = mean_interval(n, mean, std, level)?;
            IntervalEstimate {
                metric_type: MetricType::Continuous,
                rate: None,
                mean: Some(mean),
                lower,
                upper,
                margin_of_error: (upper - lower) / 2.0,
                confidence,
                method: IntervalMethod::T,
            }
        }
    };

    tracing::debug!(
        method = ?estimate.method,
        lower = estimate.lower,
        upper = estimate.upper,
        "single-arm confidence interval"
    );
    Ok(estimate)
}

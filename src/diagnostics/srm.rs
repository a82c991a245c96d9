//! Sample ratio mismatch (SRM) detection
//!
//! A chi-square goodness-of-fit test of the observed traffic split against
//! the configured allocation. A mismatch usually means broken assignment or
//! logging, and invalidates every downstream comparison.

use crate::error::{AnalysisError, Result};
use crate::primitives::chi2_sf;
use serde::{Deserialize, Serialize};

/// Below this p-value the split is treated as broken
const VALID_P: f64 = 0.01;
const SEVERE_P: f64 = 0.001;
const WARNING_P: f64 = 0.05;

fn default_ratio() -> f64 {
    0.5
}

/// SRM check input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrmRequest {
    pub control_visitors: i64,
    pub variant_visitors: i64,
    /// Expected control share of traffic
    #[serde(default = "default_ratio")]
    pub expected_ratio: f64,
}

/// How badly the split deviates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrmSeverity {
    None,
    Warning,
    Severe,
}

/// SRM check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrmResult {
    pub control_visitors: i64,
    pub variant_visitors: i64,
    pub expected_ratio: f64,
    pub observed_ratio: f64,
    pub deviation_percent: f64,
    pub chi_square: f64,
    pub p_value: f64,
    pub is_valid: bool,
    pub severity: SrmSeverity,
    pub recommendation: String,
}

/// Test the observed split against `expected_ratio` (control share)
///
/// # Example
/// ```
/// use exptest::diagnostics::{check_sample_ratio, SrmRequest, SrmSeverity};
///
/// let result = check_sample_ratio(&SrmRequest {
///     control_visitors: 6000,
///     variant_visitors: 4000,
///     expected_ratio: 0.5,
/// })
/// .unwrap();
/// assert!(!result.is_valid);
/// assert_eq!(result.severity, SrmSeverity::Severe);
/// ```
pub fn check_sample_ratio(request: &SrmRequest) -> Result<SrmResult> {
    for (field, value) in [
        ("control_visitors", request.control_visitors),
        ("variant_visitors", request.variant_visitors),
    ] {
        if value < 0 {
            return Err(AnalysisError::validation(
                field,
                format!("cannot be negative, got {}", value),
            ));
        }
    }
    let total = request.control_visitors.saturating_add(request.variant_visitors);
    if total == 0 {
        return Err(AnalysisError::validation(
            "control_visitors",
            "at least one visitor is required across both arms",
        ));
    }
    let ratio = request.expected_ratio;
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(AnalysisError::validation(
            "expected_ratio",
            format!("must be strictly between 0 and 1, got {}", ratio),
        ));
    }

    let total_f = total as f64;
    let expected_control = total_f * ratio;
    let expected_variant = total_f * (1.0 - ratio);
    let chi_square = (request.control_visitors as f64 - expected_control).powi(2) / expected_control
        + (request.variant_visitors as f64 - expected_variant).powi(2) / expected_variant;
    let p_value = chi2_sf(chi_square, 1.0)?;

    let severity = if p_value < SEVERE_P {
        SrmSeverity::Severe
    } else if p_value < WARNING_P {
        SrmSeverity::Warning
    } else {
        SrmSeverity::None
    };
    let is_valid = p_value >= VALID_P;
    let observed_ratio = request.control_visitors as f64 / total_f;
    let deviation_percent = (observed_ratio - ratio) * 100.0;

    let recommendation = match severity {
        SrmSeverity::None => "Traffic split matches the expected allocation.".to_string(),
        SrmSeverity::Warning => format!(
            "Traffic split is off by {:+.2} points (p = {:.4}). Check assignment and logging \
             before trusting results.",
            deviation_percent, p_value
        ),
        SrmSeverity::Severe => format!(
            "Sample ratio mismatch (p = {:.2e}): observed control share {:.2}% vs expected \
             {:.2}%. Results are not trustworthy until the cause is found.",
            p_value,
            observed_ratio * 100.0,
            ratio * 100.0
        ),
    };

    if severity != SrmSeverity::None {
        tracing::warn!(chi_square, p_value, ?severity, "sample ratio mismatch");
    }

    Ok(SrmResult {
        control_visitors: request.control_visitors,
        variant_visitors: request.variant_visitors,
        expected_ratio: ratio,
        observed_ratio,
        deviation_percent,
        chi_square,
        p_value,
        is_valid,
        severity,
        recommendation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(control: i64, variant: i64, ratio: f64) -> SrmResult {
        check_sample_ratio(&SrmRequest {
            control_visitors: control,
            variant_visitors: variant,
            expected_ratio: ratio,
        })
        .unwrap()
    }

    #[test]
    fn test_balanced_split_is_valid() {
        let result = check(5000, 5000, 0.5);
        assert!(result.is_valid);
        assert_eq!(result.severity, SrmSeverity::None);
        assert_eq!(result.chi_square, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_lopsided_split_is_invalid() {
        let result = check(6000, 4000, 0.5);
        assert!(!result.is_valid);
        assert!(result.severity >= SrmSeverity::Warning);
        assert!((result.chi_square - 400.0).abs() < 1e-9);
        assert!((result.deviation_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_warning_band() {
        // chi² = 4.0 → p ≈ 0.0455
        let result = check(5100, 4900, 0.5);
        assert_eq!(result.severity, SrmSeverity::Warning);
        assert!(result.is_valid);
    }

    #[test]
    fn test_uneven_allocation() {
        let result = check(7000, 3000, 0.7);
        assert!(result.is_valid);
        assert!(result.deviation_percent.abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_input() {
        let bad = |c, v, r| {
            check_sample_ratio(&SrmRequest {
                control_visitors: c,
                variant_visitors: v,
                expected_ratio: r,
            })
            .is_err()
        };
        assert!(bad(-1, 10, 0.5));
        assert!(bad(0, 0, 0.5));
        assert!(bad(10, 10, 0.0));
        assert!(bad(10, 10, 1.0));
    }
}

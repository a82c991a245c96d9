//! Experiment health score
//!
//! A fixed battery of checks, run in order, each ending in pass / warning /
//! fail. Penalties for warnings and failures come off a score of 100.

use crate::config::EngineConfig;
use crate::diagnostics::srm::{check_sample_ratio, SrmRequest, SrmSeverity};
use crate::error::{AnalysisError, Result};
use crate::types::SampleSummary;
use serde::{Deserialize, Serialize};

fn default_ratio() -> f64 {
    0.5
}

/// Health check input (binary arms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRequest {
    pub control: SampleSummary,
    pub variant: SampleSummary,
    /// Expected control share used for the traffic balance check
    #[serde(default = "default_ratio")]
    pub expected_ratio: f64,
}

/// Outcome of one check; ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Pass,
    Warning,
    Fail,
}

/// A single named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus, message: String) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

/// Ordered checks plus the aggregate verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
    pub score: u32,
    pub overall_status: HealthStatus,
    pub can_trust_results: bool,
}

fn binary_counts(summary: &SampleSummary, field: &str) -> Result<(i64, i64)> {
    summary.validate(field)?;
    match *summary {
        SampleSummary::Binary {
            visitors,
            conversions,
        } => Ok((visitors, conversions)),
        SampleSummary::Continuous { .. } => Err(AnalysisError::validation(
            field,
            "health checks support binary (visitors/conversions) arms only",
        )),
    }
}

fn sample_size_check(control: i64, variant: i64, min: i64) -> HealthCheck {
    let smallest = control.min(variant);
    // integer form of `smallest >= 0.1 * min`
    let status = if smallest >= min {
        HealthStatus::Pass
    } else if smallest.saturating_mul(10) >= min {
        HealthStatus::Warning
    } else {
        HealthStatus::Fail
    };
    let message = match status {
        HealthStatus::Pass => format!("Both arms have at least {} visitors.", min),
        _ => format!(
            "Smallest arm has {} visitors; at least {} per arm are recommended.",
            smallest, min
        ),
    };
    HealthCheck::new("sample_size", status, message)
}

fn conversion_rate_check(control_rate: f64, variant_rate: f64) -> HealthCheck {
    let degenerate = |rate: f64| rate <= 0.0 || rate >= 1.0;
    if degenerate(control_rate) || degenerate(variant_rate) {
        HealthCheck::new(
            "conversion_rate",
            HealthStatus::Fail,
            format!(
                "A conversion rate sits at a boundary (control {:.2}%, variant {:.2}%); \
                 check event tracking.",
                control_rate * 100.0,
                variant_rate * 100.0
            ),
        )
    } else {
        HealthCheck::new(
            "conversion_rate",
            HealthStatus::Pass,
            "Conversion rates are within (0%, 100%).".to_string(),
        )
    }
}

fn conversion_volume_check(control: i64, variant: i64, min: i64) -> HealthCheck {
    let smallest = control.min(variant);
    if smallest >= min {
        HealthCheck::new(
            "conversion_volume",
            HealthStatus::Pass,
            format!("Both arms have at least {} conversions.", min),
        )
    } else {
        HealthCheck::new(
            "conversion_volume",
            HealthStatus::Warning,
            format!(
                "Smallest arm has {} conversions; normal approximations are shaky below {}.",
                smallest, min
            ),
        )
    }
}

/// Run the health battery
///
/// # Example
/// ```
/// use exptest::config::EngineConfig;
/// use exptest::diagnostics::{check_health, HealthRequest, HealthStatus};
/// use exptest::types::SampleSummary;
///
/// let report = check_health(
///     &HealthRequest {
///         control: SampleSummary::binary(5000, 250),
///         variant: SampleSummary::binary(5000, 270),
///         expected_ratio: 0.5,
///     },
///     &EngineConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(report.score, 100);
/// assert_eq!(report.overall_status, HealthStatus::Pass);
/// ```
pub fn check_health(request: &HealthRequest, config: &EngineConfig) -> Result<HealthReport> {
    let (control_visitors, control_conversions) = binary_counts(&request.control, "control")?;
    let (variant_visitors, variant_conversions) = binary_counts(&request.variant, "variant")?;

    let srm = check_sample_ratio(&SrmRequest {
        control_visitors,
        variant_visitors,
        expected_ratio: request.expected_ratio,
    })?;
    let balance_status = match srm.severity {
        SrmSeverity::None => HealthStatus::Pass,
        SrmSeverity::Warning => HealthStatus::Warning,
        SrmSeverity::Severe => HealthStatus::Fail,
    };

    let checks = vec![
        sample_size_check(control_visitors, variant_visitors, config.min_visitors_per_arm),
        conversion_rate_check(request.control.point(), request.variant.point()),
        HealthCheck::new("traffic_balance", balance_status, srm.recommendation),
        conversion_volume_check(
            control_conversions,
            variant_conversions,
            config.min_conversions_per_arm,
        ),
    ];

    let penalty: u32 = checks
        .iter()
        .map(|check| match check.status {
            HealthStatus::Pass => 0,
            HealthStatus::Warning => config.warning_penalty,
            HealthStatus::Fail => config.fail_penalty,
        })
        .sum();
    let score = 100u32.saturating_sub(penalty);
    let overall_status = checks
        .iter()
        .map(|check| check.status)
        .max()
        .unwrap_or(HealthStatus::Pass);

    tracing::debug!(score, ?overall_status, "health checks");

    Ok(HealthReport {
        checks,
        score,
        overall_status,
        can_trust_results: overall_status != HealthStatus::Fail,
    })
}

//! Guardrail metric monitoring
//!
//! Secondary metrics (latency, refund rate, unsubscribes, ...) that must
//! not get worse while the primary metric is optimized. Each guardrail is
//! a two-arm comparison judged only in its harmful direction.

use crate::diagnostics::HealthStatus;
use crate::error::{AnalysisError, Result};
use crate::frequentist::compare_arms;
use crate::types::{default_confidence, ConfidenceLevel, SampleSummary};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which movement of the metric is harmful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailDirection {
    IncreaseIsBad,
    DecreaseIsBad,
}

impl GuardrailDirection {
    pub const SUPPORTED: &'static [&'static str] = &["increase_is_bad", "decrease_is_bad"];
}

impl FromStr for GuardrailDirection {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "increase_is_bad" => Ok(GuardrailDirection::IncreaseIsBad),
            "decrease_is_bad" => Ok(GuardrailDirection::DecreaseIsBad),
            _ => Err(AnalysisError::UnsupportedConfiguration {
                option: "guardrail direction",
                value: s.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

/// One guardrail metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailInput {
    pub name: String,
    pub control: SampleSummary,
    pub variant: SampleSummary,
    pub direction: GuardrailDirection,
    /// Largest acceptable relative degradation, in percent
    #[serde(default)]
    pub max_degradation_percent: f64,
}

/// Guardrail check input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailsRequest {
    pub guardrails: Vec<GuardrailInput>,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
}

/// Verdict for one guardrail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailCheck {
    pub name: String,
    pub direction: GuardrailDirection,
    pub control_value: f64,
    pub variant_value: f64,
    pub lift_percent: f64,
    /// Lift in the harmful direction (negative means improvement)
    pub degradation_percent: f64,
    pub max_degradation_percent: f64,
    pub p_value: f64,
    pub significant_harm: bool,
    pub status: HealthStatus,
    pub message: String,
}

/// All guardrail verdicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailReport {
    pub checks: Vec<GuardrailCheck>,
    pub all_passed: bool,
    /// Names of failing guardrails
    pub failed: Vec<String>,
}

/// Check every guardrail for harmful movement
pub fn check_guardrails(request: &GuardrailsRequest) -> Result<GuardrailReport> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    if request.guardrails.is_empty() {
        return Err(AnalysisError::validation(
            "guardrails",
            "at least one guardrail is required",
        ));
    }

    let mut checks = Vec::with_capacity(request.guardrails.len());
    for (i, guardrail) in request.guardrails.iter().enumerate() {
        let field = format!("guardrails[{}]", i);
        let threshold = guardrail.max_degradation_percent;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AnalysisError::validation(
                format!("{}.max_degradation_percent", field),
                format!("must be non-negative, got {}", threshold),
            ));
        }

        let comparison = compare_arms(
            &guardrail.control,
            &guardrail.variant,
            confidence,
            (&format!("{}.control", field), &format!("{}.variant", field)),
        )?;
        let degradation = match guardrail.direction {
            GuardrailDirection::IncreaseIsBad => comparison.lift_percent,
            GuardrailDirection::DecreaseIsBad => -comparison.lift_percent,
        };
        let significant_harm = comparison.is_significant && degradation > 0.0;
        let exceeds = degradation > threshold;

        let (status, message) = match (significant_harm, exceeds) {
            (true, true) => (
                HealthStatus::Fail,
                format!(
                    "'{}' degraded significantly by {:.2}% (limit {:.2}%).",
                    guardrail.name, degradation, threshold
                ),
            ),
            (true, false) => (
                HealthStatus::Warning,
                format!(
                    "'{}' degraded significantly but within the {:.2}% limit ({:.2}%).",
                    guardrail.name, threshold, degradation
                ),
            ),
            (false, true) => (
                HealthStatus::Warning,
                format!(
                    "'{}' moved {:.2}% in the harmful direction, above the {:.2}% limit, but \
                     not significantly.",
                    guardrail.name, degradation, threshold
                ),
            ),
            (false, false) => (
                HealthStatus::Pass,
                format!("'{}' shows no harmful movement.", guardrail.name),
            ),
        };

        if status == HealthStatus::Fail {
            tracing::warn!(guardrail = %guardrail.name, degradation, "guardrail failed");
        }

        checks.push(GuardrailCheck {
            name: guardrail.name.clone(),
            direction: guardrail.direction,
            control_value: comparison.control_value,
            variant_value: comparison.variant_value,
            lift_percent: comparison.lift_percent,
            degradation_percent: degradation,
            max_degradation_percent: threshold,
            p_value: comparison.p_value,
            significant_harm,
            status,
            message,
        });
    }

    let failed = checks
        .iter()
        .filter(|c| c.status == HealthStatus::Fail)
        .map(|c| c.name.clone())
        .collect();
    Ok(GuardrailReport {
        all_passed: checks.iter().all(|c| c.status == HealthStatus::Pass),
        checks,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardrail(
        name: &str,
        control: SampleSummary,
        variant: SampleSummary,
        direction: GuardrailDirection,
        limit: f64,
    ) -> GuardrailInput {
        GuardrailInput {
            name: name.to_string(),
            control,
            variant,
            direction,
            max_degradation_percent: limit,
        }
    }

    fn run(guardrails: Vec<GuardrailInput>) -> GuardrailReport {
        check_guardrails(&GuardrailsRequest {
            guardrails,
            confidence: 95,
        })
        .unwrap()
    }

    #[test]
    fn test_significant_large_harm_fails() {
        let report = run(vec![guardrail(
            "refund_rate",
            SampleSummary::binary(20_000, 400),
            SampleSummary::binary(20_000, 520),
            GuardrailDirection::IncreaseIsBad,
            10.0,
        )]);
        assert_eq!(report.checks[0].status, HealthStatus::Fail);
        assert!(!report.all_passed);
        assert_eq!(report.failed, vec!["refund_rate".to_string()]);
    }

    #[test]
    fn test_significant_small_harm_warns() {
        let report = run(vec![guardrail(
            "refund_rate",
            SampleSummary::binary(20_000, 400),
            SampleSummary::binary(20_000, 520),
            GuardrailDirection::IncreaseIsBad,
            50.0,
        )]);
        assert_eq!(report.checks[0].status, HealthStatus::Warning);
        assert!(report.failed.is_empty());
        assert!(!report.all_passed);
    }

    #[test]
    fn test_improvement_passes() {
        let report = run(vec![guardrail(
            "revenue_per_user",
            SampleSummary::continuous(5000, 20.0, 8.0),
            SampleSummary::continuous(5000, 21.0, 8.0),
            GuardrailDirection::DecreaseIsBad,
            1.0,
        )]);
        assert_eq!(report.checks[0].status, HealthStatus::Pass);
        assert!(report.checks[0].degradation_percent < 0.0);
        assert!(report.all_passed);
    }

    #[test]
    fn test_noisy_large_move_warns() {
        let report = run(vec![guardrail(
            "latency_ms",
            SampleSummary::continuous(50, 200.0, 80.0),
            SampleSummary::continuous(50, 216.0, 80.0),
            GuardrailDirection::IncreaseIsBad,
            5.0,
        )]);
        assert!(!report.checks[0].significant_harm);
        assert_eq!(report.checks[0].status, HealthStatus::Warning);
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!(
            "decrease_is_bad".parse::<GuardrailDirection>().unwrap(),
            GuardrailDirection::DecreaseIsBad
        );
        let err = "sideways".parse::<GuardrailDirection>().unwrap_err();
        assert_eq!(err.kind(), "unsupported_configuration");
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = check_guardrails(&GuardrailsRequest {
            guardrails: vec![guardrail(
                "x",
                SampleSummary::binary(100, 10),
                SampleSummary::binary(100, 11),
                GuardrailDirection::IncreaseIsBad,
                -1.0,
            )],
            confidence: 95,
        })
        .unwrap_err();
        assert!(err.to_string().contains("guardrails[0].max_degradation_percent"));
    }
}

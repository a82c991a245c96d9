//! Group-sequential monitoring with alpha-spending boundaries
//!
//! Lets an experiment be checked repeatedly without inflating the false
//! positive rate. At information fraction `t` the spending function says how
//! much of the total alpha may have been used so far, which fixes the z
//! boundary an interim look must cross to stop.
//!
//! Scientific Foundation:
//! - Lan, K. K. G. & DeMets, D. L. (1983). Discrete sequential boundaries for
//!   clinical trials. Biometrika 70(3).
//! - O'Brien-Fleming spending is conservative early and nearly full-alpha at
//!   the end; Pocock spending is close to uniform over the looks.

use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::primitives::{normal_cdf, normal_sf, normal_upper_quantile, pooled_se, z_critical};
use crate::types::{SampleSummary, SpendingFunction};
use serde::{Deserialize, Serialize};
use std::f64::consts::E;

fn default_alpha() -> f64 {
    0.05
}

/// Sequential monitoring input (binary arms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialRequest {
    pub control: SampleSummary,
    pub variant: SampleSummary,
    /// Planned maximum visitors per arm
    pub expected_visitors_per_variant: i64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub method: SpendingFunction,
}

/// Stop/continue decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequentialDecision {
    None,
    VariantWins,
    ControlWins,
}

/// State of the sequential test at the current look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialState {
    pub method: SpendingFunction,
    pub alpha: f64,
    pub information_fraction: f64,
    pub alpha_spent: f64,
    /// Critical |z|; `None` when no early stop is possible at this look
    pub boundary_z: Option<f64>,
    pub observed_z: f64,
    pub can_stop: bool,
    pub decision: SequentialDecision,
    pub control_rate: f64,
    pub variant_rate: f64,
    /// Relative lift in percent; absent when the control rate is zero
    pub lift_percent: Option<f64>,
    /// 100·Φ(z_observed)
    pub confidence_variant_better: f64,
    pub estimated_remaining_visitors: i64,
    pub recommendation: String,
}

/// Cumulative alpha allowed at information fraction `t`
///
/// # Example
/// ```
/// use exptest::sequential::alpha_spent;
/// use exptest::types::SpendingFunction;
///
/// let early = alpha_spent(SpendingFunction::ObrienFleming, 0.05, 0.25);
/// let full = alpha_spent(SpendingFunction::ObrienFleming, 0.05, 1.0);
/// assert!(early < 0.001);
/// assert!((full - 0.05).abs() < 1e-9);
/// ```
pub fn alpha_spent(method: SpendingFunction, alpha: f64, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t == 0.0 {
        return 0.0;
    }
    match method {
        SpendingFunction::ObrienFleming => 2.0 * normal_sf(z_critical(alpha) / t.sqrt()),
        SpendingFunction::Pocock => alpha * (1.0 + (E - 1.0) * t).ln(),
    }
}

/// Critical |z| for cumulative spend `spent` (infinite when nothing is spent)
pub fn boundary_z(spent: f64) -> f64 {
    normal_upper_quantile(spent / 2.0)
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
            "sequential monitoring supports binary (visitors/conversions) arms only",
        )),
    }
}

/// Evaluate the current look of a sequential test
pub fn analyze_sequential(request: &SequentialRequest, config: &EngineConfig) -> Result<SequentialState> {
    let (control_visitors, control_conversions) = binary_counts(&request.control, "control")?;
    let (variant_visitors, variant_conversions) = binary_counts(&request.variant, "variant")?;
    if request.expected_visitors_per_variant < 1 {
        return Err(AnalysisError::validation(
            "expected_visitors_per_variant",
            format!("must be positive, got {}", request.expected_visitors_per_variant),
        ));
    }
    if !(request.alpha > 0.0 && request.alpha < 0.5) {
        return Err(AnalysisError::validation(
            "alpha",
            format!("must be in (0, 0.5), got {}", request.alpha),
        ));
    }

    let planned = request.expected_visitors_per_variant;
    let observed = control_visitors.min(variant_visitors);
    let t = (observed as f64 / planned as f64).min(1.0);

    let spent = alpha_spent(request.method, request.alpha, t);
    let boundary = boundary_z(spent);

    let control_rate = request.control.point();
    let variant_rate = request.variant.point();
    let se = pooled_se(
        control_conversions,
        control_visitors,
        variant_conversions,
        variant_visitors,
    );
    let z = if se > 0.0 {
        (variant_rate - control_rate) / se
    } else {
        0.0
    };

    let crossed = t >= config.min_information_fraction && z.abs() >= boundary;
    let can_stop = t >= 1.0 || crossed;
    let decision = if !crossed {
        SequentialDecision::None
    } else if z > 0.0 {
        SequentialDecision::VariantWins
    } else {
        SequentialDecision::ControlWins
    };

    let remaining = (planned - observed).max(0);
    let recommendation = match decision {
        SequentialDecision::VariantWins => format!(
            "Stop the test: the variant crossed the efficacy boundary (|z| = {:.2} ≥ {:.2}).",
            z.abs(),
            boundary
        ),
        SequentialDecision::ControlWins => format!(
            "Stop the test: the control crossed the boundary (|z| = {:.2} ≥ {:.2}).",
            z.abs(),
            boundary
        ),
        SequentialDecision::None if t >= 1.0 => {
            "Planned sample reached without crossing the boundary; no significant difference."
                .to_string()
        }
        SequentialDecision::None => format!(
            "Continue: {:.0}% of the planned sample collected, about {} more visitors per arm.",
            t * 100.0,
            remaining
        ),
    };

    tracing::debug!(
        t,
        spent,
        boundary,
        z,
        can_stop,
        "sequential look"
    );

    Ok(SequentialState {
        method: request.method,
        alpha: request.alpha,
        information_fraction: t,
        alpha_spent: spent,
        boundary_z: boundary.is_finite().then_some(boundary),
        observed_z: z,
        can_stop,
        decision,
        control_rate,
        variant_rate,
        lift_percent: (control_rate > 0.0)
            .then(|| (variant_rate - control_rate) / control_rate * 100.0),
        confidence_variant_better: 100.0 * normal_cdf(z),
        estimated_remaining_visitors: remaining,
        recommendation,
    })
}

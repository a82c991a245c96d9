//! Bayesian A/B comparison with Beta-Binomial conjugate updating
//!
//! Each arm's conversion rate gets a `Beta(prior_alpha, prior_beta)` prior,
//! updated with the observed successes and failures. Win probability,
//! expected loss and the lift credible interval are estimated from paired
//! posterior draws.
//!
//! Draws come from an explicitly seeded `Xoshiro256PlusPlus`, so identical
//! inputs and seed reproduce bit-identical output.

use crate::config::{EngineConfig, MAX_SIMULATION_DRAWS};
use crate::error::{AnalysisError, Result};
use crate::types::{ConfidenceInterval, SampleSummary, Winner};
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Probability (percent) above which the variant is declared the winner
const WIN_THRESHOLD: f64 = 95.0;

fn default_prior() -> f64 {
    1.0
}

/// Bayesian comparison input (binary arms only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianRequest {
    pub control: SampleSummary,
    pub variant: SampleSummary,
    #[serde(default = "default_prior")]
    pub prior_alpha: f64,
    #[serde(default = "default_prior")]
    pub prior_beta: f64,
    /// Paired draws; falls back to the engine's `simulation_draws`
    #[serde(default)]
    pub draws: Option<usize>,
    /// Simulation seed; falls back to the engine's `default_seed`
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Beta posterior for one arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosteriorState {
    pub alpha: f64,
    pub beta: f64,
}

impl PosteriorState {
    /// Conjugate update of a Beta prior with binomial counts
    pub fn update(prior_alpha: f64, prior_beta: f64, visitors: i64, conversions: i64) -> Self {
        Self {
            alpha: prior_alpha + conversions as f64,
            beta: prior_beta + (visitors - conversions) as f64,
        }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    fn distribution(&self, field: &str) -> Result<Beta<f64>> {
        Beta::new(self.alpha, self.beta).map_err(|e| {
            AnalysisError::Numerical(format!(
                "{} posterior Beta({}, {}): {}",
                field, self.alpha, self.beta, e
            ))
        })
    }
}

/// Posterior state with its mean, as reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    pub alpha: f64,
    pub beta: f64,
    pub mean: f64,
}

impl From<PosteriorState> for PosteriorSummary {
    fn from(state: PosteriorState) -> Self {
        Self {
            alpha: state.alpha,
            beta: state.beta,
            mean: state.mean(),
        }
    }
}

/// Bayesian comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianResult {
    pub control_posterior: PosteriorSummary,
    pub variant_posterior: PosteriorSummary,
    /// Percent of draws where the variant beats control
    pub probability_variant_better: f64,
    /// Percent of draws where control beats the variant
    pub probability_control_better: f64,
    /// Mean simulated relative lift, in percent
    pub lift_percent: f64,
    /// E[max(control − variant, 0)], in rate units
    pub expected_loss_choosing_variant: f64,
    /// E[max(variant − control, 0)], in rate units
    pub expected_loss_choosing_control: f64,
    /// 2.5th / 97.5th percentiles of simulated lift, in percent
    pub lift_credible_interval: ConfidenceInterval,
    pub winner: Winner,
    pub recommendation: String,
    pub draws: usize,
    pub seed: u64,
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
            "Bayesian analysis supports binary (visitors/conversions) arms only",
        )),
    }
}

fn validate_prior(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::validation(
            field,
            format!("must be a positive number, got {}", value),
        ))
    }
}

/// Linear-interpolated percentile of sorted data
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Run the Beta-Binomial comparison
///
/// # Example
/// ```
/// use exptest::bayesian::{analyze_bayesian, BayesianRequest};
/// use exptest::config::EngineConfig;
/// use exptest::types::SampleSummary;
///
/// let request = BayesianRequest {
///     control: SampleSummary::binary(1000, 50),
///     variant: SampleSummary::binary(1000, 80),
///     prior_alpha: 1.0,
///     prior_beta: 1.0,
///     draws: Some(20_000),
///     seed: Some(7),
/// };
/// let result = analyze_bayesian(&request, &EngineConfig::default()).unwrap();
/// assert!(result.probability_variant_better > 95.0);
/// ```
pub fn analyze_bayesian(request: &BayesianRequest, config: &EngineConfig) -> Result<BayesianResult> {
    let (control_visitors, control_conversions) = binary_counts(&request.control, "control")?;
    let (variant_visitors, variant_conversions) = binary_counts(&request.variant, "variant")?;
    validate_prior("prior_alpha", request.prior_alpha)?;
    validate_prior("prior_beta", request.prior_beta)?;

    let requested = request.draws.unwrap_or(config.simulation_draws);
    if requested == 0 {
        return Err(AnalysisError::validation("draws", "must be at least 1"));
    }
    let draws = if requested > MAX_SIMULATION_DRAWS {
        tracing::warn!(
            requested,
            cap = MAX_SIMULATION_DRAWS,
            "clamping simulation draws"
        );
        MAX_SIMULATION_DRAWS
    } else {
        requested
    };
    let seed = request.seed.unwrap_or(config.default_seed);

    let control_state = PosteriorState::update(
        request.prior_alpha,
        request.prior_beta,
        control_visitors,
        control_conversions,
    );
    let variant_state = PosteriorState::update(
        request.prior_alpha,
        request.prior_beta,
        variant_visitors,
        variant_conversions,
    );
    let control_dist = control_state.distribution("control")?;
    let variant_dist = variant_state.distribution("variant")?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut variant_wins = 0usize;
    let mut control_wins = 0usize;
    let mut loss_variant = 0.0;
    let mut loss_control = 0.0;
    let mut lifts = Vec::with_capacity(draws);

    for _ in 0..draws {
        let c: f64 = control_dist.sample(&mut rng);
        let v: f64 = variant_dist.sample(&mut rng);
        if v > c {
            variant_wins += 1;
        } else if c > v {
            control_wins += 1;
        }
        loss_variant += (c - v).max(0.0);
        loss_control += (v - c).max(0.0);
        if c > 0.0 {
            lifts.push((v - c) / c * 100.0);
        }
    }

    if lifts.len() < draws {
        tracing::warn!(
            dropped = draws - lifts.len(),
            "control draws at zero excluded from lift"
        );
    }
    lifts.sort_by(|a, b| a.total_cmp(b));

    let n = draws as f64;
    let probability_variant_better = variant_wins as f64 / n * 100.0;
    let probability_control_better = control_wins as f64 / n * 100.0;
    let lift_percent = if lifts.is_empty() {
        0.0
    } else {
        lifts.iter().sum::<f64>() / lifts.len() as f64
    };

    let winner = if probability_variant_better > WIN_THRESHOLD {
        Winner::Variant
    } else if probability_variant_better < 100.0 - WIN_THRESHOLD {
        Winner::Control
    } else {
        Winner::None
    };

    let recommendation = match winner {
        Winner::Variant => format!(
            "There is a {:.1}% chance the variant is better. Expected loss if you ship it is \
             {:.4} percentage points.",
            probability_variant_better,
            loss_variant / n * 100.0
        ),
        Winner::Control => format!(
            "There is only a {:.1}% chance the variant is better. Keep the control.",
            probability_variant_better
        ),
        Winner::None => format!(
            "The variant is better with probability {:.1}%, short of the {:.0}% bar. \
             Keep collecting data.",
            probability_variant_better, WIN_THRESHOLD
        ),
    };

    tracing::debug!(
        draws,
        seed,
        p_variant = probability_variant_better,
        "bayesian comparison"
    );

    Ok(BayesianResult {
        control_posterior: control_state.into(),
        variant_posterior: variant_state.into(),
        probability_variant_better,
        probability_control_better,
        lift_percent,
        expected_loss_choosing_variant: loss_variant / n,
        expected_loss_choosing_control: loss_control / n,
        lift_credible_interval: ConfidenceInterval::new(
            percentile(&lifts, 0.025),
            percentile(&lifts, 0.975),
            95,
        ),
        winner,
        recommendation,
        draws,
        seed,
    })
}

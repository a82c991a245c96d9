//! Business impact projection
//!
//! Turns the lift of a binary two-arm test into projected yearly
//! conversions, revenue and profit, carrying the uncertainty of the
//! difference through to a revenue interval.

use crate::bayesian::{analyze_bayesian, BayesianRequest};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::frequentist::compare_arms;
use crate::primitives::normal_cdf;
use crate::types::{
    default_confidence, ConfidenceInterval, ConfidenceLevel, MetricType, SampleSummary,
};
use serde::{Deserialize, Serialize};

fn default_margin() -> f64 {
    1.0
}

fn default_prior() -> f64 {
    1.0
}

/// Optional Bayesian settings for the probability of a positive impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianPrior {
    #[serde(default = "default_prior")]
    pub prior_alpha: f64,
    #[serde(default = "default_prior")]
    pub prior_beta: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Impact projection input (binary arms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRequest {
    pub control: SampleSummary,
    pub variant: SampleSummary,
    pub average_order_value: f64,
    /// Visitors per year exposed to the change
    pub annual_traffic: f64,
    #[serde(default = "default_margin")]
    pub profit_margin: f64,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
    #[serde(default)]
    pub implementation_cost: Option<f64>,
    #[serde(default)]
    pub bayesian: Option<BayesianPrior>,
}

/// How `probability_positive` was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityMethod {
    Normal,
    Bayesian,
}

/// Interval of the additional yearly revenue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueInterval {
    pub revenue_lower: f64,
    pub revenue_upper: f64,
    pub level: u32,
}

impl From<ConfidenceInterval> for RevenueInterval {
    fn from(interval: ConfidenceInterval) -> Self {
        Self {
            revenue_lower: interval.lower,
            revenue_upper: interval.upper,
            level: interval.level,
        }
    }
}

impl RevenueInterval {
    pub fn contains(&self, revenue: f64) -> bool {
        self.revenue_lower <= revenue && revenue <= self.revenue_upper
    }
}

/// Projected yearly impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactProjection {
    pub control_rate: f64,
    pub variant_rate: f64,
    pub lift_percent: f64,
    pub additional_conversions: f64,
    pub additional_revenue: f64,
    pub additional_profit: f64,
    pub confidence_interval: RevenueInterval,
    /// Return on the implementation cost, or on baseline profit without one
    pub roi_percent: Option<f64>,
    /// Probability in [0, 1] that the variant has a higher rate
    pub probability_positive: f64,
    pub probability_method: ProbabilityMethod,
    pub p_value: f64,
    pub is_significant: bool,
    pub recommendation: String,
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::validation(
            field,
            format!("must be positive, got {}", value),
        ))
    }
}

/// Project the yearly business impact of shipping the variant
pub fn project_impact(request: &ImpactRequest, config: &EngineConfig) -> Result<ImpactProjection> {
    let confidence = ConfidenceLevel::new("confidence", request.confidence)?;
    for (field, arm) in [("control", &request.control), ("variant", &request.variant)] {
        if arm.metric_type() != MetricType::Binary {
            return Err(AnalysisError::validation(
                field,
                "impact projection supports binary (visitors/conversions) arms only",
            ));
        }
    }
    positive("average_order_value", request.average_order_value)?;
    positive("annual_traffic", request.annual_traffic)?;
    if !(0.0..=1.0).contains(&request.profit_margin) {
        return Err(AnalysisError::validation(
            "profit_margin",
            format!("must be in [0, 1], got {}", request.profit_margin),
        ));
    }
    if let Some(cost) = request.implementation_cost {
        positive("implementation_cost", cost)?;
    }

    let comparison = compare_arms(
        &request.control,
        &request.variant,
        confidence,
        ("control", "variant"),
    )?;
    let diff = comparison.lift_absolute;
    let traffic = request.annual_traffic;
    let aov = request.average_order_value;

    let additional_conversions = traffic * diff;
    let additional_revenue = additional_conversions * aov;
    let additional_profit = additional_revenue * request.profit_margin;
    let revenue_interval =
        RevenueInterval::from(comparison.confidence_interval.scaled(traffic * aov));

    let roi_percent = match request.implementation_cost {
        Some(cost) => Some((additional_profit - cost) / cost * 100.0),
        None => {
            let baseline = traffic * comparison.control_value * aov * request.profit_margin;
            (baseline > 0.0).then(|| additional_profit / baseline * 100.0)
        }
    };

    let (probability_positive, probability_method) = match &request.bayesian {
        Some(prior) => {
            let bayes = analyze_bayesian(
                &BayesianRequest {
                    control: request.control,
                    variant: request.variant,
                    prior_alpha: prior.prior_alpha,
                    prior_beta: prior.prior_beta,
                    draws: None,
                    seed: prior.seed,
                },
                config,
            )?;
            (
                bayes.probability_variant_better / 100.0,
                ProbabilityMethod::Bayesian,
            )
        }
        None => {
            let se = comparison.standard_error;
            let p = if se > 0.0 {
                normal_cdf(diff / se)
            } else if diff > 0.0 {
                1.0
            } else if diff < 0.0 {
                0.0
            } else {
                0.5
            };
            (p, ProbabilityMethod::Normal)
        }
    };

    let recommendation = if comparison.is_significant && diff > 0.0 {
        format!(
            "Shipping the variant is projected to add {:.0} conversions and {:.2} in revenue \
             per year ({:.2} to {:.2} at {}% confidence).",
            additional_conversions,
            additional_revenue,
            revenue_interval.revenue_lower,
            revenue_interval.revenue_upper,
            confidence.percent()
        )
    } else if comparison.is_significant {
        format!(
            "The variant is projected to lose {:.2} in revenue per year. Do not ship it.",
            -additional_revenue
        )
    } else {
        format!(
            "The projected impact ({:.2} revenue per year) is not statistically reliable; the \
             interval spans {:.2} to {:.2}.",
            additional_revenue,
            revenue_interval.revenue_lower,
            revenue_interval.revenue_upper
        )
    };

    Ok(ImpactProjection {
        control_rate: comparison.control_value,
        variant_rate: comparison.variant_value,
        lift_percent: comparison.lift_percent,
        additional_conversions,
        additional_revenue,
        additional_profit,
        confidence_interval: revenue_interval,
        roi_percent,
        probability_positive: probability_positive.clamp(0.0, 1.0),
        probability_method,
        p_value: comparison.p_value,
        is_significant: comparison.is_significant,
        recommendation,
    })
}

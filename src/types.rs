//! Shared experiment data model
//!
//! Arm summaries, confidence levels, intervals and the closed option
//! enumerations used by every analysis family.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summary statistics for one experiment arm
///
/// Binary metrics carry raw counts, continuous metrics carry `n`, mean and
/// standard deviation. `visitors` is accepted as an alias for `n` so both
/// shapes read naturally in request payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleSummary {
    Binary {
        visitors: i64,
        conversions: i64,
    },
    Continuous {
        #[serde(alias = "visitors")]
        n: i64,
        mean: f64,
        std: f64,
    },
}

impl SampleSummary {
    /// Binary arm from visitor/conversion counts
    pub fn binary(visitors: i64, conversions: i64) -> Self {
        SampleSummary::Binary {
            visitors,
            conversions,
        }
    }

    /// Continuous arm from summary statistics
    pub fn continuous(n: i64, mean: f64, std: f64) -> Self {
        SampleSummary::Continuous { n, mean, std }
    }

    /// Check the summary invariants, naming `field` in any error
    pub fn validate(&self, field: &str) -> Result<()> {
        match *self {
            SampleSummary::Binary {
                visitors,
                conversions,
            } => {
                if visitors < 1 {
                    return Err(AnalysisError::validation(
                        format!("{}.visitors", field),
                        format!("must be at least 1, got {}", visitors),
                    ));
                }
                if conversions < 0 {
                    return Err(AnalysisError::validation(
                        format!("{}.conversions", field),
                        format!("cannot be negative, got {}", conversions),
                    ));
                }
                if conversions > visitors {
                    return Err(AnalysisError::validation(
                        format!("{}.conversions", field),
                        format!(
                            "cannot exceed visitors ({} > {})",
                            conversions, visitors
                        ),
                    ));
                }
            }
            SampleSummary::Continuous { n, mean, std } => {
                if n < 2 {
                    return Err(AnalysisError::validation(
                        format!("{}.n", field),
                        format!("must be at least 2, got {}", n),
                    ));
                }
                if !mean.is_finite() {
                    return Err(AnalysisError::validation(
                        format!("{}.mean", field),
                        "must be a finite number",
                    ));
                }
                if !std.is_finite() || std < 0.0 {
                    return Err(AnalysisError::validation(
                        format!("{}.std", field),
                        format!("must be finite and non-negative, got {}", std),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn metric_type(&self) -> MetricType {
        match self {
            SampleSummary::Binary { .. } => MetricType::Binary,
            SampleSummary::Continuous { .. } => MetricType::Continuous,
        }
    }

    /// Number of observations (visitors or `n`)
    pub fn size(&self) -> i64 {
        match *self {
            SampleSummary::Binary { visitors, .. } => visitors,
            SampleSummary::Continuous { n, .. } => n,
        }
    }

    /// Point estimate: conversion rate or mean
    pub fn point(&self) -> f64 {
        match *self {
            SampleSummary::Binary {
                visitors,
                conversions,
            } => conversions as f64 / visitors as f64,
            SampleSummary::Continuous { mean, .. } => mean,
        }
    }

    /// Per-observation variance: p(1-p) or std²
    pub fn unit_variance(&self) -> f64 {
        match *self {
            SampleSummary::Binary { .. } => {
                let p = self.point();
                p * (1.0 - p)
            }
            SampleSummary::Continuous { std, .. } => std * std,
        }
    }

    /// Variance of the point estimate: unit variance / size
    pub fn estimate_variance(&self) -> f64 {
        self.unit_variance() / self.size() as f64
    }
}

/// Metric family of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Binary,
    Continuous,
}

/// Validated confidence level (90, 95 or 99 percent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u32")]
pub struct ConfidenceLevel(u32);

impl ConfidenceLevel {
    pub const SUPPORTED: [u32; 3] = [90, 95, 99];

    /// Validate a percentage confidence level for the named field
    pub fn new(field: &str, percent: u32) -> Result<Self> {
        if Self::SUPPORTED.contains(&percent) {
            Ok(ConfidenceLevel(percent))
        } else {
            Err(AnalysisError::validation(
                field,
                format!("must be one of 90, 95, 99, got {}", percent),
            ))
        }
    }

    pub fn percent(&self) -> u32 {
        self.0
    }

    /// Significance level: 1 - confidence/100
    pub fn alpha(&self) -> f64 {
        1.0 - self.0 as f64 / 100.0
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        ConfidenceLevel(95)
    }
}

impl From<ConfidenceLevel> for u32 {
    fn from(level: ConfidenceLevel) -> Self {
        level.0
    }
}

/// Default confidence percentage for request payloads
pub fn default_confidence() -> u32 {
    95
}

/// Confidence interval with its confidence level in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: u32,
}

impl ConfidenceInterval {
    pub fn new(lower: f64, upper: f64, level: u32) -> Self {
        Self {
            lower,
            upper,
            level,
        }
    }

    /// Zero-width interval at a point (degenerate variance)
    pub fn point(value: f64, level: u32) -> Self {
        Self::new(value, value, level)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Interval with both bounds multiplied by `factor` (order preserved)
    pub fn scaled(&self, factor: f64) -> Self {
        let a = self.lower * factor;
        let b = self.upper * factor;
        Self::new(a.min(b), a.max(b), self.level)
    }
}

/// Which arm an analysis declares the winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Control,
    Variant,
    None,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Control => write!(f, "control"),
            Winner::Variant => write!(f, "variant"),
            Winner::None => write!(f, "no winner yet"),
        }
    }
}

/// Multiple-comparison correction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    #[default]
    Bonferroni,
    Holm,
    None,
}

impl Correction {
    pub const SUPPORTED: &'static [&'static str] = &["bonferroni", "holm", "none"];
}

impl FromStr for Correction {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bonferroni" => Ok(Correction::Bonferroni),
            "holm" => Ok(Correction::Holm),
            "none" => Ok(Correction::None),
            _ => Err(AnalysisError::UnsupportedConfiguration {
                option: "correction",
                value: s.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

/// Group-sequential alpha spending function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingFunction {
    #[default]
    #[serde(alias = "obrien-fleming")]
    ObrienFleming,
    Pocock,
}

impl SpendingFunction {
    pub const SUPPORTED: &'static [&'static str] = &["obrien_fleming", "pocock"];
}

impl FromStr for SpendingFunction {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "obrien_fleming" | "obrien-fleming" => Ok(SpendingFunction::ObrienFleming),
            "pocock" => Ok(SpendingFunction::Pocock),
            _ => Err(AnalysisError::UnsupportedConfiguration {
                option: "spending function",
                value: s.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_summary_validation() {
        assert!(SampleSummary::binary(100, 5).validate("control").is_ok());
        assert!(SampleSummary::binary(100, 100).validate("control").is_ok());

        let err = SampleSummary::binary(100, 101).validate("variant").unwrap_err();
        assert!(err.to_string().contains("variant.conversions"));

        let err = SampleSummary::binary(0, 0).validate("control").unwrap_err();
        assert!(err.to_string().contains("control.visitors"));

        let err = SampleSummary::binary(10, -1).validate("control").unwrap_err();
        assert!(err.to_string().contains("cannot be negative"));
    }

    #[test]
    fn test_continuous_summary_validation() {
        assert!(SampleSummary::continuous(2, 10.0, 0.0).validate("a").is_ok());
        assert!(SampleSummary::continuous(1, 10.0, 1.0).validate("a").is_err());
        assert!(SampleSummary::continuous(10, 10.0, -1.0).validate("a").is_err());
        assert!(SampleSummary::continuous(10, f64::NAN, 1.0).validate("a").is_err());
    }

    #[test]
    fn test_summary_deserializes_both_shapes() {
        let binary: SampleSummary =
            serde_json::from_str(r#"{"visitors": 1000, "conversions": 50}"#).unwrap();
        assert_eq!(binary, SampleSummary::binary(1000, 50));

        let continuous: SampleSummary =
            serde_json::from_str(r#"{"visitors": 500, "mean": 50.0, "std": 15.0}"#).unwrap();
        assert_eq!(continuous, SampleSummary::continuous(500, 50.0, 15.0));

        let with_n: SampleSummary =
            serde_json::from_str(r#"{"n": 20, "mean": 1.5, "std": 0.5}"#).unwrap();
        assert_eq!(with_n.metric_type(), MetricType::Continuous);
    }

    #[test]
    fn test_point_and_variance() {
        let arm = SampleSummary::binary(200, 50);
        assert!((arm.point() - 0.25).abs() < 1e-12);
        assert!((arm.estimate_variance() - 0.1875 / 200.0).abs() < 1e-12);

        let arm = SampleSummary::continuous(100, 50.0, 10.0);
        assert!((arm.estimate_variance() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_level_domain() {
        assert!(ConfidenceLevel::new("confidence", 95).is_ok());
        assert!(ConfidenceLevel::new("confidence", 80).is_err());
        let level = ConfidenceLevel::new("confidence", 99).unwrap();
        assert!((level.alpha() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_option_parsing_lists_supported_values() {
        assert_eq!("holm".parse::<Correction>().unwrap(), Correction::Holm);
        assert_eq!(
            "obrien-fleming".parse::<SpendingFunction>().unwrap(),
            SpendingFunction::ObrienFleming
        );
        let err = "hochberg".parse::<Correction>().unwrap_err();
        assert!(err.to_string().contains("bonferroni, holm, none"));
        let err = "haybittle".parse::<SpendingFunction>().unwrap_err();
        assert!(err.to_string().contains("obrien_fleming, pocock"));
    }

    #[test]
    fn test_interval_scaling_keeps_order() {
        let ci = ConfidenceInterval::new(-0.01, 0.02, 95);
        let scaled = ci.scaled(-100.0);
        assert!(scaled.lower <= scaled.upper);
        assert!((scaled.lower + 2.0).abs() < 1e-9);
    }
}

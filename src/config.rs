// Engine configuration for experiment analysis
//
// Every tunable threshold the analyses use lives here instead of being a
// magic number at the call site. Loaded from TOML via `--config FILE`;
// missing keys fall back to the defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on Monte Carlo draws per Bayesian call
pub const MAX_SIMULATION_DRAWS: usize = 100_000;

/// Tunable engine thresholds
///
/// # Example
/// ```
/// use exptest::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.novelty_tolerance_points, 5.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the Bayesian simulation when a request carries none
    pub default_seed: u64,

    /// Paired posterior draws per Bayesian call (1..=100,000)
    pub simulation_draws: usize,

    /// Information fraction below which a sequential test never stops early
    ///
    /// Early looks carry almost no information and O'Brien-Fleming boundaries
    /// there are astronomically large; Pocock boundaries are not, so the
    /// floor keeps both methods from stopping on the first handful of visitors.
    ///
    /// Default: 0.1
    pub min_information_fraction: f64,

    /// Lift change (percentage points) between early and current windows
    /// that counts as a novelty or primacy effect
    ///
    /// Default: 5.0
    pub novelty_tolerance_points: f64,

    /// Minimum number of daily records for novelty detection
    pub novelty_min_days: usize,

    /// Visitors per arm for a passing sample-size health check
    pub min_visitors_per_arm: i64,

    /// Conversions per arm below which the volume health check warns
    pub min_conversions_per_arm: i64,

    /// Health score penalty per warning check
    pub warning_penalty: u32,

    /// Health score penalty per failing check
    pub fail_penalty: u32,

    /// Significance level of Cochran's Q heterogeneity test across segments
    pub heterogeneity_alpha: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_seed: 42,
            simulation_draws: MAX_SIMULATION_DRAWS,
            min_information_fraction: 0.1,
            novelty_tolerance_points: 5.0,
            novelty_min_days: 7,
            min_visitors_per_arm: 1000,
            min_conversions_per_arm: 25,
            warning_penalty: 15,
            fail_penalty: 40,
            heterogeneity_alpha: 0.05,
        }
    }
}

impl EngineConfig {
    /// Create a strict configuration (flags problems sooner, stops later)
    pub fn strict() -> Self {
        Self {
            min_information_fraction: 0.25,
            novelty_tolerance_points: 3.0,
            novelty_min_days: 14,
            min_visitors_per_arm: 5000,
            min_conversions_per_arm: 100,
            warning_penalty: 20,
            fail_penalty: 50,
            heterogeneity_alpha: 0.10,
            ..Self::default()
        }
    }

    /// Create a permissive configuration (fewer warnings, earlier stopping)
    pub fn permissive() -> Self {
        Self {
            simulation_draws: 20_000,
            min_information_fraction: 0.05,
            novelty_tolerance_points: 8.0,
            min_visitors_per_arm: 500,
            min_conversions_per_arm: 10,
            warning_penalty: 10,
            fail_penalty: 30,
            heterogeneity_alpha: 0.01,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).context("Failed to parse engine configuration")?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid engine configuration: {}", e))?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize engine configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.simulation_draws == 0 || self.simulation_draws > MAX_SIMULATION_DRAWS {
            return Err(format!(
                "simulation_draws must be in 1..={}, got {}",
                MAX_SIMULATION_DRAWS, self.simulation_draws
            ));
        }

        if !(0.0..=1.0).contains(&self.min_information_fraction) {
            return Err(format!(
                "min_information_fraction must be in [0, 1], got {}",
                self.min_information_fraction
            ));
        }

        if !self.novelty_tolerance_points.is_finite() || self.novelty_tolerance_points < 0.0 {
            return Err(format!(
                "novelty_tolerance_points must be non-negative, got {}",
                self.novelty_tolerance_points
            ));
        }

        if self.novelty_min_days < 2 {
            return Err(format!(
                "novelty_min_days must be >= 2, got {}",
                self.novelty_min_days
            ));
        }

        if self.min_visitors_per_arm < 1 {
            return Err(format!(
                "min_visitors_per_arm must be >= 1, got {}",
                self.min_visitors_per_arm
            ));
        }

        if self.min_conversions_per_arm < 0 {
            return Err(format!(
                "min_conversions_per_arm must be non-negative, got {}",
                self.min_conversions_per_arm
            ));
        }

        if self.warning_penalty > 100 || self.fail_penalty > 100 {
            return Err(format!(
                "penalties must be <= 100, got warning={} fail={}",
                self.warning_penalty, self.fail_penalty
            ));
        }

        if !(self.heterogeneity_alpha > 0.0 && self.heterogeneity_alpha < 1.0) {
            return Err(format!(
                "heterogeneity_alpha must be in (0, 1), got {}",
                self.heterogeneity_alpha
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_seed, 42);
        assert_eq!(config.simulation_draws, 100_000);
        assert_eq!(config.min_information_fraction, 0.1);
        assert_eq!(config.min_visitors_per_arm, 1000);
        assert_eq!(config.warning_penalty, 15);
        assert_eq!(config.fail_penalty, 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineConfig::strict().validate().is_ok());
        assert!(EngineConfig::permissive().validate().is_ok());
        assert!(
            EngineConfig::strict().novelty_tolerance_points
                < EngineConfig::permissive().novelty_tolerance_points
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("default_seed = 7\nfail_penalty = 35\n").unwrap();
        assert_eq!(config.default_seed, 7);
        assert_eq!(config.fail_penalty, 35);
        assert_eq!(config.novelty_min_days, 7);
    }

    #[test]
    fn test_toml_roundtrip_preserves_values() {
        let config = EngineConfig::strict();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EngineConfig::from_toml_str("simulation_draws = 200000").is_err());
        assert!(EngineConfig::from_toml_str("heterogeneity_alpha = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("min_information_fraction = 1.5").is_err());
        assert!(EngineConfig::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_penalties() {
        let mut config = EngineConfig::default();
        config.fail_penalty = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "novelty_tolerance_points = 2.5\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.novelty_tolerance_points, 2.5);

        assert!(EngineConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}

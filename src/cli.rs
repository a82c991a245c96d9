//! CLI argument parsing for exptest

use crate::config::EngineConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for analysis responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report (default)
    Text,
    /// JSON response for machine parsing
    Json,
}

/// Built-in engine configuration presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigPreset {
    Default,
    Strict,
    Permissive,
}

impl ConfigPreset {
    pub fn config(self) -> EngineConfig {
        match self {
            ConfigPreset::Default => EngineConfig::default(),
            ConfigPreset::Strict => EngineConfig::strict(),
            ConfigPreset::Permissive => EngineConfig::permissive(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "exptest")]
#[command(version)]
#[command(about = "Statistical analysis of A/B test results", long_about = None)]
pub struct Cli {
    /// JSON request file (reads stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration preset used when no --config file is given
    #[arg(long, value_enum, default_value = "default", conflicts_with = "config")]
    pub preset: ConfigPreset,

    /// Seed for Monte Carlo simulation (overrides the configured default)
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Enable debug tracing output (to stderr)
    #[arg(long)]
    pub debug: bool,

    /// Print the effective engine configuration as TOML and exit
    #[arg(long = "print-config")]
    pub print_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["exptest"]);
        assert!(cli.request.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.preset, ConfigPreset::Default);
        assert!(!cli.pretty);
        assert!(!cli.debug);
        assert!(cli.seed.is_none());
    }

    #[test]
    fn test_cli_request_and_format() {
        let cli = Cli::parse_from(["exptest", "-r", "req.json", "--format", "json", "--pretty"]);
        assert_eq!(cli.request, Some(PathBuf::from("req.json")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.pretty);
    }

    #[test]
    fn test_cli_seed_override() {
        let cli = Cli::parse_from(["exptest", "--seed", "7"]);
        assert_eq!(cli.seed, Some(7));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["exptest", "--format", "csv"]).is_err());
    }

    #[test]
    fn test_cli_preset_conflicts_with_config() {
        assert!(Cli::try_parse_from(["exptest", "--preset", "strict", "--config", "a.toml"]).is_err());
        let cli = Cli::parse_from(["exptest", "--preset", "strict"]);
        assert_eq!(cli.preset.config(), EngineConfig::strict());
    }
}

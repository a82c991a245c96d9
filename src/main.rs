use anyhow::{Context, Result};
use clap::Parser;
use exptest::cli::{Cli, OutputFormat};
use exptest::config::EngineConfig;
use exptest::error::AnalysisError;
use exptest::request::{AnalysisRequest, AnalysisResponse};
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve the engine configuration from --config, --preset and --seed
fn engine_config(args: &Cli) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => args.preset.config(),
    };
    if let Some(seed) = args.seed {
        config.default_seed = seed;
    }
    Ok(config)
}

/// Read the request payload from a file, or stdin when no file is given
fn read_request(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read request from stdin")?;
            Ok(input)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialize output")
}

fn print_response(response: &AnalysisResponse, args: &Cli) -> Result<()> {
    match args.format {
        OutputFormat::Json => println!("{}", to_json(response, args.pretty)?),
        OutputFormat::Text => print!("{}", response.to_report_string()),
    }
    Ok(())
}

fn print_error(err: &AnalysisError, args: &Cli) -> Result<()> {
    match args.format {
        OutputFormat::Json => println!("{}", to_json(&err.to_body(), args.pretty)?),
        OutputFormat::Text => eprintln!("❌ {} ({})", err, err.kind()),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug or RUST_LOG is set
    init_tracing(args.debug);

    let config = engine_config(&args)?;
    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let input = read_request(args.request.as_deref())?;
    let outcome = AnalysisRequest::from_json(&input).and_then(|request| request.run(&config));
    match outcome {
        Ok(response) => print_response(&response, &args),
        Err(err) => {
            tracing::debug!(kind = err.kind(), "analysis failed: {}", err);
            print_error(&err, &args)?;
            std::process::exit(err.exit_code());
        }
    }
}

//! exptest - Statistical inference engine for online controlled experiments
//!
//! This library turns summary statistics of A/B/n test arms into decisions:
//! frequentist and Bayesian comparisons, power and sample-size planning,
//! group-sequential monitoring, validity diagnostics, segment analysis,
//! guardrail checks and business impact projection. Every analysis is a
//! pure function of its request.
//!
//! # Example
//! ```
//! use exptest::{analyze_json, AnalysisResponse, EngineConfig};
//!
//! let response = analyze_json(
//!     r#"{
//!         "analysis": "two_arm",
//!         "control": {"visitors": 10000, "conversions": 500},
//!         "variant": {"visitors": 10000, "conversions": 575}
//!     }"#,
//!     &EngineConfig::default(),
//! )
//! .unwrap();
//!
//! if let AnalysisResponse::TwoArm(result) = response {
//!     assert!(result.is_significant);
//! }
//! ```

pub mod bayesian;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod frequentist;
pub mod guardrails;
pub mod impact;
pub mod power;
pub mod primitives;
pub mod report;
pub mod request;
pub mod segments;
pub mod sequential;
pub mod types;

pub use config::EngineConfig;
pub use error::{AnalysisError, Result};
pub use request::{analyze_json, AnalysisRequest, AnalysisResponse};

//! Analysis request and response sum types
//!
//! A request is a JSON object tagged by `"analysis"`; the response carries
//! the same tag. Option values (`correction`, `correction_method`, `method`,
//! `direction`) are checked against their closed sets before
//! deserialization so an unknown value is reported as an unsupported
//! configuration rather than a parse failure.
//!
//! Arms may be sent nested (`"control": {"visitors": .., "conversions": ..}`)
//! or flat (`"control_visitors"`, `"control_conversions"`, `"control_mean"`,
//! `"control_std"`); flat fields are folded into the nested form first.

use crate::bayesian::{analyze_bayesian, BayesianRequest, BayesianResult};
use crate::config::EngineConfig;
use crate::diagnostics::{
    check_health, check_sample_ratio, detect_novelty, HealthReport, HealthRequest,
    NoveltyRequest, NoveltyResult, SrmRequest, SrmResult,
};
use crate::error::{AnalysisError, Result};
use crate::frequentist::{
    analyze_diff_in_diff, analyze_k_arm, analyze_two_arm, ComparisonResult, DiffInDiffRequest,
    DiffInDiffResult, KArmRequest, KArmResult, TwoArmRequest,
};
use crate::guardrails::{check_guardrails, GuardrailDirection, GuardrailReport, GuardrailsRequest};
use crate::impact::{project_impact, ImpactProjection, ImpactRequest};
use crate::power::{
    achieved_power, sample_size, PowerAnalysis, PowerRequest, SampleSizePlan, SampleSizeRequest,
};
use crate::primitives::{confidence_interval, IntervalEstimate};
use crate::segments::{analyze_segments, SegmentReport, SegmentsRequest};
use crate::sequential::{analyze_sequential, SequentialRequest, SequentialState};
use crate::types::{default_confidence, Correction, SampleSummary, SpendingFunction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Interval estimate for a single arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceIntervalRequest {
    #[serde(flatten)]
    pub sample: SampleSummary,
    #[serde(default = "default_confidence")]
    pub confidence: u32,
}

/// Every supported analysis, tagged by `"analysis"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisRequest {
    SampleSize(SampleSizeRequest),
    Power(PowerRequest),
    ConfidenceInterval(ConfidenceIntervalRequest),
    TwoArm(TwoArmRequest),
    KArm(KArmRequest),
    Bayesian(BayesianRequest),
    Sequential(SequentialRequest),
    Health(HealthRequest),
    Srm(SrmRequest),
    Novelty(NoveltyRequest),
    Segments(SegmentsRequest),
    Impact(ImpactRequest),
    Guardrails(GuardrailsRequest),
    DiffInDiff(DiffInDiffRequest),
}

/// Result of an analysis, tagged like its request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisResponse {
    SampleSize(SampleSizePlan),
    Power(PowerAnalysis),
    ConfidenceInterval(IntervalEstimate),
    TwoArm(ComparisonResult),
    KArm(KArmResult),
    Bayesian(BayesianResult),
    Sequential(SequentialState),
    Health(HealthReport),
    Srm(SrmResult),
    Novelty(NoveltyResult),
    Segments(SegmentReport),
    Impact(ImpactProjection),
    Guardrails(GuardrailReport),
    DiffInDiff(DiffInDiffResult),
}

impl AnalysisRequest {
    /// Values accepted for the `"analysis"` tag
    pub const KINDS: &'static [&'static str] = &[
        "sample_size",
        "power",
        "confidence_interval",
        "two_arm",
        "k_arm",
        "bayesian",
        "sequential",
        "health",
        "srm",
        "novelty",
        "segments",
        "impact",
        "guardrails",
        "diff_in_diff",
    ];

    /// Parse a JSON request payload
    ///
    /// # Example
    /// ```
    /// use exptest::request::AnalysisRequest;
    ///
    /// let request = AnalysisRequest::from_json(
    ///     r#"{"analysis": "srm", "control_visitors": 5000, "variant_visitors": 5000}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(request.kind(), "srm");
    /// ```
    pub fn from_json(input: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(input)?;
        normalize_options(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Tag value of this request
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::SampleSize(_) => "sample_size",
            AnalysisRequest::Power(_) => "power",
            AnalysisRequest::ConfidenceInterval(_) => "confidence_interval",
            AnalysisRequest::TwoArm(_) => "two_arm",
            AnalysisRequest::KArm(_) => "k_arm",
            AnalysisRequest::Bayesian(_) => "bayesian",
            AnalysisRequest::Sequential(_) => "sequential",
            AnalysisRequest::Health(_) => "health",
            AnalysisRequest::Srm(_) => "srm",
            AnalysisRequest::Novelty(_) => "novelty",
            AnalysisRequest::Segments(_) => "segments",
            AnalysisRequest::Impact(_) => "impact",
            AnalysisRequest::Guardrails(_) => "guardrails",
            AnalysisRequest::DiffInDiff(_) => "diff_in_diff",
        }
    }

    /// Run the analysis
    pub fn run(&self, config: &EngineConfig) -> Result<AnalysisResponse> {
        tracing::debug!(analysis = self.kind(), "running analysis");
        let response = match self {
            AnalysisRequest::SampleSize(req) => AnalysisResponse::SampleSize(sample_size(req)?),
            AnalysisRequest::Power(req) => AnalysisResponse::Power(achieved_power(req)?),
            AnalysisRequest::ConfidenceInterval(req) => AnalysisResponse::ConfidenceInterval(
                confidence_interval(&req.sample, req.confidence)?,
            ),
            AnalysisRequest::TwoArm(req) => AnalysisResponse::TwoArm(analyze_two_arm(req)?),
            AnalysisRequest::KArm(req) => AnalysisResponse::KArm(analyze_k_arm(req)?),
            AnalysisRequest::Bayesian(req) => {
                AnalysisResponse::Bayesian(analyze_bayesian(req, config)?)
            }
            AnalysisRequest::Sequential(req) => {
                AnalysisResponse::Sequential(analyze_sequential(req, config)?)
            }
            AnalysisRequest::Health(req) => AnalysisResponse::Health(check_health(req, config)?),
            AnalysisRequest::Srm(req) => AnalysisResponse::Srm(check_sample_ratio(req)?),
            AnalysisRequest::Novelty(req) => {
                AnalysisResponse::Novelty(detect_novelty(req, config)?)
            }
            AnalysisRequest::Segments(req) => {
                AnalysisResponse::Segments(analyze_segments(req, config)?)
            }
            AnalysisRequest::Impact(req) => AnalysisResponse::Impact(project_impact(req, config)?),
            AnalysisRequest::Guardrails(req) => {
                AnalysisResponse::Guardrails(check_guardrails(req)?)
            }
            AnalysisRequest::DiffInDiff(req) => {
                AnalysisResponse::DiffInDiff(analyze_diff_in_diff(req)?)
            }
        };
        Ok(response)
    }
}

impl AnalysisResponse {
    /// Tag value of this response
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisResponse::SampleSize(_) => "sample_size",
            AnalysisResponse::Power(_) => "power",
            AnalysisResponse::ConfidenceInterval(_) => "confidence_interval",
            AnalysisResponse::TwoArm(_) => "two_arm",
            AnalysisResponse::KArm(_) => "k_arm",
            AnalysisResponse::Bayesian(_) => "bayesian",
            AnalysisResponse::Sequential(_) => "sequential",
            AnalysisResponse::Health(_) => "health",
            AnalysisResponse::Srm(_) => "srm",
            AnalysisResponse::Novelty(_) => "novelty",
            AnalysisResponse::Segments(_) => "segments",
            AnalysisResponse::Impact(_) => "impact",
            AnalysisResponse::Guardrails(_) => "guardrails",
            AnalysisResponse::DiffInDiff(_) => "diff_in_diff",
        }
    }
}

/// Parse and run a JSON request in one step
pub fn analyze_json(input: &str, config: &EngineConfig) -> Result<AnalysisResponse> {
    AnalysisRequest::from_json(input)?.run(config)
}

/// Reject unknown tags and option values, rewriting accepted aliases to
/// their canonical names
fn normalize_options(value: &mut Value) -> Result<()> {
    let Some(object) = value.as_object_mut() else {
        return Ok(());
    };

    let analysis = match object.get("analysis") {
        Some(Value::String(name)) => name.clone(),
        _ => return Ok(()),
    };
    if !AnalysisRequest::KINDS.contains(&analysis.as_str()) {
        return Err(AnalysisError::UnsupportedConfiguration {
            option: "analysis",
            value: analysis,
            supported: AnalysisRequest::KINDS,
        });
    }

    match analysis.as_str() {
        "two_arm" | "bayesian" | "health" | "impact" => {
            nest_arms(object, &PAIRED_ARMS);
            Ok(())
        }
        "sequential" => {
            nest_arms(object, &PAIRED_ARMS);
            canonicalize::<SpendingFunction>(object, "method")
        }
        "diff_in_diff" => {
            nest_arms(object, &PRE_POST_ARMS);
            Ok(())
        }
        "k_arm" => canonicalize::<Correction>(object, "correction"),
        "segments" => {
            canonicalize::<Correction>(object, "correction_method")?;
            canonicalize::<Correction>(object, "correction")?;
            for item in array_items(object, "segments") {
                nest_arms(item, &PAIRED_ARMS);
            }
            Ok(())
        }
        "guardrails" => {
            for item in array_items(object, "guardrails") {
                nest_arms(item, &PAIRED_ARMS);
                canonicalize::<GuardrailDirection>(item, "direction")?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

const PAIRED_ARMS: [&str; 2] = ["control", "variant"];
const PRE_POST_ARMS: [&str; 4] = [
    "control_pre",
    "control_post",
    "treatment_pre",
    "treatment_post",
];

/// Summary keys accepted in flat `{arm}_{key}` form
const ARM_KEYS: [&str; 5] = ["visitors", "conversions", "n", "mean", "std"];

/// Fold flat `{arm}_{key}` fields into a nested `{arm}` object
///
/// An arm already sent nested is left alone.
fn nest_arms(object: &mut Map<String, Value>, arms: &[&str]) {
    for arm in arms {
        if object.contains_key(*arm) {
            continue;
        }
        let mut nested = Map::new();
        for key in ARM_KEYS {
            if let Some(value) = object.remove(&format!("{}_{}", arm, key)) {
                nested.insert(key.to_string(), value);
            }
        }
        if !nested.is_empty() {
            object.insert(arm.to_string(), Value::Object(nested));
        }
    }
}

fn array_items<'a>(
    object: &'a mut Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    object
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

fn canonicalize<T>(object: &mut Map<String, Value>, key: &str) -> Result<()>
where
    T: FromStr<Err = AnalysisError> + Serialize,
{
    let canonical = match object.get(key) {
        Some(Value::String(raw)) => serde_json::to_value(raw.parse::<T>()?)?,
        _ => return Ok(()),
    };
    object.insert(key.to_string(), canonical);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Winner;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_request_types_are_thread_safe() {
        assert_send_sync::<AnalysisRequest>();
        assert_send_sync::<AnalysisResponse>();
        assert_send_sync::<EngineConfig>();
    }

    #[test]
    fn test_parses_two_arm_request() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "two_arm",
                "control": {"visitors": 10000, "conversions": 500},
                "variant": {"visitors": 10000, "conversions": 575}
            }"#,
        )
        .unwrap();
        assert_eq!(request.kind(), "two_arm");
        match request.run(&EngineConfig::default()).unwrap() {
            AnalysisResponse::TwoArm(result) => {
                assert!((result.lift_percent - 15.0).abs() < 1e-9);
                assert_eq!(result.winner, Winner::Variant);
            }
            other => panic!("unexpected response {:?}", other.kind()),
        }
    }

    #[test]
    fn test_confidence_interval_request_flattens_sample() {
        let request = AnalysisRequest::from_json(
            r#"{"analysis": "confidence_interval", "n": 50, "mean": 10.0, "std": 2.0, "confidence": 99}"#,
        )
        .unwrap();
        match request {
            AnalysisRequest::ConfidenceInterval(req) => {
                assert_eq!(req.sample, SampleSummary::continuous(50, 10.0, 2.0));
                assert_eq!(req.confidence, 99);
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_correction_is_unsupported() {
        let err = AnalysisRequest::from_json(
            r#"{
                "analysis": "k_arm",
                "variants": [
                    {"name": "a", "visitors": 100, "conversions": 10},
                    {"name": "b", "visitors": 100, "conversions": 12}
                ],
                "correction": "sidak"
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "unsupported_configuration");
        assert!(err.to_string().contains("bonferroni, holm, none"));
    }

    #[test]
    fn test_option_aliases_are_canonicalized() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "sequential",
                "control": {"visitors": 5000, "conversions": 250},
                "variant": {"visitors": 5000, "conversions": 300},
                "expected_visitors_per_variant": 20000,
                "method": "OBrien-Fleming"
            }"#,
        )
        .unwrap();
        match request {
            AnalysisRequest::Sequential(req) => {
                assert_eq!(req.method, SpendingFunction::ObrienFleming)
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_guardrail_direction_is_unsupported() {
        let err = AnalysisRequest::from_json(
            r#"{
                "analysis": "guardrails",
                "guardrails": [{
                    "name": "latency",
                    "control": {"n": 100, "mean": 200.0, "std": 30.0},
                    "variant": {"n": 100, "mean": 201.0, "std": 30.0},
                    "direction": "up_is_bad"
                }]
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_flat_binary_arms_are_accepted() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "two_arm",
                "control_visitors": 10000,
                "control_conversions": 500,
                "variant_visitors": 10000,
                "variant_conversions": 575,
                "confidence": 95
            }"#,
        )
        .unwrap();
        match request {
            AnalysisRequest::TwoArm(req) => {
                assert_eq!(req.control, SampleSummary::binary(10_000, 500));
                assert_eq!(req.variant, SampleSummary::binary(10_000, 575));
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_flat_continuous_arms_are_accepted() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "two_arm",
                "control_visitors": 2000, "control_mean": 50.0, "control_std": 12.0,
                "variant_visitors": 2000, "variant_mean": 53.0, "variant_std": 12.5
            }"#,
        )
        .unwrap();
        match request {
            AnalysisRequest::TwoArm(req) => {
                assert_eq!(req.control, SampleSummary::continuous(2000, 50.0, 12.0));
                assert_eq!(req.variant, SampleSummary::continuous(2000, 53.0, 12.5));
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_flat_arms_inside_segments_and_diff_in_diff() {
        let segments = AnalysisRequest::from_json(
            r#"{
                "analysis": "segments",
                "segments": [{
                    "segment_name": "device", "segment_value": "mobile",
                    "control_visitors": 4000, "control_conversions": 200,
                    "variant_visitors": 4000, "variant_conversions": 240
                }]
            }"#,
        )
        .unwrap();
        match segments {
            AnalysisRequest::Segments(req) => {
                assert_eq!(req.segments[0].variant, SampleSummary::binary(4000, 240));
            }
            other => panic!("unexpected request {}", other.kind()),
        }

        let did = AnalysisRequest::from_json(
            r#"{
                "analysis": "diff_in_diff",
                "control_pre_visitors": 1000, "control_pre_conversions": 50,
                "control_post_visitors": 1000, "control_post_conversions": 52,
                "treatment_pre_visitors": 1000, "treatment_pre_conversions": 50,
                "treatment_post_visitors": 1000, "treatment_post_conversions": 70
            }"#,
        )
        .unwrap();
        match did {
            AnalysisRequest::DiffInDiff(req) => {
                assert_eq!(req.treatment_post, SampleSummary::binary(1000, 70));
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_nested_arm_wins_over_stray_flat_fields() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "health",
                "control": {"visitors": 3000, "conversions": 150},
                "control_visitors": 1,
                "variant_visitors": 3000, "variant_conversions": 140
            }"#,
        )
        .unwrap();
        match request {
            AnalysisRequest::Health(req) => {
                assert_eq!(req.control, SampleSummary::binary(3000, 150));
                assert_eq!(req.variant, SampleSummary::binary(3000, 140));
            }
            other => panic!("unexpected request {}", other.kind()),
        }
    }

    #[test]
    fn test_segments_correction_method_is_honored() {
        let request = AnalysisRequest::from_json(
            r#"{
                "analysis": "segments",
                "correction_method": "none",
                "segments": [
                    {"segment_name": "country", "segment_value": "us",
                     "control_visitors": 5000, "control_conversions": 250,
                     "variant_visitors": 5000, "variant_conversions": 290},
                    {"segment_name": "country", "segment_value": "de",
                     "control_visitors": 5000, "control_conversions": 250,
                     "variant_visitors": 5000, "variant_conversions": 262}
                ]
            }"#,
        )
        .unwrap();
        match request.run(&EngineConfig::default()).unwrap() {
            AnalysisResponse::Segments(report) => {
                assert_eq!(report.correction, Correction::None);
                for segment in &report.segments {
                    assert_eq!(segment.p_value_adjusted, segment.comparison.p_value);
                }
            }
            other => panic!("unexpected response {}", other.kind()),
        }
    }

    #[test]
    fn test_segments_unknown_correction_method_is_unsupported() {
        let err = AnalysisRequest::from_json(
            r#"{"analysis": "segments", "correction_method": "sidak", "segments": []}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "unsupported_configuration");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_unknown_analysis_is_unsupported() {
        let err = AnalysisRequest::from_json(r#"{"analysis": "anova"}"#).unwrap_err();
        assert_eq!(err.kind(), "unsupported_configuration");
    }

    #[test]
    fn test_malformed_payloads() {
        for input in ["", "{", "[]", r#"{"control": 1}"#, r#"{"analysis": "srm"}"#] {
            let err = AnalysisRequest::from_json(input).unwrap_err();
            assert_eq!(err.kind(), "malformed_request", "input {:?}", input);
        }
    }

    #[test]
    fn test_response_round_trips_through_json() {
        let response = analyze_json(
            r#"{"analysis": "srm", "control_visitors": 6000, "variant_visitors": 4000}"#,
            &EngineConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["analysis"], "srm");
        assert_eq!(json["is_valid"], false);
        let back: AnalysisResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), response.kind());
    }
}

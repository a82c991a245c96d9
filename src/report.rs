//! Human-readable reports for analysis responses

use crate::bayesian::BayesianResult;
use crate::diagnostics::{
    EffectType, HealthReport, HealthStatus, NoveltyResult, SrmResult, SrmSeverity,
};
use crate::frequentist::{ComparisonResult, DiffInDiffResult, KArmResult};
use crate::guardrails::GuardrailReport;
use crate::impact::ImpactProjection;
use crate::power::{PowerAnalysis, SampleSizePlan};
use crate::primitives::IntervalEstimate;
use crate::request::AnalysisResponse;
use crate::segments::SegmentReport;
use crate::sequential::{SequentialDecision, SequentialState};
use crate::types::{ConfidenceInterval, MetricType, Winner};

fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Pass => "✅",
        HealthStatus::Warning => "⚠️ ",
        HealthStatus::Fail => "❌",
    }
}

fn interval(ci: &ConfidenceInterval) -> String {
    format!("[{:.4}, {:.4}] ({}%)", ci.lower, ci.upper, ci.level)
}

impl AnalysisResponse {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        match self {
            AnalysisResponse::SampleSize(plan) => plan.to_report_string(),
            AnalysisResponse::Power(power) => power.to_report_string(),
            AnalysisResponse::ConfidenceInterval(estimate) => estimate.to_report_string(),
            AnalysisResponse::TwoArm(result) => result.to_report_string(),
            AnalysisResponse::KArm(result) => result.to_report_string(),
            AnalysisResponse::Bayesian(result) => result.to_report_string(),
            AnalysisResponse::Sequential(state) => state.to_report_string(),
            AnalysisResponse::Health(report) => report.to_report_string(),
            AnalysisResponse::Srm(result) => result.to_report_string(),
            AnalysisResponse::Novelty(result) => result.to_report_string(),
            AnalysisResponse::Segments(report) => report.to_report_string(),
            AnalysisResponse::Impact(projection) => projection.to_report_string(),
            AnalysisResponse::Guardrails(report) => report.to_report_string(),
            AnalysisResponse::DiffInDiff(result) => result.to_report_string(),
        }
    }
}

impl SampleSizePlan {
    pub fn to_report_string(&self) -> String {
        let mut report = String::from("📊 SAMPLE SIZE PLAN\n\n");
        report.push_str(&format!(
            "Visitors per variant: {}\n",
            self.visitors_per_variant
        ));
        report.push_str(&format!(
            "Total visitors ({} arms): {}\n",
            self.num_variants, self.total_visitors
        ));
        if let (Some(current), Some(expected)) = (self.current_rate, self.expected_rate) {
            report.push_str(&format!(
                "Rate: {:.4} -> {:.4} ({:+.1}% lift)\n",
                current, expected, self.lift_percent
            ));
        }
        if let (Some(current), Some(expected)) = (self.current_mean, self.expected_mean) {
            report.push_str(&format!(
                "Mean: {:.4} -> {:.4} ({:+.1}% lift)\n",
                current, expected, self.lift_percent
            ));
        }
        report.push_str(&format!(
            "Confidence: {}%, power: {}%\n",
            self.confidence, self.power
        ));
        if let Some(days) = self.test_duration_days {
            report.push_str(&format!("Estimated duration: {} days\n", days));
        }
        report
    }
}

impl PowerAnalysis {
    pub fn to_report_string(&self) -> String {
        let header = if self.power_percent >= 80.0 {
            "✅ ADEQUATELY POWERED"
        } else {
            "⚠️  UNDERPOWERED"
        };
        let mut report = format!("{}\n\n", header);
        report.push_str(&format!("Power: {:.1}%\n", self.power_percent));
        report.push_str(&format!(
            "Visitors per variant: {} (detecting {:+.1}% lift at {}% confidence)\n",
            self.visitors_per_variant, self.lift_percent, self.confidence
        ));
        report
    }
}

impl IntervalEstimate {
    pub fn to_report_string(&self) -> String {
        let mut report = String::from("📊 CONFIDENCE INTERVAL\n\n");
        let (label, point) = match self.metric_type {
            MetricType::Binary => ("Rate", self.rate),
            MetricType::Continuous => ("Mean", self.mean),
        };
        if let Some(point) = point {
            report.push_str(&format!("{}: {:.4}\n", label, point));
        }
        report.push_str(&format!(
            "{}% interval: [{:.4}, {:.4}] (±{:.4}, {:?})\n",
            self.confidence, self.lower, self.upper, self.margin_of_error, self.method
        ));
        report
    }
}

impl ComparisonResult {
    pub fn to_report_string(&self) -> String {
        let mut report = match self.winner {
            Winner::Variant => String::from("✅ VARIANT WINS\n\n"),
            Winner::Control => String::from("❌ CONTROL WINS\n\n"),
            Winner::None => String::from("⚠️  NO SIGNIFICANT DIFFERENCE\n\n"),
        };
        report.push_str(&format!(
            "Control: {:.4}  Variant: {:.4}\n",
            self.control_value, self.variant_value
        ));
        report.push_str(&format!(
            "Lift: {:+.2}% ({:+.4} absolute)\n",
            self.lift_percent, self.lift_absolute
        ));
        report.push_str(&format!(
            "p-value: {:.4}  statistic: {:.3}\n",
            self.p_value, self.test_statistic
        ));
        report.push_str(&format!(
            "Difference interval: {}\n",
            interval(&self.confidence_interval)
        ));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl KArmResult {
    pub fn to_report_string(&self) -> String {
        let mut report = if self.is_significant {
            format!("✅ SIGNIFICANT DIFFERENCES ({} arms)\n\n", self.variants.len())
        } else {
            format!("⚠️  NO SIGNIFICANT DIFFERENCES ({} arms)\n\n", self.variants.len())
        };
        report.push_str(&format!(
            "Omnibus p-value: {:.4} (statistic {:.3}, df {})\n",
            self.p_value, self.test_statistic, self.degrees_of_freedom
        ));
        report.push_str(&format!(
            "Best: {}  Worst: {}\n",
            self.best_variant, self.worst_variant
        ));

        report.push_str(&format!("\n📊 Pairwise ({:?} correction):\n", self.correction));
        for pair in &self.pairwise_comparisons {
            let lift = pair
                .lift_percent
                .map_or_else(|| "n/a".to_string(), |lift| format!("{:+.2}%", lift));
            report.push_str(&format!(
                "  {} vs {}: {} (p={:.4}, adjusted={:.4}){}\n",
                pair.variant_b,
                pair.variant_a,
                lift,
                pair.p_value,
                pair.p_value_adjusted,
                if pair.is_significant { " *" } else { "" }
            ));
        }
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl BayesianResult {
    pub fn to_report_string(&self) -> String {
        let mut report = match self.winner {
            Winner::Variant => String::from("✅ VARIANT LIKELY BETTER\n\n"),
            Winner::Control => String::from("❌ CONTROL LIKELY BETTER\n\n"),
            Winner::None => String::from("⚠️  INCONCLUSIVE\n\n"),
        };
        report.push_str(&format!(
            "P(variant better): {:.1}%  P(control better): {:.1}%\n",
            self.probability_variant_better, self.probability_control_better
        ));
        report.push_str(&format!(
            "Expected lift: {:+.2}%  credible interval: {}\n",
            self.lift_percent,
            interval(&self.lift_credible_interval)
        ));
        report.push_str(&format!(
            "Expected loss: variant {:.5}, control {:.5}\n",
            self.expected_loss_choosing_variant, self.expected_loss_choosing_control
        ));
        report.push_str(&format!("Draws: {} (seed {})\n", self.draws, self.seed));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl SequentialState {
    pub fn to_report_string(&self) -> String {
        let mut report = match (self.can_stop, self.decision) {
            (true, SequentialDecision::VariantWins) => String::from("✅ STOP: VARIANT WINS\n\n"),
            (true, SequentialDecision::ControlWins) => String::from("❌ STOP: CONTROL WINS\n\n"),
            (true, SequentialDecision::None) => String::from("⚠️  STOP: NO DIFFERENCE\n\n"),
            (false, _) => String::from("⏳ CONTINUE\n\n"),
        };
        report.push_str(&format!(
            "Information fraction: {:.1}%\n",
            self.information_fraction * 100.0
        ));
        report.push_str(&format!(
            "Alpha spent: {:.5} of {:.3} ({:?})\n",
            self.alpha_spent, self.alpha, self.method
        ));
        match self.boundary_z {
            Some(boundary) => report.push_str(&format!(
                "Observed z: {:.3}  boundary: ±{:.3}\n",
                self.observed_z, boundary
            )),
            None => report.push_str(&format!(
                "Observed z: {:.3}  boundary: none yet\n",
                self.observed_z
            )),
        }
        report.push_str(&format!(
            "Remaining visitors: {}\n",
            self.estimated_remaining_visitors
        ));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl HealthReport {
    pub fn to_report_string(&self) -> String {
        let mut report = format!(
            "{} HEALTH SCORE {}/100\n\n",
            status_icon(self.overall_status),
            self.score
        );
        for check in &self.checks {
            report.push_str(&format!(
                "  {} {}: {}\n",
                status_icon(check.status),
                check.name,
                check.message
            ));
        }
        report.push_str(&format!(
            "\nResults can be trusted: {}\n",
            if self.can_trust_results { "yes" } else { "no" }
        ));
        report
    }
}

impl SrmResult {
    pub fn to_report_string(&self) -> String {
        let mut report = match self.severity {
            SrmSeverity::None => String::from("✅ NO SAMPLE RATIO MISMATCH\n\n"),
            SrmSeverity::Warning => String::from("⚠️  POSSIBLE SAMPLE RATIO MISMATCH\n\n"),
            SrmSeverity::Severe => String::from("❌ SAMPLE RATIO MISMATCH\n\n"),
        };
        report.push_str(&format!(
            "Observed control share: {:.4} (expected {:.4}, {:.2}% off)\n",
            self.observed_ratio, self.expected_ratio, self.deviation_percent
        ));
        report.push_str(&format!(
            "chi-square: {:.3}  p-value: {:.6}\n",
            self.chi_square, self.p_value
        ));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl NoveltyResult {
    pub fn to_report_string(&self) -> String {
        let mut report = match self.effect_type {
            EffectType::InsufficientData => String::from("⚠️  INSUFFICIENT DATA\n\n"),
            EffectType::Stable => String::from("✅ STABLE LIFT\n\n"),
            EffectType::Novelty => String::from("⚠️  NOVELTY EFFECT\n\n"),
            EffectType::Primacy => String::from("⚠️  PRIMACY EFFECT\n\n"),
        };
        report.push_str(&format!("Days analyzed: {}\n", self.days_analyzed));
        if let (Some(initial), Some(current)) = (self.initial_lift, self.current_lift)
        {
            report.push_str(&format!(
                "Early lift: {:+.2}%  current lift: {:+.2}% (tolerance {:.1} points)\n",
                initial, current, self.tolerance_points
            ));
        }
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl SegmentReport {
    pub fn to_report_string(&self) -> String {
        let mut report = format!("📊 SEGMENT ANALYSIS ({} segments)\n\n", self.segments.len());
        report.push_str(&format!("Overall lift: {:+.2}%\n", self.overall_lift));
        if self.heterogeneity_detected {
            report.push_str("⚠️  Effects differ across segments\n");
        }
        if self.simpsons_paradox_risk {
            report.push_str("⚠️  Simpson's paradox risk\n");
        }

        report.push_str(&format!("\nSegments ({:?} correction):\n", self.correction));
        for segment in &self.segments {
            report.push_str(&format!(
                "  {}: {:+.2}% (adjusted p={:.4}, n={}){}{}\n",
                segment.label(),
                segment.comparison.lift_percent,
                segment.p_value_adjusted,
                segment.visitors,
                if segment.is_significant { " *" } else { "" },
                if segment.sample_size_adequate { "" } else { " [small]" }
            ));
        }
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl ImpactProjection {
    pub fn to_report_string(&self) -> String {
        let mut report = String::from("💰 PROJECTED YEARLY IMPACT\n\n");
        report.push_str(&format!(
            "Lift: {:+.2}% ({:.4} -> {:.4})\n",
            self.lift_percent, self.control_rate, self.variant_rate
        ));
        report.push_str(&format!(
            "Additional conversions: {:.0}\n",
            self.additional_conversions
        ));
        report.push_str(&format!(
            "Additional revenue: {:.2} [{:.2}, {:.2}]\n",
            self.additional_revenue,
            self.confidence_interval.revenue_lower,
            self.confidence_interval.revenue_upper
        ));
        report.push_str(&format!("Additional profit: {:.2}\n", self.additional_profit));
        if let Some(roi) = self.roi_percent {
            report.push_str(&format!("ROI: {:.1}%\n", roi));
        }
        report.push_str(&format!(
            "P(positive impact): {:.1}% ({:?})\n",
            self.probability_positive * 100.0,
            self.probability_method
        ));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

impl GuardrailReport {
    pub fn to_report_string(&self) -> String {
        let mut report = if self.all_passed {
            String::from("✅ ALL GUARDRAILS PASSED\n\n")
        } else if self.failed.is_empty() {
            String::from("⚠️  GUARDRAIL WARNINGS\n\n")
        } else {
            format!("❌ GUARDRAILS FAILED: {}\n\n", self.failed.join(", "))
        };
        for check in &self.checks {
            report.push_str(&format!(
                "  {} {}\n",
                status_icon(check.status),
                check.message
            ));
        }
        report
    }
}

impl DiffInDiffResult {
    pub fn to_report_string(&self) -> String {
        let mut report = if self.is_significant {
            String::from("✅ SIGNIFICANT TREATMENT EFFECT\n\n")
        } else {
            String::from("⚠️  NO SIGNIFICANT TREATMENT EFFECT\n\n")
        };
        report.push_str(&format!(
            "Control change: {:+.4}  Treatment change: {:+.4}\n",
            self.control_change, self.treatment_change
        ));
        report.push_str(&format!(
            "Difference-in-differences: {:+.4} {}\n",
            self.diff_in_diff,
            interval(&self.confidence_interval)
        ));
        report.push_str(&format!(
            "z: {:.3}  p-value: {:.4}\n",
            self.z_statistic, self.p_value
        ));
        report.push_str(&format!("\n{}\n", self.recommendation));
        report
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::request::analyze_json;

    fn report(input: &str) -> String {
        analyze_json(input, &EngineConfig::default())
            .unwrap()
            .to_report_string()
    }

    #[test]
    fn test_two_arm_report_header() {
        let text = report(
            r#"{"analysis": "two_arm",
                "control": {"visitors": 10000, "conversions": 500},
                "variant": {"visitors": 10000, "conversions": 575}}"#,
        );
        assert!(text.starts_with("✅ VARIANT WINS"));
        assert!(text.contains("Lift: +15.00%"));
    }

    #[test]
    fn test_srm_report_flags_mismatch() {
        let text = report(
            r#"{"analysis": "srm", "control_visitors": 6000, "variant_visitors": 4000}"#,
        );
        assert!(text.contains("SAMPLE RATIO MISMATCH"));
        assert!(!text.starts_with("✅"));
    }

    #[test]
    fn test_health_report_lists_checks() {
        let text = report(
            r#"{"analysis": "health",
                "control": {"visitors": 5000, "conversions": 250},
                "variant": {"visitors": 5000, "conversions": 260}}"#,
        );
        assert!(text.contains("HEALTH SCORE 100/100"));
        for name in ["sample_size", "conversion_rate", "traffic_balance", "conversion_volume"] {
            assert!(text.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_sequential_report_continue() {
        let text = report(
            r#"{"analysis": "sequential",
                "control": {"visitors": 500, "conversions": 25},
                "variant": {"visitors": 500, "conversions": 27},
                "expected_visitors_per_variant": 20000}"#,
        );
        assert!(text.starts_with("⏳ CONTINUE"));
    }
}

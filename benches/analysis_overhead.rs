//! Analysis latency benchmark
//!
//! Closed-form analyses should answer in microseconds; the Bayesian
//! simulation scales linearly with the number of posterior draws.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench analysis_overhead
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exptest::bayesian::{analyze_bayesian, BayesianRequest};
use exptest::config::EngineConfig;
use exptest::frequentist::{analyze_k_arm, analyze_two_arm, KArmRequest, NamedArm, TwoArmRequest};
use exptest::request::analyze_json;
use exptest::types::{Correction, SampleSummary};

const TWO_ARM_JSON: &str = r#"{
    "analysis": "two_arm",
    "control": {"visitors": 10000, "conversions": 500},
    "variant": {"visitors": 10000, "conversions": 575}
}"#;

fn bench_two_arm(c: &mut Criterion) {
    let binary = TwoArmRequest {
        control: SampleSummary::binary(10_000, 500),
        variant: SampleSummary::binary(10_000, 575),
        confidence: 95,
    };
    let continuous = TwoArmRequest {
        control: SampleSummary::continuous(5_000, 42.0, 11.0),
        variant: SampleSummary::continuous(5_000, 43.0, 11.5),
        confidence: 95,
    };

    c.bench_function("two_arm_binary", |b| {
        b.iter(|| analyze_two_arm(black_box(&binary)))
    });
    c.bench_function("two_arm_welch", |b| {
        b.iter(|| analyze_two_arm(black_box(&continuous)))
    });
}

fn bench_k_arm(c: &mut Criterion) {
    let mut group = c.benchmark_group("k_arm");
    for arms in [3usize, 5, 10] {
        let request = KArmRequest {
            variants: (0..arms)
                .map(|i| NamedArm::new(format!("arm_{}", i), SampleSummary::binary(10_000, 500 + 10 * i as i64)))
                .collect(),
            confidence: 95,
            correction: Correction::Holm,
        };
        group.bench_with_input(BenchmarkId::from_parameter(arms), &request, |b, request| {
            b.iter(|| analyze_k_arm(black_box(request)))
        });
    }
    group.finish();
}

fn bench_bayesian_draws(c: &mut Criterion) {
    let mut group = c.benchmark_group("bayesian_draws");
    group.sample_size(20);
    let config = EngineConfig::default();
    for draws in [1_000usize, 10_000, 100_000] {
        let request = BayesianRequest {
            control: SampleSummary::binary(10_000, 500),
            variant: SampleSummary::binary(10_000, 575),
            prior_alpha: 1.0,
            prior_beta: 1.0,
            draws: Some(draws),
            seed: Some(42),
        };
        group.bench_with_input(BenchmarkId::from_parameter(draws), &request, |b, request| {
            b.iter(|| analyze_bayesian(black_box(request), &config))
        });
    }
    group.finish();
}

fn bench_request_layer(c: &mut Criterion) {
    let config = EngineConfig::default();
    c.bench_function("analyze_json_two_arm", |b| {
        b.iter(|| analyze_json(black_box(TWO_ARM_JSON), &config))
    });
}

criterion_group!(
    benches,
    bench_two_arm,
    bench_k_arm,
    bench_bayesian_draws,
    bench_request_layer
);
criterion_main!(benches);

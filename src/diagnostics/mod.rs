//! Validity diagnostics for running experiments
//!
//! Checks that say whether a comparison can be trusted at all: the health
//! battery, sample ratio mismatch, and novelty/primacy trends.

mod health;
mod novelty;
mod srm;

pub use health::{check_health, HealthCheck, HealthReport, HealthRequest, HealthStatus};
pub use novelty::{
    classify_trend, detect_novelty, DailyRecord, EffectType, NoveltyRequest, NoveltyResult,
};
pub use srm::{check_sample_ratio, SrmRequest, SrmResult, SrmSeverity};

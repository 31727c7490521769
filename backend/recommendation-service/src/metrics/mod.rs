//! Recommendation Metrics
//!
//! Prometheus metrics for recommendation generation runs

use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static GENERATION_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommendation_generation_runs_total",
        "Total recommendation generation runs by outcome",
        &["outcome"]
    )
    .expect("Failed to register recommendation runs metric")
});

static GENERATION_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "recommendation_generation_duration_seconds",
        "Duration of a full recommendation generation run",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register recommendation duration metric")
});

static RECOMMENDATIONS_RETURNED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommendation_items_total",
        "Recommendations returned and persisted",
        &["stage"]
    )
    .expect("Failed to register recommendation items metric")
});

static INPUT_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommendation_input_fallbacks_total",
        "Inputs replaced by their default/zero fallback",
        &["kind"]
    )
    .expect("Failed to register recommendation fallback metric")
});

static STORAGE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommendation_storage_errors_total",
        "Store calls that failed, by operation and error kind",
        &["operation", "kind"]
    )
    .expect("Failed to register recommendation storage error metric")
});

/// Record run outcome (ok/empty/aborted)
pub fn record_generation_run(outcome: &str) {
    GENERATION_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_generation_duration(duration: Duration) {
    GENERATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record item counts by stage (returned/persisted/persist_failed)
pub fn record_items(stage: &str, count: usize) {
    RECOMMENDATIONS_RETURNED_TOTAL
        .with_label_values(&[stage])
        .inc_by(count as u64);
}

pub fn record_input_fallback(kind: &str) {
    INPUT_FALLBACKS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_storage_error(operation: &str, error: &AppError) {
    STORAGE_ERRORS_TOTAL
        .with_label_values(&[operation, error.kind()])
        .inc();
}

/// Serialise every registered metric in the Prometheus text format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| AppError::Internal(format!("metrics output is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_storage_errors() {
        record_storage_error("fetch_active_listings", &AppError::Database("down".to_string()));
        record_generation_run("aborted");

        let text = render().unwrap();
        assert!(text.contains("recommendation_storage_errors_total"));
        assert!(text.contains("kind=\"database\""));
        assert!(text.contains("recommendation_generation_runs_total"));
    }
}

// Prometheus metrics for grading runs

use autograde_engine::GradingOutcome;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    pub static ref GRADING_RUNS: IntCounterVec = register_int_counter_vec!(
        "autograde_grading_runs_total",
        "Grading runs by resulting submission status",
        &["status"]
    )
    .expect("grading runs counter registers once");
    pub static ref TEST_RESULTS: IntCounterVec = register_int_counter_vec!(
        "autograde_test_results_total",
        "Graded test cases by result",
        &["result"]
    )
    .expect("test results counter registers once");
    pub static ref GRADING_DURATION: Histogram = register_histogram!(
        "autograde_grading_duration_seconds",
        "Wall time of a whole grading run",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("grading duration histogram registers once");
}

pub fn record_grading(outcome: &GradingOutcome, elapsed: Duration) {
    let status = if outcome.is_graded() { "graded" } else { "error" };
    GRADING_RUNS.with_label_values(&[status]).inc();
    GRADING_DURATION.observe(elapsed.as_secs_f64());

    if let Some(summary) = &outcome.summary {
        for result in &summary.results {
            let label = if result.passed {
                "passed"
            } else if result.timed_out {
                "timed_out"
            } else {
                "failed"
            };
            TEST_RESULTS.with_label_values(&[label]).inc();
        }
    }
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    lazy_static::initialize(&GRADING_RUNS);
    lazy_static::initialize(&TEST_RESULTS);
    lazy_static::initialize(&GRADING_DURATION);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

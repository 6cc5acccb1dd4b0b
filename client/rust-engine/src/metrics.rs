use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // API Collaborator Metrics
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "api_request_duration_seconds",
        "Backend API request duration in seconds",
        &["operation", "module"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    pub static ref EXERCISES_FETCHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exercises_fetched_total",
        "Total number of exercises fetched",
        &["module", "status"]
    )
    .unwrap();

    pub static ref ATTEMPTS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_submitted_total",
        "Total number of attempts submitted",
        &["module", "status"]
    )
    .unwrap();

    pub static ref SUBMISSION_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submission_retries_total",
        "Total number of user-triggered submission retries",
        &["module"]
    )
    .unwrap();

    // Capture Metrics
    pub static ref CAPTURE_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "capture_failures_total",
        "Total number of audio capture acquisition failures",
        &["reason"]
    )
    .unwrap();

    // Module Auxiliary Metrics
    pub static ref VOCABULARY_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vocabulary_lookups_total",
        "Total number of vocabulary lookups while reading",
        &["resolved"]
    )
    .unwrap();

    pub static ref PLAYBACK_COMPLETIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "playback_completions_total",
        "Total number of playback timers that ran to completion",
        &["module"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

pub fn record_fetch(module: &str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    EXERCISES_FETCHED_TOTAL.with_label_values(&[module, status]).inc();
}

pub fn record_submission(module: &str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    ATTEMPTS_SUBMITTED_TOTAL.with_label_values(&[module, status]).inc();
}

pub fn record_lookup(resolved: bool) {
    let label = if resolved { "hit" } else { "miss" };
    VOCABULARY_LOOKUPS_TOTAL.with_label_values(&[label]).inc();
}

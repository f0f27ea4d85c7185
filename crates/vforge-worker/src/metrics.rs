//! Prometheus metrics for the worker.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder, returning the handle used to render
/// `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_COMPLETED_TOTAL: &str = "vforge_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vforge_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vforge_job_duration_seconds";

    // Processing metrics
    pub const FFMPEG_DURATION_SECONDS: &str = "vforge_ffmpeg_duration_seconds";
    pub const BATCH_ITEMS_PROCESSED_TOTAL: &str = "vforge_batch_items_processed_total";
    pub const BATCH_CONCURRENCY: &str = "vforge_batch_concurrency";
    pub const DURATION_DRIFT_MS: &str = "vforge_duration_drift_ms";

    // Transfer metrics
    pub const DOWNLOAD_DURATION_SECONDS: &str = "vforge_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vforge_upload_duration_seconds";
}

pub fn record_job_completed(operation: &str, duration_secs: f64) {
    let labels = [("operation", operation.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_failed(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record one FFmpeg invocation; `step` names what it produced.
pub fn record_ffmpeg_duration(step: &str, duration_secs: f64) {
    let labels = [("step", step.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_batch_item(variant: &str) {
    let labels = [("variant", variant.to_string())];
    counter!(names::BATCH_ITEMS_PROCESSED_TOTAL, &labels).increment(1);
}

pub fn set_batch_concurrency(concurrency: usize) {
    gauge!(names::BATCH_CONCURRENCY).set(concurrency as f64);
}

pub fn record_duration_drift(delta_ms: f64) {
    histogram!(names::DURATION_DRIFT_MS).record(delta_ms);
}

pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

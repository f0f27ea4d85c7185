//! Structured job logging.
//!
//! Every lifecycle event carries the job ID and operation name as fields,
//! so JSON logs from concurrent jobs can be told apart.

use std::time::Instant;
use tracing::{error, info, warn, Span};
use vforge_models::{JobId, Operation};

/// Job-scoped logger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: Operation,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: Operation) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_secs = self.elapsed_secs(),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_secs = self.elapsed_secs(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Seconds since the logger was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Span that attaches the job fields to everything logged inside it,
    /// including logs from the media and storage crates.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from_string("job-123");
        let logger = JobLogger::new(&job_id, Operation::ConcatWithAudioCycle);

        assert_eq!(logger.job_id(), "job-123");
        assert_eq!(logger.operation(), Operation::ConcatWithAudioCycle);
        assert!(logger.elapsed_secs() >= 0.0);
    }
}

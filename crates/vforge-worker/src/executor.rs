//! Job executor.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, Instrument};
use vforge_media::{EncoderProfile, FfmpegRunner};
use vforge_models::{JobEnvelope, JobId, JobOutput, JobRequest, S3Overrides};
use vforge_storage::{ObjectStore, S3Store};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::operations::{self, JobContext, OperationOutcome, Transcoder};

/// Runs one job at a time against the configured object store.
pub struct JobExecutor {
    config: WorkerConfig,
    runner: Arc<dyn Transcoder>,
    delivery: EncoderProfile,
}

impl JobExecutor {
    /// Create an executor. `gpu_available` selects the delivery encoder.
    pub fn new(config: WorkerConfig, gpu_available: bool) -> Self {
        let runner: Arc<dyn Transcoder> =
            Arc::new(FfmpegRunner::new().with_optional_timeout(config.ffmpeg_timeout_secs));
        let delivery = EncoderProfile::for_delivery(gpu_available && !config.disable_gpu);
        info!(encoder = delivery.codec(), "Job executor ready");

        Self {
            config,
            runner,
            delivery,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Parse a JSON job and run it.
    ///
    /// Only a document that is not a job at all is an `Err`; every failure
    /// after parsing is reported through the returned [`JobOutput`].
    pub async fn execute_json(&self, input: &str) -> WorkerResult<JobOutput> {
        let envelope: JobEnvelope = serde_json::from_str(input)
            .map_err(|e| WorkerError::validation(format!("malformed job: {}", e)))?;
        Ok(self.execute(envelope).await)
    }

    /// Run a job to completion and describe the outcome.
    pub async fn execute(&self, envelope: JobEnvelope) -> JobOutput {
        let JobEnvelope {
            job_id,
            s3_config,
            request,
        } = envelope;
        let operation = request.operation();
        let logger = JobLogger::new(&job_id, operation);
        let span = logger.create_span();

        async move {
            logger.log_start(&format!("Starting {}", operation));

            match self
                .run(&job_id, s3_config.as_ref(), &request, logger.clone())
                .await
            {
                Ok(outcome) => {
                    metrics::record_job_completed(operation.as_str(), logger.elapsed_secs());
                    logger.log_completion(&format!("{} finished", operation));
                    JobOutput::success(job_id, operation, outcome.result, outcome.diagnostics)
                }
                Err(e) => {
                    metrics::record_job_failed(operation.as_str());
                    let message = failure_message(&e);
                    logger.log_error(&message);
                    JobOutput::failure(job_id, operation, message)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        job_id: &JobId,
        overrides: Option<&S3Overrides>,
        request: &JobRequest,
        logger: JobLogger,
    ) -> WorkerResult<OperationOutcome> {
        request.validate().map_err(WorkerError::validation)?;

        let storage = match overrides {
            Some(o) if !o.is_empty() => {
                debug!("Applying job storage overrides");
                self.config.storage.with_overrides(o)
            }
            _ => self.config.storage.clone(),
        };
        let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&storage).await?);

        let scratch = self.scratch_dir(job_id).await?;
        let ctx = JobContext {
            job_id: job_id.clone(),
            store,
            runner: Arc::clone(&self.runner),
            delivery: self.delivery,
            scratch: canonical(&scratch).await?,
            keep_dir: self
                .config
                .serve_output
                .then(|| self.config.output_dir.clone()),
            batch_concurrency: self.config.batch_concurrency(),
            logger,
        };

        // `scratch` is dropped, and the directory removed, when this returns.
        dispatch(&ctx, request).await
    }

    async fn scratch_dir(&self, job_id: &JobId) -> WorkerResult<TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", sanitize(job_id.as_str())))
            .tempdir_in(&self.config.work_dir)?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(dir)
    }
}

async fn dispatch(ctx: &JobContext, request: &JobRequest) -> WorkerResult<OperationOutcome> {
    match request {
        JobRequest::AnimateImageBatch(job) => operations::animate_image_batch(ctx, job).await,
        JobRequest::Caption(job) => operations::caption(ctx, job).await,
        JobRequest::CaptionSegments(job) => operations::caption_segments(ctx, job).await,
        JobRequest::CaptionHighlight(job) => operations::caption_highlight(ctx, job).await,
        JobRequest::AddAudio(job) => operations::add_audio(ctx, job).await,
        JobRequest::AddSoundtrack(job) => operations::add_soundtrack(ctx, job).await,
        JobRequest::Concatenate(job) => operations::concatenate(ctx, job).await,
        JobRequest::ConcatWithAudioCycle(job) => operations::concat_with_audio_cycle(ctx, job).await,
    }
}

/// Concat lists are resolved relative to themselves, so handlers need an
/// absolute scratch path.
async fn canonical(dir: &TempDir) -> WorkerResult<PathBuf> {
    Ok(tokio::fs::canonicalize(dir.path()).await?)
}

/// Error text for the job output, with FFmpeg's stderr appended verbatim.
fn failure_message(err: &WorkerError) -> String {
    match err.ffmpeg_stderr() {
        Some(stderr) if !stderr.trim().is_empty() => format!("{}\n{}", err, stderr.trim_end()),
        _ => err.to_string(),
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(48)
        .collect()
}

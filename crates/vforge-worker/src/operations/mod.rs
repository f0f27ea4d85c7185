//! Operation handlers.
//!
//! Each handler downloads its inputs into the job's scratch directory,
//! drives FFmpeg, uploads the result and reports diagnostics. Scratch files
//! are owned by the executor's `TempDir` guard.

mod animate;
mod audio;
mod caption;
mod concat;

pub use animate::animate_image_batch;
pub use audio::{add_audio, add_soundtrack};
pub use caption::{caption, caption_highlight, caption_segments};
pub use concat::{concat_with_audio_cycle, concatenate};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use vforge_media::{EncoderProfile, FfmpegCommand, FfmpegRunner, MediaResult};
use vforge_models::{Diagnostics, JobId, JobResult, OutputRef};
use vforge_storage::{object_key, ObjectStore};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// What a handler produced.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub result: JobResult,
    pub diagnostics: Diagnostics,
}

impl OperationOutcome {
    pub fn single(output: OutputRef, diagnostics: Diagnostics) -> Self {
        Self {
            result: JobResult::Single(output),
            diagnostics,
        }
    }
}

/// Executes built FFmpeg commands.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

#[async_trait]
impl Transcoder for FfmpegRunner {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        FfmpegRunner::run(self, cmd).await
    }
}

/// Everything a handler needs for one job.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub store: Arc<dyn ObjectStore>,
    pub runner: Arc<dyn Transcoder>,
    /// Encoder for caption, audio and concatenation re-encodes
    pub delivery: EncoderProfile,
    /// Per-job scratch directory
    pub scratch: PathBuf,
    /// Where published outputs are kept for local serving, if anywhere
    pub keep_dir: Option<PathBuf>,
    pub batch_concurrency: usize,
    pub logger: JobLogger,
}

impl JobContext {
    /// Path for a file in the scratch directory.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch.join(name)
    }

    /// Download `reference` into the scratch directory as `name`.
    pub async fn fetch(&self, reference: &str, name: &str) -> WorkerResult<PathBuf> {
        let dest = self.scratch_path(name);
        let started = Instant::now();

        let bytes = self
            .store
            .download(reference, &dest)
            .await
            .map_err(|e| WorkerError::download_failed(format!("{}: {}", reference, e)))?;

        metrics::record_download_duration(started.elapsed().as_secs_f64());
        debug!(bytes, file = name, "Fetched {}", reference);
        Ok(dest)
    }

    /// Run one FFmpeg step, recording its duration under `step`.
    pub async fn run_ffmpeg(&self, step: &str, cmd: &FfmpegCommand) -> WorkerResult<()> {
        let started = Instant::now();
        self.runner.run(cmd).await?;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_ffmpeg_duration(step, elapsed);
        debug!(step, elapsed_secs = elapsed, "FFmpeg step finished");
        Ok(())
    }

    /// Upload `local` as `{prefix}/{filename}` and return where it went.
    pub async fn publish(&self, local: &Path, prefix: &str, filename: &str) -> WorkerResult<OutputRef> {
        let key = object_key(prefix, filename);
        let started = Instant::now();

        let url = self
            .store
            .upload(local, &key)
            .await
            .map_err(|e| WorkerError::upload_failed(e.to_string()))?;

        metrics::record_upload_duration(started.elapsed().as_secs_f64());
        info!(key = %key, "Published {}", url);

        if let Some(dir) = &self.keep_dir {
            let kept = dir.join(filename);
            if let Err(e) = tokio::fs::copy(local, &kept).await {
                warn!(error = %e, "Could not keep {} for local serving", kept.display());
            }
        }

        Ok(OutputRef {
            output_uri: url,
            filename: filename.to_string(),
            storage_key: key,
        })
    }
}

/// Reject output names that would escape the scratch directory.
pub(crate) fn checked_filename(filename: &str) -> WorkerResult<&str> {
    let name = filename.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(WorkerError::validation(format!(
            "output_filename must be a plain file name, got '{}'",
            filename
        )));
    }
    Ok(name)
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use tempfile::TempDir;
    use vforge_models::Operation;

    fn context(dir: &TempDir, store: MemoryStore, keep: Option<PathBuf>) -> JobContext {
        let job_id = JobId::from_string("test-job");
        JobContext {
            logger: JobLogger::new(&job_id, Operation::Concatenate),
            job_id,
            store: Arc::new(store),
            runner: Arc::new(FfmpegRunner::new()),
            delivery: EncoderProfile::for_delivery(false),
            scratch: dir.path().to_path_buf(),
            keep_dir: keep,
            batch_concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_fetch_and_publish() {
        let dir = TempDir::new().unwrap();
        let keep = TempDir::new().unwrap();
        let store = MemoryStore::default().with_object("https://cdn.test/a.mp4", b"video");
        let ctx = context(&dir, store, Some(keep.path().to_path_buf()));

        let local = ctx.fetch("https://cdn.test/a.mp4", "input.mp4").await.unwrap();
        assert_eq!(tokio::fs::read(&local).await.unwrap(), b"video");

        let output = ctx.publish(&local, "channel/videos/", "out.mp4").await.unwrap();
        assert_eq!(output.storage_key, "channel/videos/out.mp4");
        assert_eq!(output.output_uri, "https://s3.test/bucket/channel/videos/out.mp4");
        assert!(keep.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_download_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, MemoryStore::default(), None);

        let err = ctx.fetch("https://cdn.test/missing.mp4", "in.mp4").await.unwrap_err();
        assert!(matches!(err, WorkerError::DownloadFailed(_)));
    }

    #[test]
    fn test_checked_filename() {
        assert_eq!(checked_filename(" final.mp4 ").unwrap(), "final.mp4");
        assert!(checked_filename("../escape.mp4").is_err());
        assert!(checked_filename("a/b.mp4").is_err());
        assert!(checked_filename("..").is_err());
    }
}

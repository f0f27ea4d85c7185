//! Burned-in captions.

use std::path::Path;
use vforge_media::filters::{ass_filter, subtitles_filter};
use vforge_media::subtitles::{write_highlight_ass, write_segments_ass};
use vforge_media::FfmpegCommand;
use vforge_models::{CaptionHighlightJob, CaptionJob, CaptionSegmentsJob, Diagnostics};

use super::{checked_filename, JobContext, OperationOutcome};
use crate::error::WorkerResult;

/// Burn an SRT file with the engine's own subtitle renderer.
pub async fn caption(ctx: &JobContext, job: &CaptionJob) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let video = ctx.fetch(&job.video_uri, "input.mp4").await?;
    let srt = ctx.fetch(&job.subtitle_uri, "captions.srt").await?;

    if job.force_style.is_some() {
        ctx.logger.log_progress("Applying custom subtitle style");
    }

    let filter = subtitles_filter(&srt, job.force_style.as_deref());
    burn(ctx, &video, filter, filename).await?;

    let output = ctx.publish(&ctx.scratch_path(filename), &job.path, filename).await?;
    Ok(OperationOutcome::single(output, Diagnostics::default()))
}

/// Render SRT cues with a segments style, then burn the ASS file.
pub async fn caption_segments(
    ctx: &JobContext,
    job: &CaptionSegmentsJob,
) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let video = ctx.fetch(&job.video_uri, "input.mp4").await?;
    let srt = ctx.fetch(&job.subtitle_uri, "captions.srt").await?;

    let ass = ctx.scratch_path("captions.ass");
    let cues = write_segments_ass(&srt, &ass, &job.style).await?;
    ctx.logger
        .log_progress(&format!("Rendered {} caption segments", cues));

    burn(ctx, &video, ass_filter(&ass), filename).await?;

    let output = ctx.publish(&ctx.scratch_path(filename), &job.path, filename).await?;
    Ok(OperationOutcome::single(
        output,
        Diagnostics {
            segment_count: Some(cues),
            ..Default::default()
        },
    ))
}

/// Render word timings as highlighted karaoke-style lines, then burn them.
pub async fn caption_highlight(
    ctx: &JobContext,
    job: &CaptionHighlightJob,
) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let video = ctx.fetch(&job.video_uri, "input.mp4").await?;
    let words = ctx.fetch(&job.words_uri, "words.json").await?;

    let ass = ctx.scratch_path("highlight.ass");
    let dialogues = write_highlight_ass(&words, &ass, &job.style).await?;
    ctx.logger
        .log_progress(&format!("Rendered {} highlight lines", dialogues));

    burn(ctx, &video, ass_filter(&ass), filename).await?;

    let output = ctx.publish(&ctx.scratch_path(filename), &job.path, filename).await?;
    Ok(OperationOutcome::single(
        output,
        Diagnostics {
            segment_count: Some(dialogues),
            ..Default::default()
        },
    ))
}

/// Re-encode `video` through `filter`, keeping its audio as is.
async fn burn(ctx: &JobContext, video: &Path, filter: String, filename: &str) -> WorkerResult<()> {
    let cmd = FfmpegCommand::new(video, ctx.scratch_path(filename))
        .video_filter(filter)
        .encoder(&ctx.delivery)
        .audio_codec("copy")
        .faststart();

    ctx.run_ffmpeg("caption", &cmd).await
}

#[cfg(test)]
mod tests {
    use super::super::testing::MemoryStore;
    use super::*;
    use crate::error::WorkerError;
    use crate::logging::JobLogger;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vforge_media::{EncoderProfile, FfmpegRunner, MediaError};
    use vforge_models::{JobId, Operation};

    fn context(dir: &TempDir, store: MemoryStore) -> JobContext {
        let job_id = JobId::from_string("caption-test");
        JobContext {
            logger: JobLogger::new(&job_id, Operation::CaptionSegments),
            job_id,
            store: Arc::new(store),
            runner: Arc::new(FfmpegRunner::new()),
            delivery: EncoderProfile::for_delivery(false),
            scratch: dir.path().to_path_buf(),
            keep_dir: None,
            batch_concurrency: 1,
        }
    }

    #[tokio::test]
    async fn test_srt_without_cues_fails_before_transcoding() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::default()
            .with_object("https://cdn.test/v.mp4", b"not really a video")
            .with_object("https://cdn.test/c.srt", b"just some text\n");

        let job = CaptionSegmentsJob {
            video_uri: "https://cdn.test/v.mp4".to_string(),
            subtitle_uri: "https://cdn.test/c.srt".to_string(),
            path: "p/".to_string(),
            output_filename: "out.mp4".to_string(),
            ..Default::default()
        };

        let err = caption_segments(&context(&dir, store), &job).await.unwrap_err();
        assert!(matches!(err, WorkerError::Media(MediaError::InvalidSubtitle(_))));
    }

    #[tokio::test]
    async fn test_bad_filename_is_rejected() {
        let dir = TempDir::new().unwrap();
        let job = CaptionJob {
            video_uri: "https://cdn.test/v.mp4".to_string(),
            subtitle_uri: "https://cdn.test/c.srt".to_string(),
            path: "p/".to_string(),
            output_filename: "../out.mp4".to_string(),
            force_style: None,
        };

        let err = caption(&context(&dir, MemoryStore::default()), &job)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}

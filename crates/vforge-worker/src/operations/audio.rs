//! Audio replacement and soundtrack mixing.

use tracing::info;
use vforge_media::audio::{compute_reduction_db, loops_needed};
use vforge_media::encoding::{AUDIO_BITRATE, AUDIO_CODEC};
use vforge_media::filters::{retime_filter, soundtrack_filter};
use vforge_media::{analyze_volume, probe_duration, FfmpegCommand, VolumeStats};
use vforge_models::{AddAudioJob, AddSoundtrackJob, AudioAnalysis, Diagnostics};

use super::{checked_filename, JobContext, OperationOutcome};
use crate::error::{WorkerError, WorkerResult};

/// Replace a video's audio, stretching the video to the new audio's length.
pub async fn add_audio(ctx: &JobContext, job: &AddAudioJob) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let video = ctx.fetch(&job.video_uri, "input.mp4").await?;
    let audio = ctx.fetch(&job.audio_uri, "audio.mp3").await?;

    let video_duration = probe_duration(&video).await?;
    let audio_duration = probe_duration(&audio).await?;
    let speed_factor = speed_factor(video_duration, audio_duration)?;
    info!(
        video_duration,
        audio_duration,
        speed_factor,
        "Retiming video to audio length"
    );

    let output = ctx.scratch_path(filename);
    let cmd = FfmpegCommand::new(&video, &output)
        .input(&audio)
        .filter_complex(retime_filter(speed_factor))
        .map("[vout]")
        .map("1:a")
        .encoder(&ctx.delivery)
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
        .shortest()
        .faststart();
    ctx.run_ffmpeg("add_audio", &cmd).await?;

    let published = ctx.publish(&output, &job.path, filename).await?;
    Ok(OperationOutcome::single(
        published,
        Diagnostics {
            speed_factor: Some(speed_factor),
            video_duration: Some(video_duration),
            audio_duration: Some(audio_duration),
            ..Default::default()
        },
    ))
}

/// `video / audio`; both must be positive.
fn speed_factor(video_duration: f64, audio_duration: f64) -> WorkerResult<f64> {
    if video_duration <= 0.0 || audio_duration <= 0.0 {
        return Err(WorkerError::processing_failed(format!(
            "cannot retime: video {:.3}s, audio {:.3}s",
            video_duration, audio_duration
        )));
    }
    Ok(video_duration / audio_duration)
}

/// Loop a soundtrack under a video's own audio at a matched level.
pub async fn add_soundtrack(
    ctx: &JobContext,
    job: &AddSoundtrackJob,
) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let video = ctx.fetch(&job.video_uri, "input.mp4").await?;
    let soundtrack = ctx.fetch(&job.soundtrack_uri, "soundtrack.mp3").await?;

    let video_duration = probe_duration(&video).await?;
    let soundtrack_duration = probe_duration(&soundtrack).await?;

    let (reduction_db, analysis) = match job.volume_reduction_db {
        Some(db) => {
            info!(reduction_db = db, "Using requested soundtrack reduction");
            (db, None)
        }
        None => {
            let video_stats = measure(ctx, &video).await;
            let track_stats = measure(ctx, &soundtrack).await;
            let db = compute_reduction_db(video_stats.mean_db, track_stats.mean_db);
            info!(
                video_mean_db = ?video_stats.mean_db,
                soundtrack_mean_db = ?track_stats.mean_db,
                reduction_db = db,
                "Computed soundtrack reduction"
            );
            let analysis = AudioAnalysis {
                video_mean_volume_db: video_stats.mean_db,
                video_max_volume_db: video_stats.max_db,
                soundtrack_mean_volume_db: track_stats.mean_db,
                soundtrack_max_volume_db: track_stats.max_db,
            };
            (db, Some(analysis))
        }
    };

    let loops = loops_needed(video_duration, soundtrack_duration);
    ctx.logger.log_progress(&format!(
        "Mixing soundtrack: {} loops, -{:.2} dB",
        loops, reduction_db
    ));

    let output = ctx.scratch_path(filename);
    let cmd = FfmpegCommand::new(&video, &output)
        .input(&soundtrack)
        .filter_complex(soundtrack_filter(loops, reduction_db))
        .map("0:v")
        .map("[aout]")
        .encoder(&ctx.delivery)
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
        .shortest()
        .faststart();
    ctx.run_ffmpeg("add_soundtrack", &cmd).await?;

    let published = ctx.publish(&output, &job.path, filename).await?;
    Ok(OperationOutcome::single(
        published,
        Diagnostics {
            video_duration: Some(video_duration),
            audio_duration: Some(soundtrack_duration),
            volume_reduction_db: Some(reduction_db),
            loops_applied: Some(loops),
            audio_analysis: analysis,
            ..Default::default()
        },
    ))
}

/// Loudness of a file; a failed analysis yields empty stats.
async fn measure(ctx: &JobContext, path: &std::path::Path) -> VolumeStats {
    match analyze_volume(path).await {
        Ok(stats) => stats,
        Err(e) => {
            ctx.logger.log_warning(&format!(
                "volume analysis failed for {}, assuming default loudness: {}",
                path.display(),
                e
            ));
            VolumeStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::MemoryStore;
    use super::*;
    use crate::logging::JobLogger;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vforge_media::{EncoderProfile, FfmpegRunner};
    use vforge_models::{JobId, Operation};

    #[tokio::test]
    async fn test_unreadable_audio_falls_back_to_default_loudness() {
        let dir = TempDir::new().unwrap();
        let job_id = JobId::from_string("soundtrack-test");
        let ctx = JobContext {
            logger: JobLogger::new(&job_id, Operation::AddSoundtrack),
            job_id,
            store: Arc::new(MemoryStore::default()),
            runner: Arc::new(FfmpegRunner::new()),
            delivery: EncoderProfile::for_delivery(false),
            scratch: dir.path().to_path_buf(),
            keep_dir: None,
            batch_concurrency: 1,
        };
        let garbage = dir.path().join("soundtrack.mp3");
        tokio::fs::write(&garbage, b"not audio").await.unwrap();

        let stats = measure(&ctx, &garbage).await;
        assert!(stats.mean_db.is_none());
        assert_eq!(compute_reduction_db(stats.mean_db, stats.mean_db), 20.0);
    }

    #[test]
    fn test_speed_factor() {
        assert!((speed_factor(30.0, 24.0).unwrap() - 1.25).abs() < 1e-12);
        assert!((speed_factor(10.0, 20.0).unwrap() - 0.5).abs() < 1e-12);
        assert!(speed_factor(10.0, 0.0).is_err());
    }
}

//! Clip concatenation.

use std::path::{Path, PathBuf};
use tracing::info;
use vforge_media::encoding::{AUDIO_BITRATE, AUDIO_CODEC};
use vforge_media::filters::{FILTER_NORMALIZE, NORMALIZED_FPS};
use vforge_media::{probe_duration, write_concat_list, EncoderProfile, FfmpegCommand};
use vforge_models::{ConcatWithAudioCycleJob, ConcatenateJob, Diagnostics};

use super::{checked_filename, JobContext, OperationOutcome};
use crate::error::WorkerResult;
use crate::metrics;
use crate::sequencer::{clip_name, plan_sequence, verify_duration, Clip, SequencePlan};

/// Join clips in order, re-encoding the result.
pub async fn concatenate(ctx: &JobContext, job: &ConcatenateJob) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let inputs = fetch_all(ctx, &job.video_uris).await?;

    let list = ctx.scratch_path("concat_list.txt");
    write_concat_list(&list, &inputs).await?;

    let output = ctx.scratch_path(filename);
    let cmd = FfmpegCommand::new(&list, &output)
        .concat_demuxer()
        .encoder(&ctx.delivery)
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
        .faststart();
    ctx.run_ffmpeg("concatenate", &cmd).await?;

    let published = ctx.publish(&output, &job.path, filename).await?;
    Ok(OperationOutcome::single(
        published,
        Diagnostics {
            clip_count: Some(inputs.len()),
            ..Default::default()
        },
    ))
}

/// Cycle through the clips until they cover the audio track exactly, then
/// lay the audio over them.
pub async fn concat_with_audio_cycle(
    ctx: &JobContext,
    job: &ConcatWithAudioCycleJob,
) -> WorkerResult<OperationOutcome> {
    let filename = checked_filename(&job.output_filename)?;
    let inputs = fetch_all(ctx, &job.video_uris).await?;
    let audio = ctx.fetch(&job.audio_uri, "audio.mp3").await?;

    let target = probe_duration(&audio).await?;
    let mut clips = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let duration = probe_duration(input).await?;
        info!(clip = %clip_name(input), duration, "Measured clip");
        clips.push(Clip::new(input, duration));
    }

    let mut plan = plan_sequence(&clips, target)?;

    let sources = if job.normalize {
        normalize_all(ctx, &inputs).await?
    } else {
        inputs.clone()
    };

    let pending_trim = plan.trimmed_segment().map(|s| (s.clip_index, s.duration));
    if let Some((clip_index, requested)) = pending_trim {
        let trimmed = trim_last(ctx, &sources[clip_index], requested, job.normalize).await?;
        plan.materialize_trim(trimmed);
    }

    let list = ctx.scratch_path("concat_list.txt");
    write_concat_list(&list, &playlist(&plan, &sources)).await?;

    let output = ctx.scratch_path(filename);
    let cmd = FfmpegCommand::new(&list, &output)
        .concat_demuxer()
        .input(&audio)
        .video_codec("copy")
        .audio_codec("copy")
        .map("0:v:0")
        .map("1:a:0")
        .shortest()
        .faststart();
    ctx.run_ffmpeg("assemble", &cmd).await?;

    let final_duration = probe_duration(&output).await?;
    let delta_ms = verify_duration(target, final_duration);
    metrics::record_duration_drift(delta_ms);

    let published = ctx.publish(&output, &job.path, filename).await?;
    Ok(OperationOutcome::single(
        published,
        Diagnostics {
            video_duration: Some(final_duration),
            audio_duration: Some(target),
            segment_count: Some(plan.segment_count()),
            full_cycles: Some(plan.full_cycles()),
            partial_cycle: Some(plan.partial_cycle()),
            duration_delta_ms: Some((delta_ms * 10.0).round() / 10.0),
            clip_count: Some(clips.len()),
            ..Default::default()
        },
    ))
}

async fn fetch_all(ctx: &JobContext, references: &[String]) -> WorkerResult<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(references.len());
    for (i, reference) in references.iter().enumerate() {
        paths.push(ctx.fetch(reference, &format!("input_{}.mp4", i)).await?);
    }
    info!(count = paths.len(), "Downloaded clips");
    Ok(paths)
}

/// Re-encode every clip to 1920x1080, 30 fps, H.264 High 4.0, no audio, so
/// the assembly can stream-copy.
async fn normalize_all(ctx: &JobContext, inputs: &[PathBuf]) -> WorkerResult<Vec<PathBuf>> {
    let mut normalized = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let output = ctx.scratch_path(&format!("normalized_{}.mp4", i));
        let cmd = FfmpegCommand::new(input, &output)
            .video_filter(FILTER_NORMALIZE)
            .frame_rate(NORMALIZED_FPS)
            .encoder(&EncoderProfile::X264Uniform)
            .no_audio()
            .faststart();
        ctx.run_ffmpeg("normalize", &cmd).await?;
        normalized.push(output);
    }
    ctx.logger
        .log_progress(&format!("Normalized {} clips", normalized.len()));
    Ok(normalized)
}

/// Cut `source` to `duration` seconds with the same encoding as the other
/// segments, and measure the result.
async fn trim_last(
    ctx: &JobContext,
    source: &Path,
    duration: f64,
    normalize: bool,
) -> WorkerResult<Clip> {
    let output = ctx.scratch_path("trimmed_last.mp4");
    let cmd = trim_command(source, &output, duration, normalize);
    ctx.run_ffmpeg("trim", &cmd).await?;

    let actual = probe_duration(&output).await?;
    info!(
        requested = duration,
        actual,
        "Trimmed final segment: requested {:.3}s, actual {:.3}s",
        duration,
        actual
    );

    Ok(Clip {
        path: output,
        duration: actual,
        trimmed: true,
    })
}

fn trim_command(source: &Path, output: &Path, duration: f64, normalize: bool) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(source, output).duration(duration);
    let cmd = if normalize {
        cmd.video_filter(FILTER_NORMALIZE)
            .frame_rate(NORMALIZED_FPS)
            .encoder(&EncoderProfile::X264Uniform)
            .no_audio()
    } else {
        cmd.encoder(&EncoderProfile::X264Uniform)
            .audio_codec(AUDIO_CODEC)
            .output_args(["-ar", "48000", "-ac", "2"])
            .audio_bitrate(AUDIO_BITRATE)
    };
    cmd.faststart()
}

/// Files to concatenate: each segment's source clip, or the trimmed copy
/// for the final segment.
fn playlist(plan: &SequencePlan, sources: &[PathBuf]) -> Vec<PathBuf> {
    plan.segments()
        .iter()
        .map(|segment| {
            if segment.clip.trimmed {
                segment.clip.path.clone()
            } else {
                sources[segment.clip_index].clone()
            }
        })
        .collect()
}

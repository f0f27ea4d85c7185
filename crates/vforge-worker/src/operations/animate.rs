//! Still image to animated clip, in batches.

use std::sync::Arc;
use tracing::{debug, info};
use vforge_media::filters::{build_animation_filter, OUTPUT_HEIGHT, OUTPUT_WIDTH};
use vforge_media::probe::probe_dimensions;
use vforge_media::{EncoderProfile, FfmpegCommand};
use vforge_models::{
    AnimateImageBatchJob, BatchItemOutput, BatchOutput, Diagnostics, ImageItem, JobResult,
    ZoomVariant,
};

use super::{JobContext, OperationOutcome};
use crate::batch::{chunk_count, global_index, run_batch};
use crate::distribute::{distribute_seeded, variant_counts};
use crate::error::WorkerResult;
use crate::metrics;

/// One image with its assigned motion and output number.
#[derive(Debug, Clone)]
struct AnimationTask {
    image: ImageItem,
    variant: ZoomVariant,
    global_index: usize,
}

/// Animate every image of the job, `ctx.batch_concurrency` at a time.
pub async fn animate_image_batch(
    ctx: &JobContext,
    job: &AnimateImageBatchJob,
) -> WorkerResult<OperationOutcome> {
    let total = job.images.len();
    let concurrency = ctx.batch_concurrency.max(1);
    let variants = distribute_seeded(&job.variants, total, job.seed);
    let counts = variant_counts(&variants);

    metrics::set_batch_concurrency(concurrency);
    info!(
        total,
        concurrency,
        frame_rate = job.frame_rate,
        start_index = job.start_index,
        distribution = ?counts,
        "Animating image batch"
    );

    let tasks: Vec<AnimationTask> = job
        .images
        .iter()
        .cloned()
        .zip(variants)
        .enumerate()
        .map(|(i, (image, variant))| AnimationTask {
            image,
            variant,
            global_index: global_index(job.start_index, i),
        })
        .collect();

    let shared = Arc::new(ctx.clone());
    let prefix: Arc<str> = Arc::from(job.path.as_str());
    let frame_rate = job.frame_rate;

    let items = run_batch(tasks, concurrency, move |_, task| {
        let ctx = Arc::clone(&shared);
        let prefix = Arc::clone(&prefix);
        async move { animate_one(&ctx, task, frame_rate, &prefix).await }
    })
    .await?;

    ctx.logger
        .log_progress(&format!("{} of {} images animated", items.len(), total));

    Ok(OperationOutcome {
        result: JobResult::Batch(BatchOutput::new(total, items)),
        diagnostics: Diagnostics {
            clip_count: Some(total),
            chunk_count: Some(chunk_count(total, concurrency)),
            concurrency: Some(concurrency),
            variant_counts: counts,
            ..Default::default()
        },
    })
}

async fn animate_one(
    ctx: &JobContext,
    task: AnimationTask,
    frame_rate: u32,
    prefix: &str,
) -> WorkerResult<BatchItemOutput> {
    let filename = format!("video_{}.mp4", task.global_index);
    let image_path = ctx
        .fetch(&task.image.source_uri, &format!("image_{}.jpg", task.global_index))
        .await?;

    let size = match probe_dimensions(&image_path).await {
        Ok(Some(size)) => size,
        _ => {
            debug!(id = %task.image.id, "Image dimensions unknown, assuming 1920x1080");
            (OUTPUT_WIDTH, OUTPUT_HEIGHT)
        }
    };

    let output = ctx.scratch_path(&filename);
    let fps = frame_rate.to_string();
    let cmd = FfmpegCommand::new(&image_path, &output)
        .input_args(["-framerate", fps.as_str(), "-loop", "1"])
        .video_filter(build_animation_filter(
            task.variant,
            size,
            frame_rate,
            task.image.duration,
        ))
        .encoder(&EncoderProfile::for_animation())
        .output_args(["-threads", "0"])
        .duration(task.image.duration);

    ctx.run_ffmpeg("animate", &cmd).await?;
    tokio::fs::remove_file(&image_path).await.ok();

    let published = ctx.publish(&output, prefix, &filename).await?;
    tokio::fs::remove_file(&output).await.ok();

    metrics::record_batch_item(task.variant.as_str());
    info!(
        id = %task.image.id,
        index = task.global_index,
        variant = %task.variant,
        "Animated {}", filename
    );

    Ok(BatchItemOutput {
        id: task.image.id,
        index: task.global_index,
        output_uri: published.output_uri,
        filename,
        storage_key: published.storage_key,
        variant: task.variant,
    })
}

//! Shared data models for the vforge media worker.
//!
//! This crate provides Serde-serializable types for:
//! - Job requests (one variant per operation) and their validation
//! - Job results and diagnostics
//! - Animation variants for image batches
//! - Caption styles for subtitle rendering
//! - Per-job object store overrides

pub mod caption;
pub mod job;
pub mod output;
pub mod storage;
pub mod variant;

// Re-export common types
pub use caption::{HighlightStyle, RgbColor, SegmentsStyle};
pub use job::{
    AddAudioJob, AddSoundtrackJob, AnimateImageBatchJob, CaptionHighlightJob, CaptionJob,
    CaptionSegmentsJob, ConcatWithAudioCycleJob, ConcatenateJob, ImageItem, JobEnvelope, JobId,
    JobRequest, Operation,
};
pub use output::{AudioAnalysis, BatchItemOutput, BatchOutput, Diagnostics, JobOutput, JobResult, OutputRef};
pub use storage::S3Overrides;
pub use variant::{VariantParseError, ZoomVariant};

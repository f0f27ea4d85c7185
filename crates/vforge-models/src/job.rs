//! Job requests accepted by the worker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{HighlightStyle, S3Overrides, SegmentsStyle, ZoomVariant};

/// Default frame rate for animated images.
pub const DEFAULT_FRAME_RATE: u32 = 24;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job as received by the worker: the operation plus job-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobEnvelope {
    /// Caller-supplied ID, generated when absent
    #[serde(default)]
    pub job_id: JobId,

    /// Object store credentials for this job only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_config: Option<S3Overrides>,

    #[serde(flatten)]
    pub request: JobRequest,
}

/// Operation discriminant, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AnimateImageBatch,
    Caption,
    CaptionSegments,
    CaptionHighlight,
    AddAudio,
    AddSoundtrack,
    Concatenate,
    ConcatWithAudioCycle,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AnimateImageBatch => "animate_image_batch",
            Operation::Caption => "caption",
            Operation::CaptionSegments => "caption_segments",
            Operation::CaptionHighlight => "caption_highlight",
            Operation::AddAudio => "add_audio",
            Operation::AddSoundtrack => "add_soundtrack",
            Operation::Concatenate => "concatenate",
            Operation::ConcatWithAudioCycle => "concat_with_audio_cycle",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The operation-specific part of a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum JobRequest {
    AnimateImageBatch(AnimateImageBatchJob),
    Caption(CaptionJob),
    CaptionSegments(CaptionSegmentsJob),
    CaptionHighlight(CaptionHighlightJob),
    AddAudio(AddAudioJob),
    AddSoundtrack(AddSoundtrackJob),
    Concatenate(ConcatenateJob),
    ConcatWithAudioCycle(ConcatWithAudioCycleJob),
}

impl JobRequest {
    pub fn operation(&self) -> Operation {
        match self {
            JobRequest::AnimateImageBatch(_) => Operation::AnimateImageBatch,
            JobRequest::Caption(_) => Operation::Caption,
            JobRequest::CaptionSegments(_) => Operation::CaptionSegments,
            JobRequest::CaptionHighlight(_) => Operation::CaptionHighlight,
            JobRequest::AddAudio(_) => Operation::AddAudio,
            JobRequest::AddSoundtrack(_) => Operation::AddSoundtrack,
            JobRequest::Concatenate(_) => Operation::Concatenate,
            JobRequest::ConcatWithAudioCycle(_) => Operation::ConcatWithAudioCycle,
        }
    }

    /// Validate required fields before any work starts.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            JobRequest::AnimateImageBatch(job) => job.validate(),
            JobRequest::Caption(job) => {
                require_fields(&[
                    ("video_uri", &job.video_uri),
                    ("subtitle_uri", &job.subtitle_uri),
                    ("path", &job.path),
                    ("output_filename", &job.output_filename),
                ])
            }
            JobRequest::CaptionSegments(job) => require_fields(&[
                ("video_uri", &job.video_uri),
                ("subtitle_uri", &job.subtitle_uri),
                ("path", &job.path),
                ("output_filename", &job.output_filename),
            ]),
            JobRequest::CaptionHighlight(job) => require_fields(&[
                ("video_uri", &job.video_uri),
                ("words_uri", &job.words_uri),
                ("path", &job.path),
                ("output_filename", &job.output_filename),
            ]),
            JobRequest::AddAudio(job) => require_fields(&[
                ("video_uri", &job.video_uri),
                ("audio_uri", &job.audio_uri),
                ("path", &job.path),
                ("output_filename", &job.output_filename),
            ]),
            JobRequest::AddSoundtrack(job) => job.validate(),
            JobRequest::Concatenate(job) => job.validate(),
            JobRequest::ConcatWithAudioCycle(job) => job.validate(),
        }
    }
}

/// Report every blank field at once, in declaration order.
fn require_fields(fields: &[(&str, &String)]) -> Result<(), String> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("Missing required fields: {}", missing.join(", ")))
    }
}

/// A still image to animate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ImageItem {
    pub id: String,
    pub source_uri: String,
    /// Clip length in seconds
    pub duration: f64,
}

/// Turn a batch of still images into short animated clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnimateImageBatchJob {
    pub images: Vec<ImageItem>,
    /// Variants distributed across the images
    pub variants: Vec<ZoomVariant>,
    /// Output key prefix
    pub path: String,
    pub frame_rate: u32,
    /// Offset for output numbering when several workers share one batch
    pub start_index: usize,
    /// Fixes the variant shuffle order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AnimateImageBatchJob {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            variants: vec![ZoomVariant::ZoomIn],
            path: String::new(),
            frame_rate: DEFAULT_FRAME_RATE,
            start_index: 0,
            seed: None,
        }
    }
}

impl AnimateImageBatchJob {
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.images.is_empty() {
            missing.push("images");
        }
        if self.path.trim().is_empty() {
            missing.push("path");
        }
        if !missing.is_empty() {
            return Err(format!("Missing required fields: {}", missing.join(", ")));
        }
        if self.frame_rate == 0 {
            return Err("frame_rate must be positive".to_string());
        }
        for (i, image) in self.images.iter().enumerate() {
            if image.id.trim().is_empty() || image.source_uri.trim().is_empty() {
                return Err(format!("images[{}]: id and source_uri are required", i));
            }
            if !(image.duration.is_finite() && image.duration > 0.0) {
                return Err(format!(
                    "images[{}]: duration must be a positive number of seconds",
                    i
                ));
            }
        }
        Ok(())
    }
}

/// Burn an SRT file into a video with the engine's subtitle renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionJob {
    pub video_uri: String,
    pub subtitle_uri: String,
    pub path: String,
    pub output_filename: String,
    /// ASS `force_style` override string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_style: Option<String>,
}

/// Burn sentence-level captions rendered from SRT with a custom style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionSegmentsJob {
    pub video_uri: String,
    pub subtitle_uri: String,
    pub path: String,
    pub output_filename: String,
    pub style: SegmentsStyle,
}

/// Burn word-level highlight captions rendered from a words JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionHighlightJob {
    pub video_uri: String,
    pub words_uri: String,
    pub path: String,
    pub output_filename: String,
    pub style: HighlightStyle,
}

/// Replace a video's audio, retiming the video to the audio's length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AddAudioJob {
    pub video_uri: String,
    pub audio_uri: String,
    pub path: String,
    pub output_filename: String,
}

/// Mix a looped background track under a video's own audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AddSoundtrackJob {
    pub video_uri: String,
    pub soundtrack_uri: String,
    pub path: String,
    pub output_filename: String,
    /// Attenuation in dB; computed from measured loudness when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_reduction_db: Option<f64>,
}

impl AddSoundtrackJob {
    pub fn validate(&self) -> Result<(), String> {
        require_fields(&[
            ("video_uri", &self.video_uri),
            ("soundtrack_uri", &self.soundtrack_uri),
            ("path", &self.path),
            ("output_filename", &self.output_filename),
        ])?;
        match self.volume_reduction_db {
            Some(db) if !db.is_finite() || db < 0.0 => {
                Err("volume_reduction_db must be a non-negative number".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Join clips back to back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConcatenateJob {
    pub video_uris: Vec<String>,
    pub path: String,
    pub output_filename: String,
}

impl ConcatenateJob {
    pub fn validate(&self) -> Result<(), String> {
        if self.video_uris.is_empty() {
            return Err("Missing required fields: video_uris".to_string());
        }
        require_fields(&[("path", &self.path), ("output_filename", &self.output_filename)])?;
        if self.video_uris.len() < 2 {
            return Err("At least 2 videos are required for concatenation".to_string());
        }
        if self.video_uris.iter().any(|u| u.trim().is_empty()) {
            return Err("video_uris must not contain blank entries".to_string());
        }
        Ok(())
    }
}

/// Replay clips cyclically until they cover an audio track exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConcatWithAudioCycleJob {
    pub video_uris: Vec<String>,
    pub audio_uri: String,
    pub path: String,
    pub output_filename: String,
    /// Re-encode every clip to one format so the assembly can stream-copy
    pub normalize: bool,
}

impl Default for ConcatWithAudioCycleJob {
    fn default() -> Self {
        Self {
            video_uris: Vec::new(),
            audio_uri: String::new(),
            path: String::new(),
            output_filename: String::new(),
            normalize: true,
        }
    }
}

impl ConcatWithAudioCycleJob {
    pub fn validate(&self) -> Result<(), String> {
        if self.video_uris.is_empty() {
            return Err("Missing required fields: video_uris".to_string());
        }
        require_fields(&[
            ("audio_uri", &self.audio_uri),
            ("path", &self.path),
            ("output_filename", &self.output_filename),
        ])?;
        if self.video_uris.iter().any(|u| u.trim().is_empty()) {
            return Err("video_uris must not contain blank entries".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_batch_job() {
        let json = r#"{
            "operation": "animate_image_batch",
            "images": [{"id": "a", "source_uri": "https://x/a.jpg", "duration": 3}],
            "variants": ["zoomin", "zoompanright"],
            "path": "channel/videos/temp/",
            "start_index": 10
        }"#;

        let envelope: JobEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.request.operation(), Operation::AnimateImageBatch);
        assert!(envelope.s3_config.is_none());

        let JobRequest::AnimateImageBatch(job) = envelope.request else {
            panic!("wrong variant");
        };
        assert_eq!(job.frame_rate, DEFAULT_FRAME_RATE);
        assert_eq!(job.start_index, 10);
        assert_eq!(job.images[0].duration, 3.0);
        assert_eq!(job.variants, vec![ZoomVariant::ZoomIn, ZoomVariant::ZoomPanRight]);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_envelope_carries_storage_overrides() {
        let json = r#"{
            "job_id": "job-1",
            "operation": "add_audio",
            "s3_config": {"bucket_name": "other"},
            "video_uri": "v", "audio_uri": "a", "path": "p/", "output_filename": "o.mp4"
        }"#;

        let envelope: JobEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.job_id.as_str(), "job-1");
        let overrides = envelope.s3_config.unwrap();
        assert_eq!(overrides.bucket_name.as_deref(), Some("other"));
        assert!(overrides.endpoint_url.is_none());
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let request = JobRequest::Caption(CaptionJob {
            video_uri: "v".to_string(),
            ..Default::default()
        });
        let err = request.validate().unwrap_err();
        assert_eq!(
            err,
            "Missing required fields: subtitle_uri, path, output_filename"
        );
    }

    #[test]
    fn test_concatenate_requires_two_videos() {
        let job = ConcatenateJob {
            video_uris: vec!["a".to_string()],
            path: "p/".to_string(),
            output_filename: "out.mp4".to_string(),
        };
        assert!(job.validate().unwrap_err().contains("At least 2"));
    }

    #[test]
    fn test_cycle_job_defaults_to_normalize() {
        let json = r#"{"operation": "concat_with_audio_cycle", "video_uris": ["a"], "audio_uri": "m", "path": "p", "output_filename": "f.mp4"}"#;
        let envelope: JobEnvelope = serde_json::from_str(json).unwrap();
        let JobRequest::ConcatWithAudioCycle(job) = envelope.request else {
            panic!("wrong variant");
        };
        assert!(job.normalize);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_batch_names_only_missing_fields() {
        let image = ImageItem {
            id: "1".to_string(),
            source_uri: "u".to_string(),
            duration: 2.0,
        };
        let no_path = AnimateImageBatchJob {
            images: vec![image],
            ..Default::default()
        };
        assert_eq!(no_path.validate().unwrap_err(), "Missing required fields: path");

        let no_images = AnimateImageBatchJob {
            path: "p/".to_string(),
            ..Default::default()
        };
        assert_eq!(no_images.validate().unwrap_err(), "Missing required fields: images");

        let empty = AnimateImageBatchJob::default();
        assert_eq!(empty.validate().unwrap_err(), "Missing required fields: images, path");
    }

    #[test]
    fn test_image_duration_must_be_positive() {
        let job = AnimateImageBatchJob {
            images: vec![ImageItem {
                id: "1".to_string(),
                source_uri: "u".to_string(),
                duration: 0.0,
            }],
            path: "p/".to_string(),
            ..Default::default()
        };
        assert!(job.validate().unwrap_err().contains("duration"));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let json = r#"{"operation": "explode"}"#;
        assert!(serde_json::from_str::<JobEnvelope>(json).is_err());
    }
}

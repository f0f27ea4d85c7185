//! Job results returned to the caller.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{JobId, Operation, ZoomVariant};

/// A single uploaded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputRef {
    /// Public URL of the uploaded object
    pub output_uri: String,
    pub filename: String,
    pub storage_key: String,
}

/// One processed item of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchItemOutput {
    pub id: String,
    /// Global output index (`start_index + position + 1`)
    pub index: usize,
    pub output_uri: String,
    pub filename: String,
    pub storage_key: String,
    pub variant: ZoomVariant,
}

/// All items of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutput {
    pub total: usize,
    pub processed: usize,
    pub items: Vec<BatchItemOutput>,
}

impl BatchOutput {
    pub fn new(total: usize, items: Vec<BatchItemOutput>) -> Self {
        Self {
            total,
            processed: items.len(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobResult {
    Batch(BatchOutput),
    Single(OutputRef),
}

/// Measured loudness of the two soundtrack inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_mean_volume_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_max_volume_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soundtrack_mean_volume_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soundtrack_max_volume_db: Option<f64>,
}

/// Operation-specific measurements attached to a result.
///
/// Only the fields an operation fills in are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_reduction_db: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loops_applied: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_analysis: Option<AudioAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_cycles: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_cycle: Option<bool>,
    /// Absolute difference between final and target duration, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_delta_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variant_counts: BTreeMap<String, usize>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        *self == Diagnostics::default()
    }
}

/// Final outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobOutput {
    pub job_id: JobId,
    pub operation: Operation,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Diagnostics::is_empty")]
    pub diagnostics: Diagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl JobOutput {
    pub fn success(
        job_id: JobId,
        operation: Operation,
        result: JobResult,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            job_id,
            operation,
            success: true,
            result: Some(result),
            diagnostics,
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(job_id: JobId, operation: Operation, error: impl Into<String>) -> Self {
        Self {
            job_id,
            operation,
            success: false,
            result: None,
            diagnostics: Diagnostics::default(),
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_result_shape() {
        let output = JobOutput::success(
            JobId::from_string("j"),
            Operation::AddAudio,
            JobResult::Single(OutputRef {
                output_uri: "https://s3/bucket/p/out.mp4".to_string(),
                filename: "out.mp4".to_string(),
                storage_key: "p/out.mp4".to_string(),
            }),
            Diagnostics {
                speed_factor: Some(1.25),
                ..Default::default()
            },
        );

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["operation"], "add_audio");
        assert_eq!(value["result"]["storage_key"], "p/out.mp4");
        assert_eq!(value["diagnostics"]["speed_factor"], 1.25);
        assert!(value["diagnostics"].get("video_duration").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_omits_result_and_diagnostics() {
        let output = JobOutput::failure(JobId::new(), Operation::Concatenate, "boom");
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "boom");
        assert!(value.get("result").is_none());
        assert!(value.get("diagnostics").is_none());
    }

    #[test]
    fn test_batch_result_counts_processed() {
        let batch = BatchOutput::new(
            2,
            vec![BatchItemOutput {
                id: "a".to_string(),
                index: 1,
                output_uri: "u".to_string(),
                filename: "video_1.mp4".to_string(),
                storage_key: "p/video_1.mp4".to_string(),
                variant: ZoomVariant::ZoomOut,
            }],
        );
        assert_eq!(batch.processed, 1);

        let value = serde_json::to_value(JobResult::Batch(batch)).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["items"][0]["variant"], "zoomout");
    }
}

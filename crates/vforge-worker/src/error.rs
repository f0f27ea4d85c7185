//! Worker error types.

use thiserror::Error;

use crate::batch::BatchError;
use crate::sequencer::SequencingError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job: {0}")]
    Validation(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Sequencing failed: {0}")]
    Sequencing(#[from] SequencingError),

    #[error("Item {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Media error: {0}")]
    Media(#[from] vforge_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vforge_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Wrap a failing batch item's error with its position in the batch.
    pub fn batch(index: usize, source: WorkerError) -> Self {
        Self::Batch {
            index,
            source: Box::new(source),
        }
    }

    /// Check if the job was rejected before any work started.
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkerError::Validation(_))
    }

    /// Captured FFmpeg stderr, if this error came from a transcode.
    pub fn ffmpeg_stderr(&self) -> Option<&str> {
        match self {
            WorkerError::Media(e) => e.stderr(),
            WorkerError::Batch { source, .. } => source.ffmpeg_stderr(),
            _ => None,
        }
    }
}

impl From<BatchError<WorkerError>> for WorkerError {
    fn from(err: BatchError<WorkerError>) -> Self {
        match err {
            BatchError::ItemFailed { index, error } => WorkerError::batch(index, error),
            BatchError::TaskPanicked { index, message } => WorkerError::batch(
                index,
                WorkerError::processing_failed(format!("task panicked: {}", message)),
            ),
        }
    }
}

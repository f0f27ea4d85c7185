//! FFmpeg CLI wrapper for the vforge media worker.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner that captures stderr, enforces an optional timeout and
//!   rejects empty outputs
//! - FFprobe duration and dimension probing
//! - Filter builders (zoompan animation, normalization, subtitles, audio mixing)
//! - ASS subtitle rendering from SRT cues and word timings
//! - Encoder profile selection (NVENC or libx264)

pub mod audio;
pub mod command;
pub mod concat;
pub mod encoding;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;
pub mod subtitles;

pub use audio::{analyze_volume, VolumeStats};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::write_concat_list;
pub use encoding::{detect_gpu, EncoderProfile};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::FfmpegProgress;

//! Video encoder profiles.

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Rate cap shared by every delivery profile
pub const MAX_RATE: &str = "10M";
pub const BUFFER_SIZE: &str = "20M";

/// Audio settings for re-encoded outputs
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "192k";

/// H.264 encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderProfile {
    /// NVIDIA hardware encoder
    Nvenc,
    /// libx264 at the given preset
    X264 { preset: &'static str },
    /// libx264 with a fixed High 4.0 / yuv420p output, so clips can be
    /// joined with stream copy
    X264Uniform,
}

impl EncoderProfile {
    /// Profile for caption, audio and concatenation re-encodes.
    pub fn for_delivery(gpu_available: bool) -> Self {
        if gpu_available {
            Self::Nvenc
        } else {
            Self::X264 { preset: "medium" }
        }
    }

    /// Profile for image animation; short clips encode faster on the CPU
    /// than NVENC can initialize.
    pub fn for_animation() -> Self {
        Self::X264 { preset: "veryfast" }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            Self::Nvenc => "h264_nvenc",
            Self::X264 { .. } | Self::X264Uniform => "libx264",
        }
    }

    /// FFmpeg output arguments for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            Self::Nvenc => vec![
                "-c:v", "h264_nvenc", "-preset", "p4", "-tune", "hq", "-rc:v", "vbr", "-cq:v",
                "23", "-b:v", "0", "-maxrate", MAX_RATE, "-bufsize", BUFFER_SIZE,
            ],
            Self::X264 { preset } => vec![
                "-c:v", "libx264", "-preset", *preset, "-crf", "23", "-maxrate", MAX_RATE,
                "-bufsize", BUFFER_SIZE,
            ],
            Self::X264Uniform => vec![
                "-c:v", "libx264", "-preset", "veryfast", "-profile:v", "high", "-level", "4.0",
                "-pix_fmt", "yuv420p",
            ],
        };
        args.into_iter().map(String::from).collect()
    }
}

/// Whether an NVIDIA GPU is usable, judged by `nvidia-smi` succeeding.
pub async fn detect_gpu() -> bool {
    if which::which("nvidia-smi").is_err() {
        debug!("nvidia-smi not found, using CPU encoding");
        return false;
    }

    let available = Command::new("nvidia-smi")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false);

    info!(gpu_available = available, "GPU detection complete");
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_profile_follows_gpu() {
        assert_eq!(EncoderProfile::for_delivery(true).codec(), "h264_nvenc");
        assert_eq!(EncoderProfile::for_delivery(false).codec(), "libx264");
    }

    #[test]
    fn test_nvenc_uses_constant_quality() {
        let args = EncoderProfile::Nvenc.video_args();
        assert!(args.windows(2).any(|w| w == ["-cq:v", "23"]));
        assert!(args.windows(2).any(|w| w == ["-maxrate", "10M"]));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_animation_profile_is_veryfast() {
        let args = EncoderProfile::for_animation().video_args();
        assert!(args.windows(2).any(|w| w == ["-preset", "veryfast"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
    }

    #[test]
    fn test_uniform_profile_pins_format() {
        let args = EncoderProfile::X264Uniform.video_args();
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-level", "4.0"]));
    }
}

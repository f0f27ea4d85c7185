//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds, when the container or a stream reports one
    pub duration: Option<f64>,
    /// Width of the first video stream
    pub width: Option<u32>,
    /// Height of the first video stream
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        duration: resolve_duration(&probe),
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        has_video: video_stream.is_some(),
        has_audio,
    })
}

/// Container duration, else the first stream duration, else size / bitrate.
fn resolve_duration(probe: &FfprobeOutput) -> Option<f64> {
    let positive = |v: f64| (v.is_finite() && v > 0.0).then_some(v);
    let parse = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<f64>().ok());

    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| parse(&f.duration))
        .and_then(positive);

    let stream_duration = || {
        probe
            .streams
            .iter()
            .filter_map(|s| parse(&s.duration))
            .find_map(positive)
    };

    let estimated = || {
        let format = probe.format.as_ref()?;
        let size = parse(&format.size)?;
        let bit_rate = parse(&format.bit_rate)?;
        if bit_rate <= 0.0 {
            return None;
        }
        positive(size * 8.0 / bit_rate)
    };

    format_duration.or_else(stream_duration).or_else(estimated)
}

/// Get a media file's duration in seconds; fails when none can be determined.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    probe_media(path).await?.duration.ok_or_else(|| {
        MediaError::invalid_media(format!("could not determine duration of {}", path.display()))
    })
}

/// Pixel dimensions of an image or video, if FFprobe reports them.
pub async fn probe_dimensions(path: impl AsRef<Path>) -> MediaResult<Option<(u32, u32)>> {
    let info = probe_media(path).await?;
    Ok(match (info.width, info.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    })
}

//! Loudness analysis and soundtrack mixing parameters.

use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::warn;

use crate::command::check_ffmpeg;
use crate::error::MediaResult;

/// Soundtrack level relative to the video's own audio, in dB.
pub const SOUNDTRACK_OFFSET_DB: f64 = 20.0;
/// Bounds for the computed attenuation.
pub const MIN_REDUCTION_DB: f64 = 0.0;
pub const MAX_REDUCTION_DB: f64 = 40.0;
/// Mean volume assumed when volumedetect reports nothing.
pub const FALLBACK_MEAN_DB: f64 = -20.0;

/// Output of FFmpeg's `volumedetect` filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeStats {
    pub mean_db: Option<f64>,
    pub max_db: Option<f64>,
}

static MEAN_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mean_volume:\s*(-?[\d.]+|-inf)\s*dB").unwrap());
static MAX_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"max_volume:\s*(-?[\d.]+|-inf)\s*dB").unwrap());

/// Extract mean and max volume from volumedetect output.
pub fn parse_volumedetect(output: &str) -> VolumeStats {
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    VolumeStats {
        mean_db: capture(&MEAN_VOLUME),
        max_db: capture(&MAX_VOLUME),
    }
}

/// Measure a file's loudness. Analysis problems degrade to empty stats
/// rather than failing the job.
pub async fn analyze_volume(path: impl AsRef<Path>) -> MediaResult<VolumeStats> {
    check_ffmpeg()?;
    let path = path.as_ref();

    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-i")
        .arg(path)
        .args(["-af", "volumedetect", "-vn", "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let stats = parse_volumedetect(&text);
    if stats.mean_db.is_none() {
        warn!(path = %path.display(), "Could not extract mean_volume from volumedetect output");
    }
    Ok(stats)
}

/// Attenuation that puts the soundtrack [`SOUNDTRACK_OFFSET_DB`] below the
/// video's audio, clamped to `[0, 40]` dB.
pub fn compute_reduction_db(video_mean_db: Option<f64>, soundtrack_mean_db: Option<f64>) -> f64 {
    let video = video_mean_db.unwrap_or(FALLBACK_MEAN_DB);
    let soundtrack = soundtrack_mean_db.unwrap_or(FALLBACK_MEAN_DB);
    (soundtrack - video + SOUNDTRACK_OFFSET_DB).clamp(MIN_REDUCTION_DB, MAX_REDUCTION_DB)
}

/// `aloop` count so the soundtrack covers the whole video.
pub fn loops_needed(video_duration: f64, soundtrack_duration: f64) -> u32 {
    if soundtrack_duration <= 0.0 || !video_duration.is_finite() {
        return 1;
    }
    (video_duration / soundtrack_duration).floor() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[Parsed_volumedetect_0 @ 0x5581] n_samples: 2646000
[Parsed_volumedetect_0 @ 0x5581] mean_volume: -27.3 dB
[Parsed_volumedetect_0 @ 0x5581] max_volume: -4.1 dB
[Parsed_volumedetect_0 @ 0x5581] histogram_4db: 12";

    #[test]
    fn test_parse_volumedetect() {
        let stats = parse_volumedetect(SAMPLE);
        assert_eq!(stats.mean_db, Some(-27.3));
        assert_eq!(stats.max_db, Some(-4.1));
    }

    #[test]
    fn test_parse_volumedetect_missing() {
        assert_eq!(parse_volumedetect("no audio stream"), VolumeStats::default());
        assert_eq!(parse_volumedetect("mean_volume: -inf dB").mean_db, None);
    }

    #[test]
    fn test_reduction_puts_soundtrack_below_video() {
        // Soundtrack at -14 dB, video at -22 dB: 8 dB louder, so 28 dB down.
        assert!((compute_reduction_db(Some(-22.0), Some(-14.0)) - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduction_is_clamped() {
        assert_eq!(compute_reduction_db(Some(-5.0), Some(-60.0)), 0.0);
        assert_eq!(compute_reduction_db(Some(-60.0), Some(-5.0)), 40.0);
        // Both unknown: same fallback on each side
        assert_eq!(compute_reduction_db(None, None), 20.0);
    }

    #[test]
    fn test_loops_needed() {
        assert_eq!(loops_needed(60.0, 25.0), 3);
        assert_eq!(loops_needed(50.0, 25.0), 3);
        assert_eq!(loops_needed(10.0, 25.0), 1);
        assert_eq!(loops_needed(10.0, 0.0), 1);
    }
}

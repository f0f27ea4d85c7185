//! FFmpeg filter definitions.

use std::path::Path;
use vforge_models::ZoomVariant;

/// Delivery resolution for animated and normalized clips.
pub const OUTPUT_WIDTH: u32 = 1920;
pub const OUTPUT_HEIGHT: u32 = 1080;

/// Frame rate every clip is normalized to before stream-copy assembly.
pub const NORMALIZED_FPS: u32 = 30;

/// Source images are upscaled by this factor before zoompan so sub-pixel
/// motion stays smooth.
pub const UPSCALE_FACTOR: u32 = 6;

/// Fit inside 1920x1080 and letterbox to exactly 1920x1080.
pub const FILTER_NORMALIZE: &str = concat!(
    "scale=1920:1080:force_original_aspect_ratio=decrease,",
    "pad=1920:1080:(ow-iw)/2:(oh-ih)/2:black"
);

/// Zoom range for the zoom-in and pan variants.
const ZOOM_IN_START: f64 = 1.0;
const ZOOM_IN_END: f64 = 1.4;
/// Zoom range for the zoom-out variant.
const ZOOM_OUT_START: f64 = 1.35;
const ZOOM_OUT_END: f64 = 1.0;

const CENTER_X: &str = "iw/2-(iw/zoom/2)";
const CENTER_Y: &str = "ih/2-(ih/zoom/2)";

/// zoompan expressions for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomMotion {
    pub zoom: String,
    pub x: String,
    pub y: String,
}

type MotionBuilder = fn(total_frames: f64) -> ZoomMotion;

/// Indexed by [`ZoomVariant::index`].
const MOTIONS: [MotionBuilder; 3] = [zoom_in_motion, zoom_out_motion, zoom_pan_right_motion];

fn zoom_in_motion(total_frames: f64) -> ZoomMotion {
    ZoomMotion {
        zoom: format!(
            "min({:.2}+{:.2}*on/{},{:.2})",
            ZOOM_IN_START,
            ZOOM_IN_END - ZOOM_IN_START,
            total_frames,
            ZOOM_IN_END
        ),
        x: CENTER_X.to_string(),
        y: CENTER_Y.to_string(),
    }
}

fn zoom_out_motion(total_frames: f64) -> ZoomMotion {
    ZoomMotion {
        zoom: format!(
            "max({:.2}-{:.2}*on/{},{:.2})",
            ZOOM_OUT_START,
            ZOOM_OUT_START - ZOOM_OUT_END,
            total_frames,
            ZOOM_OUT_END
        ),
        x: CENTER_X.to_string(),
        y: CENTER_Y.to_string(),
    }
}

/// Zooms in while x travels from the left edge (0) to the right edge.
fn zoom_pan_right_motion(total_frames: f64) -> ZoomMotion {
    ZoomMotion {
        x: format!("(iw-ow/zoom)*on/{}", total_frames),
        ..zoom_in_motion(total_frames)
    }
}

/// zoompan expressions for `variant` over `total_frames` frames.
pub fn zoom_motion(variant: ZoomVariant, total_frames: f64) -> ZoomMotion {
    MOTIONS[variant.index()](total_frames)
}

/// Full video filter turning a looped still image into an animated clip.
///
/// `source_size` is the image's pixel size; the frame count is kept
/// fractional so the motion ends exactly at the clip's last frame.
pub fn build_animation_filter(
    variant: ZoomVariant,
    source_size: (u32, u32),
    frame_rate: u32,
    duration: f64,
) -> String {
    let total_frames = f64::from(frame_rate) * duration;
    let motion = zoom_motion(variant, total_frames);
    let (width, height) = source_size;

    format!(
        "scale={}:{}:flags=lanczos,\
         zoompan=z='{}':d={}:x='{}':y='{}':s={}x{}:fps={},\
         scale={}:{}:flags=bicubic,\
         format=nv12",
        width * UPSCALE_FACTOR,
        height * UPSCALE_FACTOR,
        motion.zoom,
        total_frames,
        motion.x,
        motion.y,
        OUTPUT_WIDTH,
        OUTPUT_HEIGHT,
        frame_rate,
        OUTPUT_WIDTH,
        OUTPUT_HEIGHT,
    )
}

/// Escape a path for use inside a quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Burn an SRT file with the engine's subtitle renderer.
pub fn subtitles_filter(srt_path: &Path, force_style: Option<&str>) -> String {
    let path = escape_filter_path(srt_path);
    match force_style.filter(|s| !s.trim().is_empty()) {
        Some(style) => format!("subtitles=filename='{}':force_style='{}'", path, style),
        None => format!("subtitles=filename='{}'", path),
    }
}

/// Burn a rendered ASS file.
pub fn ass_filter(ass_path: &Path) -> String {
    format!("ass='{}'", escape_filter_path(ass_path))
}

/// Retime input 0's video so it lasts `duration / speed_factor`.
pub fn retime_filter(speed_factor: f64) -> String {
    format!("[0:v]setpts={:.6}*PTS[vout]", 1.0 / speed_factor)
}

/// Loop input 1's audio `loops` times, attenuate it and mix it under
/// input 0's audio, ending with the video's audio.
pub fn soundtrack_filter(loops: u32, reduction_db: f64) -> String {
    format!(
        "[1:a]aloop=loop={}:size=2e+09[loop];\
         [loop]volume=-{:.2}dB[reduced];\
         [0:a][reduced]amix=inputs=2:duration=first[aout]",
        loops, reduction_db
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_zoom_in_formula() {
        let motion = zoom_motion(ZoomVariant::ZoomIn, 72.0);
        assert_eq!(motion.zoom, "min(1.00+0.40*on/72,1.40)");
        assert_eq!(motion.x, CENTER_X);
    }

    #[test]
    fn test_zoom_out_formula() {
        let motion = zoom_motion(ZoomVariant::ZoomOut, 79.92);
        assert_eq!(motion.zoom, "max(1.35-0.35*on/79.92,1.00)");
        assert_eq!(motion.y, CENTER_Y);
    }

    #[test]
    fn test_pan_right_starts_at_left_edge() {
        let motion = zoom_motion(ZoomVariant::ZoomPanRight, 48.0);
        assert_eq!(motion.x, "(iw-ow/zoom)*on/48");
        assert!(motion.zoom.starts_with("min("));
    }

    #[test]
    fn test_every_variant_has_a_motion() {
        for variant in ZoomVariant::ALL {
            let motion = zoom_motion(*variant, 24.0);
            assert!(!motion.zoom.is_empty());
        }
    }

    #[test]
    fn test_animation_filter() {
        let filter = build_animation_filter(ZoomVariant::ZoomIn, (800, 600), 24, 3.0);
        assert!(filter.starts_with("scale=4800:3600:flags=lanczos,"));
        assert!(filter.contains(":d=72:"));
        assert!(filter.contains(":s=1920x1080:fps=24,"));
        assert!(filter.ends_with("scale=1920:1080:flags=bicubic,format=nv12"));
    }

    #[test]
    fn test_subtitle_path_escaping() {
        let path = PathBuf::from("/tmp/job:1/it's.srt");
        assert_eq!(
            subtitles_filter(&path, None),
            "subtitles=filename='/tmp/job\\:1/it\\'s.srt'"
        );
        assert_eq!(
            subtitles_filter(&PathBuf::from("/a.srt"), Some("FontSize=24")),
            "subtitles=filename='/a.srt':force_style='FontSize=24'"
        );
        assert_eq!(ass_filter(&PathBuf::from("/w/c.ass")), "ass='/w/c.ass'");
    }

    #[test]
    fn test_retime_filter() {
        // 10s of video stretched to 8s of audio
        assert_eq!(retime_filter(1.25), "[0:v]setpts=0.800000*PTS[vout]");
    }

    #[test]
    fn test_soundtrack_filter() {
        let filter = soundtrack_filter(3, 12.5);
        assert!(filter.contains("aloop=loop=3:size=2e+09"));
        assert!(filter.contains("volume=-12.50dB"));
        assert!(filter.ends_with("amix=inputs=2:duration=first[aout]"));
    }
}

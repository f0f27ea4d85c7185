//! Cyclic clip sequencing.
//!
//! Tiles an ordered clip list, replaying it from the start once exhausted,
//! until the played time reaches a target duration. Only the final segment
//! may be cut short, and the plan's durations sum to the target.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Tolerance for duration comparisons, in seconds.
pub const EPSILON: f64 = 1e-6;

/// Drift between target and assembled duration that is reported as a
/// warning, in milliseconds.
pub const DRIFT_WARNING_MS: f64 = 100.0;

/// Remainder below which a cycle is not counted as partial, in seconds.
const PARTIAL_CYCLE_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencingError {
    #[error("At least one clip is required")]
    EmptyClipList,

    #[error("Target duration must be a positive number of seconds, got {0}")]
    InvalidTarget(f64),

    #[error("Clip {index} has an invalid duration: {duration}")]
    InvalidClipDuration { index: usize, duration: f64 },
}

/// A clip available for sequencing.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub path: PathBuf,
    /// Measured duration in seconds
    pub duration: f64,
    /// Whether this file is already a trimmed copy
    pub trimmed: bool,
}

impl Clip {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
            trimmed: false,
        }
    }
}

/// One entry of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSegment {
    /// Position of the source clip in the clip list
    pub clip_index: usize,
    pub clip: Clip,
    /// Seconds of the clip that are played
    pub duration: f64,
    /// Set when the clip must be cut to `duration` before assembly
    pub trimmed: bool,
}

/// Ordered segments whose durations sum to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePlan {
    segments: Vec<SequenceSegment>,
    cycle_duration: f64,
}

impl SequencePlan {
    pub fn segments(&self) -> &[SequenceSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Sum of all segment durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Complete passes through the clip list.
    pub fn full_cycles(&self) -> usize {
        self.cycle_split().0
    }

    /// Whether the plan ends partway through a pass.
    pub fn partial_cycle(&self) -> bool {
        self.cycle_split().1 > PARTIAL_CYCLE_TOLERANCE
    }

    fn cycle_split(&self) -> (usize, f64) {
        let total = self.total_duration();
        let full = ((total + EPSILON) / self.cycle_duration).floor();
        let remainder = (total - full * self.cycle_duration).max(0.0);
        (full as usize, remainder)
    }

    /// The segment that still needs cutting, if any.
    pub fn trimmed_segment(&self) -> Option<&SequenceSegment> {
        self.segments.last().filter(|s| s.trimmed)
    }

    /// Replace the segment awaiting a trim with a physically trimmed clip.
    ///
    /// The planned duration is kept. Returns false when nothing awaited a
    /// trim.
    pub fn materialize_trim(&mut self, trimmed: Clip) -> bool {
        match self.segments.last_mut() {
            Some(segment) if segment.trimmed => {
                segment.clip = Clip {
                    trimmed: true,
                    ..trimmed
                };
                segment.trimmed = false;
                true
            }
            _ => false,
        }
    }

    /// Files to play, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.clip.path.clone()).collect()
    }
}

/// Plan segments covering `target` seconds from a cyclic clip list.
pub fn plan_sequence(clips: &[Clip], target: f64) -> Result<SequencePlan, SequencingError> {
    if clips.is_empty() {
        return Err(SequencingError::EmptyClipList);
    }
    if !(target.is_finite() && target > 0.0) {
        return Err(SequencingError::InvalidTarget(target));
    }
    if let Some((index, clip)) = clips
        .iter()
        .enumerate()
        .find(|(_, c)| !(c.duration.is_finite() && c.duration > 0.0))
    {
        return Err(SequencingError::InvalidClipDuration {
            index,
            duration: clip.duration,
        });
    }

    let mut segments = Vec::new();
    let mut accumulated = 0.0;
    let mut index = 0;

    while target - accumulated > EPSILON {
        let remaining = target - accumulated;
        let clip_index = index % clips.len();
        let clip = &clips[clip_index];

        if remaining >= clip.duration - EPSILON {
            segments.push(SequenceSegment {
                clip_index,
                clip: clip.clone(),
                duration: clip.duration,
                trimmed: false,
            });
            accumulated += clip.duration;
        } else {
            segments.push(SequenceSegment {
                clip_index,
                clip: clip.clone(),
                duration: remaining,
                trimmed: true,
            });
            accumulated += remaining;
            break;
        }

        index += 1;
    }

    let plan = SequencePlan {
        segments,
        cycle_duration: clips.iter().map(|c| c.duration).sum(),
    };

    info!(
        segments = plan.segment_count(),
        total_duration = plan.total_duration(),
        target,
        full_cycles = plan.full_cycles(),
        partial_cycle = plan.partial_cycle(),
        "Sequence planned"
    );

    Ok(plan)
}

/// Drift between the target and the assembled duration, in milliseconds.
///
/// Drift above [`DRIFT_WARNING_MS`] is logged; it never fails the job.
pub fn verify_duration(target: f64, actual: f64) -> f64 {
    let delta_ms = (actual - target).abs() * 1000.0;
    if delta_ms > DRIFT_WARNING_MS {
        warn!(
            target,
            actual,
            delta_ms,
            "Assembled duration differs from target by more than {}ms",
            DRIFT_WARNING_MS
        );
    } else {
        info!(target, actual, delta_ms, "Assembled duration verified");
    }
    delta_ms
}

/// Display helper for a clip's file name.
pub fn clip_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips(durations: &[f64]) -> Vec<Clip> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| Clip::new(format!("clip_{}.mp4", i), *d))
            .collect()
    }

    fn shape(plan: &SequencePlan) -> Vec<(usize, f64, bool)> {
        plan.segments()
            .iter()
            .map(|s| (s.clip_index, s.duration, s.trimmed))
            .collect()
    }

    #[test]
    fn test_wraps_and_trims_last_segment() {
        let plan = plan_sequence(&clips(&[4.0, 3.0]), 10.0).unwrap();
        assert_eq!(shape(&plan), vec![(0, 4.0, false), (1, 3.0, false), (0, 3.0, true)]);
        assert!((plan.total_duration() - 10.0).abs() < EPSILON);
        assert_eq!(plan.full_cycles(), 1);
        assert!(plan.partial_cycle());
        assert_eq!(plan.trimmed_segment().map(|s| s.clip_index), Some(0));
    }

    #[test]
    fn test_exact_fit_has_no_zero_length_tail() {
        let plan = plan_sequence(&clips(&[5.0]), 5.0).unwrap();
        assert_eq!(shape(&plan), vec![(0, 5.0, false)]);
        assert_eq!(plan.full_cycles(), 1);
        assert!(!plan.partial_cycle());
        assert!(plan.trimmed_segment().is_none());
    }

    #[test]
    fn test_single_clip_repeats() {
        let plan = plan_sequence(&clips(&[5.0]), 12.0).unwrap();
        assert_eq!(shape(&plan), vec![(0, 5.0, false), (0, 5.0, false), (0, 2.0, true)]);
        assert_eq!(plan.full_cycles(), 2);
        assert!(plan.partial_cycle());
    }

    #[test]
    fn test_target_shorter_than_first_clip() {
        let plan = plan_sequence(&clips(&[8.0, 2.0]), 1.5).unwrap();
        assert_eq!(shape(&plan), vec![(0, 1.5, true)]);
        assert_eq!(plan.full_cycles(), 0);
    }

    #[test]
    fn test_fractional_durations_sum_to_target() {
        let plan = plan_sequence(&clips(&[2.137, 4.004, 3.3]), 61.234).unwrap();
        assert!((plan.total_duration() - 61.234).abs() < 1e-9);
        let trimmed = plan.segments().iter().filter(|s| s.trimmed).count();
        assert!(trimmed <= 1);
        assert!(plan.segments()[..plan.segment_count() - 1].iter().all(|s| !s.trimmed));
    }

    #[test]
    fn test_near_exact_fit_within_epsilon() {
        let plan = plan_sequence(&clips(&[0.1, 0.2]), 0.3 + 1e-9).unwrap();
        assert_eq!(plan.segment_count(), 2);
        assert!(plan.trimmed_segment().is_none());
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(plan_sequence(&[], 10.0), Err(SequencingError::EmptyClipList));
        assert_eq!(
            plan_sequence(&clips(&[1.0]), 0.0),
            Err(SequencingError::InvalidTarget(0.0))
        );
        assert!(matches!(
            plan_sequence(&clips(&[1.0]), f64::NAN),
            Err(SequencingError::InvalidTarget(_))
        ));
        assert_eq!(
            plan_sequence(&clips(&[1.0, 0.0]), 3.0),
            Err(SequencingError::InvalidClipDuration {
                index: 1,
                duration: 0.0
            })
        );
    }

    #[test]
    fn test_materialize_trim() {
        let mut plan = plan_sequence(&clips(&[4.0, 3.0]), 10.0).unwrap();
        assert!(plan.materialize_trim(Clip::new("trimmed_last.mp4", 3.002)));

        let last = plan.segments().last().unwrap();
        assert!(!last.trimmed);
        assert!(last.clip.trimmed);
        assert_eq!(last.duration, 3.0);
        assert_eq!(plan.paths().last().unwrap(), &PathBuf::from("trimmed_last.mp4"));

        // Nothing left to trim.
        assert!(!plan.materialize_trim(Clip::new("again.mp4", 1.0)));
    }

    #[test]
    fn test_verify_duration() {
        assert!((verify_duration(10.0, 10.05) - 50.0).abs() < 1e-6);
        assert!((verify_duration(10.0, 9.75) - 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_name() {
        assert_eq!(clip_name(Path::new("/tmp/work/normalized_0.mp4")), "normalized_0.mp4");
    }
}

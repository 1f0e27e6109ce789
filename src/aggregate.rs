// src/aggregate.rs - Per-clip series buffer and the clip-level validity gate
use tracing::{info, warn};

use crate::cadence::estimate_cadence;
use crate::kinematics::FrameFeature;
use crate::metrics::{AnalysisOutcome, RawMetrics};

/// Fewer detected frames than this and no derived metric is reported.
pub const MIN_POSE_FRAMES: u64 = 10;
/// Vertical oscillation needs strictly more hip samples than this.
pub const MIN_OSCILLATION_SAMPLES: usize = 5;

pub const LOW_CONFIDENCE_REASON: &str =
    "Pose detection confidence too low or too few valid frames";

/// A detected, sampled frame and its position in the source video (1-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledFeature {
    pub frame_index: usize,
    pub feature: FrameFeature,
}

/// Feature series for one clip, kept in frame order. Owned by a single
/// analysis call and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct ClipSeries {
    frames: Vec<SampledFeature>,
}

impl ClipSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame_index: usize, feature: FrameFeature) {
        self.frames.push(SampledFeature {
            frame_index,
            feature,
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[SampledFeature] {
        &self.frames
    }

    fn series(&self, f: impl Fn(&FrameFeature) -> f64) -> Vec<f64> {
        self.frames.iter().map(|s| f(&s.feature)).collect()
    }

    pub fn torso_leans(&self) -> Vec<f64> {
        self.series(|f| f.torso_lean_deg)
    }

    pub fn overstride_signals(&self) -> Vec<f64> {
        self.series(|f| f.overstride_signal)
    }

    pub fn knee_drive_signals(&self) -> Vec<f64> {
        self.series(|f| f.knee_drive_signal)
    }

    pub fn hip_center_ys(&self) -> Vec<f64> {
        self.series(|f| f.hip_center_y)
    }

    pub fn left_ankle_ys(&self) -> Vec<f64> {
        self.series(|f| f.left_ankle_y)
    }

    pub fn right_ankle_ys(&self) -> Vec<f64> {
        self.series(|f| f.right_ankle_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounts {
    pub frames_total: u64,
    pub frames_used: u64,
    pub pose_frames: u64,
}

/// Sampling parameters needed to turn frame counts into elapsed time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipTiming {
    pub sample_stride: usize,
    pub fps: f64,
}

/// Median; even-length series average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Reduces one clip's series to `RawMetrics`, or to the low-confidence
/// result when too few frames had a detection.
pub fn aggregate(series: &ClipSeries, counts: FrameCounts, timing: ClipTiming) -> AnalysisOutcome {
    if counts.pose_frames < MIN_POSE_FRAMES {
        warn!(
            pose_frames = counts.pose_frames,
            frames_used = counts.frames_used,
            "too few pose frames, skipping metric aggregation"
        );
        return AnalysisOutcome::LowConfidence {
            reason: LOW_CONFIDENCE_REASON.to_string(),
            raw_metrics: RawMetrics::counters_only(
                counts.frames_total,
                counts.frames_used,
                counts.pose_frames,
            ),
        };
    }

    let hip_ys = series.hip_center_ys();
    let vertical_oscillation_norm = if hip_ys.len() > MIN_OSCILLATION_SAMPLES {
        population_std(&hip_ys)
    } else {
        None
    };

    let raw = RawMetrics {
        frames_total: counts.frames_total,
        frames_used: counts.frames_used,
        pose_frames: counts.pose_frames,
        avg_torso_lean_deg: median(&series.torso_leans()),
        overstride_ratio: median(&series.overstride_signals()),
        knee_drive_ratio: median(&series.knee_drive_signals()),
        vertical_oscillation_norm,
        cadence_spm_est: estimate_cadence(
            &series.left_ankle_ys(),
            &series.right_ankle_ys(),
            counts.frames_used,
            timing.sample_stride,
            timing.fps,
        ),
    };

    info!(
        pose_frames = raw.pose_frames,
        lean = ?raw.avg_torso_lean_deg,
        overstride = ?raw.overstride_ratio,
        oscillation = ?raw.vertical_oscillation_norm,
        cadence = ?raw.cadence_spm_est,
        "clip metrics aggregated"
    );

    AnalysisOutcome::Ok(raw)
}

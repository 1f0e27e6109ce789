// src/scoring.rs - RawMetrics to a 0-100 coaching score with tips
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics::RawMetrics;

/// Scoring needs more detected frames than aggregation does.
pub const MIN_SCORING_POSE_FRAMES: u64 = 15;
/// Subscores below this value trigger a coaching tip.
pub const TIP_THRESHOLD: u8 = 75;
pub const MAX_TIPS: usize = 3;
/// Score given to a metric that could not be measured.
pub const NEUTRAL_SUBSCORE: u8 = 60;

const POSTURE_WEIGHT: f64 = 0.30;
const STRIDE_WEIGHT: f64 = 0.35;
const STABILITY_WEIGHT: f64 = 0.20;
const CADENCE_WEIGHT: f64 = 0.15;

pub const GENERAL_WARNING: &str = "Best results come from side-view videos with full body visible.";

pub const NO_SUBJECT_MESSAGE: &str =
    "No running subject detected or pose landmarks were insufficient for analysis.";
pub const INSUFFICIENT_LANDMARKS_MESSAGE: &str =
    "Insufficient pose landmarks for reliable running-form analysis.";
pub const INSUFFICIENT_MOTION_MESSAGE: &str =
    "A person may be visible, but the video does not appear to contain enough running motion for analysis.";

const FALLBACK_TIPS: [&str; 2] = [
    "We could not confidently analyze running form in this video.",
    "Please make sure the video is of someone running (preferably side-view) with the full body visible.",
];

const POSTURE_TIP: &str = "Maintain a slight forward lean from the ankles, not by bending at the waist.";
const STRIDE_TIP: &str = "Try landing with your foot closer under your hips to reduce overstriding.";
const STABILITY_TIP: &str = "Focus on smooth forward motion and reduce excess vertical bounce.";
const CADENCE_TIP: &str =
    "Try slightly quicker, lighter steps to improve cadence and reduce braking forces.";
pub const SOLID_FORM_TIP: &str =
    "Form looks solid overall. Maintain consistency and gradually build volume.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscores {
    pub posture: u8,
    pub stride: u8,
    pub stability: u8,
    pub cadence_proxy: u8,
}

impl Subscores {
    /// Weighted composite, rounded half-to-even.
    pub fn composite(&self) -> u8 {
        let weighted = POSTURE_WEIGHT * f64::from(self.posture)
            + STRIDE_WEIGHT * f64::from(self.stride)
            + STABILITY_WEIGHT * f64::from(self.stability)
            + CADENCE_WEIGHT * f64::from(self.cadence_proxy);
        weighted.round_ties_even().clamp(0.0, 100.0) as u8
    }
}

/// Raw metric values echoed back next to the score, with the frame
/// counters always present as integers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsEcho {
    pub avg_torso_lean_deg: Option<f64>,
    pub overstride_ratio: Option<f64>,
    pub knee_drive_ratio: Option<f64>,
    pub vertical_oscillation_norm: Option<f64>,
    pub cadence_spm_est: Option<f64>,
    pub frames_total: u64,
    pub frames_used: u64,
    pub pose_frames: u64,
}

impl From<&RawMetrics> for MetricsEcho {
    fn from(raw: &RawMetrics) -> Self {
        Self {
            avg_torso_lean_deg: raw.avg_torso_lean_deg,
            overstride_ratio: raw.overstride_ratio,
            knee_drive_ratio: raw.knee_drive_ratio,
            vertical_oscillation_norm: raw.vertical_oscillation_norm,
            cadence_spm_est: raw.cadence_spm_est,
            frames_total: raw.frames_total,
            frames_used: raw.frames_used,
            pose_frames: raw.pose_frames,
        }
    }
}

/// One subscore paired with the measurement behind it, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub name: String,
    pub score: u8,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub subscores: Subscores,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: MetricsEcho,
    /// Set when the input was judged too unreliable to score.
    #[serde(default)]
    pub fallback: bool,
}

impl ScoreResult {
    /// Subscores next to their source measurements, in display order.
    pub fn metric_breakdown(&self) -> Vec<MetricScore> {
        let entry = |name: &str, score: u8, value: Option<f64>, unit: &str| MetricScore {
            name: name.to_string(),
            score,
            value,
            unit: Some(unit.to_string()),
        };
        vec![
            entry("posture", self.subscores.posture, self.metrics.avg_torso_lean_deg, "deg"),
            entry("stride", self.subscores.stride, self.metrics.overstride_ratio, "torso-lengths"),
            entry(
                "stability",
                self.subscores.stability,
                self.metrics.vertical_oscillation_norm,
                "frame-heights",
            ),
            entry("cadence_proxy", self.subscores.cadence_proxy, self.metrics.cadence_spm_est, "spm"),
        ]
    }
}

/// Generic band scorer: 100 inside `[ideal_low, ideal_high]`, 40 at or beyond
/// the bad bounds, linear (truncated) in between, 60 when unmeasured.
///
/// The final 60 is only reached by a value that is neither below, inside nor
/// above the ideal band, which contiguous bounds rule out.
pub fn score_range(value: Option<f64>, ideal_low: f64, ideal_high: f64, bad_low: f64, bad_high: f64) -> u8 {
    let Some(value) = value else {
        return NEUTRAL_SUBSCORE;
    };

    if ideal_low <= value && value <= ideal_high {
        return 100;
    }

    if value < ideal_low {
        if value <= bad_low {
            return 40;
        }
        let frac = (value - bad_low) / (ideal_low - bad_low).max(1e-6);
        return (40.0 + 60.0 * frac) as u8;
    }

    if value > ideal_high {
        if value >= bad_high {
            return 40;
        }
        let frac = (bad_high - value) / (bad_high - ideal_high).max(1e-6);
        return (40.0 + 60.0 * frac) as u8;
    }

    NEUTRAL_SUBSCORE
}

/// Full marks up to `good`, 45 from `bad` on, falling linearly (truncated) between.
fn score_ceiling(value: Option<f64>, good: f64, bad: f64) -> u8 {
    match value {
        None => NEUTRAL_SUBSCORE,
        Some(v) if v <= good => 100,
        Some(v) if v >= bad => 45,
        Some(v) => (100.0 - ((v - good) / (bad - good)) * 55.0) as u8,
    }
}

pub fn posture_score(avg_torso_lean_deg: Option<f64>) -> u8 {
    score_range(avg_torso_lean_deg, 5.0, 15.0, 0.0, 25.0)
}

pub fn stride_score(overstride_ratio: Option<f64>) -> u8 {
    score_ceiling(overstride_ratio, 1.2, 2.2)
}

pub fn stability_score(vertical_oscillation_norm: Option<f64>) -> u8 {
    score_ceiling(vertical_oscillation_norm, 0.015, 0.05)
}

pub fn cadence_score(cadence_spm_est: Option<f64>) -> u8 {
    match cadence_spm_est {
        None => NEUTRAL_SUBSCORE,
        Some(c) if (160.0..=185.0).contains(&c) => 100,
        Some(c) if c < 145.0 || c > 205.0 => 50,
        Some(_) => 80,
    }
}

fn fallback_result(raw: &RawMetrics, message: &str) -> ScoreResult {
    warn!(
        pose_frames = raw.pose_frames,
        frames_used = raw.frames_used,
        reason = message,
        "scoring fell back to the no-runner result"
    );
    ScoreResult {
        score: 0,
        subscores: Subscores::default(),
        tips: FALLBACK_TIPS.iter().map(|t| t.to_string()).collect(),
        warnings: vec![message.to_string(), GENERAL_WARNING.to_string()],
        metrics: MetricsEcho::from(raw),
        fallback: true,
    }
}

fn coaching_tips(subscores: &Subscores) -> Vec<String> {
    let mut tips: Vec<String> = [
        (subscores.posture, POSTURE_TIP),
        (subscores.stride, STRIDE_TIP),
        (subscores.stability, STABILITY_TIP),
        (subscores.cadence_proxy, CADENCE_TIP),
    ]
    .iter()
    .filter(|(score, _)| *score < TIP_THRESHOLD)
    .map(|(_, tip)| tip.to_string())
    .take(MAX_TIPS)
    .collect();

    if tips.is_empty() {
        tips.push(SOLID_FORM_TIP.to_string());
    }
    tips
}

/// Scores one clip's metrics. Pure: identical input gives identical output.
pub fn score(raw: &RawMetrics) -> ScoreResult {
    if raw.pose_frames == 0 || raw.frames_used == 0 {
        return fallback_result(raw, NO_SUBJECT_MESSAGE);
    }
    if raw.pose_frames < MIN_SCORING_POSE_FRAMES {
        return fallback_result(raw, INSUFFICIENT_LANDMARKS_MESSAGE);
    }
    if raw.core_metric_count() <= 1 {
        return fallback_result(raw, INSUFFICIENT_MOTION_MESSAGE);
    }

    // non-finite measurements score like missing ones
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let subscores = Subscores {
        posture: posture_score(finite(raw.avg_torso_lean_deg)),
        stride: stride_score(finite(raw.overstride_ratio)),
        stability: stability_score(finite(raw.vertical_oscillation_norm)),
        cadence_proxy: cadence_score(finite(raw.cadence_spm_est)),
    };
    let score = subscores.composite();
    debug!(?subscores, score, "running form scored");

    ScoreResult {
        score,
        subscores,
        tips: coaching_tips(&subscores),
        warnings: vec![GENERAL_WARNING.to_string()],
        metrics: MetricsEcho::from(raw),
        fallback: false,
    }
}

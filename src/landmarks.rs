// src/landmarks.rs - Landmark types and the detector boundary
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisResult;

/// A single 2D joint position normalized to [0, 1] with the detector's
/// visibility confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Shoulder,
    Hip,
    Knee,
    Ankle,
}

impl Joint {
    pub const ALL: [Joint; 4] = [Joint::Shoulder, Joint::Hip, Joint::Knee, Joint::Ankle];

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::Hip => "hip",
            Joint::Knee => "knee",
            Joint::Ankle => "ankle",
        }
    }

    /// Index of this joint in the MediaPipe Pose 33-landmark layout.
    pub fn mediapipe_index(&self, side: Side) -> usize {
        const LEFT_SHOULDER: usize = 11;
        const RIGHT_SHOULDER: usize = 12;
        const LEFT_HIP: usize = 23;
        const RIGHT_HIP: usize = 24;
        const LEFT_KNEE: usize = 25;
        const RIGHT_KNEE: usize = 26;
        const LEFT_ANKLE: usize = 27;
        const RIGHT_ANKLE: usize = 28;

        match (self, side) {
            (Joint::Shoulder, Side::Left) => LEFT_SHOULDER,
            (Joint::Shoulder, Side::Right) => RIGHT_SHOULDER,
            (Joint::Hip, Side::Left) => LEFT_HIP,
            (Joint::Hip, Side::Right) => RIGHT_HIP,
            (Joint::Knee, Side::Left) => LEFT_KNEE,
            (Joint::Knee, Side::Right) => RIGHT_KNEE,
            (Joint::Ankle, Side::Left) => LEFT_ANKLE,
            (Joint::Ankle, Side::Right) => RIGHT_ANKLE,
        }
    }
}

/// The four tracked joints of one body side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideLandmarks {
    pub shoulder: Landmark,
    pub hip: Landmark,
    pub knee: Landmark,
    pub ankle: Landmark,
}

impl SideLandmarks {
    pub fn joint(&self, joint: Joint) -> &Landmark {
        match joint {
            Joint::Shoulder => &self.shoulder,
            Joint::Hip => &self.hip,
            Joint::Knee => &self.knee,
            Joint::Ankle => &self.ankle,
        }
    }

    /// Weakest visibility across the chain; one occluded joint makes the
    /// whole side untrustworthy.
    pub fn min_visibility(&self) -> f64 {
        Joint::ALL
            .iter()
            .map(|j| self.joint(*j).visibility)
            .fold(f64::INFINITY, f64::min)
    }
}

/// One frame's detection. "No detection" is modelled as `Option::None`
/// by the detector, never as a zero-filled frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub left: SideLandmarks,
    pub right: SideLandmarks,
}

impl LandmarkFrame {
    pub fn side(&self, side: Side) -> &SideLandmarks {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Builds a frame from MediaPipe Pose output rows of `[x, y, z, visibility]`.
    /// Returns `None` when the array is too short to hold the lower body.
    pub fn from_mediapipe(landmarks: &[[f64; 4]]) -> Option<Self> {
        let pick = |joint: Joint, side: Side| -> Option<Landmark> {
            let row = landmarks.get(joint.mediapipe_index(side))?;
            Some(Landmark::new(row[0], row[1], row[3]))
        };
        let side = |side: Side| -> Option<SideLandmarks> {
            Some(SideLandmarks {
                shoulder: pick(Joint::Shoulder, side)?,
                hip: pick(Joint::Hip, side)?,
                knee: pick(Joint::Knee, side)?,
                ankle: pick(Joint::Ankle, side)?,
            })
        };

        Some(Self {
            left: side(Side::Left)?,
            right: side(Side::Right)?,
        })
    }
}

/// Boundary to the external pose model: one raw frame in, either a
/// landmark frame or "no detection" out. Errors are fatal to the analysis.
pub trait LandmarkDetector<F> {
    fn detect(&mut self, frame: &F) -> AnalysisResult<Option<LandmarkFrame>>;
}

impl<F, D> LandmarkDetector<F> for D
where
    D: FnMut(&F) -> AnalysisResult<Option<LandmarkFrame>>,
{
    fn detect(&mut self, frame: &F) -> AnalysisResult<Option<LandmarkFrame>> {
        self(frame)
    }
}

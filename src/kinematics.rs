// src/kinematics.rs - Per-frame running features from one landmark frame
use nalgebra::Vector2;
use tracing::trace;

use crate::landmarks::{LandmarkFrame, Side};

/// Smallest torso length accepted as the normalizing scale. Distant or
/// partially cropped runners otherwise blow up the ratio signals.
pub const MIN_BODY_SCALE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFeature {
    pub side: Side,
    pub torso_lean_deg: f64,
    pub overstride_signal: f64,
    pub knee_drive_signal: f64,
    pub hip_center_y: f64,
    pub left_ankle_y: f64,
    pub right_ankle_y: f64,
}

/// Picks the side whose weakest joint is most visible. Ties go left.
///
/// Evaluated independently per frame: the chosen side may flip from one
/// frame to the next and no smoothing is applied.
pub fn select_side(frame: &LandmarkFrame) -> Side {
    if frame.left.min_visibility() >= frame.right.min_visibility() {
        Side::Left
    } else {
        Side::Right
    }
}

/// Unsigned angle in degrees between the hip→shoulder vector and image vertical.
/// Image y grows downward, hence the negated dy.
pub fn angle_from_vertical(shoulder: Vector2<f64>, hip: Vector2<f64>) -> f64 {
    let d = shoulder - hip;
    d.x.atan2(-d.y).to_degrees().abs()
}

/// Shoulder-center to hip-center distance over both sides, floored.
pub fn body_scale(frame: &LandmarkFrame) -> f64 {
    let shoulder_center = (frame.left.shoulder.position() + frame.right.shoulder.position()) / 2.0;
    let hip_center = (frame.left.hip.position() + frame.right.hip.position()) / 2.0;
    (shoulder_center - hip_center).norm().max(MIN_BODY_SCALE)
}

pub fn compute_frame_features(frame: &LandmarkFrame) -> FrameFeature {
    let side = select_side(frame);
    let chain = frame.side(side);
    let scale = body_scale(frame);

    let feature = FrameFeature {
        side,
        torso_lean_deg: angle_from_vertical(chain.shoulder.position(), chain.hip.position()),
        overstride_signal: (chain.ankle.x - chain.hip.x).abs() / scale,
        knee_drive_signal: (chain.hip.y - chain.knee.y).abs() / scale,
        hip_center_y: (frame.left.hip.y + frame.right.hip.y) / 2.0,
        left_ankle_y: frame.left.ankle.y,
        right_ankle_y: frame.right.ankle.y,
    };

    trace!(
        side = side.as_str(),
        lean = feature.torso_lean_deg,
        overstride = feature.overstride_signal,
        "frame features"
    );

    feature
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::{Landmark, SideLandmarks};

    pub(crate) fn side_at(x: f64, vis: f64) -> SideLandmarks {
        SideLandmarks {
            shoulder: Landmark::new(x, 0.3, vis),
            hip: Landmark::new(x, 0.5, vis),
            knee: Landmark::new(x, 0.7, vis),
            ankle: Landmark::new(x, 0.9, vis),
        }
    }

    pub(crate) fn upright_frame() -> LandmarkFrame {
        LandmarkFrame {
            left: side_at(0.5, 0.9),
            right: side_at(0.5, 0.8),
        }
    }

    #[test]
    fn test_select_side_prefers_more_visible_chain() {
        let mut frame = upright_frame();
        assert_eq!(select_side(&frame), Side::Left);

        frame.left.ankle.visibility = 0.1;
        assert_eq!(select_side(&frame), Side::Right);
    }

    #[test]
    fn test_select_side_tie_goes_left() {
        let frame = LandmarkFrame {
            left: side_at(0.4, 0.7),
            right: side_at(0.6, 0.7),
        };
        assert_eq!(select_side(&frame), Side::Left);
    }

    #[test]
    fn test_upright_torso_has_zero_lean() {
        let f = compute_frame_features(&upright_frame());
        assert!(f.torso_lean_deg.abs() < 1e-9);
    }

    #[test]
    fn test_forward_lean_is_unsigned() {
        let hip = Vector2::new(0.5, 0.5);
        let forward = angle_from_vertical(Vector2::new(0.6, 0.4), hip);
        let backward = angle_from_vertical(Vector2::new(0.4, 0.4), hip);
        assert!((forward - 45.0).abs() < 1e-9);
        assert!((backward - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_body_scale_is_floored() {
        let mut frame = upright_frame();
        for side in [&mut frame.left, &mut frame.right] {
            side.shoulder.y = 0.5;
            side.hip.y = 0.51;
        }
        assert_eq!(body_scale(&frame), MIN_BODY_SCALE);
    }

    #[test]
    fn test_ratio_signals_use_selected_side() {
        let mut frame = upright_frame();
        // torso length 0.2 on both sides
        frame.left.ankle.x = 0.7;
        frame.right.ankle.x = 0.9;
        frame.right.hip.y = 0.5;

        let f = compute_frame_features(&frame);
        assert_eq!(f.side, Side::Left);
        assert!((f.overstride_signal - 1.0).abs() < 1e-9);
        assert!((f.knee_drive_signal - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hip_center_and_ankles_ignore_side_selection() {
        let mut frame = upright_frame();
        frame.left.hip.y = 0.48;
        frame.right.hip.y = 0.52;
        frame.left.ankle.y = 0.88;
        frame.right.ankle.y = 0.93;
        frame.left.knee.visibility = 0.05;

        let f = compute_frame_features(&frame);
        assert_eq!(f.side, Side::Right);
        assert!((f.hip_center_y - 0.5).abs() < 1e-9);
        assert_eq!(f.left_ankle_y, 0.88);
        assert_eq!(f.right_ankle_y, 0.93);
    }
}

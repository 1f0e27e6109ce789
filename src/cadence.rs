// src/cadence.rs - Step-rate estimate from ankle height peaks
use tracing::debug;

/// The ankle series must be strictly longer than this to estimate cadence.
pub const MIN_CADENCE_SAMPLES: usize = 20;
pub const CADENCE_MIN_SPM: f64 = 120.0;
pub const CADENCE_MAX_SPM: f64 = 220.0;
const MIN_DURATION_SEC: f64 = 1e-6;

/// Counts strict local maxima (greater than both neighbours).
/// Endpoints are never peaks. The slice must be in frame order.
pub fn count_peaks(series: &[f64]) -> usize {
    series
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2])
        .count()
}

/// Source-video seconds spanned by the sampled frames, detected or not.
pub fn sampled_duration_sec(frames_used: u64, sample_stride: usize, fps: f64) -> f64 {
    ((frames_used as f64 * sample_stride as f64) / fps).max(MIN_DURATION_SEC)
}

/// Estimates steps per minute from the per-frame ankle heights.
///
/// Uses the longer of the two series (left on ties), mean-centres it and
/// counts footstrike peaks over the sampled duration. The estimate is
/// clamped to [120, 220] spm, so out-of-band cadences report the nearest
/// bound. Degenerate inputs give `None` instead of an error.
pub fn estimate_cadence(
    left_ankle_y: &[f64],
    right_ankle_y: &[f64],
    frames_used: u64,
    sample_stride: usize,
    fps: f64,
) -> Option<f64> {
    let series = if left_ankle_y.len() >= right_ankle_y.len() {
        left_ankle_y
    } else {
        right_ankle_y
    };
    if series.len() <= MIN_CADENCE_SAMPLES {
        return None;
    }

    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let centered: Vec<f64> = series.iter().map(|y| y - mean).collect();
    let peaks = count_peaks(&centered);

    let duration_sec = sampled_duration_sec(frames_used, sample_stride, fps);
    let spm = (peaks as f64 / duration_sec) * 60.0;
    if !spm.is_finite() {
        debug!(peaks, duration_sec, "cadence estimate not finite, dropping");
        return None;
    }

    let clamped = spm.clamp(CADENCE_MIN_SPM, CADENCE_MAX_SPM);
    debug!(peaks, duration_sec, raw_spm = spm, spm = clamped, "cadence estimate");
    Some(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat(pattern: &[f64], times: usize) -> Vec<f64> {
        pattern.iter().copied().cycle().take(pattern.len() * times).collect()
    }

    #[test]
    fn test_count_peaks_strict_maxima_only() {
        assert_eq!(count_peaks(&[0.0, 1.0, 0.0, 1.0, 1.0, 0.0]), 1);
        assert_eq!(count_peaks(&[2.0, 1.0, 0.0]), 0);
        assert_eq!(count_peaks(&[0.0, 1.0]), 0);
    }

    #[test]
    fn test_cadence_from_regular_strides() {
        // 12 footstrikes over 60 samples; 60 frames used at stride 2, 30 fps = 4 s
        let series = repeat(&[0.0, 1.0, 0.6, -0.6, -1.0], 12);
        let spm = estimate_cadence(&series, &[], 60, 2, 30.0).unwrap();
        assert!((spm - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_cadence_clamped_to_band() {
        let fast = repeat(&[0.0, 1.0], 30);
        assert_eq!(estimate_cadence(&fast, &[], 60, 2, 30.0), Some(CADENCE_MAX_SPM));

        let mut slow = vec![0.0; 60];
        slow[10] = 1.0;
        slow[40] = 1.0;
        assert_eq!(estimate_cadence(&slow, &[], 60, 2, 30.0), Some(CADENCE_MIN_SPM));
    }

    #[test]
    fn test_cadence_requires_more_than_twenty_samples() {
        let series = repeat(&[0.0, 1.0, 0.0, -1.0], 5);
        assert_eq!(series.len(), 20);
        assert_eq!(estimate_cadence(&series, &series, 40, 2, 30.0), None);
    }

    #[test]
    fn test_longer_series_wins_and_ties_go_left() {
        let busy = repeat(&[0.0, 1.0, 0.6, -0.6, -1.0], 12);
        let flat = vec![0.0; 60];
        // flat left series has no peaks, so the tie picks it and clamps low
        assert_eq!(estimate_cadence(&flat, &busy, 60, 2, 30.0), Some(CADENCE_MIN_SPM));

        let mut longer_right = busy.clone();
        longer_right.push(0.0);
        let spm = estimate_cadence(&flat, &longer_right, 60, 2, 30.0).unwrap();
        assert!((spm - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_is_floored_not_divided_by_zero() {
        let series = repeat(&[0.0, 1.0, 0.6, -0.6, -1.0], 12);
        assert_eq!(estimate_cadence(&series, &[], 0, 2, 30.0), Some(CADENCE_MAX_SPM));
    }
}

// src/analyzer.rs - Drives one clip from frames to RawMetrics
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::aggregate::{aggregate, ClipSeries, ClipTiming, FrameCounts};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::kinematics::compute_frame_features;
use crate::landmarks::LandmarkDetector;
use crate::metrics::AnalysisOutcome;
use crate::source::{FrameSource, SourceInfo};

/// Everything one analysis call produced. The feature series is kept for
/// export; it is not needed to interpret the outcome.
#[derive(Debug, Clone)]
pub struct ClipAnalysis {
    pub outcome: AnalysisOutcome,
    pub series: ClipSeries,
    pub info: SourceInfo,
    /// The frame loop ended before the source ran out (cancel or frame cap).
    pub stopped_early: bool,
}

pub struct Analyzer {
    config: AnalyzerConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Stops the frame loop once `flag` is set. Frames read so far are
    /// still aggregated through the normal validity gate.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn run<S, D>(&self, source: &mut S, detector: &mut D) -> AnalysisResult<ClipAnalysis>
    where
        S: FrameSource,
        D: LandmarkDetector<S::Frame>,
    {
        let info = source.info();
        let stride = self.config.sample_stride;

        let mut series = ClipSeries::new();
        let mut frame_index: usize = 0;
        let mut frames_used: u64 = 0;
        let mut pose_frames: u64 = 0;
        let mut stopped_early = false;

        loop {
            if self.is_cancelled() {
                info!(frame_index, "analysis cancelled, aggregating partial clip");
                stopped_early = true;
                break;
            }
            if let Some(max) = self.config.max_frames {
                if frame_index >= max {
                    debug!(max, "frame cap reached");
                    stopped_early = true;
                    break;
                }
            }

            let Some(frame) = source.read_frame()? else {
                break;
            };
            frame_index += 1;
            if frame_index % stride != 0 {
                continue;
            }

            frames_used += 1;
            match detector.detect(&frame)? {
                Some(landmarks) => {
                    pose_frames += 1;
                    series.push(frame_index, compute_frame_features(&landmarks));
                }
                None => trace!(frame_index, "no pose detected"),
            }
        }

        // some sources under-report their length; never report fewer frames than were read
        let counts = FrameCounts {
            frames_total: info.frames_total.max(frame_index as u64),
            frames_used,
            pose_frames,
        };
        debug!(?counts, fps = info.fps, stride, "frame loop finished");

        let timing = ClipTiming {
            sample_stride: stride,
            fps: info.fps,
        };
        let outcome = aggregate(&series, counts, timing);

        Ok(ClipAnalysis {
            outcome,
            series,
            info,
            stopped_early,
        })
    }
}

/// Analyzes one clip at the given sample stride with default settings.
///
/// Data-quality problems come back as `AnalysisOutcome::LowConfidence` or as
/// null metrics; only source and detector failures are errors.
pub fn analyze<S, D>(source: &mut S, detector: &mut D, sample_stride: usize) -> AnalysisResult<AnalysisOutcome>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
{
    if sample_stride == 0 {
        return Err(AnalysisError::InvalidConfig(
            "sample_stride must be at least 1".to_string(),
        ));
    }
    let config = AnalyzerConfig {
        sample_stride,
        ..AnalyzerConfig::default()
    };
    let analysis = Analyzer::new(config)?.run(source, detector)?;
    Ok(analysis.outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::LOW_CONFIDENCE_REASON;
    use crate::kinematics::tests::upright_frame;
    use crate::landmarks::LandmarkFrame;
    use crate::scoring::{score, SOLID_FORM_TIP};
    use crate::source::{MemorySource, RecordedClip, RecordedDetector};

    fn pass_through(frame: &Option<LandmarkFrame>) -> AnalysisResult<Option<LandmarkFrame>> {
        Ok(*frame)
    }

    /// A runner bobbing at a steady rhythm: the left ankle peaks once every `period` frames.
    fn running_clip(frames: usize, period: usize) -> Vec<Option<LandmarkFrame>> {
        (0..frames)
            .map(|i| {
                let mut frame = upright_frame();
                let phase = (i % period) as f64 / period as f64;
                let lift = ((phase - 0.5) * std::f64::consts::TAU).cos();
                frame.left.ankle.y = 0.9 + 0.03 * lift;
                frame.right.ankle.y = 0.9 - 0.03 * lift;
                frame.left.shoulder.x = 0.535;
                frame.right.shoulder.x = 0.465;
                frame.left.ankle.x = 0.6;
                frame.left.hip.y = 0.5 + 0.005 * lift;
                frame.right.hip.y = 0.5 + 0.005 * lift;
                Some(frame)
            })
            .collect()
    }

    #[test]
    fn test_no_detections_reports_counters_only() {
        let mut source = MemorySource::new(vec![None; 60], Some(30.0));
        let outcome = analyze(&mut source, &mut pass_through, 2).unwrap();

        assert!(!outcome.is_ok());
        assert_eq!(outcome.reason(), Some(LOW_CONFIDENCE_REASON));
        let raw = outcome.raw_metrics();
        assert_eq!(raw.frames_total, 60);
        assert_eq!(raw.frames_used, 30);
        assert_eq!(raw.pose_frames, 0);
        assert_eq!(score(raw).score, 0);
    }

    #[test]
    fn test_sampling_picks_every_nth_frame() {
        let mut seen = Vec::new();
        let mut detector = |frame: &usize| -> AnalysisResult<Option<LandmarkFrame>> {
            seen.push(*frame);
            Ok(None)
        };
        let mut source = MemorySource::new((1..=10).collect::<Vec<usize>>(), None);
        let outcome = analyze(&mut source, &mut detector, 3).unwrap();

        assert_eq!(seen, vec![3, 6, 9]);
        assert_eq!(outcome.raw_metrics().frames_used, 3);
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        let mut source = MemorySource::new(vec![None; 4], None);
        let err = analyze(&mut source, &mut pass_through, 0).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_detector_failure_aborts() {
        let mut source = MemorySource::new(vec![Some(upright_frame()); 40], None);
        let mut detector = |_: &Option<LandmarkFrame>| -> AnalysisResult<Option<LandmarkFrame>> {
            Err(AnalysisError::Detector("model crashed".to_string()))
        };
        assert!(matches!(
            analyze(&mut source, &mut detector, 2),
            Err(AnalysisError::Detector(_))
        ));
    }

    #[test]
    fn test_running_clip_end_to_end() {
        // 240 frames at 30 fps = 8 s; stride 1 keeps every frame
        let mut source = MemorySource::new(running_clip(240, 10), Some(30.0));
        let outcome = analyze(&mut source, &mut pass_through, 1).unwrap();
        let raw = outcome.raw_metrics().clone();

        assert!(outcome.is_ok());
        assert_eq!(raw.pose_frames, 240);
        let lean = raw.avg_torso_lean_deg.unwrap();
        assert!((lean - 9.927).abs() < 0.01);
        assert!((raw.overstride_ratio.unwrap() - 0.5).abs() < 1e-3);
        assert!((raw.vertical_oscillation_norm.unwrap() - 0.003536).abs() < 1e-5);
        // 24 ankle peaks over 8 s
        assert!((raw.cadence_spm_est.unwrap() - 180.0).abs() < 1e-9);

        let result = score(&raw);
        assert_eq!(result.score, 100);
        assert_eq!(result.tips, vec![SOLID_FORM_TIP]);
    }

    #[test]
    fn test_cancel_still_aggregates_partial_series() {
        let flag = Arc::new(AtomicBool::new(false));
        let analyzer = Analyzer::new(AnalyzerConfig {
            sample_stride: 1,
            ..AnalyzerConfig::default()
        })
        .unwrap()
        .with_cancel(flag.clone());

        let stop_at = 30;
        let mut calls = 0;
        let mut detector = |frame: &Option<LandmarkFrame>| -> AnalysisResult<Option<LandmarkFrame>> {
            calls += 1;
            if calls == stop_at {
                flag.store(true, Ordering::Relaxed);
            }
            Ok(*frame)
        };
        let mut source = MemorySource::new(running_clip(240, 10), Some(30.0));
        let analysis = analyzer.run(&mut source, &mut detector).unwrap();

        assert!(analysis.stopped_early);
        assert_eq!(analysis.series.len(), stop_at);
        let raw = analysis.outcome.raw_metrics();
        assert_eq!(raw.frames_total, 240);
        assert_eq!(raw.pose_frames, stop_at as u64);
        assert!(raw.avg_torso_lean_deg.is_some());
    }

    #[test]
    fn test_frame_cap_routes_through_gate() {
        let analyzer = Analyzer::new(AnalyzerConfig {
            sample_stride: 2,
            max_frames: Some(16),
            ..AnalyzerConfig::default()
        })
        .unwrap();
        let mut source = MemorySource::new(running_clip(100, 10), None);
        let analysis = analyzer.run(&mut source, &mut pass_through).unwrap();

        assert!(analysis.stopped_early);
        assert_eq!(analysis.outcome.raw_metrics().frames_used, 8);
        assert_eq!(analysis.outcome.reason(), Some(LOW_CONFIDENCE_REASON));
    }

    #[test]
    fn test_recorded_clip_through_analyzer() {
        use crate::source::tests::{detected_row, empty_row, HEADER};

        let mut csv = format!("# fps=30\n{}\n", HEADER);
        for i in 1..=40 {
            if i % 8 == 0 {
                csv.push_str(&empty_row(i));
            } else {
                csv.push_str(&detected_row(i, 0.9));
            }
            csv.push('\n');
        }
        let mut clip = RecordedClip::from_reader(csv.as_bytes(), None).unwrap();
        let outcome = analyze(&mut clip, &mut RecordedDetector, 2).unwrap();
        let raw = outcome.raw_metrics();

        assert_eq!(raw.frames_total, 40);
        assert_eq!(raw.frames_used, 20);
        assert_eq!(raw.pose_frames, 15);
        assert!(raw.pose_frames <= raw.frames_used && raw.frames_used <= raw.frames_total);
        assert_eq!(raw.vertical_oscillation_norm, Some(0.0));
    }
}

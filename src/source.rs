// src/source.rs - Frame sources: recorded landmark CSV files and in-memory clips
use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::landmarks::{Landmark, LandmarkDetector, LandmarkFrame, SideLandmarks};

pub const DEFAULT_FPS: f64 = 30.0;

/// Frame rate to use for a reported value; missing, non-positive or
/// non-finite rates fall back to 30 fps.
pub fn normalize_fps(fps: Option<f64>) -> f64 {
    match fps {
        Some(f) if f.is_finite() && f > 0.0 => f,
        _ => DEFAULT_FPS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub fps: f64,
    pub frames_total: u64,
}

impl SourceInfo {
    pub fn new(fps: Option<f64>, frames_total: u64) -> Self {
        Self {
            fps: normalize_fps(fps),
            frames_total,
        }
    }
}

/// An ordered sequence of frames for one video.
///
/// `read_frame` returns `Ok(None)` at the end of the clip; an `Err` means the
/// source could not be read and aborts the analysis.
pub trait FrameSource {
    type Frame;

    fn info(&self) -> SourceInfo;

    fn read_frame(&mut self) -> AnalysisResult<Option<Self::Frame>>;
}

/// Frames held in memory, delivered in insertion order.
pub struct MemorySource<F> {
    frames: VecDeque<F>,
    info: SourceInfo,
}

impl<F> MemorySource<F> {
    pub fn new(frames: Vec<F>, fps: Option<f64>) -> Self {
        let info = SourceInfo::new(fps, frames.len() as u64);
        Self {
            frames: frames.into(),
            info,
        }
    }
}

impl<F> FrameSource for MemorySource<F> {
    type Frame = F;

    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read_frame(&mut self) -> AnalysisResult<Option<F>> {
        Ok(self.frames.pop_front())
    }
}

/// One row of a recorded clip: the detector output for a source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedFrame {
    pub frame: u64,
    pub landmarks: Option<LandmarkFrame>,
}

#[derive(Debug, Deserialize)]
struct LandmarkRecord {
    frame: Option<u64>,

    left_shoulder_x: Option<f64>,
    left_shoulder_y: Option<f64>,
    left_shoulder_visibility: Option<f64>,
    left_hip_x: Option<f64>,
    left_hip_y: Option<f64>,
    left_hip_visibility: Option<f64>,
    left_knee_x: Option<f64>,
    left_knee_y: Option<f64>,
    left_knee_visibility: Option<f64>,
    left_ankle_x: Option<f64>,
    left_ankle_y: Option<f64>,
    left_ankle_visibility: Option<f64>,

    right_shoulder_x: Option<f64>,
    right_shoulder_y: Option<f64>,
    right_shoulder_visibility: Option<f64>,
    right_hip_x: Option<f64>,
    right_hip_y: Option<f64>,
    right_hip_visibility: Option<f64>,
    right_knee_x: Option<f64>,
    right_knee_y: Option<f64>,
    right_knee_visibility: Option<f64>,
    right_ankle_x: Option<f64>,
    right_ankle_y: Option<f64>,
    right_ankle_visibility: Option<f64>,
}

impl LandmarkRecord {
    fn cells(&self) -> [Option<f64>; 24] {
        [
            self.left_shoulder_x,
            self.left_shoulder_y,
            self.left_shoulder_visibility,
            self.left_hip_x,
            self.left_hip_y,
            self.left_hip_visibility,
            self.left_knee_x,
            self.left_knee_y,
            self.left_knee_visibility,
            self.left_ankle_x,
            self.left_ankle_y,
            self.left_ankle_visibility,
            self.right_shoulder_x,
            self.right_shoulder_y,
            self.right_shoulder_visibility,
            self.right_hip_x,
            self.right_hip_y,
            self.right_hip_visibility,
            self.right_knee_x,
            self.right_knee_y,
            self.right_knee_visibility,
            self.right_ankle_x,
            self.right_ankle_y,
            self.right_ankle_visibility,
        ]
    }

    /// `Ok(None)` for an empty row (no detection); rows with only some cells
    /// filled are malformed.
    fn into_landmarks(self, row: usize) -> AnalysisResult<Option<LandmarkFrame>> {
        let cells = self.cells();
        if cells.iter().all(Option::is_none) {
            return Ok(None);
        }

        let mut values = [0.0; 24];
        for (i, cell) in cells.iter().enumerate() {
            values[i] = cell.ok_or_else(|| {
                AnalysisError::SourceUnavailable(format!(
                    "row {}: partial landmark data (column {} empty)",
                    row,
                    i + 2
                ))
            })?;
        }

        let lm = |i: usize| Landmark::new(values[i], values[i + 1], values[i + 2]);
        let side = |o: usize| SideLandmarks {
            shoulder: lm(o),
            hip: lm(o + 3),
            knee: lm(o + 6),
            ankle: lm(o + 9),
        };

        Ok(Some(LandmarkFrame {
            left: side(0),
            right: side(12),
        }))
    }
}

/// Reads an optional `# fps=<value>` header line.
fn parse_fps_header(content: &str) -> Option<f64> {
    let first = content.lines().next()?.trim();
    let rest = first.strip_prefix('#')?.trim();
    rest.strip_prefix("fps=")?.trim().parse().ok()
}

/// A clip recorded as per-frame detector output in CSV form.
///
/// One row per source frame, in order. Rows with empty landmark cells are
/// frames where the detector found nobody.
pub struct RecordedClip {
    path: Option<PathBuf>,
    frames: VecDeque<RecordedFrame>,
    info: SourceInfo,
}

impl RecordedClip {
    /// Opens a recorded clip. `fps` overrides any `# fps=` header in the file.
    pub fn open(path: impl AsRef<Path>, fps: Option<f64>) -> AnalysisResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AnalysisError::SourceUnavailable(format!(
                "Landmark file does not exist: {}",
                path.display()
            )));
        }

        let file = std::fs::File::open(path).map_err(|e| {
            AnalysisError::SourceUnavailable(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let mut clip = Self::from_reader(file, fps)?;
        clip.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            frames = clip.info.frames_total,
            fps = clip.info.fps,
            "recorded clip loaded"
        );
        Ok(clip)
    }

    pub fn from_reader<R: Read>(mut reader: R, fps: Option<f64>) -> AnalysisResult<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let fps = fps.or_else(|| parse_fps_header(&content));

        let mut csv_reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut frames = VecDeque::new();
        for (i, record) in csv_reader.deserialize::<LandmarkRecord>().enumerate() {
            let record = record?;
            let frame = record.frame.unwrap_or(i as u64 + 1);
            let landmarks = record.into_landmarks(i + 1)?;
            frames.push_back(RecordedFrame { frame, landmarks });
        }

        if frames.is_empty() {
            return Err(AnalysisError::SourceUnavailable(
                "Recorded clip has no frames".to_string(),
            ));
        }
        debug!(rows = frames.len(), "parsed recorded landmark rows");

        let info = SourceInfo::new(fps, frames.len() as u64);
        Ok(Self {
            path: None,
            frames,
            info,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl FrameSource for RecordedClip {
    type Frame = RecordedFrame;

    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read_frame(&mut self) -> AnalysisResult<Option<RecordedFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Detector for recorded clips: the landmarks were detected when the clip
/// was recorded, so they are passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedDetector;

impl LandmarkDetector<RecordedFrame> for RecordedDetector {
    fn detect(&mut self, frame: &RecordedFrame) -> AnalysisResult<Option<LandmarkFrame>> {
        Ok(frame.landmarks)
    }
}

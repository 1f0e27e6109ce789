// src/lib.rs
//! Running-form analysis: pose landmarks in, per-clip metrics and a coaching score out.
//!
//! [`analyze`] turns a clip into [`RawMetrics`] (wrapped in an [`AnalysisOutcome`]),
//! and [`score`] turns those metrics into a [`ScoreResult`]. The two stages share
//! nothing but the `RawMetrics` record, which also round-trips through JSON.

pub mod aggregate;
pub mod analyzer;
pub mod cadence;
pub mod config;
pub mod error;
pub mod kinematics;
pub mod landmarks;
pub mod metrics;
pub mod report;
pub mod scoring;
pub mod source;

pub use analyzer::{analyze, Analyzer, ClipAnalysis};
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use landmarks::{LandmarkDetector, LandmarkFrame};
pub use metrics::{AnalysisOutcome, RawMetrics};
pub use report::{JobRecord, ReportExporter};
pub use scoring::{score, ScoreResult};
pub use source::{FrameSource, MemorySource, RecordedClip, RecordedDetector};

// src/error.rs
use thiserror::Error;

/// Failures that abort an analysis call.
///
/// Low-confidence clips and missing metrics are not errors; they surface as
/// `AnalysisOutcome::LowConfidence` or as `None` fields on `RawMetrics`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Landmark detector failed: {0}")]
    Detector(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Landmark CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

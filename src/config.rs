// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{AnalysisError, AnalysisResult};

pub const DEFAULT_SAMPLE_STRIDE: usize = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Analyze every n-th source frame
    pub sample_stride: usize,
    /// Frame rate override for sources that do not carry one
    pub fps: Option<f64>,
    /// Stop after this many source frames; partial series are still aggregated
    pub max_frames: Option<usize>,
    /// Where reports are written when export is enabled
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("StrideCoach")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            fps: None,
            max_frames: None,
            output_dir: default_output_dir(),
        }
    }
}

impl AnalyzerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: AnalyzerConfig = toml::from_str(&content).map_err(|e| {
            AnalysisError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("config {} not used ({}), falling back to defaults", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.sample_stride == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sample_stride must be at least 1".to_string(),
            ));
        }
        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(AnalysisError::InvalidConfig(format!(
                    "fps must be positive, got {}",
                    fps
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.sample_stride, 2);
        assert!(config.fps.is_none());
        assert!(config.max_frames.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalyzerConfig = toml::from_str("sample_stride = 3\nfps = 59.94\n").unwrap();
        assert_eq!(config.sample_stride, 3);
        assert_eq!(config.fps, Some(59.94));
        assert!(config.max_frames.is_none());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let dir = std::env::temp_dir().join(format!("stride_coach_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "sample_stride = 0\n").unwrap();

        let err = AnalyzerConfig::load(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
        assert_eq!(AnalyzerConfig::load_or_default(&path).sample_stride, 2);

        let _ = fs::remove_dir_all(&dir);
    }
}

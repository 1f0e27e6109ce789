// src/metrics.rs - Clip-level metrics and the analysis outcome envelope
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Clip-level aggregate produced once per analyzed clip.
///
/// `None` in a derived field means the source data was insufficient, never zero.
/// The frame counters accept loosely typed input (numeric strings, floats,
/// null) so stored metrics from other producers can still be scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    #[serde(default, deserialize_with = "lenient_count")]
    pub frames_total: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub frames_used: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub pose_frames: u64,
    #[serde(default)]
    pub avg_torso_lean_deg: Option<f64>,
    #[serde(default)]
    pub overstride_ratio: Option<f64>,
    #[serde(default)]
    pub knee_drive_ratio: Option<f64>,
    #[serde(default)]
    pub vertical_oscillation_norm: Option<f64>,
    #[serde(default)]
    pub cadence_spm_est: Option<f64>,
}

impl RawMetrics {
    /// Counters only, every derived field null.
    pub fn counters_only(frames_total: u64, frames_used: u64, pose_frames: u64) -> Self {
        Self {
            frames_total,
            frames_used,
            pose_frames,
            ..Default::default()
        }
    }

    /// Number of the four motion metrics the scorer relies on that are present.
    /// Knee drive is reported but not part of this count.
    pub fn core_metric_count(&self) -> usize {
        [
            self.avg_torso_lean_deg,
            self.overstride_ratio,
            self.vertical_oscillation_norm,
            self.cadence_spm_est,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

/// Parses a frame counter the way a lenient integer cast would:
/// integers pass, floats truncate, numeric strings parse, anything else is 0.
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc().max(0.0) as u64)
            })
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| i.max(0) as u64)
            .unwrap_or(0),
        Value::Bool(b) => u64::from(*b),
        _ => 0,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_count).unwrap_or(0))
}

pub const DEFAULT_FAILURE_REASON: &str = "Pose detection failed";

/// Result of `analyze`: either usable metrics or the low-confidence early exit.
///
/// Serialized as `{"ok": true, "raw_metrics": {..}}` or
/// `{"ok": false, "error": "..", "raw_metrics": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeEnvelope", from = "OutcomeEnvelope")]
pub enum AnalysisOutcome {
    Ok(RawMetrics),
    LowConfidence { reason: String, raw_metrics: RawMetrics },
}

impl AnalysisOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisOutcome::Ok(_))
    }

    pub fn raw_metrics(&self) -> &RawMetrics {
        match self {
            AnalysisOutcome::Ok(raw) => raw,
            AnalysisOutcome::LowConfidence { raw_metrics, .. } => raw_metrics,
        }
    }

    pub fn into_raw_metrics(self) -> RawMetrics {
        match self {
            AnalysisOutcome::Ok(raw) => raw,
            AnalysisOutcome::LowConfidence { raw_metrics, .. } => raw_metrics,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Ok(_) => None,
            AnalysisOutcome::LowConfidence { reason, .. } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeEnvelope {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    raw_metrics: RawMetrics,
}

impl From<AnalysisOutcome> for OutcomeEnvelope {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::Ok(raw_metrics) => Self {
                ok: true,
                error: None,
                raw_metrics,
            },
            AnalysisOutcome::LowConfidence { reason, raw_metrics } => Self {
                ok: false,
                error: Some(reason),
                raw_metrics,
            },
        }
    }
}

impl From<OutcomeEnvelope> for AnalysisOutcome {
    fn from(envelope: OutcomeEnvelope) -> Self {
        if envelope.ok {
            AnalysisOutcome::Ok(envelope.raw_metrics)
        } else {
            AnalysisOutcome::LowConfidence {
                reason: envelope
                    .error
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
                raw_metrics: envelope.raw_metrics,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counters_parse_leniently() {
        let raw: RawMetrics = serde_json::from_value(json!({
            "frames_total": 120.0,
            "frames_used": "60",
            "pose_frames": "abc",
            "avg_torso_lean_deg": 9.5
        }))
        .unwrap();

        assert_eq!(raw.frames_total, 120);
        assert_eq!(raw.frames_used, 60);
        assert_eq!(raw.pose_frames, 0);
        assert_eq!(raw.avg_torso_lean_deg, Some(9.5));
        assert_eq!(raw.cadence_spm_est, None);
    }

    #[test]
    fn test_coerce_count_edge_values() {
        assert_eq!(coerce_count(&json!(null)), 0);
        assert_eq!(coerce_count(&json!(16.9)), 16);
        assert_eq!(coerce_count(&json!(" 17 ")), 17);
        assert_eq!(coerce_count(&json!("16.9")), 0);
        assert_eq!(coerce_count(&json!(-4)), 0);
        assert_eq!(coerce_count(&json!([1, 2])), 0);
    }

    #[test]
    fn test_null_counter_defaults_to_zero() {
        let raw: RawMetrics = serde_json::from_str(r#"{"pose_frames": null}"#).unwrap();
        assert_eq!(raw.pose_frames, 0);
        assert_eq!(raw.frames_used, 0);
    }

    #[test]
    fn test_core_metric_count_ignores_knee_drive() {
        let raw = RawMetrics {
            knee_drive_ratio: Some(1.1),
            cadence_spm_est: Some(170.0),
            ..RawMetrics::counters_only(100, 50, 40)
        };
        assert_eq!(raw.core_metric_count(), 1);
    }

    #[test]
    fn test_low_confidence_envelope_shape() {
        let outcome = AnalysisOutcome::LowConfidence {
            reason: "too few frames".to_string(),
            raw_metrics: RawMetrics::counters_only(30, 15, 3),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"], json!("too few frames"));
        assert_eq!(value["raw_metrics"]["pose_frames"], json!(3));
        assert_eq!(value["raw_metrics"]["cadence_spm_est"], json!(null));

        let back: AnalysisOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_not_ok_envelope_without_error_gets_default_reason() {
        let outcome: AnalysisOutcome =
            serde_json::from_str(r#"{"ok": false, "raw_metrics": {"pose_frames": 2}}"#).unwrap();
        assert_eq!(outcome.reason(), Some(DEFAULT_FAILURE_REASON));
        assert_eq!(outcome.raw_metrics().pose_frames, 2);
    }
}

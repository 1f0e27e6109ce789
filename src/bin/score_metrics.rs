// src/bin/score_metrics.rs - Scores a stored RawMetrics JSON document
use std::io::Read;

use anyhow::{Context, Result};
use serde_json::Value;

use stride_coach::{score, AnalysisOutcome, RawMetrics};

/// Accepts bare metrics or the `{ok, raw_metrics}` analysis envelope.
fn parse_metrics(input: &str) -> Result<RawMetrics> {
    let value: Value = serde_json::from_str(input).context("Input is not valid JSON")?;

    if value.get("raw_metrics").is_some() {
        let outcome: AnalysisOutcome =
            serde_json::from_value(value).context("Malformed analysis envelope")?;
        return Ok(outcome.into_raw_metrics());
    }
    serde_json::from_value(value).context("Malformed raw metrics")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let input = match std::env::args().nth(1) {
        Some(path) if path != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let raw = parse_metrics(&input)?;
    let result = score(&raw);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_metrics() {
        let raw = parse_metrics(
            r#"{"frames_total": 80, "frames_used": "40", "pose_frames": 20,
                "avg_torso_lean_deg": 10.0, "cadence_spm_est": 172.0}"#,
        )
        .unwrap();
        assert_eq!(raw.frames_used, 40);
        assert_eq!(raw.overstride_ratio, None);
        assert!(!score(&raw).fallback);
    }

    #[test]
    fn test_envelope_unwrapped() {
        let raw = parse_metrics(
            r#"{"ok": false, "error": "too few frames",
                "raw_metrics": {"frames_total": 12, "frames_used": 6, "pose_frames": 3}}"#,
        )
        .unwrap();
        assert_eq!(raw.pose_frames, 3);
        assert_eq!(score(&raw).score, 0);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_metrics("not json").is_err());
    }
}

// src/report.rs - Per-clip exports: feature CSV, job record JSON and an HTML summary
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::ClipSeries;
use crate::landmarks::Side;
use crate::metrics::AnalysisOutcome;
use crate::scoring::{MetricScore, MetricsEcho, ScoreResult, Subscores};

#[derive(Debug, Serialize)]
struct FeatureRecord {
    frame: usize,
    side: Side,
    torso_lean_deg: f64,
    overstride_signal: f64,
    knee_drive_signal: f64,
    hip_center_y: f64,
    left_ankle_y: f64,
    right_ankle_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Done,
    Error,
}

/// Stored outcome of analyzing and scoring one clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Local>,
    pub clip: String,
    pub overall_score: u8,
    pub fallback: bool,
    pub subscores: Subscores,
    pub breakdown: Vec<MetricScore>,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: MetricsEcho,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn completed(clip: impl Into<String>, outcome: &AnalysisOutcome, result: &ScoreResult) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Done,
            created_at: Local::now(),
            clip: clip.into(),
            overall_score: result.score,
            fallback: result.fallback,
            subscores: result.subscores,
            breakdown: result.metric_breakdown(),
            tips: result.tips.clone(),
            warnings: result.warnings.clone(),
            metrics: result.metrics.clone(),
            error: outcome.reason().map(str::to_string),
        }
    }

    /// Record for a clip whose source could not be analyzed at all.
    pub fn failed(clip: impl Into<String>, error: impl ToString) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Error,
            created_at: Local::now(),
            clip: clip.into(),
            overall_score: 0,
            fallback: true,
            subscores: Subscores::default(),
            breakdown: Vec::new(),
            tips: Vec::new(),
            warnings: Vec::new(),
            metrics: MetricsEcho::default(),
            error: Some(error.to_string()),
        }
    }
}

pub struct ReportExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl ReportExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("run_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create report directory {}", dir.display()))?;
        Ok(dir.join(file_name))
    }

    /// One row per detected, sampled frame.
    pub fn export_features_csv(&self, series: &ClipSeries) -> Result<PathBuf> {
        let csv_path = self.prepare("frame_features.csv")?;
        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for sampled in series.frames() {
            let f = &sampled.feature;
            writer.serialize(FeatureRecord {
                frame: sampled.frame_index,
                side: f.side,
                torso_lean_deg: f.torso_lean_deg,
                overstride_signal: f.overstride_signal,
                knee_drive_signal: f.knee_drive_signal,
                hip_center_y: f.hip_center_y,
                left_ankle_y: f.left_ankle_y,
                right_ankle_y: f.right_ankle_y,
            })?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn write_job_record(&self, record: &JobRecord) -> Result<PathBuf> {
        let json_path = self.prepare("result.json")?;
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&json_path, json)?;
        info!(job_id = %record.job_id, path = %json_path.display(), "job record written");
        Ok(json_path)
    }

    pub fn generate_report(&self, record: &JobRecord) -> Result<PathBuf> {
        let report_path = self.prepare("report.html")?;
        std::fs::write(&report_path, self.create_html_report(record))?;
        Ok(report_path)
    }

    fn create_html_report(&self, record: &JobRecord) -> String {
        let rows: String = record
            .breakdown
            .iter()
            .map(|m| {
                let value = m
                    .value
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "        <div class=\"stat-item\"><span class=\"stat-label\">{}:</span> \
<span class=\"stat-value\">{}</span> <span class=\"stat-detail\">({} {})</span></div>\n",
                    m.name,
                    m.score,
                    value,
                    m.unit.as_deref().unwrap_or("")
                )
            })
            .collect();

        let list = |items: &[String]| -> String {
            items
                .iter()
                .map(|t| format!("        <li>{}</li>\n", html_escape(t)))
                .collect()
        };

        let detection_rate = if record.metrics.frames_used == 0 {
            0.0
        } else {
            record.metrics.pose_frames as f64 / record.metrics.frames_used as f64 * 100.0
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Running Form Report - {session}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #4682EA; font-size: 1.2em; }}
        .stat-detail {{ color: #999; }}
    </style>
</head>
<body>
    <h1>Running Form Report</h1>
    <div class="stats">
        <h2>{clip}</h2>
        <div class="stat-item"><span class="stat-label">Overall Score:</span> <span class="stat-value">{score}</span></div>
        <div class="stat-item"><span class="stat-label">Pose Detection Rate:</span> <span class="stat-value">{rate:.1}%</span></div>
{rows}        <h3>Tips</h3>
        <ul>
{tips}        </ul>
        <h3>Warnings</h3>
        <ul>
{warnings}        </ul>
    </div>
</body>
</html>
"#,
            session = html_escape(&self.session_name),
            clip = html_escape(&record.clip),
            score = record.overall_score,
            rate = detection_rate,
            rows = rows,
            tips = list(&record.tips),
            warnings = list(&record.warnings),
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

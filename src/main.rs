// src/main.rs
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use stride_coach::{
    score, AnalysisOutcome, Analyzer, AnalyzerConfig, JobRecord, RecordedClip, RecordedDetector,
    ReportExporter, ScoreResult,
};

const USAGE: &str = "usage: stride_coach [--config FILE] [--stride N] [--fps F] [--out DIR] [--report] CLIP.csv...";

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    stride: Option<usize>,
    fps: Option<f64>,
    out: Option<PathBuf>,
    report: bool,
    clips: Vec<PathBuf>,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<CliArgs> {
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{} needs a value", flag));
        match arg.as_str() {
            "--config" => cli.config = Some(PathBuf::from(value("--config")?)),
            "--stride" => {
                let raw = value("--stride")?;
                cli.stride = Some(raw.parse().with_context(|| format!("invalid --stride {}", raw))?);
            }
            "--fps" => {
                let raw = value("--fps")?;
                cli.fps = Some(raw.parse().with_context(|| format!("invalid --fps {}", raw))?);
            }
            "--out" => {
                cli.out = Some(PathBuf::from(value("--out")?));
                cli.report = true;
            }
            "--report" => cli.report = true,
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            clip => cli.clips.push(PathBuf::from(clip)),
        }
    }

    if cli.clips.is_empty() {
        bail!(USAGE);
    }
    Ok(cli)
}

fn build_config(cli: &CliArgs) -> Result<AnalyzerConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    if let Some(stride) = cli.stride {
        config.sample_stride = stride;
    }
    if let Some(fps) = cli.fps {
        config.fps = Some(fps);
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Serialize)]
struct ClipOutput {
    clip: String,
    job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn session_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    format!("{}_{}", stem, Local::now().format("%Y%m%d_%H%M%S"))
}

fn write_reports(
    config: &AnalyzerConfig,
    path: &Path,
    series: &stride_coach::aggregate::ClipSeries,
    record: &JobRecord,
) -> Result<()> {
    let exporter = ReportExporter::new(&config.output_dir, Some(session_name(path)));
    exporter.export_features_csv(series)?;
    exporter.write_job_record(record)?;
    let report = exporter.generate_report(record)?;
    info!("Report generated: {}", report.display());
    Ok(())
}

fn process_clip(path: PathBuf, config: AnalyzerConfig, report: bool) -> Result<ClipOutput> {
    let clip_name = path.display().to_string();

    let mut clip = match RecordedClip::open(&path, config.fps) {
        Ok(clip) => clip,
        Err(e) => {
            error!(clip = %clip_name, "cannot open clip: {}", e);
            let record = JobRecord::failed(&clip_name, &e);
            if report {
                let exporter = ReportExporter::new(&config.output_dir, Some(session_name(&path)));
                exporter.write_job_record(&record)?;
            }
            return Ok(ClipOutput {
                clip: clip_name,
                job_id: record.job_id,
                analysis: None,
                result: None,
                error: record.error,
            });
        }
    };

    let analysis = Analyzer::new(config.clone())?
        .run(&mut clip, &mut RecordedDetector)
        .with_context(|| format!("Analysis failed for {}", clip_name))?;

    // low-confidence outcomes still carry counters, which score to the fallback result
    let result = score(analysis.outcome.raw_metrics());
    let record = JobRecord::completed(&clip_name, &analysis.outcome, &result);
    info!(clip = %clip_name, score = result.score, fallback = result.fallback, "clip scored");

    if report {
        write_reports(&config, &path, &analysis.series, &record)?;
    }

    Ok(ClipOutput {
        clip: clip_name,
        job_id: record.job_id,
        analysis: Some(analysis.outcome),
        result: Some(result),
        error: None,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON results
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = parse_args(std::env::args().skip(1))?;
    let config = build_config(&cli)?;
    info!(
        clips = cli.clips.len(),
        stride = config.sample_stride,
        "analyzing recorded clips"
    );

    let handles: Vec<_> = cli
        .clips
        .iter()
        .cloned()
        .map(|path| {
            let config = config.clone();
            let report = cli.report;
            tokio::task::spawn_blocking(move || process_clip(path, config, report))
        })
        .collect();

    let mut failures = 0;
    for handle in handles {
        let output = handle.await.context("Clip task panicked")??;
        if output.error.is_some() {
            failures += 1;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if failures > 0 {
        bail!("{} of {} clips could not be analyzed", failures, cli.clips.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_flags_and_clips() {
        let cli = parse_args(args(&["--stride", "3", "--fps", "60", "a.csv", "b.csv"])).unwrap();
        assert_eq!(cli.stride, Some(3));
        assert_eq!(cli.fps, Some(60.0));
        assert!(!cli.report);
        assert_eq!(cli.clips, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
    }

    #[test]
    fn test_out_enables_reports() {
        let cli = parse_args(args(&["--out", "reports", "run.csv"])).unwrap();
        assert!(cli.report);
        assert_eq!(cli.out, Some(PathBuf::from("reports")));
    }

    #[test]
    fn test_bad_arguments_rejected() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--stride"])).is_err());
        assert!(parse_args(args(&["--stride", "two", "a.csv"])).is_err());
        assert!(parse_args(args(&["--verbose", "a.csv"])).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = parse_args(args(&["--stride", "4", "--out", "elsewhere", "a.csv"])).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.sample_stride, 4);
        assert_eq!(config.output_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_missing_clip_reports_error() {
        let config = AnalyzerConfig::default();
        let output = process_clip(PathBuf::from("/nonexistent/clip.csv"), config, false).unwrap();
        assert!(output.analysis.is_none());
        assert!(output.error.unwrap().contains("does not exist"));
    }
}

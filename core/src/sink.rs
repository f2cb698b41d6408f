//! Output sinks: where a completed case report is delivered.

use crate::{
    error::TriageResult,
    report::{CaseReport, RiskBand},
    types::{CaseId, RunId},
    warning::Warning,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything delivered for one completed case.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery<'a> {
    pub run_id: &'a RunId,
    pub case_id: &'a CaseId,
    pub report: &'a CaseReport,
    pub warnings: &'a [Warning],
}

pub trait ReportSink {
    /// Deliver a report; returns where it went.
    fn deliver(&mut self, delivery: &Delivery<'_>) -> TriageResult<String>;
}

// ── File sink ───────────────────────────────────────────────────────

/// Writes `case_report_<case>_<timestamp>_<run>.txt` with the rendered report,
/// plus a `.json` sidecar carrying the score, band and warnings.
pub struct FileSink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct Sidecar<'a> {
    run_id: &'a str,
    case_id: &'a str,
    generated_at: DateTime<Local>,
    suspicion_score: u8,
    risk_band: RiskBand,
    warnings: &'a [Warning],
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl ReportSink for FileSink {
    fn deliver(&mut self, d: &Delivery<'_>) -> TriageResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let now = Local::now();
        // Run id prefix keeps same-second runs of one case apart.
        let run: String = file_safe(d.run_id).chars().take(8).collect();
        let stem = format!(
            "case_report_{}_{}_{run}",
            file_safe(d.case_id),
            now.format("%Y%m%d_%H%M%S")
        );

        let report_path = self.dir.join(format!("{stem}.txt"));
        std::fs::write(&report_path, d.report.render())?;

        let sidecar = Sidecar {
            run_id: d.run_id,
            case_id: d.case_id,
            generated_at: now,
            suspicion_score: d.report.suspicion_score,
            risk_band: d.report.risk_band(),
            warnings: d.warnings,
        };
        let sidecar_path = self.dir.join(format!("{stem}.json"));
        std::fs::write(&sidecar_path, serde_json::to_string_pretty(&sidecar)?)?;

        log::info!("case {}: report written to {}", d.case_id, report_path.display());
        Ok(report_path.display().to_string())
    }
}

// ── Memory sink ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredReport {
    pub run_id: RunId,
    pub case_id: CaseId,
    pub report: CaseReport,
    pub warnings: Vec<Warning>,
}

/// Keeps delivered reports in memory. Used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: Vec<DeliveredReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn deliver(&mut self, d: &Delivery<'_>) -> TriageResult<String> {
        self.delivered.push(DeliveredReport {
            run_id: d.run_id.clone(),
            case_id: d.case_id.clone(),
            report: d.report.clone(),
            warnings: d.warnings.to_vec(),
        });
        Ok(format!("memory[{}]", self.delivered.len() - 1))
    }
}

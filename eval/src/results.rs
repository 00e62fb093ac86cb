//! Batch summary capture and persistence.
//!
//! One `workflow_summary_<timestamp>.json` per batch, next to the per-case
//! workspaces under the output root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use repair::core::types::{AcceptanceOutcome, RunMode, TerminationReason};
use repair::io::problem::CaseRef;
use repair::io::run_log::RunLog;

use crate::outcome::{CaseStatus, classify_run};

/// Per-case record in the batch summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseEntry {
    pub problem: String,
    pub cr: String,
    pub status: CaseStatus,
    pub termination_reason: Option<TerminationReason>,
    pub exec_retry_count: Option<u32>,
    pub validation_retry_count: Option<u32>,
    pub generator_calls: Option<u32>,
    pub acceptance: Option<AcceptanceOutcome>,
    pub workspace: Option<String>,
    pub run_log: Option<String>,
    /// SHA-256 of the case inputs, for reproducibility tracking.
    pub case_hash: Option<String>,
    pub duration_secs: f64,
    /// Error or panic text for skipped cases.
    pub error: Option<String>,
}

impl CaseEntry {
    pub fn from_log(case: &CaseRef, log: &RunLog, workspace: &Path, run_log: &Path) -> Self {
        Self {
            problem: case.problem.clone(),
            cr: case.cr.clone(),
            status: classify_run(log),
            termination_reason: Some(log.termination_reason),
            exec_retry_count: Some(log.exec_retry_count),
            validation_retry_count: Some(log.validation_retry_count),
            generator_calls: Some(log.generator_calls),
            acceptance: Some(log.acceptance.clone()),
            workspace: Some(workspace.display().to_string()),
            run_log: Some(run_log.display().to_string()),
            case_hash: None,
            duration_secs: log.duration_ms as f64 / 1000.0,
            error: None,
        }
    }

    pub fn skipped(case: &CaseRef, workspace: Option<&Path>, error: String) -> Self {
        Self {
            problem: case.problem.clone(),
            cr: case.cr.clone(),
            status: CaseStatus::Skipped,
            termination_reason: None,
            exec_retry_count: None,
            validation_retry_count: None,
            generator_calls: None,
            acceptance: None,
            workspace: workspace.map(|path| path.display().to_string()),
            run_log: None,
            case_hash: None,
            duration_secs: 0.0,
            error: Some(error),
        }
    }

    pub fn id(&self) -> String {
        format!("{}/{}", self.problem, self.cr)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn from_statuses(statuses: impl IntoIterator<Item = CaseStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            match status {
                CaseStatus::Pass => counts.pass += 1,
                CaseStatus::Fail => counts.fail += 1,
                CaseStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

/// Everything one batch produced, persisted by [`summary_path`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub batch_id: String,
    #[serde(default)]
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// SHA-256 of the effective repair config.
    pub config_hash: String,
    /// Agent command line every case was generated with.
    #[serde(default)]
    pub agent_command: Vec<String>,
    pub counts: Counts,
    pub cases: Vec<CaseEntry>,
}

impl BatchSummary {
    pub fn new(
        batch_id: String,
        config_hash: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        cases: Vec<CaseEntry>,
    ) -> Self {
        Self {
            batch_id,
            mode: RunMode::default(),
            started_at,
            finished_at,
            config_hash,
            agent_command: Vec::new(),
            counts: Counts::from_statuses(cases.iter().map(|entry| entry.status)),
            cases,
        }
    }

    pub fn with_run_settings(mut self, mode: RunMode, agent_command: Vec<String>) -> Self {
        self.mode = mode;
        self.agent_command = agent_command;
        self
    }
}

/// `workflow_summary_<id>.json` for repair batches, `baseline_summary_<id>.json` for baseline ones.
pub fn summary_path(output_root: &Path, mode: RunMode, batch_id: &str) -> PathBuf {
    let prefix = match mode {
        RunMode::Repair => "workflow",
        RunMode::Baseline => "baseline",
    };
    output_root.join(format!("{prefix}_summary_{batch_id}.json"))
}

pub fn write_summary(path: &Path, summary: &BatchSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write summary {}", path.display()))?;
    debug!(path = %path.display(), total = summary.counts.total, "summary written");
    Ok(())
}

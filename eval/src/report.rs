use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::outcome::CaseStatus;
use crate::results::{CaseEntry, Counts};

#[derive(Debug, Default)]
pub struct ReportSummary {
    /// `repair` or `baseline`; absent in summaries that predate the field.
    pub mode: Option<String>,
    pub counts: Counts,
    pub avg_duration_secs: Option<f64>,
    /// Termination reason (or `skipped`) → number of cases.
    pub reasons: BTreeMap<String, usize>,
}

/// Recompute counts and the reason histogram from a summary file.
///
/// Malformed case entries are reported as warnings and left out of the counts.
pub fn aggregate(summary_path: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let raw = fs::read_to_string(summary_path)
        .with_context(|| format!("read {}", summary_path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", summary_path.display()))?;

    let mut warnings = Vec::new();
    let mut entries = Vec::new();
    match value.get("cases").and_then(Value::as_array) {
        Some(cases) => {
            for (index, case) in cases.iter().enumerate() {
                match serde_json::from_value::<CaseEntry>(case.clone()) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => warnings.push(format!("skip cases[{index}]: invalid entry ({err})")),
                }
            }
        }
        None => warnings.push("summary has no cases array".to_string()),
    }

    let mut summary = ReportSummary {
        mode: value.get("mode").and_then(Value::as_str).map(str::to_string),
        counts: Counts::from_statuses(entries.iter().map(|entry| entry.status)),
        ..ReportSummary::default()
    };
    for entry in &entries {
        let label = match (entry.status, entry.termination_reason) {
            (CaseStatus::Skipped, _) => "skipped".to_string(),
            (_, Some(reason)) => reason.to_string(),
            (_, None) => {
                warnings.push(format!("{}: finished run without a termination reason", entry.id()));
                "unknown".to_string()
            }
        };
        *summary.reasons.entry(label).or_insert(0) += 1;
    }

    let durations: Vec<f64> = entries
        .iter()
        .filter(|entry| entry.status != CaseStatus::Skipped)
        .map(|entry| entry.duration_secs)
        .collect();
    if !durations.is_empty() {
        summary.avg_duration_secs = Some(durations.iter().sum::<f64>() / durations.len() as f64);
    }

    if let Some(stored) = value.get("counts")
        && let Ok(stored) = serde_json::from_value::<Counts>(stored.clone())
        && stored != summary.counts
    {
        warnings.push(format!(
            "stored counts {stored:?} differ from recomputed {:?}",
            summary.counts
        ));
    }

    Ok((summary, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn entry(cr: &str, status: &str, reason: Option<&str>, duration: f64) -> Value {
        json!({
            "problem": "problem1",
            "cr": cr,
            "status": status,
            "termination_reason": reason,
            "exec_retry_count": null,
            "validation_retry_count": null,
            "generator_calls": null,
            "acceptance": null,
            "workspace": null,
            "run_log": null,
            "case_hash": null,
            "duration_secs": duration,
            "error": null
        })
    }

    fn write(path: &Path, value: &Value) {
        fs::write(path, serde_json::to_string_pretty(value).expect("json")).expect("write");
    }

    #[test]
    fn aggregates_reasons_and_durations() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("workflow_summary_x.json");
        write(
            &path,
            &json!({
                "mode": "baseline",
                "counts": {"total": 3, "pass": 1, "fail": 1, "skipped": 1},
                "cases": [
                    entry("CR1", "pass", Some("completed"), 4.0),
                    entry("CR2", "fail", Some("max_exec_retries_reached"), 8.0),
                    entry("CR3", "skipped", None, 0.0),
                ]
            }),
        );

        let (summary, warnings) = aggregate(&path).expect("aggregate");
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(summary.counts.total, 3);
        assert_eq!(summary.mode.as_deref(), Some("baseline"));
        assert_eq!(summary.reasons.get("completed"), Some(&1));
        assert_eq!(summary.reasons.get("max_exec_retries_reached"), Some(&1));
        assert_eq!(summary.reasons.get("skipped"), Some(&1));
        assert_eq!(summary.avg_duration_secs, Some(6.0));
    }

    #[test]
    fn malformed_entries_become_warnings() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("workflow_summary_y.json");
        write(
            &path,
            &json!({
                "counts": {"total": 2, "pass": 1, "fail": 0, "skipped": 0},
                "cases": [
                    entry("CR1", "pass", Some("completed"), 1.0),
                    {"problem": "problem1", "status": "exploded"},
                ]
            }),
        );

        let (summary, warnings) = aggregate(&path).expect("aggregate");
        assert_eq!(summary.counts.total, 1);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("skip cases[1]"));
        assert!(warnings[1].contains("differ from recomputed"));
    }
}

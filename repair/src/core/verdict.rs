//! Parsing validator replies into [`ValidationOutcome`].
//!
//! A reply that is not JSON, does not match the verdict schema, or cannot be
//! deserialized becomes `NeedsChanges` with a single `validator_malfunction`
//! issue. It is never read as `Pass`.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::core::schema;
use crate::core::text::strip_code_fence;
use crate::core::types::{Issue, IssueCategory, Severity, ValidationOutcome};

pub const VERDICT_SCHEMA: &str = include_str!("../../schemas/verdict.schema.json");

pub const MALFUNCTION_TITLE: &str = "validator_malfunction";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum VerdictStatus {
    Pass,
    NeedsChanges,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    status: VerdictStatus,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    notes_for_modifier: String,
}

pub fn parse_verdict(raw: &str) -> ValidationOutcome {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(err) => return malfunction(format!("verdict is not valid JSON: {err}")),
    };
    if let Err(err) = schema::check(VERDICT_SCHEMA, &value) {
        return malfunction(format!("verdict rejected: {err:#}"));
    }
    let verdict: RawVerdict = match serde_json::from_value(value) {
        Ok(verdict) => verdict,
        Err(err) => return malfunction(format!("verdict could not be read: {err}")),
    };
    match verdict.status {
        VerdictStatus::Pass => ValidationOutcome::Pass,
        VerdictStatus::NeedsChanges => {
            let mut summary = verdict.summary;
            let notes = verdict.notes_for_modifier.trim();
            if !notes.is_empty() {
                if !summary.trim().is_empty() {
                    summary.push('\n');
                }
                summary.push_str(notes);
            }
            ValidationOutcome::NeedsChanges {
                summary,
                issues: verdict.issues,
            }
        }
    }
}

/// Conservative verdict used whenever the validator could not produce one.
pub fn malfunction(reason: impl Into<String>) -> ValidationOutcome {
    let reason = reason.into();
    warn!(%reason, "validator malfunction");
    ValidationOutcome::NeedsChanges {
        summary: "Validator did not return a usable verdict.".to_string(),
        issues: vec![Issue {
            title: MALFUNCTION_TITLE.to_string(),
            description: reason,
            suggestion: "Re-check the candidate against the change request and keep the output format unchanged.".to_string(),
            severity: Severity::High,
            category: IssueCategory::Other,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_json(title: &str) -> Value {
        json!({
            "title": title,
            "description": "capacity constraint missing",
            "category": "missing_constraint",
            "severity": "high",
            "suggestion": "add it",
            "generated_lines": [12],
            "reference_lines": [10, 11],
            "confidence": 0.8
        })
    }

    fn assert_malfunction(outcome: &ValidationOutcome) {
        match outcome {
            ValidationOutcome::NeedsChanges { issues, .. } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].title, MALFUNCTION_TITLE);
                assert_eq!(issues[0].severity, Severity::High);
            }
            other => panic!("expected malfunction verdict, got {other:?}"),
        }
    }

    #[test]
    fn parses_pass() {
        let raw = json!({
            "status": "pass",
            "summary": "looks right",
            "issues": [],
            "notes_for_modifier": ""
        })
        .to_string();
        assert_eq!(parse_verdict(&raw), ValidationOutcome::Pass);
    }

    #[test]
    fn parses_needs_changes_with_issues() {
        let raw = json!({
            "status": "needs_changes",
            "summary": "one constraint missing",
            "issues": [issue_json("capacity")],
            "notes_for_modifier": ""
        })
        .to_string();
        match parse_verdict(&raw) {
            ValidationOutcome::NeedsChanges { summary, issues } => {
                assert_eq!(summary, "one constraint missing");
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].category, IssueCategory::MissingConstraint);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let body = json!({
            "status": "pass",
            "summary": "",
            "issues": [],
            "notes_for_modifier": ""
        });
        let raw = format!("```json\n{body}\n```");
        assert_eq!(parse_verdict(&raw), ValidationOutcome::Pass);
    }

    #[test]
    fn garbage_is_never_pass() {
        assert_malfunction(&parse_verdict("PASS!"));
        assert_malfunction(&parse_verdict(""));
    }

    #[test]
    fn schema_violation_is_never_pass() {
        let raw = json!({"status": "pass"}).to_string();
        assert_malfunction(&parse_verdict(&raw));
        let raw = json!({
            "status": "approved",
            "summary": "",
            "issues": [],
            "notes_for_modifier": ""
        })
        .to_string();
        assert_malfunction(&parse_verdict(&raw));
    }
}

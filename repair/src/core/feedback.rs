//! Feedback text handed to the generator on the next attempt.

use crate::core::types::{ExecFailure, Issue, ValidationOutcome};

const DEFAULT_VALIDATION_FEEDBACK: &str = "Validator requested changes.";

/// Feedback for a failed execution: the failure kind plus its captured diagnostic.
pub fn execution_feedback(failure: &ExecFailure) -> String {
    failure.to_string()
}

/// Feedback for a `NeedsChanges` verdict.
///
/// Issues render as `title: description | Suggestion: suggestion` joined by `; `.
/// With no issues, the validator summary is used instead.
pub fn validation_feedback(outcome: &ValidationOutcome) -> Option<String> {
    match outcome {
        ValidationOutcome::NeedsChanges { summary, issues } => {
            if issues.is_empty() {
                let summary = summary.trim();
                if summary.is_empty() {
                    Some(DEFAULT_VALIDATION_FEEDBACK.to_string())
                } else {
                    Some(summary.to_string())
                }
            } else {
                Some(format_issues(issues))
            }
        }
        _ => None,
    }
}

pub fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|issue| {
            format!(
                "{}: {} | Suggestion: {}",
                issue.title.trim(),
                issue.description.trim(),
                issue.suggestion.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExecFailureKind, IssueCategory, Severity};

    fn issue(title: &str) -> Issue {
        Issue {
            title: title.to_string(),
            description: format!("{title} is wrong"),
            suggestion: format!("fix {title}"),
            severity: Severity::High,
            category: IssueCategory::IncorrectConstraint,
        }
    }

    #[test]
    fn formats_issue_list() {
        let outcome = ValidationOutcome::NeedsChanges {
            summary: "ignored".to_string(),
            issues: vec![issue("capacity"), issue("objective")],
        };
        assert_eq!(
            validation_feedback(&outcome).as_deref(),
            Some(
                "capacity: capacity is wrong | Suggestion: fix capacity; \
                 objective: objective is wrong | Suggestion: fix objective"
            )
        );
    }

    #[test]
    fn falls_back_to_summary_then_default() {
        let outcome = ValidationOutcome::NeedsChanges {
            summary: "  objective sign flipped ".to_string(),
            issues: Vec::new(),
        };
        assert_eq!(
            validation_feedback(&outcome).as_deref(),
            Some("objective sign flipped")
        );

        let outcome = ValidationOutcome::NeedsChanges {
            summary: String::new(),
            issues: Vec::new(),
        };
        assert_eq!(
            validation_feedback(&outcome).as_deref(),
            Some(DEFAULT_VALIDATION_FEEDBACK)
        );
    }

    #[test]
    fn pass_has_no_feedback() {
        assert_eq!(validation_feedback(&ValidationOutcome::Pass), None);
    }

    #[test]
    fn execution_feedback_includes_stderr() {
        let failure = ExecFailure::new(
            ExecFailureKind::NonZeroExit { code: Some(1) },
            "NameError: name 'x' is not defined",
        );
        let text = execution_feedback(&failure);
        assert!(text.contains("exit code 1"));
        assert!(text.contains("NameError"));
    }
}

//! Shared deterministic types for the repair workflow.
//!
//! These are the tagged outcomes the router reads. Each one is a closed sum type
//! so a collaborator malfunction can never be mistaken for success.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a failed candidate attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecFailureKind {
    /// Process exited non-zero (or was killed by a signal when `code` is `None`).
    NonZeroExit { code: Option<i32> },
    /// Process exceeded its wall-clock deadline and was killed.
    Timeout { limit_secs: u64 },
    /// Process exited zero but stdout was not the expected JSON object.
    MalformedOutput,
    /// Process could not be started at all.
    Launch,
    /// The generator failed to produce a candidate for this attempt.
    Generation,
}

impl fmt::Display for ExecFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit { code: Some(code) } => write!(f, "execution failed (exit code {code})"),
            Self::NonZeroExit { code: None } => write!(f, "execution failed (terminated by signal)"),
            Self::Timeout { limit_secs } => write!(f, "deadline exceeded after {limit_secs}s"),
            Self::MalformedOutput => write!(f, "malformed output"),
            Self::Launch => write!(f, "candidate could not be launched"),
            Self::Generation => write!(f, "code generation failed"),
        }
    }
}

/// Structured failure for one candidate attempt.
///
/// `detail` preserves the original diagnostic text (stderr, parse error, generator
/// error chain); `kind` is what callers branch on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}:\n{detail}")]
pub struct ExecFailure {
    #[serde(flatten)]
    pub kind: ExecFailureKind,
    pub detail: String,
}

impl ExecFailure {
    pub fn new(kind: ExecFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(limit_secs: u64) -> Self {
        Self::new(ExecFailureKind::Timeout { limit_secs }, "deadline exceeded")
    }
}

/// Outcome of executing the current candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Not attempted for the current candidate.
    #[default]
    Unknown,
    /// Candidate ran and produced structured output.
    Ok(Value),
    /// Candidate failed; see [`ExecFailureKind`].
    Err(ExecFailure),
}

impl ExecutionOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn failure(&self) -> Option<&ExecFailure> {
        match self {
            Self::Err(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    MissingConstraint,
    IncorrectConstraint,
    Objective,
    DataHandling,
    OutputFormat,
    Style,
    #[default]
    Other,
}

/// A single validator finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub category: IssueCategory,
}

/// Semantic validation verdict for the current candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Not attempted for the current candidate.
    #[default]
    Unknown,
    /// The run finished without ever reaching validation.
    Skipped,
    Pass,
    NeedsChanges { summary: String, issues: Vec<Issue> },
}

impl ValidationOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Result of the ground-truth acceptance test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcceptanceOutcome {
    /// The run never reached acceptance.
    #[default]
    NotRun,
    Pass,
    /// The verify function rejected the output.
    Fail { detail: String },
    /// The acceptance harness itself failed.
    Error { detail: String },
}

impl AcceptanceOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn ran(&self) -> bool {
        !matches!(self, Self::NotRun)
    }
}

/// Why a run stopped. Every finalized run carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    MaxExecRetriesReached,
    MaxValidationRetriesReached,
    MaxValidationRetriesReachedRanAcceptance,
    GlobalStepCeilingReached,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::MaxExecRetriesReached => "max_exec_retries_reached",
            Self::MaxValidationRetriesReached => "max_validation_retries_reached",
            Self::MaxValidationRetriesReachedRanAcceptance => {
                "max_validation_retries_reached_ran_acceptance"
            }
            Self::GlobalStepCeilingReached => "global_step_ceiling_reached",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a case was driven: the repair loop, or a single generation with no retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Repair,
    Baseline,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repair => "repair",
            Self::Baseline => "baseline",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

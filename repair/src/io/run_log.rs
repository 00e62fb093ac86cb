//! The persisted record of one finished run (`run_log.json`).
//!
//! Product artifact, always written regardless of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::budget::Budgets;
use crate::core::state::RunState;
use crate::core::transition::TransitionRecord;
use crate::core::types::{
    AcceptanceOutcome, ExecutionOutcome, RunMode, TerminationReason, ValidationOutcome,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub problem: String,
    pub cr: String,
    #[serde(default)]
    pub mode: RunMode,
    /// Agent command line the run was generated with.
    #[serde(default)]
    pub agent_command: Vec<String>,
    pub termination_reason: TerminationReason,
    pub exec_retry_count: u32,
    pub validation_retry_count: u32,
    pub loop_count: u32,
    pub generator_calls: u32,
    pub steps: u32,
    pub budgets: Budgets,
    pub execution: ExecutionOutcome,
    pub validation: ValidationOutcome,
    /// Last verdict the validator returned, possibly for an earlier candidate.
    #[serde(default)]
    pub last_verdict: Option<ValidationOutcome>,
    pub acceptance: AcceptanceOutcome,
    pub candidate: Option<PathBuf>,
    pub last_ok_output: Option<Value>,
    pub feedback: Option<String>,
    pub transitions: Vec<TransitionRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunLog {
    /// Snapshot a finalized run. A state that has not reached the terminal phase is an error.
    pub fn from_state(
        state: &RunState,
        budgets: Budgets,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<Self> {
        if !state.is_finalized() {
            return Err(anyhow!(
                "run {}/{} is not finalized (phase {})",
                state.problem,
                state.cr,
                state.phase.name()
            ));
        }
        let termination_reason = state
            .termination_reason()
            .ok_or_else(|| anyhow!("finalized run has no termination reason"))?;
        Ok(Self {
            problem: state.problem.clone(),
            cr: state.cr.clone(),
            mode: RunMode::Repair,
            agent_command: Vec::new(),
            termination_reason,
            exec_retry_count: state.exec_retry_count(),
            validation_retry_count: state.validation_retry_count(),
            loop_count: state.loop_count(),
            generator_calls: state.generator_calls(),
            steps: state.steps(),
            budgets,
            execution: state.execution.clone(),
            validation: state.validation.clone(),
            last_verdict: state.last_verdict.clone(),
            acceptance: state.acceptance.clone(),
            candidate: state.candidate.clone(),
            last_ok_output: state.last_ok_output.clone(),
            feedback: state.feedback.clone(),
            transitions: state.transitions().to_vec(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        })
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_agent_command(mut self, command: Vec<String>) -> Self {
        self.agent_command = command;
        self
    }

    pub fn passed(&self) -> bool {
        self.acceptance.is_pass()
    }
}

pub fn load_run_log(path: &Path) -> Result<RunLog> {
    debug!(path = %path.display(), "loading run log");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run log {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run log {}", path.display()))
}

/// Atomically write the run log (temp file + rename).
pub fn write_run_log(path: &Path, log: &RunLog) -> Result<()> {
    debug!(path = %path.display(), reason = %log.termination_reason, "writing run log");
    let mut buf = serde_json::to_string_pretty(log)?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn refuses_unfinished_state() {
        let state = RunState::new("problem1", "CR1");
        let now = Utc::now();
        let err = RunLog::from_state(&state, Budgets::default(), now, now).unwrap_err();
        assert!(err.to_string().contains("not finalized"));
    }

    #[test]
    fn round_trips_with_tagged_outcomes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run_log.json");
        let mut state = RunState::new("problem1", "CR1");
        state.finalize(TerminationReason::MaxExecRetriesReached);
        let started = Utc::now();
        let log = RunLog::from_state(
            &state,
            Budgets::new(0, 5),
            started,
            started + Duration::milliseconds(1500),
        )
        .expect("log");
        assert_eq!(log.duration_ms, 1500);

        write_run_log(&path, &log).expect("write");
        let loaded = load_run_log(&path).expect("load");
        assert_eq!(loaded, log);

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["termination_reason"], "max_exec_retries_reached");
        assert_eq!(raw["execution"]["status"], "unknown");
        assert_eq!(raw["validation"]["status"], "skipped");
        assert_eq!(raw["acceptance"]["status"], "not_run");
        assert_eq!(raw["mode"], "repair");
        assert!(raw["last_verdict"].is_null());
    }

    #[test]
    fn records_agent_command_and_mode() {
        let mut state = RunState::new("problem1", "CR1");
        state.finalize(TerminationReason::Completed);
        let now = Utc::now();
        let log = RunLog::from_state(&state, Budgets::new(0, 0), now, now)
            .expect("log")
            .with_mode(RunMode::Baseline)
            .with_agent_command(vec!["codex".to_string(), "exec".to_string(), "-".to_string()]);

        let raw = serde_json::to_value(&log).expect("json");
        assert_eq!(raw["mode"], "baseline");
        assert_eq!(raw["agent_command"], serde_json::json!(["codex", "exec", "-"]));
    }
}

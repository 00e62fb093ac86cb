//! The single mutable record threaded through a repair run.
//!
//! Collaborator results are recorded with the `record_*` methods; counters and the
//! termination reason only move through the transition table and `finalize`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::feedback::{execution_feedback, validation_feedback};
use crate::core::transition::TransitionRecord;
use crate::core::types::{
    AcceptanceOutcome, ExecFailure, ExecFailureKind, ExecutionOutcome, TerminationReason,
    ValidationOutcome,
};

/// Workflow phase. `Finalize` carries the reason the routing edge asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "reason", rename_all = "snake_case")]
pub enum Phase {
    Start,
    Generate,
    Execute,
    Validate,
    Accept,
    Finalize(TerminationReason),
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalize(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Generate => "generate",
            Self::Execute => "execute",
            Self::Validate => "validate",
            Self::Accept => "accept",
            Self::Finalize(_) => "finalize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub problem: String,
    pub cr: String,
    pub phase: Phase,
    /// Most recent generated candidate. Never `None` after the first successful generation.
    pub candidate: Option<PathBuf>,
    pub execution: ExecutionOutcome,
    pub validation: ValidationOutcome,
    /// Most recent verdict the validator actually returned, for any candidate.
    /// Unlike `validation`, it survives a new candidate.
    pub last_verdict: Option<ValidationOutcome>,
    pub acceptance: AcceptanceOutcome,
    /// Derived from the most recent failure; consumed by the next generation.
    pub feedback: Option<String>,
    /// Output of the most recent successful execution.
    pub last_ok_output: Option<Value>,
    exec_retry_count: u32,
    validation_retry_count: u32,
    loop_count: u32,
    steps: u32,
    generator_calls: u32,
    termination_reason: Option<TerminationReason>,
    finalized: bool,
    transitions: Vec<TransitionRecord>,
}

impl RunState {
    pub fn new(problem: impl Into<String>, cr: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            cr: cr.into(),
            phase: Phase::Start,
            candidate: None,
            execution: ExecutionOutcome::Unknown,
            validation: ValidationOutcome::Unknown,
            last_verdict: None,
            acceptance: AcceptanceOutcome::NotRun,
            feedback: None,
            last_ok_output: None,
            exec_retry_count: 0,
            validation_retry_count: 0,
            loop_count: 0,
            steps: 0,
            generator_calls: 0,
            termination_reason: None,
            finalized: false,
            transitions: Vec::new(),
        }
    }

    pub fn exec_retry_count(&self) -> u32 {
        self.exec_retry_count
    }

    pub fn validation_retry_count(&self) -> u32 {
        self.validation_retry_count
    }

    /// Iterations started. Observability only; budgets never read it.
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Collaborator dispatches so far (generate, execute, validate, accept).
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn generator_calls(&self) -> u32 {
        self.generator_calls
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination_reason
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn candidate_path(&self) -> Option<&Path> {
        self.candidate.as_deref()
    }

    pub(crate) fn note_dispatch(&mut self) {
        self.steps = self.steps.saturating_add(1);
    }

    pub(crate) fn note_generator_call(&mut self) {
        self.generator_calls = self.generator_calls.saturating_add(1);
    }

    /// A new candidate replaces the old one; outcomes for the old one no longer apply.
    pub(crate) fn record_candidate(&mut self, path: PathBuf) {
        self.candidate = Some(path);
        self.execution = ExecutionOutcome::Unknown;
        self.validation = ValidationOutcome::Unknown;
        self.feedback = None;
    }

    pub(crate) fn record_generation_failure(&mut self, detail: impl Into<String>) {
        self.execution =
            ExecutionOutcome::Err(ExecFailure::new(ExecFailureKind::Generation, detail));
    }

    pub(crate) fn record_execution(&mut self, result: Result<Value, ExecFailure>) {
        self.execution = match result {
            Ok(output) => {
                self.last_ok_output = Some(output.clone());
                ExecutionOutcome::Ok(output)
            }
            Err(failure) => ExecutionOutcome::Err(failure),
        };
    }

    pub(crate) fn record_validation(&mut self, outcome: ValidationOutcome) {
        self.last_verdict = Some(outcome.clone());
        self.validation = outcome;
    }

    pub(crate) fn record_acceptance(&mut self, outcome: AcceptanceOutcome) {
        self.acceptance = outcome;
    }

    pub(crate) fn start_iteration(&mut self) {
        self.loop_count = self.loop_count.saturating_add(1);
    }

    pub(crate) fn retry_after_exec_failure(&mut self) {
        self.exec_retry_count = self.exec_retry_count.saturating_add(1);
        self.feedback = self.execution.failure().map(execution_feedback);
    }

    pub(crate) fn retry_after_validation(&mut self) {
        self.validation_retry_count = self.validation_retry_count.saturating_add(1);
        self.feedback = validation_feedback(&self.validation);
    }

    pub(crate) fn push_transition(&mut self, record: TransitionRecord) {
        self.transitions.push(record);
    }

    /// Set the termination reason if none is set yet. Returns whether it took effect.
    pub(crate) fn terminate(&mut self, reason: TerminationReason) -> bool {
        if self.termination_reason.is_some() {
            return false;
        }
        self.termination_reason = Some(reason);
        true
    }

    /// Enter the terminal state. Applied at most once; later calls are no-ops.
    ///
    /// `reason` only applies when no earlier edge already set one. A final candidate
    /// the validator never saw is reported as `Skipped` rather than `Unknown`;
    /// verdicts on earlier candidates stay in `last_verdict`.
    pub fn finalize(&mut self, reason: TerminationReason) -> bool {
        if self.finalized {
            return false;
        }
        self.terminate(reason);
        if self.validation == ValidationOutcome::Unknown {
            self.validation = ValidationOutcome::Skipped;
        }
        self.finalized = true;
        self.phase = Phase::Finalize(self.termination_reason.unwrap_or(reason));
        true
    }
}

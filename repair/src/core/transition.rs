//! Declarative routing table for the repair loop.
//!
//! Each [`Rule`] maps `(phase, outcome tag, guard)` to `(next phase, patch)`.
//! Rules are tried in order and the first whose guard holds wins. Counters and
//! the termination reason are only ever changed by applying a rule's [`Patch`].

use serde::{Deserialize, Serialize};

use crate::core::budget::Budgets;
use crate::core::state::{Phase, RunState};
use crate::core::types::TerminationReason;

/// Result class reported by the collaborator dispatched in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    Begin,
    Generated,
    GenerateFailed,
    ExecOk,
    ExecErr,
    Pass,
    NeedsChanges,
    Accepted,
}

impl OutcomeTag {
    pub const ALL: [OutcomeTag; 8] = [
        Self::Begin,
        Self::Generated,
        Self::GenerateFailed,
        Self::ExecOk,
        Self::ExecErr,
        Self::Pass,
        Self::NeedsChanges,
        Self::Accepted,
    ];

    /// The phase whose dispatch produces this tag.
    pub fn source_phase(self) -> Phase {
        match self {
            Self::Begin => Phase::Start,
            Self::Generated | Self::GenerateFailed => Phase::Generate,
            Self::ExecOk | Self::ExecErr => Phase::Execute,
            Self::Pass | Self::NeedsChanges => Phase::Validate,
            Self::Accepted => Phase::Accept,
        }
    }
}

/// Predicate over the run state that selects between rules sharing a phase and tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    ExecBudgetLeft,
    ExecBudgetSpent,
    ValidationBudgetLeft,
    /// Validation budget spent and the most recent execution succeeded.
    ValidationBudgetSpentRunnable,
    ValidationBudgetSpent,
}

impl Guard {
    pub fn holds(self, state: &RunState, budgets: &Budgets) -> bool {
        let exec_left = state.exec_retry_count() < budgets.max_exec_retries;
        let validation_left = state.validation_retry_count() < budgets.max_validation_retries;
        match self {
            Self::Always => true,
            Self::ExecBudgetLeft => exec_left,
            Self::ExecBudgetSpent => !exec_left,
            Self::ValidationBudgetLeft => validation_left,
            Self::ValidationBudgetSpentRunnable => !validation_left && state.execution.is_ok(),
            Self::ValidationBudgetSpent => !validation_left,
        }
    }
}

/// State change applied on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "patch", content = "reason", rename_all = "snake_case")]
pub enum Patch {
    Nothing,
    /// Loop counter +1.
    StartIteration,
    /// Exec retry counter +1, loop counter +1, feedback from the failure.
    RetryAfterExecFailure,
    /// Validation retry counter +1, loop counter +1, feedback from the issues.
    RetryAfterValidation,
    /// Set the termination reason without leaving the loop.
    Terminate(TerminationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub from: Phase,
    pub on: OutcomeTag,
    pub guard: Guard,
    pub to: Phase,
    pub patch: Patch,
}

const fn rule(from: Phase, on: OutcomeTag, guard: Guard, to: Phase, patch: Patch) -> Rule {
    Rule {
        from,
        on,
        guard,
        to,
        patch,
    }
}

pub static RULES: [Rule; 12] = [
    rule(
        Phase::Start,
        OutcomeTag::Begin,
        Guard::Always,
        Phase::Generate,
        Patch::StartIteration,
    ),
    rule(
        Phase::Generate,
        OutcomeTag::Generated,
        Guard::Always,
        Phase::Execute,
        Patch::Nothing,
    ),
    rule(
        Phase::Generate,
        OutcomeTag::GenerateFailed,
        Guard::ExecBudgetLeft,
        Phase::Generate,
        Patch::RetryAfterExecFailure,
    ),
    rule(
        Phase::Generate,
        OutcomeTag::GenerateFailed,
        Guard::ExecBudgetSpent,
        Phase::Finalize(TerminationReason::MaxExecRetriesReached),
        Patch::Nothing,
    ),
    rule(
        Phase::Execute,
        OutcomeTag::ExecOk,
        Guard::Always,
        Phase::Validate,
        Patch::Nothing,
    ),
    rule(
        Phase::Execute,
        OutcomeTag::ExecErr,
        Guard::ExecBudgetLeft,
        Phase::Generate,
        Patch::RetryAfterExecFailure,
    ),
    rule(
        Phase::Execute,
        OutcomeTag::ExecErr,
        Guard::ExecBudgetSpent,
        Phase::Finalize(TerminationReason::MaxExecRetriesReached),
        Patch::Nothing,
    ),
    rule(
        Phase::Validate,
        OutcomeTag::Pass,
        Guard::Always,
        Phase::Accept,
        Patch::Nothing,
    ),
    rule(
        Phase::Validate,
        OutcomeTag::NeedsChanges,
        Guard::ValidationBudgetLeft,
        Phase::Generate,
        Patch::RetryAfterValidation,
    ),
    rule(
        Phase::Validate,
        OutcomeTag::NeedsChanges,
        Guard::ValidationBudgetSpentRunnable,
        Phase::Accept,
        Patch::Terminate(TerminationReason::MaxValidationRetriesReachedRanAcceptance),
    ),
    rule(
        Phase::Validate,
        OutcomeTag::NeedsChanges,
        Guard::ValidationBudgetSpent,
        Phase::Finalize(TerminationReason::MaxValidationRetriesReached),
        Patch::Nothing,
    ),
    rule(
        Phase::Accept,
        OutcomeTag::Accepted,
        Guard::Always,
        Phase::Finalize(TerminationReason::Completed),
        Patch::Nothing,
    ),
];

/// Audit entry for one routed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub step: u32,
    pub from: Phase,
    pub on: OutcomeTag,
    pub to: Phase,
    pub patch: Patch,
}

/// First rule matching `(phase, tag)` whose guard holds.
pub fn route(
    phase: Phase,
    tag: OutcomeTag,
    state: &RunState,
    budgets: &Budgets,
) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.from == phase && rule.on == tag && rule.guard.holds(state, budgets))
}

/// Apply `rule` to `state`: patch, audit record, then the phase change.
///
/// A `Finalize` target goes through [`RunState::finalize`], so a reason set by an
/// earlier edge is kept.
pub fn apply(rule: &Rule, state: &mut RunState) {
    match rule.patch {
        Patch::Nothing => {}
        Patch::StartIteration => state.start_iteration(),
        Patch::RetryAfterExecFailure => {
            state.retry_after_exec_failure();
            state.start_iteration();
        }
        Patch::RetryAfterValidation => {
            state.retry_after_validation();
            state.start_iteration();
        }
        Patch::Terminate(reason) => {
            state.terminate(reason);
        }
    }
    state.push_transition(TransitionRecord {
        step: state.steps(),
        from: rule.from,
        on: rule.on,
        to: rule.to,
        patch: rule.patch,
    });
    match rule.to {
        Phase::Finalize(reason) => {
            state.finalize(reason);
        }
        next => state.phase = next,
    }
}

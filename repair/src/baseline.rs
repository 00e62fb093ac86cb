//! Single-shot baseline: one generation, one execution, one acceptance check.
//!
//! No edit plan, no validator and no retries. The run still ends as a finalized
//! [`RunState`], so its run log and batch entry have the same shape as a repair
//! run. A failed generation or execution finalizes with
//! [`TerminationReason::MaxExecRetriesReached`], which is what the repair loop
//! reports with an execution budget of zero.

use tracing::{info, instrument, warn};

use crate::core::budget::Budgets;
use crate::core::state::{Phase, RunState};
use crate::core::transition::{OutcomeTag, Patch, TransitionRecord};
use crate::core::types::{ExecFailure, ExecFailureKind, TerminationReason};
use crate::io::acceptance::AcceptanceTest;
use crate::io::candidate::CodeExecutor;
use crate::io::generator::{CodeGenerator, GenerateRequest};
use crate::workflow::run_acceptance;

/// Budgets recorded for baseline runs.
pub const BASELINE_BUDGETS: Budgets = Budgets::new(0, 0);

pub struct SingleShot<G, X, A> {
    generator: G,
    executor: X,
    acceptance: A,
}

impl<G, X, A> SingleShot<G, X, A>
where
    G: CodeGenerator,
    X: CodeExecutor,
    A: AcceptanceTest,
{
    pub fn new(generator: G, executor: X, acceptance: A) -> Self {
        Self {
            generator,
            executor,
            acceptance,
        }
    }

    /// Generate once, execute once, check once. A state past `Start` is returned as is.
    #[instrument(skip_all, fields(problem = %state.problem, cr = %state.cr))]
    pub fn run(&mut self, mut state: RunState) -> RunState {
        if state.phase != Phase::Start {
            return state;
        }
        state.start_iteration();
        edge(&mut state, OutcomeTag::Begin, Phase::Generate, Patch::StartIteration);

        state.note_dispatch();
        state.note_generator_call();
        let request = GenerateRequest {
            attempt: 1,
            previous_candidate: None,
            feedback: None,
        };
        match self.generator.generate(&request) {
            Ok(path) => {
                info!(candidate = %path.display(), "candidate generated");
                state.record_candidate(path);
                edge(&mut state, OutcomeTag::Generated, Phase::Execute, Patch::Nothing);
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "generation failed");
                state.record_generation_failure(format!("{err:#}"));
                edge(&mut state, OutcomeTag::GenerateFailed, exec_failed(), Patch::Nothing);
                return state;
            }
        }

        state.note_dispatch();
        let result = match state.candidate.as_deref() {
            Some(candidate) => self.executor.execute(candidate),
            None => Err(ExecFailure::new(
                ExecFailureKind::Launch,
                "no candidate to execute",
            )),
        };
        let executed = result.is_ok();
        state.record_execution(result);
        if !executed {
            info!("candidate execution failed");
            edge(&mut state, OutcomeTag::ExecErr, exec_failed(), Patch::Nothing);
            return state;
        }
        edge(&mut state, OutcomeTag::ExecOk, Phase::Accept, Patch::Nothing);

        state.note_dispatch();
        let outcome = run_acceptance(&mut self.acceptance, state.last_ok_output.as_ref());
        info!(pass = outcome.is_pass(), "acceptance finished");
        state.record_acceptance(outcome);
        edge(
            &mut state,
            OutcomeTag::Accepted,
            Phase::Finalize(TerminationReason::Completed),
            Patch::Nothing,
        );
        state
    }
}

fn exec_failed() -> Phase {
    Phase::Finalize(TerminationReason::MaxExecRetriesReached)
}

/// Record the edge and move to `to`.
fn edge(state: &mut RunState, on: OutcomeTag, to: Phase, patch: Patch) {
    state.push_transition(TransitionRecord {
        step: state.steps(),
        from: state.phase,
        on,
        to,
        patch,
    });
    match to {
        Phase::Finalize(reason) => {
            state.finalize(reason);
        }
        next => state.phase = next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AcceptanceOutcome, ExecutionOutcome, ValidationOutcome};
    use crate::test_support::{
        GenStep, ScriptedAcceptance, ScriptedExecutor, ScriptedGenerator, SeenRequest, exec_err,
        exec_ok,
    };
    use serde_json::json;

    #[test]
    fn passing_candidate_completes_without_validation() {
        let mut generator = ScriptedGenerator::always_writes(1);
        let mut executor = ScriptedExecutor::new([exec_ok(7)]);
        let mut acceptance = ScriptedAcceptance::new([Ok(AcceptanceOutcome::Pass)]);
        let state = SingleShot::new(&mut generator, &mut executor, &mut acceptance)
            .run(RunState::new("problem1", "CR1"));

        assert_eq!(state.termination_reason(), Some(TerminationReason::Completed));
        assert_eq!(state.acceptance, AcceptanceOutcome::Pass);
        assert_eq!(state.validation, ValidationOutcome::Skipped);
        assert_eq!(state.last_verdict, None);
        assert_eq!(state.steps(), 3);
        assert_eq!(
            generator.requests,
            [SeenRequest {
                attempt: 1,
                previous_candidate: None,
                feedback: None,
            }]
        );
        assert_eq!(acceptance.seen, [json!({"objective": 7})]);
        let edges: Vec<&str> = state.transitions().iter().map(|r| r.to.name()).collect();
        assert_eq!(edges, ["generate", "execute", "accept", "finalize"]);
    }

    #[test]
    fn failed_execution_is_not_retried() {
        let mut generator = ScriptedGenerator::always_writes(1);
        let mut executor = ScriptedExecutor::new([exec_err("NameError: x")]);
        let mut acceptance = ScriptedAcceptance::new([]);
        let state = SingleShot::new(&mut generator, &mut executor, &mut acceptance)
            .run(RunState::new("problem1", "CR1"));

        assert_eq!(
            state.termination_reason(),
            Some(TerminationReason::MaxExecRetriesReached)
        );
        assert_eq!(state.exec_retry_count(), 0);
        assert_eq!(state.acceptance, AcceptanceOutcome::NotRun);
        assert_eq!(acceptance.calls(), 0);
        assert!(matches!(state.execution, ExecutionOutcome::Err(_)));
    }

    #[test]
    fn generator_error_ends_the_run() {
        let mut generator = ScriptedGenerator::new([GenStep::Fail("agent timed out".to_string())]);
        let mut executor = ScriptedExecutor::new([]);
        let mut acceptance = ScriptedAcceptance::new([]);
        let state = SingleShot::new(&mut generator, &mut executor, &mut acceptance)
            .run(RunState::new("problem1", "CR1"));

        assert_eq!(
            state.termination_reason(),
            Some(TerminationReason::MaxExecRetriesReached)
        );
        assert_eq!(executor.calls(), 0);
        let Some(failure) = state.execution.failure() else {
            panic!("expected a failure, got {:?}", state.execution);
        };
        assert_eq!(failure.kind, ExecFailureKind::Generation);
        assert!(failure.detail.contains("agent timed out"));
    }
}

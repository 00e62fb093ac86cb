//! The repair loop: dispatch collaborators and route their outcomes.
//!
//! Routing lives in [`crate::core::transition`]; this module only turns
//! collaborator results into outcome tags, records them on the [`RunState`],
//! and enforces the two safety valves (global step ceiling and the generator
//! call bound). No collaborator error escapes [`RepairWorkflow::run`].

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::core::budget::Budgets;
use crate::core::state::{Phase, RunState};
use crate::core::transition::{OutcomeTag, apply, route};
use crate::core::types::{
    AcceptanceOutcome, ExecFailure, ExecFailureKind, TerminationReason, ValidationOutcome,
};
use crate::core::verdict;
use crate::io::acceptance::AcceptanceTest;
use crate::io::candidate::CodeExecutor;
use crate::io::generator::{CodeGenerator, GenerateRequest};
use crate::io::validator::SemanticValidator;

pub struct RepairWorkflow<G, X, V, A> {
    generator: G,
    executor: X,
    validator: V,
    acceptance: A,
    budgets: Budgets,
}

impl<G, X, V, A> RepairWorkflow<G, X, V, A>
where
    G: CodeGenerator,
    X: CodeExecutor,
    V: SemanticValidator,
    A: AcceptanceTest,
{
    pub fn new(generator: G, executor: X, validator: V, acceptance: A, budgets: Budgets) -> Self {
        Self {
            generator,
            executor,
            validator,
            acceptance,
            budgets,
        }
    }

    pub fn budgets(&self) -> Budgets {
        self.budgets
    }

    /// Drive `state` to the terminal phase and hand it back.
    #[instrument(skip_all, fields(problem = %state.problem, cr = %state.cr))]
    pub fn run(&mut self, mut state: RunState) -> RunState {
        while !state.phase.is_terminal() {
            self.step(&mut state);
        }
        info!(
            reason = ?state.termination_reason(),
            exec_retries = state.exec_retry_count(),
            validation_retries = state.validation_retry_count(),
            generator_calls = state.generator_calls(),
            accepted = state.acceptance.is_pass(),
            "run finished"
        );
        state
    }

    /// Advance one edge: dispatch the current phase's collaborator, then route.
    pub fn step(&mut self, state: &mut RunState) {
        let phase = state.phase;
        if phase.is_terminal() {
            return;
        }
        // An Accept entered with a reason already set (the ran-acceptance edge) must
        // still dispatch, or that reason would describe an acceptance run that never happened.
        let acceptance_promised = phase == Phase::Accept && state.termination_reason().is_some();
        if phase != Phase::Start
            && !acceptance_promised
            && self.budgets.step_ceiling_reached(state.steps())
        {
            warn!(steps = state.steps(), "global step ceiling reached");
            state.finalize(TerminationReason::GlobalStepCeilingReached);
            return;
        }

        let tag = match phase {
            Phase::Start => OutcomeTag::Begin,
            Phase::Generate => {
                if state.generator_calls() >= self.budgets.generator_call_limit() {
                    warn!(
                        calls = state.generator_calls(),
                        "generator call bound reached"
                    );
                    state.finalize(TerminationReason::GlobalStepCeilingReached);
                    return;
                }
                self.dispatch_generate(state)
            }
            Phase::Execute => self.dispatch_execute(state),
            Phase::Validate => self.dispatch_validate(state),
            Phase::Accept => self.dispatch_accept(state),
            Phase::Finalize(_) => return,
        };

        match route(phase, tag, state, &self.budgets) {
            Some(rule) => {
                debug!(from = phase.name(), on = ?tag, to = rule.to.name(), "transition");
                apply(rule, state);
            }
            None => {
                error!(from = phase.name(), on = ?tag, "no transition rule matched");
                state.finalize(TerminationReason::GlobalStepCeilingReached);
            }
        }
    }

    fn dispatch_generate(&mut self, state: &mut RunState) -> OutcomeTag {
        state.note_dispatch();
        state.note_generator_call();
        let request = GenerateRequest {
            attempt: state.generator_calls(),
            previous_candidate: state.candidate.as_deref(),
            feedback: state.feedback.as_deref(),
        };
        match self.generator.generate(&request) {
            Ok(path) => {
                info!(attempt = request.attempt, candidate = %path.display(), "candidate generated");
                state.record_candidate(path);
                OutcomeTag::Generated
            }
            Err(err) => {
                warn!(attempt = request.attempt, err = %format!("{err:#}"), "generation failed");
                state.record_generation_failure(format!("{err:#}"));
                OutcomeTag::GenerateFailed
            }
        }
    }

    fn dispatch_execute(&mut self, state: &mut RunState) -> OutcomeTag {
        state.note_dispatch();
        let result = match state.candidate.as_deref() {
            Some(candidate) => self.executor.execute(candidate),
            None => Err(ExecFailure::new(
                ExecFailureKind::Launch,
                "no candidate to execute",
            )),
        };
        let tag = match &result {
            Ok(_) => OutcomeTag::ExecOk,
            Err(failure) => {
                info!(kind = %failure.kind, "candidate execution failed");
                OutcomeTag::ExecErr
            }
        };
        state.record_execution(result);
        tag
    }

    fn dispatch_validate(&mut self, state: &mut RunState) -> OutcomeTag {
        state.note_dispatch();
        let outcome = match state.candidate.as_deref() {
            Some(candidate) => match self.validator.validate(candidate) {
                Ok(outcome @ (ValidationOutcome::Pass | ValidationOutcome::NeedsChanges { .. })) => {
                    outcome
                }
                Ok(other) => verdict::malfunction(format!("validator returned {other:?}")),
                Err(err) => verdict::malfunction(format!("{err:#}")),
            },
            None => verdict::malfunction("no candidate to validate"),
        };
        let tag = if outcome.is_pass() {
            OutcomeTag::Pass
        } else {
            OutcomeTag::NeedsChanges
        };
        state.record_validation(outcome);
        tag
    }

    fn dispatch_accept(&mut self, state: &mut RunState) -> OutcomeTag {
        state.note_dispatch();
        let outcome = run_acceptance(&mut self.acceptance, state.last_ok_output.as_ref());
        info!(pass = outcome.is_pass(), "acceptance finished");
        state.record_acceptance(outcome);
        OutcomeTag::Accepted
    }
}

/// Run the acceptance test on `output`, folding every fault into [`AcceptanceOutcome::Error`].
pub(crate) fn run_acceptance<A: AcceptanceTest>(
    acceptance: &mut A,
    output: Option<&Value>,
) -> AcceptanceOutcome {
    let Some(output) = output else {
        return AcceptanceOutcome::Error {
            detail: "no successful execution output to check".to_string(),
        };
    };
    match acceptance.accept(output) {
        Ok(outcome @ (AcceptanceOutcome::Pass
        | AcceptanceOutcome::Fail { .. }
        | AcceptanceOutcome::Error { .. })) => outcome,
        Ok(AcceptanceOutcome::NotRun) => AcceptanceOutcome::Error {
            detail: "acceptance test reported not_run".to_string(),
        },
        Err(err) => AcceptanceOutcome::Error {
            detail: format!("{err:#}"),
        },
    }
}

use serde::{Deserialize, Serialize};

use repair::io::run_log::RunLog;

/// Batch-level status of one case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// The acceptance test passed.
    Pass,
    /// The run finished but the acceptance test did not pass (or never ran).
    Fail,
    /// The run could not be set up, errored, or panicked.
    Skipped,
}

pub fn classify_run(log: &RunLog) -> CaseStatus {
    if log.passed() {
        CaseStatus::Pass
    } else {
        CaseStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repair::core::budget::Budgets;
    use repair::core::state::RunState;
    use repair::core::types::{AcceptanceOutcome, TerminationReason};

    fn log(acceptance: AcceptanceOutcome, reason: TerminationReason) -> RunLog {
        let mut state = RunState::new("problem1", "CR1");
        state.acceptance = acceptance;
        state.finalize(reason);
        let now = Utc::now();
        RunLog::from_state(&state, Budgets::default(), now, now).expect("log")
    }

    #[test]
    fn pass_only_when_acceptance_passed() {
        let passed = log(AcceptanceOutcome::Pass, TerminationReason::Completed);
        assert_eq!(classify_run(&passed), CaseStatus::Pass);

        let ran_anyway = log(
            AcceptanceOutcome::Pass,
            TerminationReason::MaxValidationRetriesReachedRanAcceptance,
        );
        assert_eq!(classify_run(&ran_anyway), CaseStatus::Pass);
    }

    #[test]
    fn fail_when_acceptance_failed_or_never_ran() {
        let failed = log(
            AcceptanceOutcome::Fail {
                detail: "capacity exceeded".to_string(),
            },
            TerminationReason::Completed,
        );
        assert_eq!(classify_run(&failed), CaseStatus::Fail);

        let exhausted = log(AcceptanceOutcome::NotRun, TerminationReason::MaxExecRetriesReached);
        assert_eq!(classify_run(&exhausted), CaseStatus::Fail);
    }
}

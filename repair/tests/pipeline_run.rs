//! End-to-end runs through the production adapters.
//!
//! The agent is scripted and `sh` stands in for the Python interpreter, so the
//! candidate programs and the acceptance shim are shell scripts.

use std::fs;

use repair::core::types::{
    AcceptanceOutcome, ExecFailureKind, ExecutionOutcome, RunMode, TerminationReason,
    ValidationOutcome,
};
use repair::io::config::RepairConfig;
use repair::io::layout::RunPaths;
use repair::io::problem::ProblemCase;
use repair::io::run_log::load_run_log;
use repair::pipeline::Pipeline;
use repair::test_support::{ScriptedAgent, TestProblems, plan_reply, verdict_reply};

const PASSING_SHIM: &str = "echo 'verify output follows'\necho '{\"status\": \"pass\", \"detail\": \"\"}'\n";

fn sh_config(max_exec_retries: u32) -> RepairConfig {
    RepairConfig {
        max_exec_retries,
        max_validation_retries: 1,
        executor_timeout_secs: 10,
        interpreter: vec!["sh".to_string()],
        ..RepairConfig::default()
    }
}

#[test]
fn runnable_and_validated_candidate_completes() {
    let problems = TestProblems::new().expect("problems");
    let case = ProblemCase::load(&problems.problem_dir("problem1"), "CR1").expect("case");
    let workdir = problems.root().join("runs/problem1/CR1/run");
    let agent = ScriptedAgent::new()
        .reply("planner", plan_reply())
        .reply("generator", "```sh\ncat input_data.json\n```")
        .reply("validator", verdict_reply(true));
    let cfg = sh_config(1);

    let log = Pipeline::new(&cfg, &agent)
        .with_acceptance_shim(PASSING_SHIM)
        .run(&case, &workdir)
        .expect("run");

    assert_eq!(log.termination_reason, TerminationReason::Completed);
    assert!(log.passed());
    assert_eq!(log.generator_calls, 1);
    assert_eq!(
        log.execution,
        ExecutionOutcome::Ok(serde_json::json!({"capacity": 3}))
    );

    let paths = RunPaths::new(&workdir);
    assert!(paths.plan().is_file());
    assert!(paths.attempt(1).is_file());
    assert_eq!(
        fs::read_to_string(paths.candidate()).expect("candidate"),
        "cat input_data.json\n"
    );
    assert!(paths.agent_call("validator", 1).with_extension("reply").is_file());
    assert_eq!(load_run_log(&paths.run_log()).expect("load"), log);
    assert_eq!(log.mode, RunMode::Repair);
    assert_eq!(log.agent_command, cfg.agent.command);

    let roles: Vec<String> = agent.prompts().into_iter().map(|(role, _)| role).collect();
    assert_eq!(roles, ["planner", "generator", "validator"]);
}

#[test]
fn failing_candidates_spend_exec_budget_and_still_write_log() {
    let problems = TestProblems::new().expect("problems");
    let case = ProblemCase::load(&problems.problem_dir("problem1"), "CR1").expect("case");
    let workdir = problems.root().join("run");
    let agent = ScriptedAgent::new()
        .reply("planner", plan_reply())
        .reply("generator", "echo 'NameError: capacity' >&2\nexit 1")
        .reply("generator", "echo 'still broken' >&2\nexit 1");
    let cfg = sh_config(1);

    let log = Pipeline::new(&cfg, &agent)
        .with_acceptance_shim(PASSING_SHIM)
        .run(&case, &workdir)
        .expect("run");

    assert_eq!(log.termination_reason, TerminationReason::MaxExecRetriesReached);
    assert_eq!(log.exec_retry_count, 1);
    assert_eq!(log.acceptance, AcceptanceOutcome::NotRun);
    let failure = match &log.execution {
        ExecutionOutcome::Err(failure) => failure,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(failure.kind, ExecFailureKind::NonZeroExit { code: Some(1) });
    assert!(failure.detail.contains("still broken"));

    // The second generator prompt carries the first failure's stderr.
    let prompts = agent.prompts();
    let (_, retry_prompt) = prompts
        .iter()
        .filter(|(role, _)| role == "generator")
        .nth(1)
        .expect("second generator prompt");
    assert!(retry_prompt.contains("NameError: capacity"));
    assert!(RunPaths::new(&workdir).run_log().is_file());
}

#[test]
fn planner_failure_is_a_setup_error() {
    let problems = TestProblems::new().expect("problems");
    let case = ProblemCase::load(&problems.problem_dir("problem1"), "CR1").expect("case");
    let workdir = problems.root().join("run");
    let agent = ScriptedAgent::new().reply("planner", "I could not produce a plan.");
    let cfg = sh_config(1);

    let err = Pipeline::new(&cfg, &agent)
        .run(&case, &workdir)
        .unwrap_err();

    assert!(format!("{err:#}").contains("plan edits for problem1/CR1"));
    assert!(!RunPaths::new(&workdir).run_log().exists());
}

#[test]
fn baseline_runs_one_generation_without_plan_or_validator() {
    let problems = TestProblems::new().expect("problems");
    let case = ProblemCase::load(&problems.problem_dir("problem1"), "CR1").expect("case");
    let workdir = problems.root().join("baseline");
    let agent = ScriptedAgent::new().reply("generator", "cat input_data.json");
    let cfg = sh_config(3);

    let log = Pipeline::new(&cfg, &agent)
        .with_acceptance_shim(PASSING_SHIM)
        .run_baseline(&case, &workdir)
        .expect("baseline");

    assert_eq!(log.mode, RunMode::Baseline);
    assert_eq!(log.termination_reason, TerminationReason::Completed);
    assert!(log.passed());
    assert_eq!(log.generator_calls, 1);
    assert_eq!(log.budgets.max_exec_retries, 0);
    assert_eq!(log.validation, ValidationOutcome::Skipped);

    let paths = RunPaths::new(&workdir);
    assert!(!paths.plan().exists());
    assert_eq!(load_run_log(&paths.run_log()).expect("load"), log);
    let prompts = agent.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, "generator");
    assert!(!prompts[0].1.contains("### Edit Plan"));
}

#[test]
fn baseline_does_not_retry_a_failing_candidate() {
    let problems = TestProblems::new().expect("problems");
    let case = ProblemCase::load(&problems.problem_dir("problem1"), "CR1").expect("case");
    let workdir = problems.root().join("baseline");
    let agent = ScriptedAgent::new().reply("generator", "echo 'NameError: capacity' >&2\nexit 1");
    let cfg = sh_config(3);

    let log = Pipeline::new(&cfg, &agent)
        .with_acceptance_shim(PASSING_SHIM)
        .run_baseline(&case, &workdir)
        .expect("baseline");

    assert_eq!(log.termination_reason, TerminationReason::MaxExecRetriesReached);
    assert_eq!(log.exec_retry_count, 0);
    assert_eq!(log.acceptance, AcceptanceOutcome::NotRun);
    assert_eq!(agent.prompts().len(), 1);
}

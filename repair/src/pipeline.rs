//! One end-to-end run of a problem/CR case with the production adapters.
//!
//! Setup (workspace, plan) failures are errors for the caller; everything after
//! the plan is absorbed by the workflow and ends in a finalized run log. The
//! baseline run skips the plan and drives [`SingleShot`] instead.

use std::path::{self, Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::baseline::{BASELINE_BUDGETS, SingleShot};
use crate::core::budget::Budgets;
use crate::core::state::RunState;
use crate::core::types::RunMode;
use crate::io::acceptance::ScriptAcceptanceTest;
use crate::io::agent::{Agent, AgentSettings};
use crate::io::candidate::InterpreterExecutor;
use crate::io::config::RepairConfig;
use crate::io::generator::AgentGenerator;
use crate::io::layout::RunPaths;
use crate::io::problem::ProblemCase;
use crate::io::prompt::PromptBuilder;
use crate::io::run_log::{RunLog, write_run_log};
use crate::io::validator::AgentValidator;
use crate::plan::plan_edits;
use crate::workflow::RepairWorkflow;

/// Runs cases with one config and one agent backend.
pub struct Pipeline<'a, A: ?Sized> {
    cfg: &'a RepairConfig,
    agent: &'a A,
    acceptance_shim: Option<String>,
}

impl<'a, A: Agent + ?Sized> Pipeline<'a, A> {
    pub fn new(cfg: &'a RepairConfig, agent: &'a A) -> Self {
        Self {
            cfg,
            agent,
            acceptance_shim: None,
        }
    }

    /// Replace the embedded acceptance shim (used when the interpreter is not Python).
    pub fn with_acceptance_shim(mut self, shim: impl Into<String>) -> Self {
        self.acceptance_shim = Some(shim.into());
        self
    }

    /// Plan, run the repair loop, and write `run_log.json` under `workdir`.
    #[instrument(skip_all, fields(case = %case.id(), workdir = %workdir.display()))]
    pub fn run(&self, case: &ProblemCase, workdir: &Path) -> Result<RunLog> {
        let started_at = Utc::now();
        let (paths, prompts, settings) = self.prepare(case, workdir)?;

        let plan = plan_edits(self.agent, &prompts, case, &paths, &settings)
            .with_context(|| format!("plan edits for {}", case.id()))?;

        let generator =
            AgentGenerator::new(self.agent, &prompts, case, Some(&plan), &paths, settings);
        let validator = AgentValidator::new(self.agent, &prompts, case, &paths, settings);
        let budgets = self.cfg.budgets();
        let mut workflow = RepairWorkflow::new(
            generator,
            self.executor(),
            validator,
            self.acceptance_test(case, &paths)?,
            budgets,
        );
        let state = workflow.run(RunState::new(&case.problem, &case.cr));
        self.finish(&state, budgets, RunMode::Repair, started_at, &paths)
    }

    /// One generation with no plan, validator or retries; same run log shape as [`Self::run`].
    #[instrument(skip_all, fields(case = %case.id(), workdir = %workdir.display()))]
    pub fn run_baseline(&self, case: &ProblemCase, workdir: &Path) -> Result<RunLog> {
        let started_at = Utc::now();
        let (paths, prompts, settings) = self.prepare(case, workdir)?;

        let generator = AgentGenerator::new(self.agent, &prompts, case, None, &paths, settings);
        let mut single_shot =
            SingleShot::new(generator, self.executor(), self.acceptance_test(case, &paths)?);
        let state = single_shot.run(RunState::new(&case.problem, &case.cr));
        self.finish(&state, BASELINE_BUDGETS, RunMode::Baseline, started_at, &paths)
    }

    fn prepare(
        &self,
        case: &ProblemCase,
        workdir: &Path,
    ) -> Result<(RunPaths, PromptBuilder, AgentSettings)> {
        let workdir = path::absolute(workdir)
            .with_context(|| format!("resolve workdir {}", workdir.display()))?;
        let paths = RunPaths::prepare(&workdir, case)?;
        let prompts = PromptBuilder::new(self.cfg.prompt_budget_bytes)?;
        let settings = AgentSettings {
            timeout: self.cfg.agent_timeout(),
            output_limit_bytes: self.cfg.output_limit_bytes,
        };
        Ok((paths, prompts, settings))
    }

    fn executor(&self) -> InterpreterExecutor {
        InterpreterExecutor::new(
            self.cfg.interpreter.clone(),
            self.cfg.executor_timeout(),
            self.cfg.output_limit_bytes,
        )
    }

    fn acceptance_test(&self, case: &ProblemCase, paths: &RunPaths) -> Result<ScriptAcceptanceTest> {
        let unit_test = path::absolute(case.unit_test_path())
            .with_context(|| format!("resolve unit test for {}", case.id()))?;
        let acceptance = ScriptAcceptanceTest::new(
            self.cfg.interpreter.clone(),
            unit_test,
            paths.input_data(),
            paths.acceptance_dir(),
            self.cfg.executor_timeout(),
            self.cfg.output_limit_bytes,
        );
        Ok(match &self.acceptance_shim {
            Some(shim) => acceptance.with_shim(shim.clone()),
            None => acceptance,
        })
    }

    fn finish(
        &self,
        state: &RunState,
        budgets: Budgets,
        mode: RunMode,
        started_at: DateTime<Utc>,
        paths: &RunPaths,
    ) -> Result<RunLog> {
        let log = RunLog::from_state(state, budgets, started_at, Utc::now())?
            .with_mode(mode)
            .with_agent_command(self.cfg.agent.command.clone());
        write_run_log(&paths.run_log(), &log)?;
        info!(
            %mode,
            reason = %log.termination_reason,
            passed = log.passed(),
            log = %paths.run_log().display(),
            "run log written"
        );
        Ok(log)
    }
}

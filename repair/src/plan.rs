//! Edit planning: one agent call that turns the change request into steps.
//!
//! The plan is computed once per run, before the repair loop, and handed to
//! every generator call. A planner failure is a setup error for the run.

use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::schema;
use crate::core::text::strip_code_fence;
use crate::io::agent::{Agent, AgentRequest, AgentSettings, invoke_and_read_text};
use crate::io::layout::RunPaths;
use crate::io::problem::ProblemCase;
use crate::io::prompt::PromptBuilder;

pub const PLAN_SCHEMA: &str = include_str!("../schemas/plan.schema.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AddConstraint,
    ModifyConstraint,
    RemoveConstraint,
    AddVariable,
    ModifyObjective,
    DataHandling,
    OutputFormat,
    Other,
}

/// One concrete edit to apply to the reference model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditStep {
    pub change_type: ChangeType,
    pub title: String,
    pub description: String,
    pub strategy: String,
    /// 1-based reference lines the step edits.
    #[serde(default)]
    pub target_lines: Vec<u32>,
    /// Insert new code after this reference line (`0` for the top of the file).
    #[serde(default)]
    pub insert_after_line: Option<u32>,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPlan {
    pub steps: Vec<EditStep>,
    #[serde(default)]
    pub preserve_sections: Vec<String>,
    #[serde(default)]
    pub notes_for_modifier: String,
}

impl EditPlan {
    /// Parse and schema-check a planner reply.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(strip_code_fence(raw)).context("parse planner reply")?;
        schema::check(PLAN_SCHEMA, &value).context("check planner reply")?;
        serde_json::from_value(value).context("read planner reply")
    }
}

/// Ask the planner agent for an edit plan and persist it as `plan.json`.
#[instrument(skip_all, fields(case = %case.id()))]
pub fn plan_edits<A: Agent + ?Sized>(
    agent: &A,
    prompts: &PromptBuilder,
    case: &ProblemCase,
    paths: &RunPaths,
    settings: &AgentSettings,
) -> Result<EditPlan> {
    let prompt = prompts.planner(case)?;
    let request = AgentRequest::for_call(
        paths,
        "planner",
        1,
        prompt,
        Some(paths.plan_schema()),
        settings,
    );
    let reply = invoke_and_read_text(agent, &request).context("planner agent")?;
    let plan = EditPlan::parse(&reply)?;
    let mut buf = serde_json::to_string_pretty(&plan)?;
    buf.push('\n');
    fs::write(paths.plan(), buf).with_context(|| format!("write {}", paths.plan().display()))?;
    info!(steps = plan.steps.len(), "edit plan ready");
    Ok(plan)
}

//! Test-only collaborators and fixtures.
//!
//! Scripted collaborators replay a fixed queue of results and record what they
//! were asked, so workflow tests can assert both the route taken and the inputs
//! each collaborator saw.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::types::{
    AcceptanceOutcome, ExecFailure, ExecFailureKind, Issue, IssueCategory, Severity,
    ValidationOutcome,
};
use crate::io::acceptance::AcceptanceTest;
use crate::io::agent::{Agent, AgentRequest};
use crate::io::candidate::CodeExecutor;
use crate::io::generator::{CodeGenerator, GenerateRequest};
use crate::io::layout::CANDIDATE_FILE;
use crate::io::problem::{
    BASE_DIR, CR_DESC_FILE, INPUT_DATA_FILE, PROBLEM_DESC_FILE, REFERENCE_MODEL_FILE,
    UNIT_TEST_FILE,
};
use crate::io::validator::SemanticValidator;

/// FIFO of scripted results. Running past the end panics with the collaborator name.
#[derive(Debug, Clone)]
pub struct Script<T> {
    name: &'static str,
    steps: VecDeque<T>,
    calls: u32,
}

impl<T> Script<T> {
    pub fn new(name: &'static str, steps: impl IntoIterator<Item = T>) -> Self {
        Self {
            name,
            steps: steps.into_iter().collect(),
            calls: 0,
        }
    }

    pub fn next_step(&mut self) -> T {
        self.calls += 1;
        match self.steps.pop_front() {
            Some(step) => step,
            None => panic!("{} script exhausted at call {}", self.name, self.calls),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

/// What one scripted generator call does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenStep {
    /// Return a fresh candidate path.
    Write,
    /// Return an error with this message.
    Fail(String),
    /// Panic with this message (an unexpected fault inside the generator).
    Panic(String),
}

/// Inputs observed by [`ScriptedGenerator`] for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub attempt: u32,
    pub previous_candidate: Option<PathBuf>,
    pub feedback: Option<String>,
}

/// Generator that returns `attempt_NN/generated_model.py` paths without touching disk.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Script<GenStep>,
    pub requests: Vec<SeenRequest>,
}

impl ScriptedGenerator {
    pub fn new(steps: impl IntoIterator<Item = GenStep>) -> Self {
        Self {
            script: Script::new("generator", steps),
            requests: Vec::new(),
        }
    }

    /// Generator that succeeds `calls` times.
    pub fn always_writes(calls: usize) -> Self {
        Self::new(std::iter::repeat_n(GenStep::Write, calls))
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

impl CodeGenerator for ScriptedGenerator {
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<PathBuf> {
        self.requests.push(SeenRequest {
            attempt: request.attempt,
            previous_candidate: request.previous_candidate.map(Path::to_path_buf),
            feedback: request.feedback.map(str::to_string),
        });
        match self.script.next_step() {
            GenStep::Write => Ok(PathBuf::from(format!("attempt_{:02}", request.attempt))
                .join(CANDIDATE_FILE)),
            GenStep::Fail(message) => Err(anyhow!(message)),
            GenStep::Panic(message) => panic!("{message}"),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Script<Result<Value, ExecFailure>>,
    pub seen: Vec<PathBuf>,
}

impl ScriptedExecutor {
    pub fn new(steps: impl IntoIterator<Item = Result<Value, ExecFailure>>) -> Self {
        Self {
            script: Script::new("executor", steps),
            seen: Vec::new(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

impl CodeExecutor for ScriptedExecutor {
    fn execute(&mut self, candidate: &Path) -> Result<Value, ExecFailure> {
        self.seen.push(candidate.to_path_buf());
        self.script.next_step()
    }
}

/// Validator replaying verdicts; an `Err(message)` step simulates a validator fault.
#[derive(Debug)]
pub struct ScriptedValidator {
    script: Script<Result<ValidationOutcome, String>>,
}

impl ScriptedValidator {
    pub fn new(steps: impl IntoIterator<Item = Result<ValidationOutcome, String>>) -> Self {
        Self {
            script: Script::new("validator", steps),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

impl SemanticValidator for ScriptedValidator {
    fn validate(&mut self, _candidate: &Path) -> Result<ValidationOutcome> {
        self.script.next_step().map_err(|message| anyhow!(message))
    }
}

#[derive(Debug)]
pub struct ScriptedAcceptance {
    script: Script<Result<AcceptanceOutcome, String>>,
    pub seen: Vec<Value>,
}

impl ScriptedAcceptance {
    pub fn new(steps: impl IntoIterator<Item = Result<AcceptanceOutcome, String>>) -> Self {
        Self {
            script: Script::new("acceptance", steps),
            seen: Vec::new(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.script.calls()
    }
}

impl AcceptanceTest for ScriptedAcceptance {
    fn accept(&mut self, output: &Value) -> Result<AcceptanceOutcome> {
        self.seen.push(output.clone());
        self.script.next_step().map_err(|message| anyhow!(message))
    }
}

/// Successful execution output tagged with `marker` so tests can tell runs apart.
pub fn exec_ok(marker: u32) -> Result<Value, ExecFailure> {
    Ok(json!({ "objective": marker }))
}

pub fn exec_err(detail: &str) -> Result<Value, ExecFailure> {
    Err(ExecFailure::new(
        ExecFailureKind::NonZeroExit { code: Some(1) },
        detail,
    ))
}

pub fn needs_changes(title: &str) -> Result<ValidationOutcome, String> {
    Ok(ValidationOutcome::NeedsChanges {
        summary: format!("{title} is missing"),
        issues: vec![Issue {
            title: title.to_string(),
            description: format!("the candidate does not implement {title}"),
            suggestion: format!("add {title}"),
            severity: Severity::High,
            category: IssueCategory::MissingConstraint,
        }],
    })
}

/// Agent replaying canned replies per role (`planner`, `generator`, `validator`).
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, role: &str, reply: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies
                .entry(role.to_string())
                .or_default()
                .push_back(reply.into());
        }
        self
    }

    /// `(role, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl Agent for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<()> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((request.role.clone(), request.prompt.clone()));
        }
        let reply = self
            .replies
            .lock()
            .map_err(|_| anyhow!("scripted agent lock poisoned"))?
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow!("no scripted reply left for {}", request.role))?;
        fs::write(&request.output_path, reply)
            .with_context(|| format!("write {}", request.output_path.display()))
    }
}

/// Planner reply with one step that satisfies the plan schema.
pub fn plan_reply() -> String {
    json!({
        "steps": [{
            "change_type": "add_constraint",
            "title": "cap total",
            "description": "limit the total to the new capacity",
            "strategy": "add one inequality after the data load",
            "target_lines": [],
            "insert_after_line": 1,
            "risks": []
        }],
        "preserve_sections": [],
        "notes_for_modifier": ""
    })
    .to_string()
}

pub fn verdict_reply(pass: bool) -> String {
    if pass {
        json!({"status": "pass", "summary": "ok", "issues": [], "notes_for_modifier": ""})
    } else {
        json!({
            "status": "needs_changes",
            "summary": "capacity constraint missing",
            "issues": [{
                "title": "capacity",
                "description": "no capacity constraint",
                "category": "missing_constraint",
                "severity": "high",
                "suggestion": "add it",
                "generated_lines": [],
                "reference_lines": [],
                "confidence": 0.9
            }],
            "notes_for_modifier": ""
        })
    }
    .to_string()
}

/// A problem root in a temp dir holding one `problem1/CR1` case.
pub struct TestProblems {
    temp: TempDir,
}

impl TestProblems {
    pub fn new() -> Result<Self> {
        let problems = Self {
            temp: tempfile::tempdir().context("create tempdir")?,
        };
        problems.add_case("problem1", "CR1")?;
        Ok(problems)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn problem_dir(&self, problem: &str) -> PathBuf {
        self.temp.path().join(problem)
    }

    /// Write a complete case; the base files are shared by every CR of a problem.
    pub fn add_case(&self, problem: &str, cr: &str) -> Result<PathBuf> {
        let problem_dir = self.problem_dir(problem);
        let base = problem_dir.join(BASE_DIR);
        let cr_dir = problem_dir.join(cr);
        fs::create_dir_all(&base).with_context(|| format!("create {}", base.display()))?;
        fs::create_dir_all(&cr_dir).with_context(|| format!("create {}", cr_dir.display()))?;

        let files = [
            (base.join(PROBLEM_DESC_FILE), "Assign jobs to machines.\n".to_string()),
            (
                base.join(REFERENCE_MODEL_FILE),
                "import json\nprint(json.dumps({\"total\": 1}))\n".to_string(),
            ),
            (
                cr_dir.join(CR_DESC_FILE),
                json!({
                    "content": "Machines now have a capacity.",
                    "value_info": [{"name": "capacity", "descr": "per machine"}],
                    "ref_sol_format": {"descr": "Print `total` as JSON."},
                    "prob_type": "MILP"
                })
                .to_string(),
            ),
            (cr_dir.join(INPUT_DATA_FILE), "{\"capacity\": 3}\n".to_string()),
            (cr_dir.join(UNIT_TEST_FILE), "def cr_verify_func(i, o):\n    return 'pass'\n".to_string()),
        ];
        for (path, contents) in files {
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(problem_dir)
    }
}

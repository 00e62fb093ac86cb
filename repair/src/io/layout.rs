//! Files inside one run workspace.
//!
//! Every run owns a directory. The candidate, the copied input data, agent
//! transcripts and the run log all live under it, so concurrent runs never
//! share a file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::verdict::VERDICT_SCHEMA;
use crate::io::problem::{INPUT_DATA_FILE, ProblemCase};
use crate::plan::PLAN_SCHEMA;

pub const CANDIDATE_FILE: &str = "generated_model.py";
pub const RUN_LOG_FILE: &str = "run_log.json";
pub const PLAN_FILE: &str = "plan.json";

#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the workspace and copy in the case's fixed input data and reply schemas.
    pub fn prepare(root: impl Into<PathBuf>, case: &ProblemCase) -> Result<Self> {
        let paths = Self::new(root);
        for dir in [paths.root.clone(), paths.attempts_dir(), paths.agents_dir(), paths.schemas_dir()] {
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let input = case.input_data_path();
        fs::copy(&input, paths.input_data())
            .with_context(|| format!("copy {} into workspace", input.display()))?;
        fs::write(paths.verdict_schema(), VERDICT_SCHEMA)
            .with_context(|| format!("write {}", paths.verdict_schema().display()))?;
        fs::write(paths.plan_schema(), PLAN_SCHEMA)
            .with_context(|| format!("write {}", paths.plan_schema().display()))?;
        debug!(root = %paths.root.display(), "workspace prepared");
        Ok(paths)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn candidate(&self) -> PathBuf {
        self.root.join(CANDIDATE_FILE)
    }

    pub fn input_data(&self) -> PathBuf {
        self.root.join(INPUT_DATA_FILE)
    }

    pub fn attempts_dir(&self) -> PathBuf {
        self.root.join("attempts")
    }

    /// Archived copy of the candidate produced by generator call `attempt`.
    pub fn attempt(&self, attempt: u32) -> PathBuf {
        self.attempts_dir().join(format!("attempt_{attempt:02}.py"))
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    /// Stem for the files of one agent call, e.g. `agents/validator_03`.
    pub fn agent_call(&self, role: &str, index: u32) -> PathBuf {
        self.agents_dir().join(format!("{role}_{index:02}"))
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.root.join("schemas")
    }

    pub fn verdict_schema(&self) -> PathBuf {
        self.schemas_dir().join("verdict.schema.json")
    }

    pub fn plan_schema(&self) -> PathBuf {
        self.schemas_dir().join("plan.schema.json")
    }

    pub fn plan(&self) -> PathBuf {
        self.root.join(PLAN_FILE)
    }

    pub fn acceptance_dir(&self) -> PathBuf {
        self.root.join("acceptance")
    }

    pub fn run_log(&self) -> PathBuf {
        self.root.join(RUN_LOG_FILE)
    }
}

//! Ground-truth acceptance check for a candidate's output.
//!
//! The change request ships a `unit_test.py` exposing a `*_verify_func(data,
//! solution)`. An embedded shim imports it, calls it on the fixed input data
//! and the candidate output, and prints the result as one JSON line.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::types::AcceptanceOutcome;
use crate::io::process::run_command;

const ACCEPTANCE_SHIM: &str = include_str!("shims/acceptance.py");

/// Checks a candidate's structured output against the change request.
pub trait AcceptanceTest {
    /// An `Err` means the check could not be run; the workflow records it as
    /// [`AcceptanceOutcome::Error`].
    fn accept(&mut self, output: &Value) -> Result<AcceptanceOutcome>;
}

impl<T: AcceptanceTest + ?Sized> AcceptanceTest for &mut T {
    fn accept(&mut self, output: &Value) -> Result<AcceptanceOutcome> {
        (**self).accept(output)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShimStatus {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Deserialize)]
struct ShimReport {
    status: ShimStatus,
    #[serde(default)]
    detail: String,
}

/// Runs the verify function through the shim with the configured interpreter.
#[derive(Debug, Clone)]
pub struct ScriptAcceptanceTest {
    interpreter: Vec<String>,
    unit_test: PathBuf,
    input_data: PathBuf,
    work_dir: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
    shim: String,
    runs: u32,
}

impl ScriptAcceptanceTest {
    pub fn new(
        interpreter: Vec<String>,
        unit_test: PathBuf,
        input_data: PathBuf,
        work_dir: PathBuf,
        timeout: Option<Duration>,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            interpreter,
            unit_test,
            input_data,
            work_dir,
            timeout,
            output_limit_bytes,
            shim: ACCEPTANCE_SHIM.to_string(),
            runs: 0,
        }
    }

    /// Replace the embedded shim. The replacement receives the same three arguments.
    pub fn with_shim(mut self, shim: impl Into<String>) -> Self {
        self.shim = shim.into();
        self
    }
}

impl AcceptanceTest for ScriptAcceptanceTest {
    #[instrument(skip_all, fields(unit_test = %self.unit_test.display()))]
    fn accept(&mut self, output: &Value) -> Result<AcceptanceOutcome> {
        self.runs += 1;
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("create {}", self.work_dir.display()))?;
        let shim_path = self.work_dir.join("acceptance_shim.py");
        fs::write(&shim_path, &self.shim)
            .with_context(|| format!("write {}", shim_path.display()))?;
        let output_path = self.work_dir.join(format!("output_{:02}.json", self.runs));
        let mut buf = serde_json::to_string_pretty(output)?;
        buf.push('\n');
        fs::write(&output_path, buf).with_context(|| format!("write {}", output_path.display()))?;

        let (program, args) = self
            .interpreter
            .split_first()
            .context("interpreter command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(&shim_path)
            .arg(&self.unit_test)
            .arg(&self.input_data)
            .arg(&output_path)
            .current_dir(&self.work_dir);

        let run = run_command(cmd, None, self.timeout, self.output_limit_bytes, None)
            .context("run acceptance shim")?;
        let transcript = self.work_dir.join(format!("acceptance_{:02}.log", self.runs));
        fs::write(&transcript, run.transcript("acceptance"))
            .with_context(|| format!("write {}", transcript.display()))?;

        if run.timed_out {
            warn!("acceptance check timed out");
            return Ok(AcceptanceOutcome::Error {
                detail: "acceptance check deadline exceeded".to_string(),
            });
        }
        if !run.status.success() {
            warn!(exit_code = ?run.status.code(), "acceptance shim failed");
            return Ok(AcceptanceOutcome::Error {
                detail: format!(
                    "acceptance shim exited with {:?}:\n{}",
                    run.status.code(),
                    run.stderr_lossy()
                ),
            });
        }

        let outcome = parse_report(&run.stdout_lossy());
        info!(pass = outcome.is_pass(), "acceptance result");
        Ok(outcome)
    }
}

/// Read the shim's report from the last non-empty stdout line.
///
/// Verify functions may print; only the final line is the report.
pub fn parse_report(stdout: &str) -> AcceptanceOutcome {
    let Some(line) = stdout.lines().rev().find(|line| !line.trim().is_empty()) else {
        return AcceptanceOutcome::Error {
            detail: "acceptance shim printed nothing".to_string(),
        };
    };
    match serde_json::from_str::<ShimReport>(line.trim()) {
        Ok(ShimReport {
            status: ShimStatus::Pass,
            ..
        }) => AcceptanceOutcome::Pass,
        Ok(ShimReport {
            status: ShimStatus::Fail,
            detail,
        }) => AcceptanceOutcome::Fail { detail },
        Ok(ShimReport {
            status: ShimStatus::Error,
            detail,
        }) => AcceptanceOutcome::Error { detail },
        Err(err) => AcceptanceOutcome::Error {
            detail: format!("unreadable acceptance report: {err}\n{line}"),
        },
    }
}

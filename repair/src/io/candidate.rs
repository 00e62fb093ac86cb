//! Running candidate programs and classifying how they fail.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ExecFailure, ExecFailureKind};
use crate::io::process::{CommandOutput, run_command};

/// Runs a candidate against its fixed input data.
pub trait CodeExecutor {
    /// Run `candidate`. `Ok` only for a zero exit whose stdout is one JSON object.
    fn execute(&mut self, candidate: &Path) -> Result<Value, ExecFailure>;
}

impl<X: CodeExecutor + ?Sized> CodeExecutor for &mut X {
    fn execute(&mut self, candidate: &Path) -> Result<Value, ExecFailure> {
        (**self).execute(candidate)
    }
}

/// Executor that runs `interpreter candidate` from the candidate's directory.
///
/// The directory must hold `input_data.json`; candidates read it by relative path.
#[derive(Debug, Clone)]
pub struct InterpreterExecutor {
    interpreter: Vec<String>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl InterpreterExecutor {
    pub fn new(interpreter: Vec<String>, timeout: Option<Duration>, output_limit_bytes: usize) -> Self {
        Self {
            interpreter,
            timeout,
            output_limit_bytes,
        }
    }
}

impl CodeExecutor for InterpreterExecutor {
    #[instrument(skip_all, fields(candidate = %candidate.display()))]
    fn execute(&mut self, candidate: &Path) -> Result<Value, ExecFailure> {
        let Some((program, args)) = self.interpreter.split_first() else {
            return Err(ExecFailure::new(
                ExecFailureKind::Launch,
                "interpreter command is empty",
            ));
        };
        let (Some(dir), Some(file)) = (candidate.parent(), candidate.file_name()) else {
            return Err(ExecFailure::new(
                ExecFailureKind::Launch,
                format!("candidate path has no file name: {}", candidate.display()),
            ));
        };

        let mut cmd = Command::new(program);
        cmd.args(args).arg(file);
        if !dir.as_os_str().is_empty() {
            cmd.current_dir(dir);
        }

        info!("executing candidate");
        let output = run_command(cmd, None, self.timeout, self.output_limit_bytes, None)
            .map_err(|err| ExecFailure::new(ExecFailureKind::Launch, format!("{err:#}")))?;
        classify(&output, self.timeout)
    }
}

/// Map a finished process onto the execution outcome.
pub fn classify(output: &CommandOutput, timeout: Option<Duration>) -> Result<Value, ExecFailure> {
    if output.timed_out {
        let limit_secs = timeout.map_or(0, |t| t.as_secs());
        warn!(limit_secs, "candidate timed out");
        return Err(ExecFailure::timeout(limit_secs));
    }
    if !output.status.success() {
        let code = output.status.code();
        warn!(exit_code = ?code, "candidate exited with failure");
        return Err(ExecFailure::new(
            ExecFailureKind::NonZeroExit { code },
            output.stderr_lossy(),
        ));
    }

    let stdout = output.stdout_lossy();
    if output.stdout_truncated > 0 {
        return Err(ExecFailure::new(
            ExecFailureKind::MalformedOutput,
            format!(
                "stdout exceeded the capture limit by {} bytes",
                output.stdout_truncated
            ),
        ));
    }
    match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(value @ Value::Object(_)) => {
            debug!("candidate produced structured output");
            Ok(value)
        }
        Ok(other) => Err(ExecFailure::new(
            ExecFailureKind::MalformedOutput,
            format!("expected a JSON object, got {other}"),
        )),
        Err(err) => Err(ExecFailure::new(
            ExecFailureKind::MalformedOutput,
            format!("stdout is not valid JSON: {err}\nStdout:\n{stdout}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sh_executor(timeout: Option<Duration>) -> InterpreterExecutor {
        InterpreterExecutor::new(vec!["sh".to_string()], timeout, 10_000)
    }

    fn candidate(dir: &Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("generated_model.py");
        fs::write(&path, script).expect("write candidate");
        path
    }

    #[test]
    fn json_object_on_stdout_is_ok() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "echo '{\"obj\": 3}'\n");
        let value = sh_executor(None).execute(&path).expect("ok");
        assert_eq!(value["obj"], 3);
    }

    #[test]
    fn runs_from_candidate_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("input_data.json"), "{\"n\": 4}").expect("input");
        let path = candidate(temp.path(), "cat input_data.json\n");
        let value = sh_executor(None).execute(&path).expect("ok");
        assert_eq!(value["n"], 4);
    }

    #[test]
    fn non_zero_exit_keeps_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "echo 'NameError: x' >&2\nexit 1\n");
        let failure = sh_executor(None).execute(&path).unwrap_err();
        assert_eq!(failure.kind, ExecFailureKind::NonZeroExit { code: Some(1) });
        assert!(failure.detail.contains("NameError: x"));
    }

    #[test]
    fn timeout_is_deadline_exceeded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "exec sleep 5\n");
        let failure = sh_executor(Some(Duration::from_millis(200)))
            .execute(&path)
            .unwrap_err();
        assert!(matches!(failure.kind, ExecFailureKind::Timeout { .. }));
        assert_eq!(failure.detail, "deadline exceeded");
    }

    #[test]
    fn unparseable_stdout_is_malformed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "echo 'Optimal solution found'\n");
        let failure = sh_executor(None).execute(&path).unwrap_err();
        assert_eq!(failure.kind, ExecFailureKind::MalformedOutput);
        assert!(failure.detail.starts_with("stdout is not valid JSON"));
        assert!(failure.to_string().starts_with("malformed output:"));
    }

    #[test]
    fn json_scalar_is_malformed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "echo 42\n");
        let failure = sh_executor(None).execute(&path).unwrap_err();
        assert_eq!(failure.kind, ExecFailureKind::MalformedOutput);
    }

    #[test]
    fn missing_interpreter_is_launch_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = candidate(temp.path(), "");
        let mut executor =
            InterpreterExecutor::new(vec!["/no/such/interpreter".to_string()], None, 100);
        let failure = executor.execute(&path).unwrap_err();
        assert_eq!(failure.kind, ExecFailureKind::Launch);
    }
}

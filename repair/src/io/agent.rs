//! Agent abstraction for planner, generator and validator calls.
//!
//! The [`Agent`] trait decouples the workflow adapters from the actual backend
//! (by default `codex exec`). Tests use scripted agents that write predetermined
//! replies without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::core::text::strip_code_fence;
use crate::io::layout::RunPaths;
use crate::io::process::{CommandOutput, run_command};

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Short label used in logs (`planner`, `generator`, `validator`).
    pub role: String,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Prompt text fed on stdin.
    pub prompt: String,
    /// JSON Schema constraining the reply, if the reply is structured.
    pub output_schema_path: Option<PathBuf>,
    /// Where the agent must write its final message.
    pub output_path: PathBuf,
    /// Where to write the agent's stdout/stderr transcript.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl AgentRequest {
    /// Request for the `index`-th `role` call of a run, with files under `agents/`.
    pub fn for_call(
        paths: &RunPaths,
        role: &str,
        index: u32,
        prompt: String,
        output_schema_path: Option<PathBuf>,
        settings: &AgentSettings,
    ) -> Self {
        let stem = paths.agent_call(role, index);
        Self {
            role: role.to_string(),
            workdir: paths.root().to_path_buf(),
            prompt,
            output_schema_path,
            output_path: stem.with_extension("reply"),
            log_path: stem.with_extension("log"),
            timeout: settings.timeout,
            output_limit_bytes: settings.output_limit_bytes,
        }
    }
}

/// Limits shared by every agent call of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Abstraction over agent backends.
pub trait Agent {
    /// Run the agent. On success the reply is at `request.output_path`.
    fn invoke(&self, request: &AgentRequest) -> Result<()>;
}

impl<A: Agent + ?Sized> Agent for &A {
    fn invoke(&self, request: &AgentRequest) -> Result<()> {
        (**self).invoke(request)
    }
}

/// Agent that spawns a `codex exec`-compatible command.
///
/// The configured command is extended with `--output-schema`,
/// `--output-last-message` and `-` (prompt on stdin).
#[derive(Debug, Clone)]
pub struct CodexAgent {
    command: Vec<String>,
}

impl CodexAgent {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(anyhow!("agent command must not be empty"));
        }
        Ok(Self { command })
    }
}

impl Agent for CodexAgent {
    #[instrument(skip_all, fields(role = %request.role, timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &AgentRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting agent");

        if let Some(schema) = &request.output_schema_path
            && !schema.exists()
        {
            return Err(anyhow!("missing output schema {}", schema.display()));
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        if let Some(schema) = &request.output_schema_path {
            cmd.arg("--output-schema").arg(schema);
        }
        cmd.arg("--output-last-message")
            .arg(&request.output_path)
            .arg("-")
            .current_dir(&request.workdir);

        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            Some(request.timeout),
            request.output_limit_bytes,
            None,
        )
        .with_context(|| format!("run {} agent", request.role))?;

        write_agent_log(&request.log_path, &output, &request.role)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
            return Err(anyhow!(
                "{} agent timed out after {:?}",
                request.role,
                request.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent failed");
            return Err(anyhow!(
                "{} agent failed with status {:?}",
                request.role,
                output.status.code()
            ));
        }

        debug!("agent completed successfully");
        Ok(())
    }
}

/// Invoke the agent and return its reply as text.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn invoke_and_read_text<A: Agent + ?Sized>(agent: &A, request: &AgentRequest) -> Result<String> {
    agent.invoke(request)?;
    ensure_output_exists(&request.output_path)?;
    fs::read_to_string(&request.output_path)
        .with_context(|| format!("read agent output {}", request.output_path.display()))
}

/// Invoke the agent and parse its reply as JSON of type `T`.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn invoke_and_load_json<A: Agent + ?Sized, T: DeserializeOwned>(
    agent: &A,
    request: &AgentRequest,
) -> Result<T> {
    let text = invoke_and_read_text(agent, request)?;
    let value = serde_json::from_str(strip_code_fence(&text))
        .with_context(|| format!("parse {}", request.output_path.display()))?;
    Ok(value)
}

fn ensure_output_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("missing agent output {}", path.display()));
    }
    Ok(())
}

fn write_agent_log(path: &Path, output: &CommandOutput, role: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create agent log dir {}", parent.display()))?;
    }
    fs::write(path, output.transcript(role))
        .with_context(|| format!("write agent log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct FakeAgent {
        reply: Option<&'static str>,
    }

    impl Agent for FakeAgent {
        fn invoke(&self, request: &AgentRequest) -> Result<()> {
            if let Some(reply) = self.reply {
                fs::write(&request.output_path, reply)?;
            }
            Ok(())
        }
    }

    fn request(dir: &Path) -> AgentRequest {
        AgentRequest {
            role: "validator".to_string(),
            workdir: dir.to_path_buf(),
            prompt: "prompt".to_string(),
            output_schema_path: None,
            output_path: dir.join("reply.txt"),
            log_path: dir.join("agent.log"),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1000,
        }
    }

    #[test]
    fn call_files_live_under_agents_dir() {
        let paths = RunPaths::new("/tmp/run");
        let settings = AgentSettings {
            timeout: Duration::from_secs(1),
            output_limit_bytes: 10,
        };
        let request = AgentRequest::for_call(&paths, "planner", 1, String::new(), None, &settings);
        assert_eq!(request.output_path, Path::new("/tmp/run/agents/planner_01.reply"));
        assert_eq!(request.log_path, Path::new("/tmp/run/agents/planner_01.log"));
    }

    #[test]
    fn load_json_strips_fences() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeAgent {
            reply: Some("```json\n{\"status\": \"pass\"}\n```"),
        };
        let value: Value = invoke_and_load_json(&fake, &request(temp.path())).expect("load");
        assert_eq!(value["status"], "pass");
    }

    #[test]
    fn missing_output_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeAgent { reply: None };
        let err = invoke_and_read_text(&fake, &request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("missing agent output"));
    }

    /// A shell script stands in for `codex exec`: it copies stdin to the
    /// `--output-last-message` path.
    #[test]
    fn codex_agent_passes_prompt_and_output_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = "while [ \"$1\" != \"--output-last-message\" ]; do shift; done; cat > \"$2\"";
        let agent = CodexAgent::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "agent".to_string(),
        ])
        .expect("agent");
        let text = invoke_and_read_text(&agent, &request(temp.path())).expect("invoke");
        assert_eq!(text, "prompt");
        assert!(temp.path().join("agent.log").exists());
    }

    #[test]
    fn codex_agent_reports_failure_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = CodexAgent::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "exit 3".to_string(),
        ])
        .expect("agent");
        let err = agent.invoke(&request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("failed with status Some(3)"));
    }
}

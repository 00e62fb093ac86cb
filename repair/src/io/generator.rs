//! Producing candidate programs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::text::strip_code_fence;
use crate::io::agent::{Agent, AgentRequest, AgentSettings, invoke_and_read_text};
use crate::io::layout::RunPaths;
use crate::io::problem::ProblemCase;
use crate::io::prompt::{GeneratorPrompt, PromptBuilder};
use crate::io::write_atomic;
use crate::plan::EditPlan;

/// Inputs for one generator call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// 1-based generator call number within the run.
    pub attempt: u32,
    /// Candidate from the previous attempt, if any.
    pub previous_candidate: Option<&'a Path>,
    /// Feedback derived from the most recent failure, if any.
    pub feedback: Option<&'a str>,
}

/// Produces a new candidate program.
pub trait CodeGenerator {
    /// Write a new candidate and return its path.
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<PathBuf>;
}

impl<G: CodeGenerator + ?Sized> CodeGenerator for &mut G {
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<PathBuf> {
        (**self).generate(request)
    }
}

/// Generator backed by an agent that replies with the full program.
pub struct AgentGenerator<'a, A: ?Sized> {
    agent: &'a A,
    prompts: &'a PromptBuilder,
    case: &'a ProblemCase,
    plan: Option<&'a EditPlan>,
    paths: &'a RunPaths,
    settings: AgentSettings,
}

impl<'a, A: Agent + ?Sized> AgentGenerator<'a, A> {
    pub fn new(
        agent: &'a A,
        prompts: &'a PromptBuilder,
        case: &'a ProblemCase,
        plan: Option<&'a EditPlan>,
        paths: &'a RunPaths,
        settings: AgentSettings,
    ) -> Self {
        Self {
            agent,
            prompts,
            case,
            plan,
            paths,
            settings,
        }
    }
}

impl<A: Agent + ?Sized> CodeGenerator for AgentGenerator<'_, A> {
    #[instrument(skip_all, fields(attempt = request.attempt))]
    fn generate(&mut self, request: &GenerateRequest<'_>) -> Result<PathBuf> {
        let previous_code = match request.previous_candidate {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("read previous candidate {}", path.display()))?,
            ),
            None => None,
        };
        let prompt = self.prompts.generator(
            self.case,
            GeneratorPrompt {
                attempt: request.attempt,
                plan: self.plan,
                previous_code: previous_code.as_deref(),
                feedback: request.feedback,
            },
        )?;
        let agent_request = AgentRequest::for_call(
            self.paths,
            "generator",
            request.attempt,
            prompt,
            None,
            &self.settings,
        );
        let reply = invoke_and_read_text(self.agent, &agent_request)?;
        let code = extract_code(&reply)?;

        write_atomic(&self.paths.attempt(request.attempt), &code)?;
        let candidate = self.paths.candidate();
        write_atomic(&candidate, &code)?;
        info!(bytes = code.len(), "candidate written");
        Ok(candidate)
    }
}

/// Program text from a generator reply: fences stripped, trailing newline ensured.
pub fn extract_code(reply: &str) -> Result<String> {
    let code = strip_code_fence(reply);
    if code.trim().is_empty() {
        return Err(anyhow!("generator returned no code"));
    }
    let mut code = code.to_string();
    code.push('\n');
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_program() {
        let code = extract_code("```python\nimport json\nprint(json.dumps({}))\n```").expect("code");
        assert_eq!(code, "import json\nprint(json.dumps({}))\n");
    }

    #[test]
    fn empty_reply_is_an_error() {
        let err = extract_code("```python\n```").unwrap_err();
        assert!(err.to_string().contains("no code"));
        assert!(extract_code("   \n").is_err());
    }
}

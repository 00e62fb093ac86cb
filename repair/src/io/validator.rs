//! Semantic validation of a runnable candidate.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::types::ValidationOutcome;
use crate::core::verdict::parse_verdict;
use crate::io::agent::{Agent, AgentRequest, AgentSettings, invoke_and_read_text};
use crate::io::layout::RunPaths;
use crate::io::problem::ProblemCase;
use crate::io::prompt::PromptBuilder;

/// Judges whether a candidate implements the change request.
pub trait SemanticValidator {
    /// An `Err` means the validator itself failed; the workflow treats it as a
    /// malfunction verdict.
    fn validate(&mut self, candidate: &Path) -> Result<ValidationOutcome>;
}

impl<V: SemanticValidator + ?Sized> SemanticValidator for &mut V {
    fn validate(&mut self, candidate: &Path) -> Result<ValidationOutcome> {
        (**self).validate(candidate)
    }
}

/// Validator backed by an agent replying with the verdict schema.
pub struct AgentValidator<'a, A: ?Sized> {
    agent: &'a A,
    prompts: &'a PromptBuilder,
    case: &'a ProblemCase,
    paths: &'a RunPaths,
    settings: AgentSettings,
    calls: u32,
}

impl<'a, A: Agent + ?Sized> AgentValidator<'a, A> {
    pub fn new(
        agent: &'a A,
        prompts: &'a PromptBuilder,
        case: &'a ProblemCase,
        paths: &'a RunPaths,
        settings: AgentSettings,
    ) -> Self {
        Self {
            agent,
            prompts,
            case,
            paths,
            settings,
            calls: 0,
        }
    }
}

impl<A: Agent + ?Sized> SemanticValidator for AgentValidator<'_, A> {
    #[instrument(skip_all, fields(candidate = %candidate.display()))]
    fn validate(&mut self, candidate: &Path) -> Result<ValidationOutcome> {
        self.calls += 1;
        let code = fs::read_to_string(candidate)
            .with_context(|| format!("read candidate {}", candidate.display()))?;
        let prompt = self.prompts.validator(self.case, &code)?;
        let request = AgentRequest::for_call(
            self.paths,
            "validator",
            self.calls,
            prompt,
            Some(self.paths.verdict_schema()),
            &self.settings,
        );
        let reply = invoke_and_read_text(self.agent, &request)?;
        let outcome = parse_verdict(&reply);
        info!(pass = outcome.is_pass(), "validator verdict");
        Ok(outcome)
    }
}

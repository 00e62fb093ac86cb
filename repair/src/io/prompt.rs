//! Prompt rendering for the planner, generator and validator agents.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::text::number_lines;
use crate::io::problem::ProblemCase;
use crate::plan::EditPlan;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const GENERATOR_TEMPLATE: &str = include_str!("prompts/generator.md");
const VALIDATOR_TEMPLATE: &str = include_str!("prompts/validator.md");

/// Optional sections are dropped in this order until the prompt fits.
const DROP_ORDER: [&str; 4] = ["format", "previous", "plan", "reference"];

/// Case fields shared by every template.
#[derive(Debug, Clone, Serialize)]
struct CaseContext {
    problem_desc: String,
    cr_content: String,
    value_info: String,
    ref_sol_format: String,
    output_keys: Vec<String>,
    reference_numbered: String,
}

impl CaseContext {
    fn from_case(case: &ProblemCase) -> Self {
        Self {
            problem_desc: case.problem_desc.trim().to_string(),
            cr_content: case.description.content.trim().to_string(),
            value_info: pretty(&case.description.value_info),
            ref_sol_format: pretty(&case.description.ref_sol_format),
            output_keys: case.description.expected_output_keys(),
            reference_numbered: number_lines(&case.reference_code),
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Inputs for one generator prompt beyond the case itself.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorPrompt<'a> {
    pub attempt: u32,
    /// Absent for single-shot generation.
    pub plan: Option<&'a EditPlan>,
    pub previous_code: Option<&'a str>,
    pub feedback: Option<&'a str>,
}

/// Renders prompts within a byte budget, dropping optional sections first.
pub struct PromptBuilder {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("generator", GENERATOR_TEMPLATE)
            .context("load generator template")?;
        env.add_template("validator", VALIDATOR_TEMPLATE)
            .context("load validator template")?;
        Ok(Self { env, budget_bytes })
    }

    pub fn planner(&self, case: &ProblemCase) -> Result<String> {
        let rendered = self
            .env
            .get_template("planner")?
            .render(CaseContext::from_case(case))
            .context("render planner prompt")?;
        Ok(self.fit(&rendered))
    }

    pub fn generator(&self, case: &ProblemCase, input: GeneratorPrompt<'_>) -> Result<String> {
        let rendered = self
            .env
            .get_template("generator")?
            .render(context! {
                attempt => input.attempt,
                plan => input.plan.map(pretty),
                previous_code => input.previous_code.map(str::trim).filter(|s| !s.is_empty()),
                feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
                ..minijinja::Value::from_serialize(CaseContext::from_case(case))
            })
            .context("render generator prompt")?;
        Ok(self.fit(&rendered))
    }

    pub fn validator(&self, case: &ProblemCase, candidate_code: &str) -> Result<String> {
        let rendered = self
            .env
            .get_template("validator")?
            .render(context! {
                candidate_numbered => number_lines(candidate_code),
                ..minijinja::Value::from_serialize(CaseContext::from_case(case))
            })
            .context("render validator prompt")?;
        Ok(self.fit(&rendered))
    }

    fn fit(&self, rendered: &str) -> String {
        let mut sections = parse_sections(rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        render_sections(&sections)
    }
}

/// A section of rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

/// Split rendered output on `<!-- section:KEY required|droppable -->` markers.
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("valid regex")
    });

    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len = |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let other_len: usize = sections
        .iter()
        .rev()
        .skip(1)
        .map(|s| s.content.len())
        .sum();
    let allowed = budget.saturating_sub(other_len);
    if let Some(last) = sections.last_mut()
        && last.content.len() > allowed
    {
        let before_len = last.content.len();
        let mut cut = allowed.saturating_sub(12);
        while !last.content.is_char_boundary(cut) {
            cut -= 1;
        }
        last.content.truncate(cut);
        last.content.push_str("\n[truncated]");
        debug!(
            section = %last.key,
            before_len,
            after_len = last.content.len(),
            "truncated section for budget"
        );
    }
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

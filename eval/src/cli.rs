//! CLI command implementations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use repair::io::agent::CodexAgent;
use repair::core::types::RunMode;
use repair::io::config::ConfigOverrides;
use repair::io::problem::{CaseFilter, ProblemCase};
use repair::pipeline::Pipeline;

use crate::case::load_cases;
use crate::config::{batch_config, config_hash};
use crate::report::aggregate;
use crate::results::{summary_path, write_summary};
use crate::run::{BatchOptions, run_batch};

/// List all discoverable cases.
pub fn list_cases(problems_root: &Path, filter: &CaseFilter) -> Result<()> {
    for case in load_cases(problems_root, filter)? {
        println!("{}", case.id());
    }
    Ok(())
}

/// Inputs for `eval run`.
#[derive(Debug)]
pub struct RunArgs<'a> {
    pub problems_root: &'a Path,
    pub output_root: &'a Path,
    pub config: &'a Path,
    pub filter: CaseFilter,
    pub jobs: usize,
    pub mode: RunMode,
    pub overrides: ConfigOverrides,
}

/// Run every matching case and write the batch summary.
pub fn run_cases(args: &RunArgs<'_>) -> Result<()> {
    let cfg = batch_config(args.config, &args.overrides)?;
    let cases = load_cases(args.problems_root, &args.filter)?;
    if cases.is_empty() {
        println!("run: no cases under {}", args.problems_root.display());
        return Ok(());
    }
    info!(cases = cases.len(), jobs = args.jobs, mode = %args.mode, "starting batch");

    let agent = CodexAgent::new(cfg.agent.command.clone())?;
    let pipeline = Pipeline::new(&cfg, &agent);
    let options = BatchOptions {
        output_root: args.output_root,
        jobs: args.jobs,
        config_hash: config_hash(&cfg)?,
        mode: args.mode,
        agent_command: cfg.agent.command.clone(),
    };
    let summary = run_batch(&cases, &options, |case, workdir| {
        let problem = ProblemCase::load(&case.problem_dir, &case.cr)?;
        match args.mode {
            RunMode::Repair => pipeline.run(&problem, workdir),
            RunMode::Baseline => pipeline.run_baseline(&problem, workdir),
        }
    })?;

    for entry in &summary.cases {
        println!(
            "run: case={} status={:?} reason={} workspace={}",
            entry.id(),
            entry.status,
            entry
                .termination_reason
                .map_or_else(|| "-".to_string(), |reason| reason.to_string()),
            entry.workspace.as_deref().unwrap_or("-")
        );
    }
    let path = summary_path(args.output_root, summary.mode, &summary.batch_id);
    write_summary(&path, &summary)?;
    println!(
        "run: mode={} total={} pass={} fail={} skipped={} summary={}",
        summary.mode,
        summary.counts.total,
        summary.counts.pass,
        summary.counts.fail,
        summary.counts.skipped,
        path.display()
    );
    Ok(())
}

/// Show counts and the termination-reason histogram of one batch summary.
pub fn report_summary(summary_path: &Path) -> Result<()> {
    let (summary, warnings) = aggregate(summary_path)?;
    let counts = summary.counts;
    if let Some(mode) = &summary.mode {
        println!("report: mode={}", mode);
    }
    println!(
        "report: total={} pass={} fail={} skipped={}",
        counts.total, counts.pass, counts.fail, counts.skipped
    );
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={:.2}", avg);
    }
    for (reason, count) in summary.reasons {
        println!("report: reason {} {}", reason, count);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Remove all workspaces and summaries under the output root.
pub fn clean_results(output_root: &Path) -> Result<()> {
    if output_root.exists() {
        fs::remove_dir_all(output_root)
            .with_context(|| format!("remove {}", output_root.display()))?;
    }
    println!("clean: results={}", output_root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_output_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = temp.path().join("results");
        fs::create_dir_all(output.join("problem1/CR1/20260118_120000_abc123")).expect("dirs");
        fs::write(output.join("workflow_summary_20260118_120000.json"), "{}").expect("summary");

        clean_results(&output).expect("clean");
        assert!(!output.exists());
        clean_results(&output).expect("clean is idempotent");
    }
}

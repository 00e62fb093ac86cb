//! Bounded repair loop for optimization-model change requests.
//!
//! `repair run` plans the edit, loops generate → execute → validate → accept
//! within the configured budgets, and writes `run_log.json` into the run's
//! workspace. `exec` and `check` run a single model by hand.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use repair::core::types::AcceptanceOutcome;
use repair::exit_codes;
use repair::io::acceptance::{AcceptanceTest, ScriptAcceptanceTest};
use repair::io::agent::CodexAgent;
use repair::io::candidate::{CodeExecutor, InterpreterExecutor};
use repair::io::config::{
    ConfigOverrides, DEFAULT_CONFIG_FILE, RepairConfig, resolve_config, write_config,
};
use repair::io::layout::RunPaths;
use repair::io::problem::ProblemCase;
use repair::logging;
use repair::pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "repair",
    version,
    about = "Bounded repair loop for optimization-model change requests"
)]
struct Cli {
    /// Config file; a missing file means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the repair workflow for one problem/CR case.
    Run {
        /// Problem directory (holds `base/` and the CR directories).
        #[arg(long)]
        problem: PathBuf,
        /// Change request directory name, e.g. `CR1`.
        #[arg(long)]
        cr: String,
        /// Run workspace. Defaults to `runs/<problem>/<cr>/<timestamp>`.
        #[arg(long)]
        workdir: Option<PathBuf>,
        #[command(flatten)]
        budgets: BudgetArgs,
    },
    /// Run one model from its own directory and print its JSON output.
    Exec {
        #[arg(long)]
        model: PathBuf,
        /// Seconds before the model is killed (0 disables the deadline).
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a model and the CR's acceptance test.
    Check {
        #[arg(long)]
        problem: PathBuf,
        #[arg(long)]
        cr: String,
        /// Model to check. Defaults to the CR's own `reference_model.py`.
        #[arg(long)]
        model: Option<PathBuf>,
        /// Defaults to `runs/<problem>/<cr>/check`.
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Default, Args)]
struct BudgetArgs {
    #[arg(long)]
    max_exec_retries: Option<u32>,
    #[arg(long)]
    max_validation_retries: Option<u32>,
    /// Seconds per candidate execution (0 disables the deadline).
    #[arg(long)]
    executor_timeout: Option<u64>,
    /// Ceiling on collaborator dispatches per run.
    #[arg(long)]
    max_steps: Option<u32>,
}

impl BudgetArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_exec_retries: self.max_exec_retries,
            max_validation_retries: self.max_validation_retries,
            executor_timeout_secs: self.executor_timeout,
            max_steps: self.max_steps,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            problem,
            cr,
            workdir,
            budgets,
        } => cmd_run(&cli.config, &problem, &cr, workdir, &budgets.overrides()),
        Command::Exec { model, timeout } => cmd_exec(&cli.config, &model, timeout),
        Command::Check {
            problem,
            cr,
            model,
            workdir,
        } => cmd_check(&cli.config, &problem, &cr, model, workdir),
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn cmd_run(
    config: &Path,
    problem: &Path,
    cr: &str,
    workdir: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<i32> {
    let cfg = resolve_config(config, overrides)?;
    let case = ProblemCase::load(problem, cr)?;
    let workdir = workdir.unwrap_or_else(|| {
        case_runs_dir(&case).join(Utc::now().format("%Y%m%d_%H%M%S").to_string())
    });
    let agent = CodexAgent::new(cfg.agent.command.clone())?;

    let log = Pipeline::new(&cfg, &agent).run(&case, &workdir)?;
    println!("{}", log.termination_reason);
    println!("{}", RunPaths::new(&workdir).run_log().display());
    Ok(if log.passed() {
        exit_codes::OK
    } else {
        exit_codes::INCOMPLETE
    })
}

fn cmd_exec(config: &Path, model: &Path, timeout: Option<u64>) -> Result<i32> {
    let overrides = ConfigOverrides {
        executor_timeout_secs: timeout,
        ..ConfigOverrides::default()
    };
    let cfg = resolve_config(config, &overrides)?;
    let mut executor = executor_for(&cfg);
    match executor.execute(model) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(exit_codes::OK)
        }
        Err(failure) => {
            eprintln!("{failure}");
            Ok(exit_codes::INCOMPLETE)
        }
    }
}

fn cmd_check(
    config: &Path,
    problem: &Path,
    cr: &str,
    model: Option<PathBuf>,
    workdir: Option<PathBuf>,
) -> Result<i32> {
    let cfg = resolve_config(config, &ConfigOverrides::default())?;
    let case = ProblemCase::load(problem, cr)?;
    let model = model.unwrap_or_else(|| case.cr_reference_model_path());
    let workdir = workdir.unwrap_or_else(|| case_runs_dir(&case).join("check"));

    let paths = RunPaths::prepare(&workdir, &case)?;
    fs::copy(&model, paths.candidate())
        .with_context(|| format!("copy {} into {}", model.display(), workdir.display()))?;

    let output = match executor_for(&cfg).execute(&paths.candidate()) {
        Ok(output) => output,
        Err(failure) => {
            eprintln!("{failure}");
            return Ok(exit_codes::INCOMPLETE);
        }
    };
    let unit_test = std::path::absolute(case.unit_test_path()).context("resolve unit test")?;
    let input_data = std::path::absolute(paths.input_data()).context("resolve input data")?;
    let acceptance_dir =
        std::path::absolute(paths.acceptance_dir()).context("resolve acceptance dir")?;
    let outcome = ScriptAcceptanceTest::new(
        cfg.interpreter.clone(),
        unit_test,
        input_data,
        acceptance_dir,
        cfg.executor_timeout(),
        cfg.output_limit_bytes,
    )
    .accept(&output)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(match outcome {
        AcceptanceOutcome::Pass => exit_codes::OK,
        _ => exit_codes::INCOMPLETE,
    })
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &RepairConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn executor_for(cfg: &RepairConfig) -> InterpreterExecutor {
    InterpreterExecutor::new(
        cfg.interpreter.clone(),
        cfg.executor_timeout(),
        cfg.output_limit_bytes,
    )
}

fn case_runs_dir(case: &ProblemCase) -> PathBuf {
    Path::new("runs").join(&case.problem).join(&case.cr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "repair",
            "run",
            "--problem",
            "data/problem3",
            "--cr",
            "CR1",
            "--max-exec-retries",
            "0",
            "--executor-timeout",
            "5",
        ]);
        let Command::Run {
            problem,
            cr,
            workdir,
            budgets,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(problem, PathBuf::from("data/problem3"));
        assert_eq!(cr, "CR1");
        assert!(workdir.is_none());
        let overrides = budgets.overrides();
        assert_eq!(overrides.max_exec_retries, Some(0));
        assert_eq!(overrides.executor_timeout_secs, Some(5));
        assert_eq!(overrides.max_validation_retries, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["repair", "exec", "--model", "m.py", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Command::Exec { timeout: None, .. }));
    }

    #[test]
    fn parse_init_config_force() {
        let cli = Cli::parse_from(["repair", "init-config", "--force"]);
        assert!(matches!(cli.command, Command::InitConfig { force: true }));
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "max_exec_retries = 1\n").expect("seed");
        let err = cmd_init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(cmd_init_config(&path, true).expect("force"), exit_codes::OK);
    }
}

mod case;
mod cli;
mod config;
mod outcome;
mod report;
mod results;
mod run;
mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use repair::core::types::RunMode;
use repair::io::config::{ConfigOverrides, DEFAULT_CONFIG_FILE};
use repair::io::problem::CaseFilter;

#[derive(Parser)]
#[command(name = "eval", version, about = "Batch driver for the repair workflow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the `problem/CR` id of every case.
    List {
        #[arg(long, default_value = "data")]
        problems_root: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Run the workflow for every case and write a batch summary.
    Run {
        #[arg(long, default_value = "data")]
        problems_root: PathBuf,
        #[arg(long, default_value = "results")]
        output_root: PathBuf,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Cases run in parallel.
        #[arg(long, default_value_t = 1)]
        jobs: usize,
        /// `repair` runs the full loop; `baseline` generates once with no retries.
        #[arg(long, value_enum, default_value_t = ModeArg::Repair)]
        mode: ModeArg,
        #[arg(long)]
        max_exec_retries: Option<u32>,
        #[arg(long)]
        max_validation_retries: Option<u32>,
        /// Seconds per candidate execution (0 disables the deadline).
        #[arg(long)]
        executor_timeout: Option<u64>,
        #[arg(long)]
        max_steps: Option<u32>,
    },
    /// Summarize a `workflow_summary_*.json` or `baseline_summary_*.json` file.
    Report { summary: PathBuf },
    /// Remove all results under the output root.
    Clean {
        #[arg(long, default_value = "results")]
        output_root: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Repair,
    Baseline,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Repair => RunMode::Repair,
            ModeArg::Baseline => RunMode::Baseline,
        }
    }
}

#[derive(Debug, Default, Args)]
struct FilterArgs {
    #[arg(long)]
    only_problem: Option<String>,
    #[arg(long)]
    only_cr: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> CaseFilter {
        CaseFilter {
            only_problem: self.only_problem,
            only_cr: self.only_cr,
        }
    }
}

fn main() -> Result<()> {
    repair::logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::List {
            problems_root,
            filter,
        } => cli::list_cases(&problems_root, &filter.into_filter()),
        Command::Run {
            problems_root,
            output_root,
            config,
            filter,
            jobs,
            mode,
            max_exec_retries,
            max_validation_retries,
            executor_timeout,
            max_steps,
        } => cli::run_cases(&cli::RunArgs {
            problems_root: &problems_root,
            output_root: &output_root,
            config: &config,
            filter: filter.into_filter(),
            jobs,
            mode: mode.into(),
            overrides: ConfigOverrides {
                max_exec_retries,
                max_validation_retries,
                executor_timeout_secs: executor_timeout,
                max_steps,
            },
        }),
        Command::Report { summary } => cli::report_summary(&summary),
        Command::Clean { output_root } => cli::clean_results(&output_root),
    }
}

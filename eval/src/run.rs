//! Batch execution.
//!
//! Cases run on a rayon pool, each in its own workspace. A failing or
//! panicking case is recorded as skipped and never aborts the batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use repair::io::layout::RunPaths;
use repair::core::types::RunMode;
use repair::io::problem::CaseRef;
use repair::io::run_log::RunLog;

use crate::case::case_hash;
use crate::results::{BatchSummary, CaseEntry};
use crate::workspace::{create_workspace, generate_timestamp};

/// Batch-wide settings.
#[derive(Debug, Clone)]
pub struct BatchOptions<'a> {
    pub output_root: &'a Path,
    /// Worker threads; `0` is treated as `1`.
    pub jobs: usize,
    pub config_hash: String,
    pub mode: RunMode,
    pub agent_command: Vec<String>,
}

/// Run every case with `runner(case, workspace_root)` and collect the summary.
///
/// Entries keep the order of `cases` regardless of `jobs`.
#[instrument(skip_all, fields(cases = cases.len(), jobs = options.jobs, mode = %options.mode))]
pub fn run_batch<F>(cases: &[CaseRef], options: &BatchOptions<'_>, runner: F) -> Result<BatchSummary>
where
    F: Fn(&CaseRef, &Path) -> Result<RunLog> + Sync,
{
    let batch_id = generate_timestamp();
    let started_at = Utc::now();
    info!(batch_id, "batch started");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .context("build worker pool")?;
    let entries: Vec<CaseEntry> = pool.install(|| {
        cases
            .par_iter()
            .map(|case| run_one(case, options.output_root, &runner))
            .collect()
    });

    let summary = BatchSummary::new(
        batch_id,
        options.config_hash.clone(),
        started_at,
        Utc::now(),
        entries,
    )
    .with_run_settings(options.mode, options.agent_command.clone());
    info!(
        total = summary.counts.total,
        pass = summary.counts.pass,
        fail = summary.counts.fail,
        skipped = summary.counts.skipped,
        "batch finished"
    );
    Ok(summary)
}

#[instrument(skip_all, fields(case = %case.id()))]
fn run_one<F>(case: &CaseRef, output_root: &Path, runner: &F) -> CaseEntry
where
    F: Fn(&CaseRef, &Path) -> Result<RunLog>,
{
    let hash = match case_hash(case) {
        Ok(hash) => Some(hash),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "case hash unavailable");
            None
        }
    };

    let workspace = match create_workspace(output_root, case) {
        Ok(workspace) => workspace,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "workspace setup failed");
            return CaseEntry {
                case_hash: hash,
                ..CaseEntry::skipped(case, None, format!("{err:#}"))
            };
        }
    };
    debug!(workspace = %workspace.root.display(), "workspace created");

    let started = Utc::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| runner(case, &workspace.root)));
    let mut entry = match result {
        Ok(Ok(log)) => {
            let run_log = RunPaths::new(&workspace.root).run_log();
            CaseEntry::from_log(case, &log, &workspace.root, &run_log)
        }
        Ok(Err(err)) => {
            warn!(err = %format!("{err:#}"), "case run failed");
            CaseEntry::skipped(case, Some(&workspace.root), format!("{err:#}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%message, "case run panicked");
            CaseEntry::skipped(
                case,
                Some(&workspace.root),
                format!("panic: {message}"),
            )
        }
    };
    entry.case_hash = hash;
    if entry.duration_secs == 0.0 {
        entry.duration_secs = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
    }
    info!(status = ?entry.status, reason = ?entry.termination_reason, "case finished");
    entry
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

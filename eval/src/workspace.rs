//! Workspace creation and management.
//!
//! Each case run gets an isolated directory
//! `<output-root>/<problem>/<cr>/<timestamp>_<suffix>/` that holds the
//! candidate, the copied input data, agent transcripts and `run_log.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};

use repair::io::problem::CaseRef;

/// An isolated workspace for one case run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    /// Directory name (timestamp and random suffix).
    pub name: String,
}

/// Create a fresh workspace for `case` under `output_root`.
pub fn create_workspace(output_root: &Path, case: &CaseRef) -> Result<Workspace> {
    let case_dir = output_root.join(&case.problem).join(&case.cr);
    fs::create_dir_all(&case_dir)
        .with_context(|| format!("create case results dir {}", case_dir.display()))?;

    let timestamp = generate_timestamp();
    let name = build_workspace_name(&timestamp, &generate_short_id());
    let root = case_dir.join(&name);
    if root.exists() {
        bail!("workspace {} already exists", root.display());
    }
    fs::create_dir_all(&root)
        .with_context(|| format!("create workspace root {}", root.display()))?;

    let seed = format!(
        "case_id: {}\nproblem_dir: {}\ncreated_at: {timestamp}\n",
        case.id(),
        case.problem_dir.display()
    );
    fs::write(root.join("README.txt"), seed)
        .with_context(|| format!("write seed {}", root.display()))?;

    Ok(Workspace { root, name })
}

pub fn build_workspace_name(timestamp: &str, short_id: &str) -> String {
    format!("{timestamp}_{short_id}")
}

pub fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn case_ref(root: &Path) -> CaseRef {
        CaseRef {
            problem: "problem3".to_string(),
            cr: "CR2".to_string(),
            problem_dir: root.join("data/problem3"),
        }
    }

    #[test]
    fn workspace_name_uses_expected_format() {
        let name = build_workspace_name("20260118_120000", "abc123");
        assert_eq!(name, "20260118_120000_abc123");
    }

    #[test]
    fn workspaces_are_isolated_per_run() {
        let temp = tempdir().expect("tempdir");
        let case = case_ref(temp.path());
        let first = create_workspace(temp.path(), &case).expect("first");
        let second = create_workspace(temp.path(), &case).expect("second");

        assert_ne!(first.root, second.root);
        assert_eq!(first.root.parent(), Some(temp.path().join("problem3/CR2").as_path()));
        let seed = fs::read_to_string(first.root.join("README.txt")).expect("seed");
        assert!(seed.starts_with("case_id: problem3/CR2\n"));
    }
}

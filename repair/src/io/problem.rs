//! Problem and change-request inputs on disk.
//!
//! A problem directory holds `base/problem_desc.txt` and
//! `base/reference_model.py`. Each `CR*` directory beside `base/` holds
//! `desc.json`, `input_data.json` and `unit_test.py`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BASE_DIR: &str = "base";
pub const PROBLEM_DESC_FILE: &str = "problem_desc.txt";
pub const REFERENCE_MODEL_FILE: &str = "reference_model.py";
pub const CR_DESC_FILE: &str = "desc.json";
pub const INPUT_DATA_FILE: &str = "input_data.json";
pub const UNIT_TEST_FILE: &str = "unit_test.py";

/// `desc.json` for one change request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrDescription {
    pub content: String,
    pub value_info: Value,
    pub ref_sol_format: Value,
    pub prob_type: Option<String>,
}

impl CrDescription {
    /// Output keys named in `ref_sol_format`.
    ///
    /// Entries are keyed by placeholders (`var1`, `var2`, ...). The real key is the
    /// first backtick-quoted name in each entry's `descr`, without a trailing `:`.
    /// A bare `{"descr": ...}` object is read the same way.
    pub fn expected_output_keys(&self) -> Vec<String> {
        static FIRST_BACKTICKED: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

        let entries: Vec<&Value> = match &self.ref_sol_format {
            Value::Object(map) if map.contains_key("descr") => vec![&self.ref_sol_format],
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };

        let mut keys: Vec<String> = Vec::new();
        for entry in entries {
            let Some(descr) = entry.get("descr").and_then(Value::as_str) else {
                continue;
            };
            let Some(caps) = FIRST_BACKTICKED.captures(descr) else {
                continue;
            };
            let name = caps[1].trim();
            let name = name.strip_suffix(':').map_or(name, str::trim);
            if !name.is_empty() && !keys.iter().any(|k| k == name) {
                keys.push(name.to_string());
            }
        }
        keys
    }
}

/// Everything needed to run one (problem, change request) pair.
#[derive(Debug, Clone)]
pub struct ProblemCase {
    pub problem: String,
    pub cr: String,
    pub problem_dir: PathBuf,
    pub cr_dir: PathBuf,
    pub problem_desc: String,
    pub reference_code: String,
    pub description: CrDescription,
}

impl ProblemCase {
    /// Load and check the inputs for `problem_dir/<cr>`.
    pub fn load(problem_dir: &Path, cr: &str) -> Result<Self> {
        let problem = dir_name(problem_dir)?;
        let base_dir = problem_dir.join(BASE_DIR);
        let cr_dir = problem_dir.join(cr);
        if !cr_dir.is_dir() {
            return Err(anyhow!("missing change request dir {}", cr_dir.display()));
        }

        let problem_desc = read_required(&base_dir.join(PROBLEM_DESC_FILE), "base description")?;
        let reference_code = read_required(&base_dir.join(REFERENCE_MODEL_FILE), "base model")?;
        let desc_path = cr_dir.join(CR_DESC_FILE);
        let desc_raw = read_required(&desc_path, "CR description")?;
        let description: CrDescription = serde_json::from_str(&desc_raw)
            .with_context(|| format!("parse {}", desc_path.display()))?;

        for (file, label) in [(INPUT_DATA_FILE, "input data"), (UNIT_TEST_FILE, "unit test")] {
            let path = cr_dir.join(file);
            if !path.is_file() {
                return Err(anyhow!("missing {label} at {}", path.display()));
            }
        }

        Ok(Self {
            problem,
            cr: cr.to_string(),
            problem_dir: problem_dir.to_path_buf(),
            cr_dir,
            problem_desc,
            reference_code,
            description,
        })
    }

    pub fn id(&self) -> String {
        format!("{}/{}", self.problem, self.cr)
    }

    pub fn input_data_path(&self) -> PathBuf {
        self.cr_dir.join(INPUT_DATA_FILE)
    }

    pub fn unit_test_path(&self) -> PathBuf {
        self.cr_dir.join(UNIT_TEST_FILE)
    }

    /// The CR's own reference solution, when the benchmark ships one.
    pub fn cr_reference_model_path(&self) -> PathBuf {
        self.cr_dir.join(REFERENCE_MODEL_FILE)
    }

    pub fn input_data(&self) -> Result<Value> {
        let path = self.input_data_path();
        let raw =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }
}

/// A `problem*/CR*` pair found under a problems root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRef {
    pub problem: String,
    pub cr: String,
    pub problem_dir: PathBuf,
}

impl CaseRef {
    pub fn id(&self) -> String {
        format!("{}/{}", self.problem, self.cr)
    }
}

/// Optional name filters for case discovery.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub only_problem: Option<String>,
    pub only_cr: Option<String>,
}

/// List `problem*/CR*` directories under `root`, sorted by name.
pub fn discover_cases(root: &Path, filter: &CaseFilter) -> Result<Vec<CaseRef>> {
    let mut cases = Vec::new();
    for problem_dir in sorted_subdirs(root, "problem")? {
        let problem = dir_name(&problem_dir)?;
        if filter.only_problem.as_deref().is_some_and(|only| only != problem) {
            continue;
        }
        for cr_dir in sorted_subdirs(&problem_dir, "CR")? {
            let cr = dir_name(&cr_dir)?;
            if filter.only_cr.as_deref().is_some_and(|only| only != cr) {
                continue;
            }
            cases.push(CaseRef {
                problem: problem.clone(),
                cr,
                problem_dir: problem_dir.clone(),
            });
        }
    }
    Ok(cases)
}

fn sorted_subdirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        let name = entry.file_name();
        if path.is_dir() && name.to_string_lossy().starts_with(prefix) {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("path has no directory name: {}", path.display()))
}

fn read_required(path: &Path, label: &str) -> Result<String> {
    if !path.is_file() {
        return Err(anyhow!("missing {label} at {}", path.display()));
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_case(root: &Path, problem: &str, cr: &str) -> PathBuf {
        let problem_dir = root.join(problem);
        fs::create_dir_all(problem_dir.join(BASE_DIR)).expect("base dir");
        fs::write(problem_dir.join(BASE_DIR).join(PROBLEM_DESC_FILE), "desc").expect("desc");
        fs::write(problem_dir.join(BASE_DIR).join(REFERENCE_MODEL_FILE), "print(1)\n")
            .expect("model");
        let cr_dir = problem_dir.join(cr);
        fs::create_dir_all(&cr_dir).expect("cr dir");
        fs::write(
            cr_dir.join(CR_DESC_FILE),
            json!({"content": "add a constraint", "value_info": [], "ref_sol_format": {}})
                .to_string(),
        )
        .expect("cr desc");
        fs::write(cr_dir.join(INPUT_DATA_FILE), "{}").expect("input");
        fs::write(cr_dir.join(UNIT_TEST_FILE), "").expect("unit test");
        problem_dir
    }

    #[test]
    fn loads_complete_case() {
        let temp = tempfile::tempdir().expect("tempdir");
        let problem_dir = write_case(temp.path(), "problem1", "CR1");
        let case = ProblemCase::load(&problem_dir, "CR1").expect("load");
        assert_eq!(case.id(), "problem1/CR1");
        assert_eq!(case.description.content, "add a constraint");
        assert_eq!(case.reference_code, "print(1)\n");
    }

    #[test]
    fn missing_unit_test_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let problem_dir = write_case(temp.path(), "problem1", "CR1");
        fs::remove_file(problem_dir.join("CR1").join(UNIT_TEST_FILE)).expect("remove");
        let err = ProblemCase::load(&problem_dir, "CR1").unwrap_err();
        assert!(err.to_string().contains("missing unit test"));
    }

    #[test]
    fn discovers_sorted_and_filtered_cases() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_case(temp.path(), "problem2", "CR1");
        write_case(temp.path(), "problem1", "CR2");
        write_case(temp.path(), "problem1", "CR1");
        fs::create_dir_all(temp.path().join("notes")).expect("noise");
        fs::create_dir_all(temp.path().join("problem1").join("scratch")).expect("noise");

        let all = discover_cases(temp.path(), &CaseFilter::default()).expect("discover");
        let ids: Vec<String> = all.iter().map(CaseRef::id).collect();
        assert_eq!(ids, ["problem1/CR1", "problem1/CR2", "problem2/CR1"]);

        let filter = CaseFilter {
            only_problem: Some("problem1".to_string()),
            only_cr: Some("CR2".to_string()),
        };
        let some = discover_cases(temp.path(), &filter).expect("discover");
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].id(), "problem1/CR2");
    }

    #[test]
    fn output_keys_come_from_placeholder_entries() {
        let desc = CrDescription {
            ref_sol_format: json!({
                "var1": {"descr": "`schedule`: rounds x groups x players, 0-based golfer ids."},
                "var2": {"descr": "`total_repeated_pairings:` pairs that meet more than once; see `schedule`."},
                "var3": {"descr": "no identifier here"}
            }),
            ..CrDescription::default()
        };
        assert_eq!(
            desc.expected_output_keys(),
            ["schedule", "total_repeated_pairings"]
        );
    }

    #[test]
    fn output_keys_from_single_description() {
        let desc = CrDescription {
            ref_sol_format: json!({
                "descr": "Print `schedule` (rounds x players) and `total_repeated_pairings`."
            }),
            ..CrDescription::default()
        };
        assert_eq!(desc.expected_output_keys(), ["schedule"]);
        assert!(CrDescription::default().expected_output_keys().is_empty());
    }
}

//! Case discovery for batch runs.
//!
//! A case is one `problem*/CR*` directory pair under the problems root. See
//! [`repair::io::problem`] for the files each case must provide.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use repair::io::problem::{
    CR_DESC_FILE, CaseFilter, CaseRef, INPUT_DATA_FILE, UNIT_TEST_FILE, discover_cases,
};

/// Discover cases, sorted by problem then CR.
pub fn load_cases(problems_root: &Path, filter: &CaseFilter) -> Result<Vec<CaseRef>> {
    if !problems_root.is_dir() {
        return Ok(Vec::new());
    }
    discover_cases(problems_root, filter)
        .with_context(|| format!("discover cases under {}", problems_root.display()))
}

/// SHA-256 over the CR inputs (description, input data, unit test) for reproducibility tracking.
///
/// Missing files hash as empty so a broken case still gets a stable fingerprint.
pub fn case_hash(case: &CaseRef) -> Result<String> {
    let cr_dir = case.problem_dir.join(&case.cr);
    let mut hasher = Sha256::new();
    for file in [CR_DESC_FILE, INPUT_DATA_FILE, UNIT_TEST_FILE] {
        let path = cr_dir.join(file);
        hasher.update(file.as_bytes());
        if path.is_file() {
            let contents = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            hasher.update(&contents);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

//! Batch configuration: the repair config every case runs with.

use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use repair::io::config::{ConfigOverrides, RepairConfig, resolve_config};

/// Load the shared repair config and apply batch-level overrides.
pub fn batch_config(path: &Path, overrides: &ConfigOverrides) -> Result<RepairConfig> {
    resolve_config(path, overrides).with_context(|| format!("load config {}", path.display()))
}

/// SHA-256 of the effective config, recorded in the batch summary.
pub fn config_hash(cfg: &RepairConfig) -> Result<String> {
    let serialized = serde_json::to_vec(cfg).context("serialize config")?;
    Ok(hex::encode(Sha256::digest(serialized)))
}

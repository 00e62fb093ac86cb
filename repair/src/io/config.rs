//! Repair configuration stored in `repair.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::budget::Budgets;

pub const DEFAULT_CONFIG_FILE: &str = "repair.toml";

/// Repair configuration (TOML).
///
/// Missing fields default to the values used by the benchmark runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepairConfig {
    /// Execution failures tolerated before the run gives up.
    pub max_exec_retries: u32,

    /// `needs_changes` verdicts tolerated before the run gives up.
    pub max_validation_retries: u32,

    /// Wall-clock deadline per candidate execution. `0` disables the deadline.
    pub executor_timeout_secs: u64,

    /// Optional ceiling on collaborator dispatches per run.
    pub max_steps: Option<u32>,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Prompts larger than this drop their optional sections first.
    pub prompt_budget_bytes: usize,

    /// Command used to run candidates and the acceptance shim (e.g. `["python3"]`).
    pub interpreter: Vec<String>,

    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent command. The prompt is passed on stdin.
    pub command: Vec<String>,

    /// Wall-clock budget per agent call in seconds.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--sandbox".to_string(),
                "read-only".to_string(),
                "--skip-git-repo-check".to_string(),
            ],
            timeout_secs: 30 * 60,
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_exec_retries: 5,
            max_validation_retries: 5,
            executor_timeout_secs: 30,
            max_steps: None,
            output_limit_bytes: 100_000,
            prompt_budget_bytes: 200_000,
            interpreter: vec!["python3".to_string()],
            agent: AgentConfig::default(),
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.max_steps == Some(0) {
            return Err(anyhow!("max_steps must be > 0 when set"));
        }
        if self.interpreter.is_empty() || self.interpreter[0].trim().is_empty() {
            return Err(anyhow!("interpreter must be a non-empty array"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn budgets(&self) -> Budgets {
        Budgets::new(self.max_exec_retries, self.max_validation_retries)
            .with_max_steps(self.max_steps)
    }

    /// Execution deadline, or `None` when disabled.
    pub fn executor_timeout(&self) -> Option<Duration> {
        (self.executor_timeout_secs > 0).then(|| Duration::from_secs(self.executor_timeout_secs))
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.timeout_secs)
    }
}

/// Command-line overrides applied on top of the file config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub max_exec_retries: Option<u32>,
    pub max_validation_retries: Option<u32>,
    pub executor_timeout_secs: Option<u64>,
    pub max_steps: Option<u32>,
}

impl ConfigOverrides {
    pub fn apply(&self, cfg: &mut RepairConfig) {
        if let Some(value) = self.max_exec_retries {
            cfg.max_exec_retries = value;
        }
        if let Some(value) = self.max_validation_retries {
            cfg.max_validation_retries = value;
        }
        if let Some(value) = self.executor_timeout_secs {
            cfg.executor_timeout_secs = value;
        }
        if let Some(value) = self.max_steps {
            cfg.max_steps = Some(value);
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RepairConfig::default()`.
pub fn load_config(path: &Path) -> Result<RepairConfig> {
    if !path.exists() {
        let cfg = RepairConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RepairConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load the file config and apply CLI overrides, validating the result.
pub fn resolve_config(path: &Path, overrides: &ConfigOverrides) -> Result<RepairConfig> {
    let mut cfg = load_config(path)?;
    overrides.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RepairConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RepairConfig::default());
        assert_eq!(cfg.budgets(), Budgets::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/repair.toml");
        let mut cfg = RepairConfig::default();
        cfg.max_steps = Some(40);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("repair.toml");
        fs::write(&path, "max_exec_retries = 2\n[agent]\ntimeout_secs = 60\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_exec_retries, 2);
        assert_eq!(cfg.max_validation_retries, 5);
        assert_eq!(cfg.agent.timeout_secs, 60);
        assert_eq!(cfg.agent.command, AgentConfig::default().command);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let cfg = RepairConfig {
            executor_timeout_secs: 0,
            ..RepairConfig::default()
        };
        assert_eq!(cfg.executor_timeout(), None);
        assert_eq!(
            RepairConfig::default().executor_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn rejects_empty_interpreter() {
        let cfg = RepairConfig {
            interpreter: Vec::new(),
            ..RepairConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("repair.toml");
        fs::write(&path, "max_validation_retries = 9\n").expect("write");
        let overrides = ConfigOverrides {
            max_validation_retries: Some(1),
            executor_timeout_secs: Some(0),
            ..ConfigOverrides::default()
        };
        let cfg = resolve_config(&path, &overrides).expect("resolve");
        assert_eq!(cfg.max_validation_retries, 1);
        assert_eq!(cfg.executor_timeout(), None);
    }
}

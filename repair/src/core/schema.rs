//! JSON Schema checks for structured agent replies.

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

/// Validate `instance` against the Draft 2020-12 schema in `schema_raw`.
pub fn check(schema_raw: &str, instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_raw).context("parse json schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed: {}", messages.join("; "));
    }
    Ok(())
}

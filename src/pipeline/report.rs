use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write a stage summary as pretty JSON
pub fn write_report<T: Serialize>(path: &Path, summary: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(summary).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write report {:?}", path))?;
    info!("Report written to {:?}", path);
    Ok(())
}

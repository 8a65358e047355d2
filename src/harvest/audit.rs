use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: i64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

pub fn audit_log_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join("audit.log")
}

pub fn append_event(logs_dir: &Path, event: &AuditEvent) -> Result<()> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;

    let line = format!("{}\n", serde_json::to_string(event)?);
    let path = audit_log_path(logs_dir);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

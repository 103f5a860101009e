use anyhow::{Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BATCH_LOG_NAME: &str = "ffbatch.log";

/// Append a timestamped entry to `ffbatch.log` in `dir`, creating it if needed.
pub fn write_batch_log(dir: &Path, message: &str) -> Result<PathBuf> {
    let log_path = dir.join(BATCH_LOG_NAME);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{}] {}", timestamp, message)?;
    Ok(log_path)
}

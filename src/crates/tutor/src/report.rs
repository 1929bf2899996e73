//! Source report loading

use crate::error::{Result, TutorError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// Most recently modified `*.md` file directly inside `dir`
pub async fn latest_report_path(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        TutorError::Report(format!("cannot read report directory {}: {}", dir.display(), e))
    })?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        TutorError::Report(format!("no markdown reports found in {}", dir.display()))
    })
}

/// Contents of the newest markdown report in `dir`
pub async fn load_latest_report(dir: impl AsRef<Path>) -> Result<String> {
    let path = latest_report_path(dir).await?;
    debug!(path = %path.display(), "Loading report");
    Ok(fs::read_to_string(&path).await?)
}

//! Resolves a (possibly wildcarded) config path into a lexically-ordered
//! file list.

use crate::error::SchedulerError;
use std::path::{Path, PathBuf};

/// Expands `pattern` via `glob`. Zero matches is treated as "this is a
/// literal path, not a glob" so a missing plain file still surfaces as a
/// read error instead of silently producing an empty config.
pub fn resolve(pattern: &str) -> Result<Vec<PathBuf>, SchedulerError> {
    let mut matches: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| {
            SchedulerError::configuration_with_source(
                format!("invalid config glob '{pattern}'"),
                anyhow::Error::from(e),
            )
        })?
        .filter_map(Result::ok)
        .collect();

    if matches.is_empty() {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    matches.sort();
    Ok(matches)
}

/// Latest modification time across every file the pattern resolves to.
/// Used by the watcher's config-poll loop to detect changes without
/// re-reading file contents every tick.
pub fn latest_mtime(pattern: &str) -> Option<std::time::SystemTime> {
    resolve(pattern)
        .ok()?
        .iter()
        .filter_map(|p| mtime(p))
        .max()
}

fn mtime(path: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

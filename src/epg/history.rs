//! Historical guide snapshots

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::error::GuideError;

const SECS_PER_DAY: u64 = 24 * 3600;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationReport {
    pub snapshot: PathBuf,
    pub removed: Vec<PathBuf>,
}

/// Snapshot `output` and prune old snapshots, using the current local time.
pub fn rotate(output: &Path, retention_days: u32) -> Result<RotationReport, GuideError> {
    rotate_at(output, retention_days, Local::now())
}

/// Copy `output` to a timestamped sibling, then delete files in the same
/// directory with the same extension last modified before
/// `now - retention_days`. The output and the new snapshot are never deleted.
///
/// Fails only when the copy or the directory listing fails; a file that
/// cannot be removed is logged and skipped.
pub fn rotate_at(
    output: &Path,
    retention_days: u32,
    now: DateTime<Local>,
) -> Result<RotationReport, GuideError> {
    let snapshot = snapshot_path(output, &now);
    fs::copy(output, &snapshot).map_err(|e| GuideError::io("creating snapshot", &snapshot, e))?;
    info!(snapshot = %snapshot.display(), "saved historical guide");

    let cutoff = SystemTime::from(now)
        .checked_sub(Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let removed = remove_expired(output, &snapshot, cutoff)?;

    Ok(RotationReport { snapshot, removed })
}

/// `dir/xmlguide.xmltv` -> `dir/xmlguide.20240601120000.xmltv`
pub fn snapshot_path(output: &Path, now: &DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d%H%M%S");
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match output.extension() {
        Some(ext) => format!("{}.{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.{}", stem, stamp),
    };
    output.with_file_name(name)
}

fn remove_expired(output: &Path, snapshot: &Path, cutoff: SystemTime) -> Result<Vec<PathBuf>, GuideError> {
    let Some(ext) = output.extension() else {
        warn!(output = %output.display(), "output has no extension, skipping snapshot cleanup");
        return Ok(Vec::new());
    };

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let keep = [output.file_name(), snapshot.file_name()];

    let entries = fs::read_dir(dir).map_err(|e| GuideError::io("reading guide directory", dir, e))?;

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.extension() != Some(ext) || keep.contains(&Some(name.as_os_str())) {
            continue;
        }

        let modified = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        let modified = match modified {
            Ok(modified) => modified,
            Err(e) => {
                debug!(path = %path.display(), "skipping: {}", e);
                continue;
            }
        };

        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed expired guide");
                    removed.push(path);
                }
                Err(e) => warn!(path = %path.display(), "failed to remove expired guide: {}", e),
            }
        }
    }
    Ok(removed)
}

//! Capture artifact cleanup.

use crate::command::is_artifact_of;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Removes the on-disk artifacts of a stopped capture.
#[derive(Debug, Clone)]
pub struct ArtifactJanitor {
    capture_dir: PathBuf,
}

impl ArtifactJanitor {
    /// Creates a janitor for `capture_dir`.
    pub fn new(capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
        }
    }

    /// Directory scanned by [`cleanup`](Self::cleanup)
    #[must_use]
    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    /// Deletes every artifact written for `workload_name`.
    ///
    /// Best effort: an unreadable directory or a file that cannot be removed
    /// is logged at debug level and skipped. Returns the number of files
    /// actually removed.
    pub fn cleanup(&self, workload_name: &str) -> usize {
        let entries = match std::fs::read_dir(&self.capture_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read capture dir {}: {}", self.capture_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !is_artifact_of(file_name, workload_name) {
                continue;
            }

            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => debug!("Failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }
}

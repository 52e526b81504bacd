// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scratch directory for in-flight job files, delayed cleanup, and the
// periodic sweep that removes anything a crashed pipeline left behind.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use printdock_core::types::JobId;

/// Grace period between a terminal state and file deletion, so the spooler
/// can finish reading the file.
pub const CLEANUP_DELAY: Duration = Duration::from_secs(5);

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Files older than this are swept regardless of job state.
pub const SWEEP_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Directory holding decoded payloads and converted PDFs.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Where the payload of `job_id` is saved. Always inside the root.
    pub fn job_path(&self, job_id: &JobId, filename: &str) -> PathBuf {
        self.root.join(format!(
            "{}_{}",
            sanitize_component(job_id.as_str(), "job"),
            sanitize_component(last_segment(filename), "document"),
        ))
    }

    /// Delete regular files older than `max_age`. Returns how many went.
    pub async fn sweep(&self, max_age: Duration) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or(Duration::ZERO);
            if age < max_age {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(path = %entry.path().display(), age_s = age.as_secs(), "swept stale file");
                    removed += 1;
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "sweep could not remove file"),
            }
        }

        if removed > 0 {
            info!(removed, "scratch sweep removed stale files");
        }
        Ok(removed)
    }
}

/// Delete `paths` after `delay`, in the background. Missing files are fine.
pub fn schedule_cleanup(paths: Vec<PathBuf>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        remove_files(&paths).await;
    })
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "job file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove job file"),
        }
    }
}

/// Final segment of a client-side path (`/` or `\` separated).
fn last_segment(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or("")
}

/// Reduce an untrusted name to a single safe path component. Separators
/// become `_`; nothing is truncated.
fn sanitize_component(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

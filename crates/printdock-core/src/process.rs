// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded external-process execution.
//
// Every external tool (office converter, image converter, lpstat, lp) runs
// through `run_tool`: output is captured, and the child is killed when the
// time budget is exceeded.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// The most useful diagnostic text: stderr if present, else stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Why a process could not produce a [`ProcessOutput`].
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0} is not installed")]
    NotFound(String),

    #[error("{program} timed out after {}s", after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `program` with `args`, waiting at most `limit` for it to exit.
///
/// Stdin is closed. On timeout the child is killed before returning.
pub async fn run_tool<I, S>(
    program: &str,
    args: I,
    limit: Duration,
) -> Result<ProcessOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, timeout_s = limit.as_secs(), "spawning external tool");

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound(program.to_string())
        } else {
            ProcessError::Io {
                program: program.to_string(),
                source: e,
            }
        }
    })?;

    // Dropping the wait future on timeout drops the child, and
    // `kill_on_drop` terminates it.
    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| ProcessError::Io {
            program: program.to_string(),
            source: e,
        })?,
        Err(_) => {
            warn!(program, timeout_s = limit.as_secs(), "external tool timed out — killed");
            return Err(ProcessError::TimedOut {
                program: program.to_string(),
                after: limit,
            });
        }
    };

    let out = ProcessOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program, status = %out.status, "external tool exited");
    Ok(out)
}

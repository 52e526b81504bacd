// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdock print agent.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cloud-assigned identifier for a print job.
///
/// Unique per cloud session; the agent never mints these itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound job exactly as the cloud delivers it, by push or by pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub filename: String,
    /// Advisory page count from the originating request. May be wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    /// Base64-encoded document bytes.
    pub file_data: String,
}

/// Semantic document kind, derived from the filename extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    /// Office-style document converted through the office tool.
    Document,
    /// Raster image converted through the image tool.
    Image,
    Unknown,
}

impl DocumentKind {
    /// Whether this kind has to go through a converter before printing.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, Self::Document | Self::Image)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Image => "image",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Pipeline stage of a job held by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Received,
    /// Payload decoded and written to the scratch directory.
    Saved,
    Classified,
    Converting,
    Verified,
    Printing,
    Completed,
    Failed,
}

/// A job owned by the executor from intake until cleanup.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: JobId,
    pub filename: String,
    pub expected_pages: Option<u32>,
    /// SHA-256 of the decoded payload, hex encoded.
    pub payload_sha256: String,
    pub stage: JobStage,
    pub detected_kind: Option<DocumentKind>,
    /// The decoded payload as saved on disk.
    pub working_path: PathBuf,
    /// File handed to the spooler. Equals `working_path` unless converted.
    pub printable_path: PathBuf,
    pub converted: bool,
    pub received_at: DateTime<Utc>,
}

impl JobRecord {
    /// Build a record for a payload that has just been saved to `working_path`.
    pub fn saved(descriptor: &JobDescriptor, working_path: PathBuf, payload_sha256: String) -> Self {
        Self {
            job_id: descriptor.job_id.clone(),
            filename: descriptor.filename.clone(),
            expected_pages: descriptor.pages,
            payload_sha256,
            stage: JobStage::Saved,
            detected_kind: None,
            printable_path: working_path.clone(),
            working_path,
            converted: false,
            received_at: Utc::now(),
        }
    }

    /// Files owned by this job, without duplicates.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.working_path.clone()];
        if self.printable_path != self.working_path {
            paths.push(self.printable_path.clone());
        }
        paths
    }
}

/// Lifecycle events sent upstream over the cloud connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    JobReceived {
        job_id: JobId,
    },
    PrintStarted {
        job_id: JobId,
    },
    PrintComplete {
        job_id: JobId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pages_printed: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl LifecycleEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::JobReceived { job_id }
            | Self::PrintStarted { job_id }
            | Self::PrintComplete { job_id, .. } => job_id,
        }
    }

    pub fn completed(job_id: JobId, pages_printed: u32) -> Self {
        Self::PrintComplete {
            job_id,
            success: true,
            pages_printed: Some(pages_printed),
            error: None,
        }
    }

    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        Self::PrintComplete {
            job_id,
            success: false,
            pages_printed: None,
            error: Some(error.into()),
        }
    }
}

/// Coarse printer health derived from spooler status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Error,
    Unknown,
}

/// Printer health classification plus a short machine-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub detail: String,
}

impl HealthReport {
    pub fn new(status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unknown, detail)
    }
}

/// Sent once per new cloud connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub kiosk_id: String,
    pub hostname: String,
    pub printer_name: Option<String>,
}

/// Periodic liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub kiosk_id: String,
    /// Seconds since the agent started.
    pub uptime: u64,
    /// Resolved printer name, or `"none"` when no printer is known.
    pub printer_status: String,
    pub printer_ipp_status: HealthStatus,
    pub printer_ipp_detail: String,
    pub current_job: Option<JobId>,
    pub pending_jobs: usize,
    /// Resident set size in bytes, when the platform exposes it.
    pub memory: Option<u64>,
    pub poll_count: u64,
    pub jobs_fetched_today: u64,
    pub conversions_today: u64,
    pub last_poll: Option<DateTime<Utc>>,
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide agent state.
//
// One `AgentState` per process, shared between the transport, the executor
// and the timers through `SharedState`. The lock is never held across an
// await point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};

use printdock_core::types::{HealthReport, HealthStatus, Heartbeat, JobId};

use crate::queue::PendingQueue;

/// Counters that reset at local midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCounters {
    /// Local date the counters belong to.
    pub day: NaiveDate,
    pub jobs_fetched: u64,
    pub conversions: u64,
}

impl DailyCounters {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            jobs_fetched: 0,
            conversions: 0,
        }
    }
}

/// Everything the agent knows about itself at runtime.
#[derive(Debug)]
pub struct AgentState {
    pub started_at: Instant,
    /// Job currently mid-pipeline, if any.
    pub current_job: Option<JobId>,
    pub pending: PendingQueue,
    pub counters: DailyCounters,
    pub poll_count: u64,
    pub heartbeat_count: u64,
    pub last_poll: Option<DateTime<Utc>>,
    /// Cached spooler destination; cleared on every new cloud connection.
    pub printer_name: Option<String>,
    pub printer_health: Option<HealthReport>,
}

impl AgentState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            started_at: Instant::now(),
            current_job: None,
            pending: PendingQueue::new(),
            counters: DailyCounters::new(today),
            poll_count: 0,
            heartbeat_count: 0,
            last_poll: None,
            printer_name: None,
            printer_health: None,
        }
    }

    /// Zero the daily counters if `today` is a new local date.
    pub fn reset_daily_if_needed(&mut self, today: NaiveDate) -> bool {
        if self.counters.day == today {
            return false;
        }
        self.counters = DailyCounters::new(today);
        true
    }

    /// Whether `job_id` is the current job or already waiting.
    pub fn knows_job(&self, job_id: &JobId) -> bool {
        self.current_job.as_ref() == Some(job_id) || self.pending.contains(job_id)
    }

    pub fn record_poll(&mut self, at: DateTime<Utc>) {
        self.poll_count += 1;
        self.last_poll = Some(at);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Build the heartbeat payload from the current snapshot.
    pub fn heartbeat(&self, kiosk_id: &str, memory: Option<u64>) -> Heartbeat {
        let health = self
            .printer_health
            .clone()
            .unwrap_or_else(|| HealthReport::unknown("not_checked"));
        Heartbeat {
            kiosk_id: kiosk_id.to_string(),
            uptime: self.uptime_secs(),
            printer_status: self.printer_name.clone().unwrap_or_else(|| "none".into()),
            printer_ipp_status: health.status,
            printer_ipp_detail: health.detail,
            current_job: self.current_job.clone(),
            pending_jobs: self.pending.len(),
            memory,
            poll_count: self.poll_count,
            jobs_fetched_today: self.counters.jobs_fetched,
            conversions_today: self.counters.conversions,
            last_poll: self.last_poll,
        }
    }

    /// One human-readable summary line for the periodic status log.
    pub fn status_line(&self) -> String {
        let printer = self.printer_name.as_deref().unwrap_or("unresolved");
        let health = match &self.printer_health {
            Some(h) => format!("{}/{}", health_label(h.status), h.detail),
            None => "unchecked".into(),
        };
        let current = self.current_job.as_ref().map_or("idle", |j| j.as_str());
        let last_poll = self
            .last_poll
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".into());

        format!(
            "up {}s | job {} | {} pending | printer {} ({}) | today: {} fetched, {} converted | polls {} (last {})",
            self.uptime_secs(),
            current,
            self.pending.len(),
            printer,
            health,
            self.counters.jobs_fetched,
            self.counters.conversions,
            self.poll_count,
            last_poll,
        )
    }
}

fn health_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Error => "error",
        HealthStatus::Unknown => "unknown",
    }
}

/// Cloneable handle to the process-wide state.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<AgentState>>);

impl SharedState {
    pub fn new(state: AgentState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// State for a process starting now.
    pub fn starting_today() -> Self {
        Self::new(AgentState::new(Local::now().date_naive()))
    }

    /// Lock the state. A poisoned lock is recovered: every writer leaves the
    /// state consistent between statements.
    pub fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

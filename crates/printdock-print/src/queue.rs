// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory pending job queue.
//
// Jobs that have been received and saved but not yet picked up by the
// executor wait here, strictly first-in first-out. Nothing is persisted: a
// restart forgets the queue.

use std::collections::VecDeque;

use tracing::debug;

use printdock_core::types::{JobId, JobRecord};

/// Insertion-ordered set of waiting jobs, keyed by job id.
#[derive(Debug, Default)]
pub struct PendingQueue {
    jobs: VecDeque<JobRecord>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. Returns `false` (and drops `record`) if a job with the
    /// same id is already waiting.
    pub fn push(&mut self, record: JobRecord) -> bool {
        if self.contains(&record.job_id) {
            debug!(job_id = %record.job_id, "job already queued — ignoring");
            return false;
        }
        self.jobs.push_back(record);
        true
    }

    /// Take the oldest waiting job.
    pub fn pop_front(&mut self) -> Option<JobRecord> {
        self.jobs.pop_front()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.iter().any(|j| &j.job_id == job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Waiting job ids, oldest first.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.job_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use printdock_core::types::JobDescriptor;

    use super::*;

    fn record(id: &str) -> JobRecord {
        let desc = JobDescriptor {
            job_id: id.into(),
            filename: format!("{id}.pdf"),
            pages: None,
            file_data: String::new(),
        };
        JobRecord::saved(&desc, PathBuf::from(format!("/scratch/{id}.pdf")), String::new())
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut queue = PendingQueue::new();
        for id in ["a", "b", "c"] {
            assert!(queue.push(record(id)));
        }
        assert_eq!(queue.job_ids(), [JobId::from("a"), JobId::from("b"), JobId::from("c")]);

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_front())
            .map(|r| r.job_id.0)
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(record("a")));
        assert!(!queue.push(record("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn contains_tracks_membership() {
        let mut queue = PendingQueue::new();
        queue.push(record("a"));
        assert!(queue.contains(&JobId::from("a")));
        queue.pop_front();
        assert!(!queue.contains(&JobId::from("a")));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdock Print — the job pipeline.  Takes jobs from intake through
// conversion and page verification to the local print spooler, one at a time,
// and keeps the process-wide agent state that heartbeats are built from.

pub mod executor;
pub mod health;
pub mod queue;
pub mod reporter;
pub mod scratch;
pub mod spooler;
pub mod state;

pub use executor::{Intake, JobExecutor, JobOutcome};
pub use health::{classify_printer_status, refresh_printer_health};
pub use queue::PendingQueue;
pub use reporter::{ChannelReporter, Reporter};
pub use scratch::{ScratchDir, schedule_cleanup};
pub use spooler::{CupsGateway, PrinterGateway};
pub use state::{AgentState, DailyCounters, SharedState};

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Periodic background activities. Each runs as its own task so a slow
// health probe never delays the status log, the daily reset or the worker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use printdock_print::scratch::{SWEEP_INTERVAL, SWEEP_MAX_AGE};
use printdock_print::{PrinterGateway, ScratchDir, SharedState, refresh_printer_health};

use crate::transport::CloudClient;

/// How often the local date is compared against the counters' date.
const DAILY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Page size assumed when converting `/proc/self/statm` pages to bytes.
const PAGE_SIZE: u64 = 4096;

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Wait for the next tick. `false` once shutdown is signalled.
async fn next_tick(interval: &mut Interval, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = interval.tick() => !*shutdown.borrow(),
        _ = shutdown.changed() => false,
    }
}

/// Probe printer health, then upload a heartbeat if a session is open.
pub async fn heartbeat_loop(
    client: Arc<CloudClient>,
    state: SharedState,
    gateway: Arc<dyn PrinterGateway>,
    kiosk_id: String,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(every);
    while next_tick(&mut interval, &mut shutdown).await {
        refresh_printer_health(&state, gateway.as_ref()).await;

        if !client.is_connected() {
            debug!("no cloud session — heartbeat skipped");
            continue;
        }

        let heartbeat = state.lock().heartbeat(&kiosk_id, resident_memory_bytes());
        match client.send_heartbeat(&heartbeat).await {
            Ok(()) => state.lock().heartbeat_count += 1,
            Err(e) => warn!(error = %e, "heartbeat failed"),
        }
    }
}

pub async fn status_log_loop(state: SharedState, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = ticker(every);
    while next_tick(&mut interval, &mut shutdown).await {
        let line = state.lock().status_line();
        info!("{line}");
    }
}

/// Zero the daily counters when the local date rolls over.
pub async fn daily_reset_loop(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut interval = ticker(DAILY_CHECK_INTERVAL);
    while next_tick(&mut interval, &mut shutdown).await {
        let today = Local::now().date_naive();
        if state.lock().reset_daily_if_needed(today) {
            info!(%today, "daily counters reset");
        }
    }
}

/// Remove scratch files left behind by abandoned or crashed jobs.
pub async fn sweep_loop(scratch: ScratchDir, mut shutdown: watch::Receiver<bool>) {
    let mut interval = ticker(SWEEP_INTERVAL);
    while next_tick(&mut interval, &mut shutdown).await {
        if let Err(e) = scratch.sweep(SWEEP_MAX_AGE).await {
            warn!(dir = %scratch.root().display(), error = %e, "scratch sweep failed");
        }
    }
}

/// Resident set size of this process, where `/proc` is available.
pub fn resident_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm_resident(&statm)
}

fn parse_statm_resident(statm: &str) -> Option<u64> {
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE)
}

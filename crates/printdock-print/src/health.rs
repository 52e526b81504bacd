// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer health classification over spooler status text.
//
// `lpstat` output is free text, so health is a best-effort heuristic: an
// ordered list of substring rules, evaluated top to bottom. Fault rules come
// before healthy rules because a stopped queue can still report "idle".

use std::time::Duration;

use tracing::{debug, info, warn};

use printdock_core::types::{HealthReport, HealthStatus};

use crate::spooler::PrinterGateway;
use crate::state::SharedState;

/// Upper bound on a single health probe, including spooler round-trips.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Detail reported when no rule matches.
pub const UNRECOGNISED_DETAIL: &str = "ipp_unsupported";

/// One classification rule: any pattern matching yields `status`/`detail`.
struct StatusRule {
    patterns: &'static [&'static str],
    status: HealthStatus,
    detail: &'static str,
}

/// Evaluated in order; first match wins.
const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        patterns: &["media-empty", "media empty", "out of paper", "paper out", "no paper"],
        status: HealthStatus::Error,
        detail: "media-empty",
    },
    StatusRule {
        patterns: &[
            "toner-empty",
            "marker-supply-empty",
            "toner empty",
            "out of toner",
            "out of ink",
            "ink empty",
        ],
        status: HealthStatus::Error,
        detail: "toner-empty",
    },
    StatusRule {
        patterns: &["cover-open", "door-open", "cover open", "door open"],
        status: HealthStatus::Error,
        detail: "cover-open",
    },
    StatusRule {
        patterns: &["stopped", "disabled", "paused"],
        status: HealthStatus::Error,
        detail: "stopped",
    },
    StatusRule {
        patterns: &[
            "offline",
            "not connected",
            "not-connected",
            "unable to connect",
            "not responding",
        ],
        status: HealthStatus::Error,
        detail: "offline",
    },
    StatusRule {
        patterns: &["idle"],
        status: HealthStatus::Healthy,
        detail: "idle",
    },
    StatusRule {
        patterns: &["processing", "now printing", "printing"],
        status: HealthStatus::Healthy,
        detail: "processing",
    },
];

/// Classify spooler status text for a printer.
pub fn classify_printer_status(text: &str) -> HealthReport {
    let lower = text.to_ascii_lowercase();

    for rule in STATUS_RULES {
        if rule.patterns.iter().any(|p| lower.contains(p)) {
            return HealthReport::new(rule.status, rule.detail);
        }
    }

    HealthReport::unknown(UNRECOGNISED_DETAIL)
}

/// Probe the resolved printer and store the result in shared state.
///
/// Runs on its own timer, never inside the job pipeline. When no printer has
/// been resolved yet the report is `unknown/no_printer`.
pub async fn refresh_printer_health(
    state: &SharedState,
    gateway: &dyn PrinterGateway,
) -> HealthReport {
    refresh_printer_health_within(state, gateway, HEALTH_CHECK_TIMEOUT).await
}

/// [`refresh_printer_health`] with an explicit bound on the probe.
pub async fn refresh_printer_health_within(
    state: &SharedState,
    gateway: &dyn PrinterGateway,
    limit: Duration,
) -> HealthReport {
    let printer = state.lock().printer_name.clone();

    let report = match printer {
        None => HealthReport::unknown("no_printer"),
        Some(name) => {
            match tokio::time::timeout(limit, gateway.check_health(&name)).await {
                Ok(report) => report,
                Err(_) => {
                    warn!(printer = %name, "printer health check timed out");
                    HealthReport::unknown("timeout")
                }
            }
        }
    };

    let mut guard = state.lock();
    let changed = guard.printer_health.as_ref() != Some(&report);
    guard.printer_health = Some(report.clone());
    drop(guard);

    if changed {
        info!(status = ?report.status, detail = %report.detail, "printer health changed");
    } else {
        debug!(status = ?report.status, "printer health unchanged");
    }
    report
}

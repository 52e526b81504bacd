// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer gateway: destination resolution, health probing and job submission
// against the OS print spooler.
//
// The CUPS backend drives the stock command-line clients (`lpstat`, `lp`).
// Their output is parsed as text; nothing here talks IPP directly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use printdock_core::config::is_auto_printer;
use printdock_core::error::PrinterError;
use printdock_core::process::{ProcessError, run_tool};
use printdock_core::types::HealthReport;

use crate::health::{HEALTH_CHECK_TIMEOUT, classify_printer_status};

/// Budget for `lpstat` queries made while resolving a destination.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for handing a file to `lp`. The spooler copies the file, it does
/// not wait for the physical print.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the executor and the health timer need from a print spooler.
#[async_trait]
pub trait PrinterGateway: Send + Sync {
    /// Resolve `configured` (`auto` or an explicit name) to a destination.
    async fn resolve_printer(&self, configured: &str) -> Result<String, PrinterError>;

    /// Best-effort health classification. Never fails.
    async fn check_health(&self, printer: &str) -> HealthReport;

    /// Submit `file` for printing. Returns the spooler's request identifier.
    ///
    /// The file is left untouched; deleting it is the caller's job.
    async fn submit(&self, printer: &str, file: &Path) -> Result<String, PrinterError>;
}

/// CUPS (or any CUPS-compatible `lpstat`/`lp` pair).
#[derive(Debug, Clone)]
pub struct CupsGateway {
    lpstat: String,
    lp: String,
}

impl Default for CupsGateway {
    fn default() -> Self {
        Self::new("lpstat", "lp")
    }
}

impl CupsGateway {
    pub fn new(lpstat: impl Into<String>, lp: impl Into<String>) -> Self {
        Self {
            lpstat: lpstat.into(),
            lp: lp.into(),
        }
    }

    /// Run `lpstat` with `args`, mapping "cannot reach the scheduler" onto
    /// `SpoolerUnavailable`.
    async fn lpstat(&self, args: &[&str]) -> Result<String, PrinterError> {
        let out = run_tool(&self.lpstat, args, QUERY_TIMEOUT)
            .await
            .map_err(|e| PrinterError::SpoolerUnavailable(e.to_string()))?;

        let combined = format!("{}\n{}", out.stdout, out.stderr);
        if mentions_no_destinations(&combined) {
            return Err(PrinterError::NoPrinter);
        }
        if !out.success() {
            return Err(PrinterError::SpoolerUnavailable(out.diagnostic()));
        }
        Ok(out.stdout)
    }
}

#[async_trait]
impl PrinterGateway for CupsGateway {
    #[instrument(skip(self))]
    async fn resolve_printer(&self, configured: &str) -> Result<String, PrinterError> {
        let configured = configured.trim();
        if !is_auto_printer(configured) {
            debug!(printer = configured, "using configured printer");
            return Ok(configured.to_string());
        }

        let default = self.lpstat(&["-d"]).await?;
        if let Some(name) = parse_default_destination(&default) {
            info!(printer = %name, "resolved spooler default printer");
            return Ok(name);
        }

        let listing = self.lpstat(&["-p"]).await?;
        match parse_printer_names(&listing).into_iter().next() {
            Some(name) => {
                info!(printer = %name, "no spooler default — using first printer");
                Ok(name)
            }
            None => {
                warn!("spooler reports no printers");
                Err(PrinterError::NoPrinter)
            }
        }
    }

    async fn check_health(&self, printer: &str) -> HealthReport {
        match run_tool(&self.lpstat, ["-p", printer, "-l"], HEALTH_CHECK_TIMEOUT).await {
            Ok(out) => classify_printer_status(&format!("{}\n{}", out.stdout, out.stderr)),
            Err(ProcessError::TimedOut { .. }) => HealthReport::unknown("timeout"),
            Err(e) => {
                debug!(error = %e, "lpstat unavailable for health check");
                HealthReport::unknown("spooler_unavailable")
            }
        }
    }

    #[instrument(skip(self, file), fields(file = %file.display()))]
    async fn submit(&self, printer: &str, file: &Path) -> Result<String, PrinterError> {
        let file_arg = file.to_string_lossy();
        let out = run_tool(&self.lp, ["-d", printer, &*file_arg], SUBMIT_TIMEOUT)
            .await
            .map_err(|e| PrinterError::SubmitFailed(e.to_string()))?;

        if !out.success() || out.stderr.to_ascii_lowercase().contains("error") {
            warn!(status = %out.status, "spooler rejected job");
            return Err(PrinterError::SubmitFailed(out.diagnostic()));
        }

        let request = parse_request_id(&out.stdout).unwrap_or_else(|| out.stdout.trim().to_string());
        info!(printer, request = %request, "job accepted by spooler");
        Ok(request)
    }
}

/// `lpstat -d` → `system default destination: NAME`.
pub fn parse_default_destination(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, name) = line.trim().split_once("system default destination:")?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// `lpstat -p` → names from `printer NAME is idle.` style lines, in order.
pub fn parse_printer_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("printer"), Some(name)) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// `lp` → `request id is NAME-42 (1 file(s))`.
pub fn parse_request_id(output: &str) -> Option<String> {
    let (_, rest) = output.split_once("request id is ")?;
    rest.split_whitespace().next().map(str::to_string)
}

fn mentions_no_destinations(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("no destinations added") || lower.contains("no printers")
}

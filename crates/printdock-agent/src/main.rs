// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdock — local print-job agent
//
// Entry point. Initialises logging, loads configuration from the environment,
// wires the job executor to the CUPS spooler and the cloud transport, and
// runs until interrupted.

mod timers;
mod transport;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use printdock_core::AgentConfig;
use printdock_core::error::Result;
use printdock_document::{DocumentConverter, ImageConverter, ToolCommand};
use printdock_print::{CupsGateway, JobExecutor, PrinterGateway, ScratchDir, SharedState};

use transport::{CloudClient, HttpReporter, Session};

/// How long background tasks get to wind down after an interrupt.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match AgentConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration rejected");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Printdock agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> Result<()> {
    info!(
        kiosk_id = %config.kiosk_id,
        cloud_url = %config.cloud_url,
        printer = %config.printer_name,
        scratch = %config.scratch_dir.display(),
        "Printdock agent starting"
    );
    let config = Arc::new(config);

    let state = SharedState::starting_today();
    let scratch = ScratchDir::new(&config.scratch_dir);
    scratch.ensure().await?;

    let gateway: Arc<dyn PrinterGateway> = Arc::new(CupsGateway::default());
    let client = Arc::new(CloudClient::new(&config)?);

    let executor = Arc::new(
        JobExecutor::new(
            state.clone(),
            scratch.clone(),
            gateway.clone(),
            Arc::new(HttpReporter::new(client.clone())),
            config.printer_name.clone(),
        )
        .with_converters(
            Arc::new(DocumentConverter::new(ToolCommand::new(&config.office_binary))),
            Arc::new(ImageConverter::default()),
        ),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    tasks.spawn(executor.clone().run(shutdown_rx.clone()));
    tasks.spawn(
        Session {
            client: client.clone(),
            executor: executor.clone(),
            gateway: gateway.clone(),
            state: state.clone(),
            config: config.clone(),
        }
        .run(shutdown_rx.clone()),
    );
    tasks.spawn(timers::heartbeat_loop(
        client.clone(),
        state.clone(),
        gateway.clone(),
        config.kiosk_id.clone(),
        config.heartbeat_every(),
        shutdown_rx.clone(),
    ));
    tasks.spawn(timers::status_log_loop(
        state.clone(),
        config.status_log_every(),
        shutdown_rx.clone(),
    ));
    tasks.spawn(timers::daily_reset_loop(state.clone(), shutdown_rx.clone()));
    tasks.spawn(timers::sweep_loop(scratch, shutdown_rx));

    tokio::signal::ctrl_c().await?;

    {
        let state = state.lock();
        if let Some(job_id) = &state.current_job {
            warn!(%job_id, "interrupted while a job is printing — it will not be reported");
        }
        if !state.pending.is_empty() {
            warn!(
                pending = state.pending.len(),
                jobs = ?state.pending.job_ids(),
                "interrupted with queued jobs — they are discarded"
            );
        }
    }

    info!("shutting down");
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "background task ended abnormally");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!("background tasks did not stop in time — aborting them");
        tasks.abort_all();
    }

    client.end_session();
    info!("Printdock agent stopped");
    Ok(())
}

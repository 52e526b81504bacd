// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cloud transport — registration session, job pull, event and heartbeat
// upload over HTTP.
//
// A session starts with `POST /api/kiosks/register` and lasts until any
// request fails. The supervisor then waits a fixed backoff and registers
// again, forever. Events raised while no session is open are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use printdock_core::config::{AgentConfig, hostname};
use printdock_core::error::{PrintdockError, Result};
use printdock_core::types::{Heartbeat, JobDescriptor, LifecycleEvent, Registration};
use printdock_print::{Intake, JobExecutor, PrinterGateway, Reporter, SharedState};

/// Per-request timeout. Job payloads arrive inline, so this is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one kiosk identity.
pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    kiosk_id: String,
    connected: AtomicBool,
}

impl CloudClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("printdock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport_error)?;
        Ok(Self::with_http(http, &config.cloud_url, &config.kiosk_id))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, kiosk_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            kiosk_id: kiosk_id.to_string(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kiosk_url(&self, tail: &str) -> String {
        format!("{}/api/kiosks/{}/{tail}", self.base_url, self.kiosk_id)
    }

    fn lose_session(&self, err: &PrintdockError) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(error = %err, "cloud session lost");
        }
    }

    /// Open a new session.
    #[instrument(skip_all, fields(kiosk_id = %registration.kiosk_id))]
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let url = format!("{}/api/kiosks/register", self.base_url);
        self.post(&url, registration).await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(
            printer = registration.printer_name.as_deref().unwrap_or("none"),
            "registered with cloud"
        );
        Ok(())
    }

    pub async fn send_event(&self, event: &LifecycleEvent) -> Result<()> {
        let url = self.kiosk_url("events");
        self.post(&url, event).await.inspect_err(|e| self.lose_session(e))
    }

    pub async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        let url = self.kiosk_url("heartbeat");
        self.post(&url, heartbeat).await.inspect_err(|e| self.lose_session(e))
    }

    /// Pull jobs waiting for this kiosk.
    pub async fn fetch_jobs(&self) -> Result<Vec<JobDescriptor>> {
        let url = self.kiosk_url("jobs");
        let result = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(transport_error)?;
            let body = response.bytes().await.map_err(transport_error)?;
            parse_jobs(&body)
        }
        .await;
        result.inspect_err(|e| self.lose_session(e))
    }

    /// Close the session locally.
    pub fn end_session(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("cloud session closed");
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport_error)?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> PrintdockError {
    PrintdockError::Transport(err.without_url().to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobsBody {
    List(Vec<JobDescriptor>),
    Wrapped { jobs: Vec<JobDescriptor> },
}

/// Decode a pull response: a bare array, `{"jobs": [...]}`, or nothing.
pub fn parse_jobs(body: &[u8]) -> Result<Vec<JobDescriptor>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_slice::<JobsBody>(body)? {
        JobsBody::List(jobs) | JobsBody::Wrapped { jobs } => jobs,
    })
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Sends lifecycle events to the cloud while a session is open.
pub struct HttpReporter {
    client: Arc<CloudClient>,
}

impl HttpReporter {
    pub fn new(client: Arc<CloudClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn emit(&self, event: LifecycleEvent) {
        if !self.client.is_connected() {
            warn!(job_id = %event.job_id(), ?event, "cloud disconnected — event dropped");
            return;
        }
        match self.client.send_event(&event).await {
            Ok(()) => debug!(job_id = %event.job_id(), ?event, "event delivered"),
            Err(e) => warn!(job_id = %event.job_id(), error = %e, "event delivery failed — dropped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session supervisor
// ---------------------------------------------------------------------------

/// Everything the session loop needs.
pub struct Session {
    pub client: Arc<CloudClient>,
    pub executor: Arc<JobExecutor>,
    pub gateway: Arc<dyn PrinterGateway>,
    pub state: SharedState,
    pub config: Arc<AgentConfig>,
}

impl Session {
    /// Register, poll until the session drops, back off, repeat.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect().await {
                Ok(()) => self.poll_until_lost(&mut shutdown).await,
                Err(e) => warn!(
                    error = %e,
                    retry_in_ms = self.config.reconnect_delay,
                    "cloud registration failed"
                ),
            }

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_backoff()) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.client.end_session();
    }

    /// Re-resolve the printer and register it with the cloud.
    async fn connect(&self) -> Result<()> {
        self.state.lock().printer_name = None;

        let printer_name = match self.gateway.resolve_printer(&self.config.printer_name).await {
            Ok(name) => {
                self.state.lock().printer_name = Some(name.clone());
                Some(name)
            }
            Err(e) => {
                warn!(error = %e, "no printer resolved at connect — will retry per job");
                None
            }
        };

        let registration = Registration {
            kiosk_id: self.config.kiosk_id.clone(),
            hostname: hostname(),
            printer_name,
        };
        self.client.register(&registration).await
    }

    async fn poll_until_lost(&self, shutdown: &mut watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_every());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.client.is_connected() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => return,
            }

            match self.client.fetch_jobs().await {
                Ok(jobs) => {
                    self.state.lock().record_poll(Utc::now());
                    let mut queued = 0;
                    for job in jobs {
                        if self.executor.intake(job).await == Intake::Queued {
                            queued += 1;
                        }
                    }
                    if queued > 0 {
                        info!(queued, "pulled new jobs");
                    }
                }
                Err(e) => debug!(error = %e, "job pull failed"),
            }
        }
    }
}

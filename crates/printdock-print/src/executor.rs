// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job executor — the single-worker print pipeline.
//
//   intake:  decode → save → `job_received` → pending queue
//   worker:  classify → convert (if needed) → verify pages → `print_started`
//            → resolve printer → submit → `print_complete` → delayed cleanup
//
// Intake may run concurrently with the worker; it only appends to the queue.
// The worker takes one job at a time, oldest first, and every pipeline error
// stops at the job boundary as a failed `print_complete`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, Notify, watch};
use tracing::{debug, error, info, instrument, warn};

use printdock_core::error::{PrintdockError, Result};
use printdock_core::types::{
    DocumentKind, JobDescriptor, JobId, JobRecord, JobStage, LifecycleEvent,
};
use printdock_document::convert::pdf_output_path;
use printdock_document::{
    Converter, DocumentConverter, ImageConverter, PageCheck, classify, verify_pages,
};

use crate::reporter::Reporter;
use crate::scratch::{CLEANUP_DELAY, ScratchDir, schedule_cleanup};
use crate::spooler::PrinterGateway;
use crate::state::SharedState;

/// What happened to an inbound descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    /// Saved and waiting in the pending queue.
    Queued,
    /// Same job id is already current or pending; nothing was done.
    Duplicate,
    /// Payload could not be decoded or saved; reported as failed.
    Rejected,
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub stage: JobStage,
    pub kind: Option<DocumentKind>,
    pub pages_printed: Option<u32>,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.stage == JobStage::Completed
    }
}

/// Owns every job from intake to cleanup.
pub struct JobExecutor {
    state: SharedState,
    scratch: ScratchDir,
    documents: Arc<dyn Converter>,
    images: Arc<dyn Converter>,
    gateway: Arc<dyn PrinterGateway>,
    reporter: Arc<dyn Reporter>,
    /// `auto` or an explicit spooler destination.
    printer_setting: String,
    cleanup_delay: Duration,
    /// Serialises intake so duplicate checks and queue pushes are atomic.
    intake_lock: AsyncMutex<()>,
    /// Held for the whole pipeline run: one job at a time.
    worker_lock: AsyncMutex<()>,
    wake: Notify,
}

impl JobExecutor {
    pub fn new(
        state: SharedState,
        scratch: ScratchDir,
        gateway: Arc<dyn PrinterGateway>,
        reporter: Arc<dyn Reporter>,
        printer_setting: impl Into<String>,
    ) -> Self {
        Self {
            state,
            scratch,
            documents: Arc::new(DocumentConverter::libreoffice()),
            images: Arc::new(ImageConverter::default()),
            gateway,
            reporter,
            printer_setting: printer_setting.into(),
            cleanup_delay: CLEANUP_DELAY,
            intake_lock: AsyncMutex::new(()),
            worker_lock: AsyncMutex::new(()),
            wake: Notify::new(),
        }
    }

    pub fn with_converters(
        mut self,
        documents: Arc<dyn Converter>,
        images: Arc<dyn Converter>,
    ) -> Self {
        self.documents = documents;
        self.images = images;
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    // -- Intake ---------------------------------------------------------------

    /// Accept a job from push or pull delivery.
    #[instrument(skip_all, fields(job_id = %descriptor.job_id, filename = %descriptor.filename))]
    pub async fn intake(&self, descriptor: JobDescriptor) -> Intake {
        let _serial = self.intake_lock.lock().await;

        let known = self.state.lock().knows_job(&descriptor.job_id);
        if known {
            debug!("job already current or queued — ignoring repeat delivery");
            return Intake::Duplicate;
        }

        match self.save(&descriptor).await {
            Ok(record) => {
                self.reporter
                    .emit(LifecycleEvent::JobReceived {
                        job_id: record.job_id.clone(),
                    })
                    .await;
                {
                    let mut state = self.state.lock();
                    state.pending.push(record);
                    state.counters.jobs_fetched += 1;
                    debug!(pending = state.pending.len(), "job queued");
                }
                self.wake.notify_one();
                Intake::Queued
            }
            Err(err) => {
                error!(error = %err, "job intake failed");
                self.reporter
                    .emit(LifecycleEvent::failed(descriptor.job_id.clone(), err.to_string()))
                    .await;
                Intake::Rejected
            }
        }
    }

    async fn save(&self, descriptor: &JobDescriptor) -> Result<JobRecord> {
        let bytes = decode_payload(&descriptor.file_data)?;
        let digest = hex::encode(Sha256::digest(&bytes));

        self.scratch.ensure().await?;
        let path = self.scratch.job_path(&descriptor.job_id, &descriptor.filename);
        tokio::fs::write(&path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), sha256 = %digest, "job payload saved");
        Ok(JobRecord::saved(descriptor, path, digest))
    }

    // -- Worker ---------------------------------------------------------------

    /// Run the oldest pending job to a terminal state.
    ///
    /// Returns `None` when the queue is empty.
    pub async fn process_next(&self) -> Option<JobOutcome> {
        let _worker = self.worker_lock.lock().await;

        let record = {
            let mut state = self.state.lock();
            let record = state.pending.pop_front()?;
            state.current_job = Some(record.job_id.clone());
            record
        };

        let outcome = self.execute(record).await;
        self.state.lock().current_job = None;
        Some(outcome)
    }

    /// Worker loop: drain the queue, then sleep until intake wakes us.
    ///
    /// On shutdown an in-flight job is abandoned where it stands.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("job worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                outcome = self.process_next() => {
                    if outcome.is_none() {
                        tokio::select! {
                            _ = self.wake.notified() => {}
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let current = self.state.lock().current_job.clone();
                    if let Some(job_id) = current {
                        warn!(job_id = %job_id, "shutting down mid-job — abandoning it");
                    }
                    break;
                }
            }
        }

        info!("job worker stopped");
    }

    #[instrument(skip_all, fields(job_id = %record.job_id))]
    async fn execute(&self, mut record: JobRecord) -> JobOutcome {
        info!(filename = %record.filename, sha256 = %record.payload_sha256, "job started");

        let result = self.advance(&mut record).await;

        let (event, pages_printed, error_text) = match result {
            Ok(pages) => {
                set_stage(&mut record, JobStage::Completed);
                info!(pages, "job completed");
                (LifecycleEvent::completed(record.job_id.clone(), pages), Some(pages), None)
            }
            Err(err) => {
                let failed_at = record.stage;
                set_stage(&mut record, JobStage::Failed);
                error!(stage = ?failed_at, error = %err, "job failed");
                let text = err.to_string();
                (LifecycleEvent::failed(record.job_id.clone(), text.clone()), None, Some(text))
            }
        };

        // Exactly one terminal event per job.
        self.reporter.emit(event).await;

        schedule_cleanup(cleanup_paths(&record), self.cleanup_delay);

        JobOutcome {
            job_id: record.job_id,
            stage: record.stage,
            kind: record.detected_kind,
            pages_printed,
            error: error_text,
        }
    }

    /// Stages between a saved payload and an accepted spooler submission.
    /// Returns the number of pages sent.
    async fn advance(&self, record: &mut JobRecord) -> Result<u32> {
        let kind = classify(&record.filename);
        record.detected_kind = Some(kind);
        set_stage(record, JobStage::Classified);

        if kind == DocumentKind::Unknown {
            return Err(PrintdockError::UnsupportedType(record.filename.clone()));
        }

        if kind.needs_conversion() {
            set_stage(record, JobStage::Converting);
            let converter = match kind {
                DocumentKind::Image => &self.images,
                _ => &self.documents,
            };
            let pdf = converter.convert(&record.working_path).await?;
            record.printable_path = pdf;
            record.converted = true;
            self.state.lock().counters.conversions += 1;
        }

        let path = record.printable_path.clone();
        let expected = record.expected_pages;
        let check = tokio::task::spawn_blocking(move || verify_pages(&path, expected))
            .await
            .unwrap_or(PageCheck {
                actual: 1,
                expected,
            });
        set_stage(record, JobStage::Verified);

        self.reporter
            .emit(LifecycleEvent::PrintStarted {
                job_id: record.job_id.clone(),
            })
            .await;
        set_stage(record, JobStage::Printing);

        let printer = self.printer().await?;
        let request = self
            .gateway
            .submit(&printer, &record.printable_path)
            .await?;
        info!(printer = %printer, request = %request, "handed to spooler");

        Ok(check.actual)
    }

    /// The cached printer, resolving it on first use after a (re)connect.
    async fn printer(&self) -> Result<String> {
        let cached = self.state.lock().printer_name.clone();
        if let Some(name) = cached {
            return Ok(name);
        }

        let name = self.gateway.resolve_printer(&self.printer_setting).await?;
        self.state.lock().printer_name = Some(name.clone());
        Ok(name)
    }
}

fn set_stage(record: &mut JobRecord, stage: JobStage) {
    debug!(from = ?record.stage, to = ?stage, "job stage");
    record.stage = stage;
}

/// Files to delete once `record` is terminal: the saved payload, the
/// printable PDF if distinct, and any partial output of a failed conversion.
fn cleanup_paths(record: &JobRecord) -> Vec<PathBuf> {
    let mut paths = record.owned_paths();
    let conversion_failed =
        record.detected_kind.is_some_and(|k| k.needs_conversion()) && !record.converted;
    if conversion_failed {
        let partial = pdf_output_path(&record.working_path);
        if !paths.contains(&partial) {
            paths.push(partial);
        }
    }
    paths
}

/// Decode a base64 payload. Embedded whitespace and a `data:` URL prefix
/// are tolerated.
fn decode_payload(file_data: &str) -> Result<Vec<u8>> {
    let data = match file_data.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => file_data,
    };
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PrintdockError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(PrintdockError::Decode("payload is empty".into()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{Semaphore, mpsc};
    use tokio::time::timeout;

    use printdock_core::error::{ConversionError, ConversionFailure, ConversionStage, PrinterError};
    use printdock_core::types::{HealthReport, HealthStatus};
    use printdock_document::pdf::pages::fixtures::blank_pdf;

    use super::*;
    use crate::reporter::ChannelReporter;

    // -- Fakes ----------------------------------------------------------------

    #[derive(Default)]
    struct FakeGateway {
        resolves: AtomicUsize,
        submitted: StdMutex<Vec<PathBuf>>,
        fail_submit: bool,
        gate: Option<Arc<Semaphore>>,
        entered: Notify,
    }

    impl FakeGateway {
        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }

        fn rejecting() -> Self {
            Self {
                fail_submit: true,
                ..Default::default()
            }
        }

        fn submitted(&self) -> Vec<PathBuf> {
            self.submitted.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl PrinterGateway for FakeGateway {
        async fn resolve_printer(&self, configured: &str) -> std::result::Result<String, PrinterError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(if configured == "auto" { "Fake_Printer".into() } else { configured.into() })
        }

        async fn check_health(&self, _printer: &str) -> HealthReport {
            HealthReport::new(HealthStatus::Healthy, "idle")
        }

        async fn submit(&self, printer: &str, file: &Path) -> std::result::Result<String, PrinterError> {
            assert!(file.exists(), "spooler was handed a missing file");
            self.submitted.lock().expect("lock").push(file.to_path_buf());
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate open").forget();
            }
            if self.fail_submit {
                return Err(PrinterError::SubmitFailed("printer rejected job".into()));
            }
            Ok(format!("{printer}-1"))
        }
    }

    enum Behaviour {
        Produce(usize),
        Fail(ConversionFailure),
        /// Writes a truncated PDF beside the input, then reports failure.
        LeavePartial,
    }

    struct FakeConverter {
        calls: AtomicUsize,
        behaviour: Behaviour,
    }

    impl FakeConverter {
        fn producing(pages: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behaviour: Behaviour::Produce(pages),
            }
        }

        fn failing(kind: ConversionFailure) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behaviour: Behaviour::Fail(kind),
            }
        }

        fn leaving_partial() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behaviour: Behaviour::LeavePartial,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Converter for FakeConverter {
        async fn convert(&self, input: &Path) -> std::result::Result<PathBuf, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Produce(pages) => {
                    let output = pdf_output_path(input);
                    tokio::fs::write(&output, blank_pdf(pages)).await.expect("write PDF");
                    Ok(output)
                }
                Behaviour::Fail(kind) => Err(ConversionError::new(
                    ConversionStage::Document,
                    kind,
                    "soffice is not installed",
                )),
                Behaviour::LeavePartial => {
                    tokio::fs::write(pdf_output_path(input), b"%PDF-1.4\n%trunc")
                        .await
                        .expect("write partial PDF");
                    Err(ConversionError::new(
                        ConversionStage::Document,
                        ConversionFailure::ToolFailed,
                        "source file could not be loaded",
                    ))
                }
            }
        }
    }

    // -- Harness --------------------------------------------------------------

    struct Harness {
        exec: Arc<JobExecutor>,
        events: mpsc::UnboundedReceiver<LifecycleEvent>,
        gateway: Arc<FakeGateway>,
        documents: Arc<FakeConverter>,
        images: Arc<FakeConverter>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(gateway: FakeGateway, documents: FakeConverter, images: FakeConverter) -> Self {
            Self::with_delay(gateway, documents, images, Duration::from_millis(50))
        }

        fn with_delay(
            gateway: FakeGateway,
            documents: FakeConverter,
            images: FakeConverter,
            cleanup_delay: Duration,
        ) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = Arc::new(gateway);
            let documents = Arc::new(documents);
            let images = Arc::new(images);
            let (reporter, events) = ChannelReporter::channel();

            let exec = JobExecutor::new(
                SharedState::starting_today(),
                ScratchDir::new(dir.path().join("scratch")),
                gateway.clone(),
                Arc::new(reporter),
                "auto",
            )
            .with_converters(documents.clone(), images.clone())
            .with_cleanup_delay(cleanup_delay);

            Self {
                exec: Arc::new(exec),
                events,
                gateway,
                documents,
                images,
                dir,
            }
        }

        fn default_fakes() -> Self {
            Self::new(
                FakeGateway::default(),
                FakeConverter::producing(2),
                FakeConverter::producing(1),
            )
        }

        fn drain(&mut self) -> Vec<LifecycleEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn job(id: &str, filename: &str, pages: Option<u32>, bytes: &[u8]) -> JobDescriptor {
        JobDescriptor {
            job_id: id.into(),
            filename: filename.into(),
            pages,
            file_data: STANDARD.encode(bytes),
        }
    }

    fn failure_text(event: &LifecycleEvent) -> String {
        match event {
            LifecycleEvent::PrintComplete {
                success: false,
                error: Some(error),
                ..
            } => error.clone(),
            other => panic!("expected failed print_complete, got {other:?}"),
        }
    }

    // -- Scenarios ------------------------------------------------------------

    #[tokio::test]
    async fn pdf_job_prints_and_reports_pages() {
        let mut h = Harness::default_fakes();

        let intake = h.exec.intake(job("j1", "report.pdf", Some(3), &blank_pdf(3))).await;
        assert_eq!(intake, Intake::Queued);

        let outcome = h.exec.process_next().await.expect("one job");
        assert!(outcome.succeeded());
        assert_eq!(outcome.kind, Some(DocumentKind::Pdf));
        assert_eq!(outcome.pages_printed, Some(3));

        assert_eq!(
            h.drain(),
            vec![
                LifecycleEvent::JobReceived { job_id: "j1".into() },
                LifecycleEvent::PrintStarted { job_id: "j1".into() },
                LifecycleEvent::completed("j1".into(), 3),
            ]
        );
        assert_eq!(h.documents.calls() + h.images.calls(), 0, "PDFs are never converted");
        assert_eq!(h.gateway.submitted().len(), 1);
    }

    #[tokio::test]
    async fn page_mismatch_still_prints() {
        let mut h = Harness::default_fakes();
        h.exec.intake(job("j1", "report.pdf", Some(5), &blank_pdf(3))).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert!(outcome.succeeded());
        assert_eq!(outcome.pages_printed, Some(3));
        assert_eq!(h.drain().last(), Some(&LifecycleEvent::completed("j1".into(), 3)));
    }

    #[tokio::test]
    async fn document_without_converter_fails() {
        let mut h = Harness::new(
            FakeGateway::default(),
            FakeConverter::failing(ConversionFailure::ToolMissing),
            FakeConverter::producing(1),
        );
        h.exec.intake(job("j2", "notes.docx", None, b"PK\x03\x04docx")).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert_eq!(outcome.stage, JobStage::Failed);

        let events = h.drain();
        assert_eq!(events.len(), 2, "received + complete only: {events:?}");
        assert!(failure_text(&events[1]).contains("conversion"));
        assert!(h.gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_fails_without_conversion_or_printing() {
        let mut h = Harness::default_fakes();
        h.exec.intake(job("j3", "photo.gif", None, b"GIF89a")).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert_eq!(outcome.stage, JobStage::Failed);
        assert_eq!(outcome.kind, Some(DocumentKind::Unknown));

        let events = h.drain();
        assert!(failure_text(events.last().expect("events")).contains("Unsupported"));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, LifecycleEvent::PrintStarted { .. }))
        );
        assert_eq!(h.documents.calls() + h.images.calls(), 0);
        assert!(h.gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn image_is_converted_then_printed() {
        let mut h = Harness::default_fakes();
        h.exec.intake(job("j6", "photo.PNG", None, b"\x89PNG")).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert!(outcome.succeeded());
        assert_eq!(outcome.pages_printed, Some(1));
        assert_eq!(h.images.calls(), 1);
        assert_eq!(h.documents.calls(), 0);

        let submitted = h.gateway.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(h.exec.state().lock().counters.conversions, 1);
        assert_eq!(h.drain().len(), 3);
    }

    #[tokio::test]
    async fn undecodable_payload_is_rejected_at_intake() {
        let mut h = Harness::default_fakes();
        let mut bad = job("j7", "report.pdf", None, b"");
        bad.file_data = "!!! not base64 !!!".into();

        assert_eq!(h.exec.intake(bad).await, Intake::Rejected);

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert!(failure_text(&events[0]).contains("decoded"));
        let state = h.exec.state().lock();
        assert!(state.pending.is_empty());
        assert_eq!(state.counters.jobs_fetched, 0);
    }

    #[tokio::test]
    async fn repeat_delivery_is_ignored() {
        let mut h = Harness::default_fakes();
        let pdf = blank_pdf(1);

        assert_eq!(h.exec.intake(job("j1", "a.pdf", None, &pdf)).await, Intake::Queued);
        assert_eq!(h.exec.intake(job("j1", "a.pdf", None, &pdf)).await, Intake::Duplicate);

        assert_eq!(h.drain().len(), 1);
        assert_eq!(h.exec.state().lock().pending.len(), 1);
    }

    #[tokio::test]
    async fn jobs_run_in_arrival_order() {
        let h = Harness::default_fakes();
        let pdf = blank_pdf(1);
        for id in ["a", "b", "c"] {
            h.exec.intake(job(id, &format!("{id}.pdf"), None, &pdf)).await;
        }

        let mut order = Vec::new();
        while let Some(outcome) = h.exec.process_next().await {
            order.push(outcome.job_id.0);
        }
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(h.exec.state().lock().counters.jobs_fetched, 3);
    }

    #[tokio::test]
    async fn printer_is_resolved_once_and_cached() {
        let h = Harness::default_fakes();
        let pdf = blank_pdf(1);
        h.exec.intake(job("a", "a.pdf", None, &pdf)).await;
        h.exec.intake(job("b", "b.pdf", None, &pdf)).await;
        h.exec.process_next().await;
        h.exec.process_next().await;

        assert_eq!(h.gateway.resolves.load(Ordering::SeqCst), 1);
        assert_eq!(h.exec.state().lock().printer_name.as_deref(), Some("Fake_Printer"));
    }

    #[tokio::test]
    async fn spooler_rejection_fails_the_job() {
        let mut h = Harness::new(
            FakeGateway::rejecting(),
            FakeConverter::producing(1),
            FakeConverter::producing(1),
        );
        h.exec.intake(job("j8", "a.pdf", None, &blank_pdf(1))).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert_eq!(outcome.stage, JobStage::Failed);
        let events = h.drain();
        assert!(failure_text(events.last().expect("events")).contains("submission failed"));
    }

    #[tokio::test]
    async fn files_are_removed_only_after_grace_delay() {
        let h = Harness::with_delay(
            FakeGateway::default(),
            FakeConverter::producing(2),
            FakeConverter::producing(1),
            Duration::from_millis(300),
        );
        h.exec.intake(job("j9", "notes.docx", None, b"PK\x03\x04docx")).await;
        h.exec.process_next().await.expect("one job");

        let scratch = h.dir.path().join("scratch");
        let working = scratch.join("j9_notes.docx");
        let printable = scratch.join("j9_notes.pdf");
        assert!(working.exists(), "working file deleted before the delay");
        assert!(printable.exists(), "converted file deleted before the delay");

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!working.exists());
        assert!(!printable.exists());
    }

    #[tokio::test]
    async fn failed_conversion_cleans_up_partial_output() {
        let h = Harness::with_delay(
            FakeGateway::default(),
            FakeConverter::leaving_partial(),
            FakeConverter::producing(1),
            Duration::from_millis(300),
        );
        h.exec.intake(job("j_a", "brief.docx", None, b"PK\x03\x04docx")).await;

        let outcome = h.exec.process_next().await.expect("one job");
        assert_eq!(outcome.stage, JobStage::Failed);
        assert!(h.gateway.submitted().is_empty());

        let scratch = h.dir.path().join("scratch");
        let working = scratch.join("j_a_brief.docx");
        let partial = scratch.join("j_a_brief.pdf");
        assert!(working.exists(), "working file deleted before the delay");
        assert!(partial.exists(), "partial PDF deleted before the delay");

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!working.exists());
        assert!(!partial.exists());
        assert_eq!(h.exec.state().lock().current_job, None);
    }

    #[tokio::test]
    async fn queued_job_waits_for_current_job() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(
            FakeGateway::gated(gate.clone()),
            FakeConverter::producing(1),
            FakeConverter::producing(1),
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(h.exec.clone().run(stop_rx));

        let pdf = blank_pdf(1);
        h.exec.intake(job("j4", "j4.pdf", None, &pdf)).await;
        h.exec.intake(job("j5", "j5.pdf", None, &pdf)).await;

        timeout(Duration::from_secs(5), h.gateway.entered.notified())
            .await
            .expect("j4 reached the spooler");
        {
            let state = h.exec.state().lock();
            assert_eq!(state.current_job, Some(JobId::from("j4")));
            assert_eq!(state.pending.job_ids(), [JobId::from("j5")]);
        }
        assert_eq!(h.gateway.submitted().len(), 1);

        gate.add_permits(2);

        let mut events = Vec::new();
        timeout(Duration::from_secs(5), async {
            while let Some(event) = h.events.recv().await {
                let done = matches!(
                    &event,
                    LifecycleEvent::PrintComplete { job_id, .. } if job_id.as_str() == "j5"
                );
                events.push(event);
                if done {
                    break;
                }
            }
        })
        .await
        .expect("both jobs finish");

        let position = |needle: LifecycleEvent| {
            events
                .iter()
                .position(|e| *e == needle)
                .unwrap_or_else(|| panic!("missing {needle:?} in {events:?}"))
        };
        assert!(
            position(LifecycleEvent::completed("j4".into(), 1))
                < position(LifecycleEvent::PrintStarted { job_id: "j5".into() })
        );

        stop_tx.send(true).expect("worker listening");
        worker.await.expect("worker exits cleanly");
    }

    // -- Helpers --------------------------------------------------------------

    #[test]
    fn payload_decoding_is_forgiving() {
        let encoded = STANDARD.encode(b"%PDF-1.4");
        assert_eq!(decode_payload(&encoded).expect("plain"), b"%PDF-1.4");

        let wrapped = format!("{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_payload(&wrapped).expect("wrapped"), b"%PDF-1.4");

        let data_url = format!("data:application/pdf;base64,{encoded}");
        assert_eq!(decode_payload(&data_url).expect("data url"), b"%PDF-1.4");

        assert!(decode_payload("").is_err());
        assert!(decode_payload("%%%").is_err());
    }
}

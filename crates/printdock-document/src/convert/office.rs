// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Office document → PDF through a headless office suite.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use printdock_core::error::{ConversionError, ConversionFailure, ConversionStage};
use printdock_core::process::run_tool;
use tracing::{info, instrument, warn};

use super::{
    CONVERSION_TIMEOUT, Converter, ToolCommand, clear_stale_output, pdf_output_path,
    process_failure,
};

/// Converts `.doc/.docx/.rtf/.odt/.txt/.md` files with LibreOffice (or any
/// tool accepting the same `--headless --convert-to pdf --outdir` flags).
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    tool: ToolCommand,
    timeout: Duration,
}

impl DocumentConverter {
    pub fn new(tool: ToolCommand) -> Self {
        Self {
            tool,
            timeout: CONVERSION_TIMEOUT,
        }
    }

    /// `soffice` from `PATH`.
    pub fn libreoffice() -> Self {
        Self::new(ToolCommand::new("soffice"))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Converter for DocumentConverter {
    #[instrument(skip(self, input), fields(input = %input.display(), tool = %self.tool.program))]
    async fn convert(&self, input: &Path) -> Result<PathBuf, ConversionError> {
        let stage = ConversionStage::Document;
        let output = pdf_output_path(input);
        let outdir = input.parent().unwrap_or_else(|| Path::new("."));

        clear_stale_output(&output).await;

        let mut args: Vec<OsString> = self.tool.base_args.iter().map(OsString::from).collect();
        args.extend([
            OsString::from("--headless"),
            OsString::from("--convert-to"),
            OsString::from("pdf"),
            OsString::from("--outdir"),
            outdir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ]);

        let result = run_tool(&self.tool.program, &args, self.timeout)
            .await
            .map_err(|e| process_failure(stage, e))?;

        if !result.success() {
            warn!(status = %result.status, "office conversion failed");
            return Err(ConversionError::new(
                stage,
                ConversionFailure::ToolFailed,
                result.diagnostic(),
            ));
        }

        // Exit status alone is not trusted: soffice exits 0 on many failures.
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            warn!(expected = %output.display(), "office tool exited cleanly but wrote no PDF");
            let detail = match result.diagnostic() {
                d if d.is_empty() => format!("expected output {} was not created", output.display()),
                d => d,
            };
            return Err(ConversionError::new(
                stage,
                ConversionFailure::OutputMissing,
                detail,
            ));
        }

        info!(output = %output.display(), "document converted to PDF");
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::convert::test_tools::{FAILS, SILENT_SUCCESS, WRITES_PDF, script};

    fn input_in(dir: &Path) -> PathBuf {
        let input = dir.join("j2_notes.docx");
        std::fs::write(&input, b"PK\x03\x04 not really a docx").expect("write input");
        input
    }

    #[tokio::test]
    async fn converts_when_output_appears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        let converter = DocumentConverter::new(script(dir.path(), "office.sh", WRITES_PDF));

        let output = converter.convert(&input).await.expect("convert");
        assert_eq!(output, dir.path().join("j2_notes.pdf"));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn clean_exit_without_output_is_output_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        let converter = DocumentConverter::new(script(dir.path(), "office.sh", SILENT_SUCCESS));

        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.kind, ConversionFailure::OutputMissing);
        assert_eq!(err.stage, ConversionStage::Document);
    }

    #[tokio::test]
    async fn stale_output_does_not_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        std::fs::write(dir.path().join("j2_notes.pdf"), b"old").expect("stale");
        let converter = DocumentConverter::new(script(dir.path(), "office.sh", SILENT_SUCCESS));

        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.kind, ConversionFailure::OutputMissing);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_tool_diagnostic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        let converter = DocumentConverter::new(script(dir.path(), "office.sh", FAILS));

        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.kind, ConversionFailure::ToolFailed);
        assert!(err.detail.contains("could not be loaded"));
    }

    #[tokio::test]
    async fn missing_tool_is_tool_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        let converter = DocumentConverter::new(ToolCommand::new("printdock-no-such-office"));

        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.kind, ConversionFailure::ToolMissing);
        assert!(err.to_string().contains("conversion"));
    }

    #[tokio::test]
    async fn hung_tool_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = input_in(dir.path());
        let converter = DocumentConverter::new(script(dir.path(), "office.sh", "sleep 5\n"))
            .with_timeout(Duration::from_millis(200));

        let err = converter.convert(&input).await.unwrap_err();
        assert_eq!(err.kind, ConversionFailure::Timeout);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image → single-page A4 PDF through ImageMagick.
//
// ImageMagick 7 ships a single `magick` binary; ImageMagick 6 installs
// separate binaries (`convert`, `identify`, ...). Backends are tried in
// order; the first one that produces the PDF wins.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use printdock_core::error::{ConversionError, ConversionFailure, ConversionStage};
use printdock_core::process::{ProcessError, run_tool};
use tracing::{debug, info, instrument, warn};

use super::{
    CONVERSION_TIMEOUT, Converter, ToolCommand, clear_stale_output, pdf_output_path,
    process_failure,
};
use crate::classify::{IMAGE_EXTENSIONS, extension};

/// A4 at 150 DPI, in pixels.
pub const PAGE_WIDTH_PX: u32 = 1240;
pub const PAGE_HEIGHT_PX: u32 = 1754;
pub const PAGE_DPI: u32 = 150;

/// One candidate image tool.
#[derive(Debug, Clone)]
pub struct ImageBackend {
    /// Label used in logs and diagnostics.
    pub name: String,
    pub tool: ToolCommand,
}

impl ImageBackend {
    pub fn new(name: impl Into<String>, tool: ToolCommand) -> Self {
        Self {
            name: name.into(),
            tool,
        }
    }

    /// ImageMagick 7 (`magick`).
    pub fn magick7() -> Self {
        Self::new("imagemagick-7", ToolCommand::new("magick"))
    }

    /// ImageMagick 6 (`convert`).
    pub fn magick6() -> Self {
        Self::new("imagemagick-6", ToolCommand::new("convert"))
    }
}

/// Result of one backend attempt.
enum Attempt {
    Converted,
    /// The backend's binary is not installed.
    Unavailable,
    Failed(ConversionError),
}

/// Converts `.png/.jpg/.jpeg` into a white A4 page at 150 DPI: scaled down to
/// fit (never up), centred.
#[derive(Debug, Clone)]
pub struct ImageConverter {
    backends: Vec<ImageBackend>,
    timeout: Duration,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::with_backends(vec![ImageBackend::magick7(), ImageBackend::magick6()])
    }
}

impl ImageConverter {
    pub fn with_backends(backends: Vec<ImageBackend>) -> Self {
        Self {
            backends,
            timeout: CONVERSION_TIMEOUT,
        }
    }

    pub fn backends(&self) -> &[ImageBackend] {
        &self.backends
    }

    async fn attempt(&self, backend: &ImageBackend, input: &Path, output: &Path) -> Attempt {
        let stage = ConversionStage::Image;
        clear_stale_output(output).await;

        let mut args: Vec<OsString> = backend.tool.base_args.iter().map(OsString::from).collect();
        args.push(input.as_os_str().to_owned());
        args.extend(page_transform_args().into_iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());

        let result = match run_tool(&backend.tool.program, &args, self.timeout).await {
            Ok(result) => result,
            Err(ProcessError::NotFound(_)) => return Attempt::Unavailable,
            Err(e) => return Attempt::Failed(process_failure(stage, e)),
        };

        if !result.success() {
            return Attempt::Failed(ConversionError::new(
                stage,
                ConversionFailure::ToolFailed,
                format!("{}: {}", backend.name, result.diagnostic()),
            ));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Attempt::Failed(ConversionError::new(
                stage,
                ConversionFailure::OutputMissing,
                format!("{}: expected output {} was not created", backend.name, output.display()),
            ));
        }

        Attempt::Converted
    }
}

/// ImageMagick operators between the input and output operands.
fn page_transform_args() -> Vec<String> {
    let page = format!("{PAGE_WIDTH_PX}x{PAGE_HEIGHT_PX}");
    vec![
        "-resize".into(),
        // `>` only shrinks larger images.
        format!("{page}>"),
        "-background".into(),
        "white".into(),
        "-gravity".into(),
        "center".into(),
        "-extent".into(),
        page,
        "-units".into(),
        "PixelsPerInch".into(),
        "-density".into(),
        PAGE_DPI.to_string(),
    ]
}

#[async_trait]
impl Converter for ImageConverter {
    #[instrument(skip(self, input), fields(input = %input.display()))]
    async fn convert(&self, input: &Path) -> Result<PathBuf, ConversionError> {
        let stage = ConversionStage::Image;

        let ext = extension(&input.to_string_lossy()).unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ConversionError::new(
                stage,
                ConversionFailure::UnsupportedFormat,
                format!("cannot convert .{ext} images (accepted: png, jpg, jpeg)"),
            ));
        }

        let output = pdf_output_path(input);
        let mut last_failure: Option<ConversionError> = None;
        let mut last_was_unavailable = true;

        for backend in &self.backends {
            match self.attempt(backend, input, &output).await {
                Attempt::Converted => {
                    info!(backend = %backend.name, output = %output.display(), "image converted to PDF");
                    return Ok(output);
                }
                Attempt::Unavailable => {
                    debug!(backend = %backend.name, "image backend not installed — trying next");
                    last_was_unavailable = true;
                }
                Attempt::Failed(err) => {
                    warn!(backend = %backend.name, error = %err, "image backend failed — trying next");
                    last_was_unavailable = false;
                    last_failure = Some(err);
                }
            }
        }

        // Running out of installed tools is `tool-missing`, even if an earlier
        // backend ran and failed; its diagnostic is kept in the detail.
        if last_was_unavailable {
            let tried: Vec<&str> = self.backends.iter().map(|b| b.tool.program.as_str()).collect();
            let mut detail = format!("no image conversion tool available (tried {})", tried.join(", "));
            if let Some(earlier) = last_failure {
                detail.push_str(&format!("; earlier failure: {}", earlier.detail));
            }
            return Err(ConversionError::new(stage, ConversionFailure::ToolMissing, detail));
        }

        Err(last_failure.unwrap_or_else(|| {
            ConversionError::new(stage, ConversionFailure::ToolMissing, "no image backends configured")
        }))
    }
}

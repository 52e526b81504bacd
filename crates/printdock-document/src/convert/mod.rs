// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion of non-PDF inputs into printable PDF.
//
// Both paths shell out to external tools and trust only the filesystem: a
// conversion succeeds when the tool exits cleanly AND the expected PDF exists
// beside the input afterwards.

mod image;
mod office;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use printdock_core::error::{ConversionError, ConversionFailure, ConversionStage};
use printdock_core::process::ProcessError;

pub use image::{ImageBackend, ImageConverter};
pub use office::DocumentConverter;

/// Time budget for a single external conversion tool run.
pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Uniform conversion contract shared by the office and image paths.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` into a PDF and return the PDF's path.
    async fn convert(&self, input: &Path) -> Result<PathBuf, ConversionError>;
}

/// Where a converter writes its output: beside the input, same stem, `.pdf`.
pub fn pdf_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// A tool invocation prefix: the program plus any leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub base_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.base_args.push(arg.into());
        self
    }
}

/// Remove a stale output so an old file cannot masquerade as a fresh result.
async fn clear_stale_output(output: &Path) {
    if let Err(e) = tokio::fs::remove_file(output).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %output.display(), error = %e, "could not remove stale output");
        }
    }
}

/// Map a process-level failure onto the conversion taxonomy.
fn process_failure(stage: ConversionStage, err: ProcessError) -> ConversionError {
    let kind = match err {
        ProcessError::NotFound(_) => ConversionFailure::ToolMissing,
        ProcessError::TimedOut { .. } => ConversionFailure::Timeout,
        ProcessError::Io { .. } => ConversionFailure::ToolFailed,
    };
    ConversionError::new(stage, kind, err.to_string())
}

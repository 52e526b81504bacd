// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printdock.

use std::fmt;

use thiserror::Error;

/// Which conversion path produced a [`ConversionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    /// Office document → PDF.
    Document,
    /// Raster image → PDF.
    Image,
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Image => f.write_str("image"),
        }
    }
}

/// Why a conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionFailure {
    /// Input extension is not accepted by this conversion path.
    UnsupportedFormat,
    /// No usable conversion tool is installed.
    ToolMissing,
    /// The tool ran and reported an error.
    ToolFailed,
    /// The tool claimed success but the expected output file is absent.
    OutputMissing,
    /// The tool exceeded its time budget and was killed.
    Timeout,
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnsupportedFormat => "unsupported-format",
            Self::ToolMissing => "tool-missing",
            Self::ToolFailed => "tool-failed",
            Self::OutputMissing => "output-missing",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A failed document or image conversion.
#[derive(Debug, Clone, Error)]
#[error("conversion failed ({stage}, {kind}): {detail}")]
pub struct ConversionError {
    pub stage: ConversionStage,
    pub kind: ConversionFailure,
    /// Diagnostic text, usually the external tool's stderr.
    pub detail: String,
}

impl ConversionError {
    pub fn new(stage: ConversionStage, kind: ConversionFailure, detail: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            detail: detail.into(),
        }
    }
}

/// Failures talking to the OS print spooler.
#[derive(Debug, Clone, Error)]
pub enum PrinterError {
    #[error("no printer available")]
    NoPrinter,

    #[error("print spooler unavailable: {0}")]
    SpoolerUnavailable(String),

    #[error("print submission failed: {0}")]
    SubmitFailed(String),
}

/// Top-level error type for all Printdock operations.
#[derive(Debug, Error)]
pub enum PrintdockError {
    // -- Pipeline errors --
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Printer(#[from] PrinterError),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("job payload could not be decoded: {0}")]
    Decode(String),

    // -- Agent plumbing --
    #[error("cloud transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintdockError>;

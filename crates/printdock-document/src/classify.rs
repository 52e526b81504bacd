// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filename → document kind. Extension lookup only, no content sniffing.

use std::path::Path;

use printdock_core::types::DocumentKind;

/// Extensions routed through the office converter.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx", "rtf", "odt", "txt", "md"];

/// Extensions routed through the image converter.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Classify a filename by its (case-insensitive) extension.
pub fn classify(filename: &str) -> DocumentKind {
    let Some(ext) = extension(filename) else {
        return DocumentKind::Unknown;
    };

    if ext == "pdf" {
        DocumentKind::Pdf
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        DocumentKind::Document
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        DocumentKind::Image
    } else {
        DocumentKind::Unknown
    }
}

/// Lower-cased extension of `filename`, if it has one.
pub(crate) fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

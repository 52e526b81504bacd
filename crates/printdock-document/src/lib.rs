// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printdock-document — Document handling for the Printdock print agent.
//
// Maps inbound filenames to a document kind, normalises office documents and
// raster images into PDF through external tools, and counts PDF pages.

pub mod classify;
pub mod convert;
pub mod pdf;

pub use classify::classify;
pub use convert::{Converter, DocumentConverter, ImageBackend, ImageConverter, ToolCommand};
pub use pdf::pages::{PageCheck, PdfReader, count_pages, verify_pages};

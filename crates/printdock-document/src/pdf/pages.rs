// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page counting and expected-vs-actual verification using `lopdf`.
//
// Counting is structural (page tree), never rendering. A PDF that cannot be
// parsed counts as one page so printing is never blocked by the counter.

use std::path::Path;

use lopdf::Document;
use printdock_core::error::PrintdockError;
use tracing::{debug, info, instrument, warn};

/// Thin wrapper over a loaded `lopdf::Document`.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PrintdockError> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            PrintdockError::Decode(format!("failed to open PDF {}: {}", path_ref.display(), err))
        })?;
        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    /// Number of pages in the page tree.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

/// Page count of the PDF at `path`, never less than 1.
///
/// Any parse failure (or an empty page tree) yields 1.
pub fn count_pages(path: &Path) -> u32 {
    match PdfReader::open(path) {
        Ok(reader) => {
            let pages = u32::try_from(reader.page_count()).unwrap_or(u32::MAX);
            pages.max(1)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "page count failed — assuming 1 page");
            1
        }
    }
}

/// Outcome of comparing the advisory page count with the real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCheck {
    pub actual: u32,
    pub expected: Option<u32>,
}

impl PageCheck {
    pub fn mismatch(&self) -> bool {
        self.expected.is_some_and(|expected| expected != self.actual)
    }
}

/// Count pages and compare against `expected`. A mismatch is logged, never
/// an error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn verify_pages(path: &Path, expected: Option<u32>) -> PageCheck {
    let check = PageCheck {
        actual: count_pages(path),
        expected,
    };

    if check.mismatch() {
        warn!(
            expected = ?check.expected,
            actual = check.actual,
            "page count mismatch — printing anyway"
        );
    } else {
        info!(pages = check.actual, "page count verified");
    }

    check
}

/// Generators for well-formed PDFs, used by tests across the workspace.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use lopdf::{Document, Object, Stream, dictionary};

    /// A minimal PDF with `pages` blank A4 pages.
    pub fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(pages);
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("serialise fixture PDF");
        out
    }
}

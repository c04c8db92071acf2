// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// faxkit-document — everything that touches PDF bytes.
//
// Provides page rasterization and zoom for the editing view, destructive
// redaction burn-in, and the atomic multi-document assembler that produces
// the final fax.

pub mod assemble;
pub mod cover;
pub mod lease;
pub mod pdf;
pub mod redact;
pub mod render;
pub mod retry;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

// Re-export the primary types so callers can use `faxkit_document::PdfReader` etc.
pub use assemble::{AssemblyInput, AssemblyReport, AssemblyValidation, DocumentAssembler};
pub use cover::{CoverPageProvider, CoverSheet, TextCoverPage};
pub use lease::DocumentLease;
pub use pdf::{DocumentInfo, PdfReader, PdfWriter};
pub use redact::{BurnedDocument, RedactionApplier};
pub use render::{PageRasterizer, PdfiumRasterizer, PreviewStyle, RenderedPage, ZoomController, paint_edits};
#[cfg(any(test, feature = "test-support"))]
pub use render::ContentRasterizer;
pub use retry::{LockOutcome, RetryConfig};

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Faxkit.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Faxkit operations.
#[derive(Debug, Error)]
pub enum FaxkitError {
    // -- Document errors --
    #[error("cannot load document {document}: {reason}")]
    DocumentLoad { document: String, reason: String },

    #[error("document {0} is already open in another editing session")]
    DocumentInUse(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page renderer unavailable: {0}")]
    RendererUnavailable(String),

    // -- Editing errors --
    #[error("display surface has no size yet")]
    ViewNotReady,

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("unsupported edit file version {found} (supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    // -- Burn-in / assembly --
    #[error("redaction could not be applied to page {page} of {document}: {reason}")]
    RedactionApply {
        document: String,
        page: usize,
        reason: String,
    },

    #[error("assembly failed{}: {source}", describe_location(.document, .page))]
    Assembly {
        document: Option<String>,
        page: Option<usize>,
        #[source]
        source: Box<FaxkitError>,
    },

    #[error("{} is locked by another process (gave up after {attempts} attempts)", .path.display())]
    ResourceLock { path: PathBuf, attempts: u32 },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FaxkitError {
    /// Wrap `self` as the cause of a failed assembly.
    pub fn into_assembly(self, document: Option<String>, page: Option<usize>) -> Self {
        // Keep the innermost location when an assembly error is re-wrapped.
        if let FaxkitError::Assembly { .. } = self {
            return self;
        }
        FaxkitError::Assembly {
            document,
            page,
            source: Box::new(self),
        }
    }

    /// The root cause, skipping any `Assembly` wrapper.
    pub fn root(&self) -> &FaxkitError {
        match self {
            FaxkitError::Assembly { source, .. } => source.root(),
            other => other,
        }
    }
}

fn describe_location(document: &Option<String>, page: &Option<usize>) -> String {
    match (document, page) {
        (Some(doc), Some(page)) => format!(" at {doc} page {page}"),
        (Some(doc), None) => format!(" at {doc}"),
        (None, Some(page)) => format!(" at page {page}"),
        (None, None) => String::new(),
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FaxkitError>;

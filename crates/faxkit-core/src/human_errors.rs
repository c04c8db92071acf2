// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people preparing a fax.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the caller presents it.

use crate::error::FaxkitError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something else holds a file; trying again shortly usually works.
    Transient,
    /// The user must do something (pick another file, fix an edit).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying again may succeed without other changes.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `FaxkitError` into a `HumanError`.
pub fn humanize_error(err: &FaxkitError) -> HumanError {
    match err {
        FaxkitError::DocumentLoad { document, .. } => HumanError {
            message: "This document couldn't be opened.".into(),
            suggestion: format!(
                "Check that {document} still exists and is a PDF, or remove it from the fax."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FaxkitError::DocumentInUse(document) => HumanError {
            message: "This document is already open for editing.".into(),
            suggestion: format!("Finish editing {document} in the other window first."),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        FaxkitError::PageOutOfRange { page, page_count } => HumanError {
            message: "That page doesn't exist.".into(),
            suggestion: format!(
                "The document has {page_count} pages; page {} was requested.",
                page + 1
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        FaxkitError::PdfError(detail) => HumanError {
            message: "The PDF could not be processed.".into(),
            suggestion: format!("The file may be damaged. Try re-saving it as a PDF. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FaxkitError::ImageError(detail) => HumanError {
            message: "A picture inside the document could not be processed.".into(),
            suggestion: format!("Try scanning or exporting the page again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FaxkitError::RendererUnavailable(detail) => HumanError {
            message: "Pages can't be shown because the PDF renderer is missing.".into(),
            suggestion: format!(
                "Install PDFium or set pdfium_library in the configuration. \
                 Sending and merging still work. ({detail})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FaxkitError::ViewNotReady => HumanError {
            message: "The page isn't shown yet.".into(),
            suggestion: "Wait for the page to appear, then draw again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        FaxkitError::InvalidEdit(detail) => HumanError {
            message: "One of the edits is not valid.".into(),
            suggestion: format!("Undo the last edit and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FaxkitError::UnsupportedSchema { found, .. } => HumanError {
            message: "The saved edits come from a different version.".into(),
            suggestion: format!("Re-create the edits in this version (file version {found})."),
            retriable: false,
            severity: Severity::Permanent,
        },

        FaxkitError::RedactionApply { document, page, .. } => HumanError {
            message: "A redaction could not be applied safely, so the fax was not created."
                .into(),
            suggestion: format!(
                "Page {} of {document} contains content that can't be blacked out. \
                 Exclude the page or replace it with a re-scanned copy.",
                page + 1
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FaxkitError::Assembly { source, .. } => {
            let mut inner = humanize_error(source);
            inner.message = format!("The fax document was not created. {}", inner.message);
            inner
        }

        FaxkitError::ResourceLock { path, .. } => HumanError {
            message: "The output file is in use by another program.".into(),
            suggestion: format!(
                "Close any program that has {} open, then try again.",
                path.display()
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        FaxkitError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "A file could not be found.".into(),
                suggestion: "It may have been moved or deleted. Select it again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "Faxkit isn't allowed to use that file.".into(),
                suggestion: "Choose a folder you can write to, or check the file permissions."
                    .into(),
                retriable: true,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "Something went wrong reading or writing a file.".into(),
                suggestion: format!("Try again. ({io_err})"),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        FaxkitError::Serialization(detail) => HumanError {
            message: "The saved edits could not be read.".into(),
            suggestion: format!("The edits file may be damaged. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_renderer_names_the_setting() {
        let human = humanize_error(&FaxkitError::RendererUnavailable("libpdfium.so not found".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("pdfium_library"));
        assert!(!human.retriable);
    }

    #[test]
    fn lock_is_transient() {
        let err = FaxkitError::ResourceLock {
            path: "/tmp/fax.pdf".into(),
            attempts: 5,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn redaction_failure_names_one_based_page() {
        let err = FaxkitError::RedactionApply {
            document: "lease.pdf".into(),
            page: 0,
            reason: "JBIG2 image".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("Page 1 of lease.pdf"));
    }

    #[test]
    fn assembly_wraps_inner_message() {
        let err = FaxkitError::DocumentLoad {
            document: "missing.pdf".into(),
            reason: "not found".into(),
        }
        .into_assembly(Some("missing.pdf".into()), None);
        let human = humanize_error(&err);
        assert!(human.message.starts_with("The fax document was not created."));
        assert!(!human.retriable);
    }
}

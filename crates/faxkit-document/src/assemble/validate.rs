// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pre-flight report for a document combination.

use std::path::PathBuf;

use faxkit_core::config::OutputLimits;
use serde::Serialize;

/// Share of the size limit above which a warning is raised.
const SIZE_WARNING_RATIO: f64 = 0.8;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One source as it would be assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCheck {
    pub path: PathBuf,
    pub page_count: usize,
    pub included: usize,
    pub excluded: usize,
    pub size_bytes: u64,
    /// Has marks that will be burned in.
    pub edited: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyValidation {
    pub documents: Vec<DocumentCheck>,
    pub total_pages: usize,
    pub included_pages: usize,
    pub total_size_bytes: u64,
    /// Problems that would make assembly fail or be rejected.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl AssemblyValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / BYTES_PER_MB
    }

    pub(crate) fn push(&mut self, check: DocumentCheck) {
        if check.included == 0 {
            self.warnings
                .push(format!("all pages of {} are excluded", check.path.display()));
        }
        self.total_pages += check.page_count;
        self.included_pages += check.included;
        self.total_size_bytes += check.size_bytes;
        self.documents.push(check);
    }

    /// Apply the combination-wide checks. Skipped totals (from documents
    /// that failed to open) are already recorded as errors.
    pub(crate) fn check_limits(&mut self, limits: &OutputLimits) {
        let size_mb = self.total_size_mb();
        if size_mb > limits.max_output_size_mb {
            self.errors.push(format!(
                "combined size {size_mb:.1} MB exceeds the {:.0} MB limit",
                limits.max_output_size_mb
            ));
        } else if size_mb > limits.max_output_size_mb * SIZE_WARNING_RATIO {
            self.warnings.push(format!(
                "combined size {size_mb:.1} MB is close to the {:.0} MB limit",
                limits.max_output_size_mb
            ));
        }
        if self.errors.is_empty() && self.included_pages == 0 {
            self.errors.push("no pages would be sent".into());
        }
        if self.included_pages > limits.large_page_count {
            self.warnings.push(format!(
                "{} pages is a long fax; transmission may take a while",
                self.included_pages
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{AssemblyInput, DocumentAssembler};
    use crate::fixtures;
    use faxkit_core::FaxkitConfig;
    use faxkit_edit::EditSnapshot;

    fn check(pages: usize, included: usize, size_bytes: u64) -> DocumentCheck {
        DocumentCheck {
            path: PathBuf::from("a.pdf"),
            page_count: pages,
            included,
            excluded: pages - included,
            size_bytes,
            edited: false,
        }
    }

    #[test]
    fn size_limits_raise_warnings_then_errors() {
        let limits = OutputLimits {
            max_output_size_mb: 1.0,
            large_page_count: 100,
        };
        let mut near = AssemblyValidation::default();
        near.push(check(1, 1, 900 * 1024));
        near.check_limits(&limits);
        assert!(near.is_valid());
        assert_eq!(near.warnings.len(), 1);

        let mut over = AssemblyValidation::default();
        over.push(check(1, 1, 2 * 1024 * 1024));
        over.check_limits(&limits);
        assert!(!over.is_valid());
    }

    #[test]
    fn fully_excluded_documents_and_long_faxes_warn() {
        let limits = OutputLimits {
            max_output_size_mb: 36.0,
            large_page_count: 3,
        };
        let mut validation = AssemblyValidation::default();
        validation.push(check(2, 0, 10));
        validation.push(check(5, 5, 10));
        validation.check_limits(&limits);
        assert!(validation.is_valid());
        assert_eq!(validation.warnings.len(), 2);
        assert_eq!((validation.total_pages, validation.included_pages), (7, 5));
    }

    #[test]
    fn validates_real_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("present.pdf");
        fixtures::write_multi_page(&present, 2).expect("fixture");
        let inputs = [
            AssemblyInput::new(&present).excluding([1]),
            AssemblyInput::new(dir.path().join("missing.pdf")),
        ];

        let validation =
            DocumentAssembler::from_config(&FaxkitConfig::default()).validate(&inputs, &EditSnapshot::default());
        assert_eq!(validation.documents.len(), 1);
        assert_eq!(validation.documents[0].included, 1);
        assert!(validation.documents[0].size_bytes > 0);
        assert_eq!(validation.errors.len(), 1);
        assert!(validation.errors[0].contains("missing.pdf"));
    }

    #[test]
    fn nothing_selected_is_invalid() {
        let validation = DocumentAssembler::default().validate(&[], &EditSnapshot::default());
        assert!(!validation.is_valid());
    }
}

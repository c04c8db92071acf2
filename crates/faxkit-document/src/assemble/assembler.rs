// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edit-aware document assembly.
//
// Every source is opened before any output is produced, so a missing or
// unreadable document fails the whole run. Documents with marks are burned
// in first; a page that cannot be redacted fails the run as well. Surviving
// pages are copied into one fresh document which is written atomically.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use faxkit_core::config::{FaxkitConfig, OutputLimits};
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::DocumentId;
use faxkit_edit::{EditSnapshot, PageEdits};
use lopdf::{Document, ObjectId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::atomic::write_atomic;
use super::validate::{AssemblyValidation, DocumentCheck};
use crate::pdf::{OutputDocument, PdfReader};
use crate::redact::RedactionApplier;
use crate::retry::RetryConfig;

/// One document to assemble, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyInput {
    pub path: PathBuf,
    /// Key of the document's edits in the snapshot.
    pub document: DocumentId,
    /// When set, replaces the exclusion flags stored with the edits.
    pub excluded_pages: Option<BTreeSet<usize>>,
}

impl AssemblyInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            document: DocumentId::from_path(&path),
            path,
            excluded_pages: None,
        }
    }

    pub fn with_document(mut self, document: DocumentId) -> Self {
        self.document = document;
        self
    }

    pub fn excluding(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.excluded_pages = Some(pages.into_iter().collect());
        self
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// Which pages of a `page_count`-page document are dropped.
    pub(crate) fn exclusions(&self, edits: Option<&[PageEdits]>, page_count: usize) -> Result<Vec<bool>> {
        if let Some(edits) = edits
            && edits.len() != page_count
        {
            return Err(FaxkitError::InvalidEdit(format!(
                "{} has {page_count} pages but edits cover {}",
                self.name(),
                edits.len()
            )));
        }
        if let Some(pages) = &self.excluded_pages {
            if let Some(bad) = pages.iter().find(|p| **p >= page_count) {
                return Err(FaxkitError::PageOutOfRange {
                    page: *bad,
                    page_count,
                });
            }
            return Ok((0..page_count).map(|i| pages.contains(&i)).collect());
        }
        Ok(match edits {
            Some(edits) => edits.iter().map(|p| p.excluded).collect(),
            None => vec![false; page_count],
        })
    }
}

/// Outcome of one assembled document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub document: String,
    pub total_pages: usize,
    pub included_pages: usize,
    /// Whether the edited render was used instead of the source.
    pub edited: bool,
}

/// Outcome of a successful assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub page_count: usize,
    pub bytes_len: usize,
    pub documents: Vec<DocumentReport>,
}

/// A source opened for assembly.
struct Source<'a> {
    input: &'a AssemblyInput,
    reader: PdfReader,
    edits: Option<&'a [PageEdits]>,
    excluded: Vec<bool>,
}

impl Source<'_> {
    fn included(&self) -> usize {
        self.excluded.iter().filter(|e| !**e).count()
    }

    /// True when some included page carries a stroke or annotation.
    fn needs_burn_in(&self) -> bool {
        self.edits.is_some_and(|edits| {
            edits
                .iter()
                .zip(&self.excluded)
                .any(|(page, excluded)| !excluded && page.has_marks())
        })
    }
}

/// Merges sources and their edits into one output document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAssembler {
    applier: RedactionApplier,
    retry: RetryConfig,
    limits: OutputLimits,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::from_config(&FaxkitConfig::default())
    }
}

impl DocumentAssembler {
    pub fn from_config(config: &FaxkitConfig) -> Self {
        Self {
            applier: RedactionApplier::from_config(config),
            retry: RetryConfig::from(&config.lock_retry),
            limits: config.limits,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Assemble `inputs` in order into `dest`.
    ///
    /// On any error `dest` is left exactly as it was.
    #[instrument(skip_all, fields(documents = inputs.len(), dest = %dest.display()))]
    pub fn assemble(
        &self,
        inputs: &[AssemblyInput],
        snapshot: &EditSnapshot,
        dest: &Path,
    ) -> Result<AssemblyReport> {
        if inputs.is_empty() {
            return Err(FaxkitError::InvalidEdit("no documents to assemble".into()).into_assembly(None, None));
        }
        let sources = inputs
            .iter()
            .map(|input| open_source(input, snapshot))
            .collect::<Result<Vec<_>>>()?;

        let mut output = OutputDocument::new();
        let mut documents = Vec::with_capacity(sources.len());
        for source in &sources {
            documents.push(self.append(&mut output, source)?);
        }

        let expected: usize = documents.iter().map(|d| d.included_pages).sum();
        if expected == 0 {
            return Err(FaxkitError::InvalidEdit("every page is excluded".into()).into_assembly(None, None));
        }
        if output.page_count() != expected {
            return Err(FaxkitError::PdfError(format!(
                "output has {} pages, expected {expected}",
                output.page_count()
            ))
            .into_assembly(None, None));
        }

        let bytes = output.into_bytes().map_err(|err| err.into_assembly(None, None))?;
        write_atomic(dest, &bytes, &self.retry).map_err(|err| err.into_assembly(None, None))?;
        info!(pages = expected, bytes_len = bytes.len(), "fax document assembled");
        Ok(AssemblyReport {
            output: dest.to_path_buf(),
            page_count: expected,
            bytes_len: bytes.len(),
            documents,
        })
    }

    /// Write one document with its edits burned in and excluded pages
    /// dropped.
    pub fn save_edited_copy(
        &self,
        input: &AssemblyInput,
        pages: &[PageEdits],
        dest: &Path,
    ) -> Result<AssemblyReport> {
        let snapshot: EditSnapshot = [(input.document.clone(), pages.to_vec())].into_iter().collect();
        self.assemble(std::slice::from_ref(input), &snapshot, dest)
    }

    fn append(&self, output: &mut OutputDocument, source: &Source<'_>) -> Result<DocumentReport> {
        let name = source.input.name();
        let burned;
        let edited = source.needs_burn_in();
        let document: &Document = match source.edits {
            Some(edits) if edited => {
                // Override exclusions must also keep the applier off those pages.
                let effective: Vec<PageEdits> = edits
                    .iter()
                    .zip(&source.excluded)
                    .map(|(page, excluded)| PageEdits {
                        excluded: *excluded,
                        ..page.clone()
                    })
                    .collect();
                let result = self.applier.apply(source.reader.document(), &name, &effective)?;
                for failure in result.failures.iter().skip(1) {
                    warn!(error = %failure, "additional page could not be redacted");
                }
                burned = result.into_result().map_err(|err| {
                    let page = match &err {
                        FaxkitError::RedactionApply { page, .. } => Some(*page),
                        _ => None,
                    };
                    err.into_assembly(Some(name.clone()), page)
                })?;
                &burned
            }
            _ => source.reader.document(),
        };

        let pages: Vec<ObjectId> = document
            .get_pages()
            .into_values()
            .zip(&source.excluded)
            .filter(|(_, excluded)| !**excluded)
            .map(|(id, _)| id)
            .collect();
        output
            .append_pages(document, &pages)
            .map_err(|err| err.into_assembly(Some(name.clone()), None))?;
        debug!(document = %name, pages = pages.len(), edited, "document appended");
        Ok(DocumentReport {
            document: name,
            total_pages: source.excluded.len(),
            included_pages: source.included(),
            edited,
        })
    }

    /// Check a combination before assembling it. Never fails: problems are
    /// reported in the result.
    #[instrument(skip_all, fields(documents = inputs.len()))]
    pub fn validate(&self, inputs: &[AssemblyInput], snapshot: &EditSnapshot) -> AssemblyValidation {
        let mut validation = AssemblyValidation::default();
        if inputs.is_empty() {
            validation.errors.push("no documents selected".into());
            return validation;
        }
        for input in inputs {
            match open_source(input, snapshot) {
                Ok(source) => {
                    let info = source.reader.info();
                    validation.push(DocumentCheck {
                        path: input.path.clone(),
                        page_count: source.excluded.len(),
                        included: source.included(),
                        excluded: source.excluded.len() - source.included(),
                        size_bytes: info.size_bytes,
                        edited: source.needs_burn_in(),
                    });
                }
                Err(err) => validation.errors.push(match err.root() {
                    load @ FaxkitError::DocumentLoad { .. } => load.to_string(),
                    other => format!("{}: {other}", input.path.display()),
                }),
            }
        }
        validation.check_limits(&self.limits);
        debug!(
            errors = validation.errors.len(),
            warnings = validation.warnings.len(),
            "combination validated"
        );
        validation
    }
}

fn open_source<'a>(input: &'a AssemblyInput, snapshot: &'a EditSnapshot) -> Result<Source<'a>> {
    let located = |err: FaxkitError| err.into_assembly(Some(input.name()), None);
    let reader = PdfReader::open(&input.path).map_err(located)?;
    let edits = snapshot.get(&input.document);
    let excluded = input.exclusions(edits, reader.page_count()).map_err(located)?;
    Ok(Source {
        input,
        reader,
        edits,
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use faxkit_core::DocRect;
    use faxkit_edit::{EditStore, Stroke};
    use std::time::Duration;

    const HEADING: DocRect = DocRect { x0: 60.0, y0: 710.0, x1: 200.0, y1: 740.0 };

    fn assembler() -> DocumentAssembler {
        DocumentAssembler::default().with_retry(RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        })
    }

    fn sources(dir: &Path, counts: &[usize]) -> Vec<AssemblyInput> {
        counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let path = dir.join(format!("source-{i}.pdf"));
                fixtures::write_multi_page(&path, *count).expect("fixture");
                AssemblyInput::new(path)
            })
            .collect()
    }

    fn headings(path: &Path) -> Vec<String> {
        let reader = PdfReader::open(path).expect("open output");
        (0..reader.page_count())
            .map(|page| reader.text_in_region(page, &HEADING).expect("text"))
            .collect()
    }

    #[test]
    fn excluded_pages_are_dropped_across_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inputs = sources(dir.path(), &[3, 2, 1]);
        let mut store = EditStore::new(50);
        store.open_document(inputs[0].document.clone(), 3).expect("open");
        store.page_mut(&inputs[0].document, 1).expect("page").set_excluded(true);

        let dest = dir.path().join("fax.pdf");
        let report = assembler().assemble(&inputs, &store.snapshot(), &dest).expect("assemble");

        assert_eq!(report.page_count, 5);
        assert_eq!(
            headings(&dest),
            ["Page1", "Page3", "Page1", "Page2", "Page1"]
        );
        // Exclusion alone does not need a burn-in.
        assert!(!report.documents[0].edited);
        assert_eq!(report.documents[0].included_pages, 2);
    }

    #[test]
    fn exclusion_override_replaces_stored_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inputs = sources(dir.path(), &[3]);
        let mut store = EditStore::new(50);
        store.open_document(inputs[0].document.clone(), 3).expect("open");
        store.page_mut(&inputs[0].document, 1).expect("page").set_excluded(true);
        inputs[0] = inputs[0].clone().excluding([0, 2]);

        let dest = dir.path().join("fax.pdf");
        assembler().assemble(&inputs, &store.snapshot(), &dest).expect("assemble");
        assert_eq!(headings(&dest), ["Page2"]);

        inputs[0] = inputs[0].clone().excluding([7]);
        let err = assembler().assemble(&inputs, &store.snapshot(), &dest).expect_err("range");
        assert!(matches!(err.root(), FaxkitError::PageOutOfRange { page: 7, .. }));
    }

    #[test]
    fn missing_source_leaves_destination_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inputs = sources(dir.path(), &[1, 1, 1]);
        std::fs::remove_file(&inputs[1].path).expect("remove");

        let fresh = dir.path().join("fresh.pdf");
        let err = assembler()
            .assemble(&inputs, &EditSnapshot::default(), &fresh)
            .expect_err("missing");
        assert!(!fresh.exists());
        match &err {
            FaxkitError::Assembly { document, .. } => {
                assert!(document.as_deref().is_some_and(|d| d.ends_with("source-1.pdf")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root(), FaxkitError::DocumentLoad { .. }));

        let existing = dir.path().join("existing.pdf");
        std::fs::write(&existing, b"last week's fax").expect("seed");
        assembler()
            .assemble(&inputs, &EditSnapshot::default(), &existing)
            .expect_err("missing");
        assert_eq!(std::fs::read(&existing).expect("read"), b"last week's fax");
    }

    #[test]
    fn redactions_are_burned_into_the_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("statement.pdf");
        let mut doc = fixtures::text_page(&[(100.0, 703.0, "ACCOUNT 1234"), (100.0, 500.0, "Balance")])
            .expect("fixture");
        fixtures::write(&mut doc, &path).expect("write");
        let input = AssemblyInput::new(&path);

        let region = DocRect { x0: 100.0, y0: 700.0, x1: 250.0, y1: 715.0 };
        let mut store = EditStore::new(50);
        store.open_document(input.document.clone(), 1).expect("open");
        store
            .page_mut(&input.document, 0)
            .expect("page")
            .add_stroke(Stroke::redact_rect(region))
            .expect("stroke");

        let dest = dir.path().join("fax.pdf");
        let report = assembler()
            .assemble(std::slice::from_ref(&input), &store.snapshot(), &dest)
            .expect("assemble");
        assert!(report.documents[0].edited);

        let output = PdfReader::open(&dest).expect("open");
        assert_eq!(output.page_count(), 1);
        assert_eq!(output.text_in_region(0, &region).expect("text"), "");
        let rest = DocRect { x0: 90.0, y0: 490.0, x1: 200.0, y1: 520.0 };
        assert_eq!(output.text_in_region(0, &rest).expect("text"), "Balance");
        // The source itself is never modified.
        let source = PdfReader::open(&path).expect("open");
        assert_eq!(source.text_in_region(0, &region).expect("text"), "ACCOUNT1234");

        // A separate extractor agrees.
        let text = pdf_extract::extract_text(&dest).expect("extract text");
        assert!(!text.contains("ACCOUNT") && !text.contains("1234"), "{text:?}");
        assert!(text.contains("Balance"), "{text:?}");
    }

    #[test]
    fn failed_redaction_blocks_the_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scan.pdf");
        let mut doc = fixtures::multi_page(2).expect("fixture");
        let first = doc.get_pages().into_values().next().expect("page");
        let contents = doc.get_page_contents(first);
        if let Ok(lopdf::Object::Stream(stream)) = doc.get_object_mut(contents[0]) {
            stream.dict.set("Filter", "JBIG2Decode");
        }
        fixtures::write(&mut doc, &path).expect("write");
        let input = AssemblyInput::new(&path);

        let pages = vec![
            PageEdits {
                strokes: vec![Stroke::redact_rect(HEADING)],
                ..PageEdits::default()
            },
            PageEdits::default(),
        ];
        let dest = dir.path().join("fax.pdf");
        let err = assembler().save_edited_copy(&input, &pages, &dest).expect_err("unsafe page");
        assert!(!dest.exists());
        assert!(matches!(
            err,
            FaxkitError::Assembly { page: Some(0), .. }
        ));
        assert!(matches!(err.root(), FaxkitError::RedactionApply { page: 0, .. }));
    }

    #[test]
    fn excluding_every_page_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inputs: Vec<AssemblyInput> = sources(dir.path(), &[2])
            .into_iter()
            .map(|input| input.excluding([0, 1]))
            .collect();
        let dest = dir.path().join("fax.pdf");
        assert!(assembler().assemble(&inputs, &EditSnapshot::default(), &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn saved_copy_honours_exclusions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = sources(dir.path(), &[3]).remove(0);
        let mut pages = vec![PageEdits::default(); 3];
        pages[0].excluded = true;

        let dest = dir.path().join("copy.pdf");
        let report = assembler().save_edited_copy(&input, &pages, &dest).expect("save");
        assert_eq!(report.page_count, 2);
        assert_eq!(headings(&dest), ["Page2", "Page3"]);
        let text = pdf_extract::extract_text(&dest).expect("extract text");
        assert!(!text.contains("Page 1"), "{text:?}");
        assert!(text.contains("Page 2") && text.contains("Page 3"), "{text:?}");
    }
}

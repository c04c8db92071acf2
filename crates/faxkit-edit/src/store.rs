// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session-scoped map from document to per-page edit state.
//
// The store is owned and mutated by the editing session only. Assembly and
// preview workers receive an `EditSnapshot`: an immutable, shareable copy of
// the committed edits.

use std::collections::HashMap;
use std::sync::Arc;

use faxkit_core::DocumentId;
use faxkit_core::error::{FaxkitError, Result};
use tracing::{debug, info};

use crate::schema::{EditFile, PageEdits};
use crate::state::EditState;

/// Included/excluded page counts for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionSummary {
    pub total: usize,
    pub included: usize,
    pub excluded: usize,
}

impl ExclusionSummary {
    pub fn from_pages<'a>(pages: impl IntoIterator<Item = &'a PageEdits>) -> Self {
        let mut summary = Self {
            total: 0,
            included: 0,
            excluded: 0,
        };
        for page in pages {
            summary.total += 1;
            if page.excluded {
                summary.excluded += 1;
            } else {
                summary.included += 1;
            }
        }
        summary
    }
}

/// Editing state for every document opened in this session.
#[derive(Debug)]
pub struct EditStore {
    documents: HashMap<DocumentId, Vec<EditState>>,
    history_limit: usize,
}

impl EditStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            documents: HashMap::new(),
            history_limit,
        }
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Register a document for editing. Returns false when it was already
    /// registered, in which case its edits are kept as they are.
    pub fn open_document(&mut self, id: DocumentId, page_count: usize) -> Result<bool> {
        if let Some(pages) = self.documents.get(&id) {
            if pages.len() != page_count {
                return Err(FaxkitError::InvalidEdit(format!(
                    "document {id} was opened with {} pages, now reports {page_count}",
                    pages.len()
                )));
            }
            return Ok(false);
        }
        info!(document = %id, pages = page_count, "document opened for editing");
        let pages = (0..page_count)
            .map(|_| EditState::new(self.history_limit))
            .collect();
        self.documents.insert(id, pages);
        Ok(true)
    }

    /// End the editing session for a document, discarding its edits.
    pub fn release(&mut self, id: &DocumentId) -> Option<Vec<EditState>> {
        let released = self.documents.remove(id);
        if released.is_some() {
            info!(document = %id, "document released");
        }
        released
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }

    // -- Access ---------------------------------------------------------------

    pub fn pages(&self, id: &DocumentId) -> Result<&[EditState]> {
        self.documents
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| not_open(id))
    }

    pub fn page_count(&self, id: &DocumentId) -> Result<usize> {
        Ok(self.pages(id)?.len())
    }

    pub fn page(&self, id: &DocumentId, page: usize) -> Result<&EditState> {
        let pages = self.pages(id)?;
        pages.get(page).ok_or(FaxkitError::PageOutOfRange {
            page,
            page_count: pages.len(),
        })
    }

    pub fn page_mut(&mut self, id: &DocumentId, page: usize) -> Result<&mut EditState> {
        let pages = self.documents.get_mut(id).ok_or_else(|| not_open(id))?;
        let page_count = pages.len();
        pages
            .get_mut(page)
            .ok_or(FaxkitError::PageOutOfRange { page, page_count })
    }

    /// Whether any page of the document has strokes, annotations or exclusion.
    pub fn has_edits(&self, id: &DocumentId) -> bool {
        self.documents
            .get(id)
            .is_some_and(|pages| pages.iter().any(|p| !p.edits().is_trivial()))
    }

    pub fn exclusion_summary(&self, id: &DocumentId) -> Result<ExclusionSummary> {
        let pages = self.pages(id)?;
        let summary = ExclusionSummary::from_pages(pages.iter().map(EditState::edits));
        debug_assert_eq!(summary.included + summary.excluded, summary.total);
        Ok(summary)
    }

    // -- Hand-off -------------------------------------------------------------

    /// Immutable copy of all committed edits, safe to send to a worker.
    pub fn snapshot(&self) -> EditSnapshot {
        let documents = self
            .documents
            .iter()
            .map(|(id, pages)| {
                (
                    id.clone(),
                    pages.iter().map(|p| p.edits().clone()).collect(),
                )
            })
            .collect();
        EditSnapshot {
            documents: Arc::new(documents),
        }
    }

    // -- Persistence ----------------------------------------------------------

    pub fn export(&self, id: &DocumentId) -> Result<EditFile> {
        let pages = self.pages(id)?;
        Ok(EditFile::from_pages(id.clone(), pages.iter().map(EditState::edits)))
    }

    /// Load saved edits into an open document. Each affected page gets one
    /// undoable step. Nothing is applied if the file is invalid.
    pub fn import(&mut self, id: &DocumentId, file: &EditFile) -> Result<()> {
        let page_count = self.page_count(id)?;
        file.validate(page_count)?;
        for record in &file.pages {
            self.page_mut(id, record.page_index)?
                .replace(record.edits.clone())?;
        }
        debug!(document = %id, pages = file.pages.len(), "edits imported");
        Ok(())
    }
}

fn not_open(id: &DocumentId) -> FaxkitError {
    FaxkitError::InvalidEdit(format!("document {id} is not open for editing"))
}

/// Read-only view of committed edits, shared cheaply across threads.
#[derive(Debug, Clone, Default)]
pub struct EditSnapshot {
    documents: Arc<HashMap<DocumentId, Vec<PageEdits>>>,
}

impl EditSnapshot {
    pub fn get(&self, id: &DocumentId) -> Option<&[PageEdits]> {
        self.documents.get(id).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

impl FromIterator<(DocumentId, Vec<PageEdits>)> for EditSnapshot {
    fn from_iter<I: IntoIterator<Item = (DocumentId, Vec<PageEdits>)>>(iter: I) -> Self {
        Self {
            documents: Arc::new(iter.into_iter().collect()),
        }
    }
}

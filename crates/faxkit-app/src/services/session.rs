// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editing session: the single owner of open documents, their edits and the
// view state.
//
// All pointer input and undo/redo run here on the caller's task. Work that
// leaves the session (rendering, assembly) gets an owned job or an
// `EditSnapshot`, never a reference into the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DisplayPoint, DocumentId, FaxkitConfig, Rgba};
use faxkit_document::render::to_png_bytes;
use faxkit_document::{
    AssemblyInput, DocumentLease, PageRasterizer, PdfReader, PreviewStyle, RenderedPage,
    ZoomController, paint_edits,
};
use faxkit_edit::{
    Annotation, CoordinateMapper, EditFile, EditSnapshot, EditState, EditStore, ExclusionSummary,
    PageEdits, Stroke, StrokeKind,
};
use tracing::{debug, info, instrument};

/// Brush used for new strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tool {
    pub kind: StrokeKind,
    pub width: f64,
    pub color: Rgba,
}

impl Tool {
    pub fn redact(width: f64) -> Self {
        Self {
            kind: StrokeKind::Redact,
            width,
            color: Rgba::BLACK,
        }
    }

    pub fn highlight(width: f64) -> Self {
        Self {
            kind: StrokeKind::Highlight,
            width,
            color: Rgba::YELLOW,
        }
    }
}

struct OpenDocument {
    path: PathBuf,
    reader: Arc<PdfReader>,
    /// Page shown when this document is active.
    page: usize,
    _lease: DocumentLease,
}

/// Everything needed to render one view off the session task.
pub struct RenderJob {
    rasterizer: Arc<dyn PageRasterizer>,
    reader: Arc<PdfReader>,
    page: usize,
    zoom: f64,
    mapper: CoordinateMapper,
    edits: PageEdits,
    in_progress: Option<Stroke>,
    style: PreviewStyle,
}

impl RenderJob {
    /// Rasterize the page and paint the edits over it.
    pub fn run(self) -> Result<RenderedPage> {
        let mut image = self.rasterizer.render(&self.reader, self.page, self.zoom)?;
        let display = self.mapper.display_size();
        if image.dimensions() != (display.width, display.height) {
            return Err(FaxkitError::ImageError(format!(
                "rendered {}x{} for a {}x{} view",
                image.width(),
                image.height(),
                display.width,
                display.height
            )));
        }
        paint_edits(&mut image, &self.edits, self.in_progress.as_ref(), &self.mapper, &self.style)?;
        Ok(RenderedPage {
            page: self.page,
            zoom: self.zoom,
            image,
            mapper: self.mapper,
        })
    }

    /// [`run`](Self::run) and encode as PNG.
    pub fn run_png(self) -> Result<Vec<u8>> {
        to_png_bytes(&self.run()?.image)
    }
}

pub struct EditingSession {
    config: FaxkitConfig,
    store: EditStore,
    documents: HashMap<DocumentId, OpenDocument>,
    /// Open order, for listing and assembly.
    order: Vec<DocumentId>,
    active: Option<DocumentId>,
    view: ZoomController,
    tool: Tool,
}

impl EditingSession {
    pub fn new(config: FaxkitConfig, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let view = ZoomController::new(rasterizer, &config);
        Self {
            store: EditStore::new(config.history_limit),
            tool: Tool::redact(config.default_brush_width),
            documents: HashMap::new(),
            order: Vec::new(),
            active: None,
            view,
            config,
        }
    }

    // -- Documents ------------------------------------------------------------

    /// Open `path` for editing and make it the active document.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<DocumentId> {
        let path = path.as_ref();
        let lease = DocumentLease::acquire(path)?;
        let reader = Arc::new(PdfReader::open(path)?);
        let id = DocumentId::from_path(path);
        self.store.open_document(id.clone(), reader.page_count())?;
        self.documents.insert(
            id.clone(),
            OpenDocument {
                path: path.to_path_buf(),
                reader,
                page: 0,
                _lease: lease,
            },
        );
        self.order.push(id.clone());
        self.activate(&id)?;
        info!(document = %id, "document opened for editing");
        Ok(id)
    }

    /// Switch the view to another open document. Its edits and page are kept.
    pub fn activate(&mut self, id: &DocumentId) -> Result<()> {
        let open = self.documents.get(id).ok_or_else(|| not_open(id))?;
        self.view.set_page(&open.reader, open.page)?;
        self.active = Some(id.clone());
        Ok(())
    }

    /// End editing of `id`: its edits are discarded and its lease released.
    pub fn close(&mut self, id: &DocumentId) -> Result<()> {
        self.documents.remove(id).ok_or_else(|| not_open(id))?;
        self.store.release(id);
        self.order.retain(|d| d != id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
            if let Some(next) = self.order.first().cloned() {
                self.activate(&next)?;
            }
        }
        info!(document = %id, "editing session closed");
        Ok(())
    }

    pub fn documents(&self) -> &[DocumentId] {
        &self.order
    }

    pub fn active(&self) -> Option<&DocumentId> {
        self.active.as_ref()
    }

    fn active_document(&self) -> Result<(&DocumentId, &OpenDocument)> {
        let id = self.active.as_ref().ok_or(FaxkitError::ViewNotReady)?;
        let open = self.documents.get(id).ok_or_else(|| not_open(id))?;
        Ok((id, open))
    }

    pub fn page(&self) -> usize {
        self.view.page()
    }

    pub fn go_to_page(&mut self, page: usize) -> Result<()> {
        let id = self.active.clone().ok_or(FaxkitError::ViewNotReady)?;
        let open = self.documents.get_mut(&id).ok_or_else(|| not_open(&id))?;
        self.view.set_page(&open.reader, page)?;
        open.page = page;
        Ok(())
    }

    // -- View -----------------------------------------------------------------

    pub fn zoom(&self) -> f64 {
        self.view.zoom()
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.view.set_zoom(zoom)
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.view.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.view.zoom_out()
    }

    pub fn fit_width(&mut self, viewport_px: u32) -> Result<f64> {
        self.view.fit_width(viewport_px)
    }

    pub fn resize(&mut self, viewport_px: u32) -> f64 {
        self.view.resize(viewport_px)
    }

    pub fn mapper(&self) -> CoordinateMapper {
        self.view.mapper()
    }

    /// A job rendering the current view with its edits.
    pub fn render_job(&self) -> Result<RenderJob> {
        let (id, open) = self.active_document()?;
        let state = self.store.page(id, open.page)?;
        Ok(RenderJob {
            rasterizer: self.view.rasterizer(),
            reader: Arc::clone(&open.reader),
            page: open.page,
            zoom: self.view.zoom(),
            mapper: self.view.mapper(),
            edits: state.edits().clone(),
            in_progress: state.stroke_in_progress().cloned(),
            style: PreviewStyle {
                highlight_opacity: self.config.highlight_opacity,
                ..PreviewStyle::default()
            },
        })
    }

    // -- Editing --------------------------------------------------------------

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    fn current_page_mut(&mut self) -> Result<&mut EditState> {
        let id = self.active.clone().ok_or(FaxkitError::ViewNotReady)?;
        let page = self.view.page();
        self.store.page_mut(&id, page)
    }

    pub fn pointer_down(&mut self, at: DisplayPoint) -> Result<()> {
        let mapper = self.view.mapper();
        let Tool { kind, width, color } = self.tool;
        self.current_page_mut()?.pointer_down(at, &mapper, kind, width, color)
    }

    pub fn pointer_move(&mut self, at: DisplayPoint) -> Result<bool> {
        let mapper = self.view.mapper();
        self.current_page_mut()?.pointer_move(at, &mapper)
    }

    pub fn pointer_up(&mut self, at: DisplayPoint) -> Result<bool> {
        let mapper = self.view.mapper();
        let committed = self.current_page_mut()?.pointer_up(at, &mapper)?;
        if committed {
            debug!(page = self.view.page(), "stroke committed");
        }
        Ok(committed)
    }

    /// Commit a stroke built outside pointer input, e.g. a typed region.
    pub fn add_stroke(&mut self, stroke: Stroke) -> Result<()> {
        self.current_page_mut()?.add_stroke(stroke)
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.current_page_mut()?.add_annotation(annotation)
    }

    /// Toggle exclusion of the current page. Returns the new flag.
    pub fn toggle_excluded(&mut self) -> Result<bool> {
        Ok(self.current_page_mut()?.toggle_excluded())
    }

    pub fn clear_page(&mut self) -> Result<()> {
        self.current_page_mut()?.clear();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool> {
        Ok(self.current_page_mut()?.undo())
    }

    pub fn redo(&mut self) -> Result<bool> {
        Ok(self.current_page_mut()?.redo())
    }

    pub fn page_edits(&self) -> Result<&PageEdits> {
        let (id, open) = self.active_document()?;
        Ok(self.store.page(id, open.page)?.edits())
    }

    pub fn exclusion_summary(&self, id: &DocumentId) -> Result<ExclusionSummary> {
        self.store.exclusion_summary(id)
    }

    // -- Persistence and hand-off ---------------------------------------------

    pub fn save_edits(&self, id: &DocumentId, path: impl AsRef<Path>) -> Result<()> {
        self.store.export(id)?.save(path)
    }

    pub fn load_edits(&mut self, id: &DocumentId, path: impl AsRef<Path>) -> Result<()> {
        let page_count = self.store.page_count(id)?;
        let file = EditFile::load(path, page_count)?;
        self.store.import(id, &file)
    }

    /// Read-only copy of every open document's edits, for the worker.
    pub fn snapshot(&self) -> EditSnapshot {
        self.store.snapshot()
    }

    /// Open documents in open order, as assembly inputs.
    pub fn assembly_inputs(&self) -> Vec<AssemblyInput> {
        self.order
            .iter()
            .filter_map(|id| {
                self.documents
                    .get(id)
                    .map(|open| AssemblyInput::new(&open.path).with_document(id.clone()))
            })
            .collect()
    }
}

fn not_open(id: &DocumentId) -> FaxkitError {
    FaxkitError::InvalidEdit(format!("document {id} is not open"))
}

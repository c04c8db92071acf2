// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted editing: a JSON list of the actions a person would perform in the
// editing view (navigate, zoom, pick a tool, draw, annotate, exclude, undo),
// replayed against an `EditingSession`.
//
// Pointer positions are display pixels at the zoom in effect when the action
// runs, exactly as they would arrive from a front end.

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DisplayPoint, DocumentId};
use faxkit_edit::{Annotation, StrokeKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::{EditingSession, Tool};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    Page { page: usize },
    Zoom { factor: f64 },
    ZoomIn,
    ZoomOut,
    FitWidth { viewport_px: u32 },
    Resize { viewport_px: u32 },
    /// Switch tool. Without a width the current brush width is kept.
    Tool {
        kind: StrokeKind,
        #[serde(default)]
        width: Option<f64>,
    },
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Annotate { annotation: Annotation },
    Exclude,
    Clear,
    Undo,
    Redo,
}

/// Where the session ended up after a script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptSummary {
    pub document: DocumentId,
    pub page: usize,
    pub zoom: f64,
    pub view_width_px: u32,
    pub view_height_px: u32,
    /// Marks on the page left in view.
    pub strokes: usize,
    pub annotations: usize,
    pub included_pages: usize,
    pub excluded_pages: usize,
}

pub fn parse(json: &str) -> Result<Vec<EditAction>> {
    Ok(serde_json::from_str(json)?)
}

/// Replay `actions` on the active document.
pub fn run(session: &mut EditingSession, actions: &[EditAction]) -> Result<ScriptSummary> {
    for (step, action) in actions.iter().enumerate() {
        apply(session, action).map_err(|err| match err {
            FaxkitError::InvalidEdit(detail) => {
                FaxkitError::InvalidEdit(format!("script step {}: {detail}", step + 1))
            }
            other => other,
        })?;
    }
    summarize(session)
}

fn apply(session: &mut EditingSession, action: &EditAction) -> Result<()> {
    debug!(?action, "edit action");
    match action {
        EditAction::Page { page } => session.go_to_page(*page)?,
        EditAction::Zoom { factor } => {
            session.set_zoom(*factor);
        }
        EditAction::ZoomIn => {
            session.zoom_in();
        }
        EditAction::ZoomOut => {
            session.zoom_out();
        }
        EditAction::FitWidth { viewport_px } => {
            session.fit_width(*viewport_px)?;
        }
        EditAction::Resize { viewport_px } => {
            session.resize(*viewport_px);
        }
        EditAction::Tool { kind, width } => {
            let width = width.unwrap_or(session.tool().width);
            session.set_tool(match kind {
                StrokeKind::Redact => Tool::redact(width),
                StrokeKind::Highlight => Tool::highlight(width),
            });
        }
        EditAction::Down { x, y } => session.pointer_down(DisplayPoint::new(*x, *y))?,
        EditAction::Move { x, y } => {
            session.pointer_move(DisplayPoint::new(*x, *y))?;
        }
        EditAction::Up { x, y } => {
            session.pointer_up(DisplayPoint::new(*x, *y))?;
        }
        EditAction::Annotate { annotation } => session.add_annotation(annotation.clone())?,
        EditAction::Exclude => {
            session.toggle_excluded()?;
        }
        EditAction::Clear => session.clear_page()?,
        EditAction::Undo => {
            session.undo()?;
        }
        EditAction::Redo => {
            session.redo()?;
        }
    }
    Ok(())
}

fn summarize(session: &EditingSession) -> Result<ScriptSummary> {
    let document = session.active().cloned().ok_or(FaxkitError::ViewNotReady)?;
    let edits = session.page_edits()?;
    let exclusions = session.exclusion_summary(&document)?;
    let view = session.mapper().display_size();
    Ok(ScriptSummary {
        page: session.page(),
        zoom: session.zoom(),
        view_width_px: view.width,
        view_height_px: view.height,
        strokes: edits.strokes.len(),
        annotations: edits.annotations.len(),
        included_pages: exclusions.included,
        excluded_pages: exclusions.excluded,
        document,
    })
}

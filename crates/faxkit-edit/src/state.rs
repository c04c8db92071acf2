// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page edit state machine.
//
// Idle --pointer down--> Drawing --pointer up--> Idle (stroke committed).
// The pre-edit snapshot is taken on pointer down, so one stroke is one undo
// step no matter how many points it has.

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DisplayPoint, DocPoint, Rgba};
use tracing::{debug, trace};

use crate::history::History;
use crate::mapper::CoordinateMapper;
use crate::schema::{Annotation, PageEdits, Stroke, StrokeKind};

/// Whether a stroke is being captured.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PointerMode {
    #[default]
    Idle,
    Drawing(Stroke),
}

/// Mutable edit record for one page.
#[derive(Debug, Clone)]
pub struct EditState {
    edits: PageEdits,
    history: History<PageEdits>,
    mode: PointerMode,
}

impl EditState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            edits: PageEdits::default(),
            history: History::new(history_limit),
            mode: PointerMode::Idle,
        }
    }

    // -- Reading --------------------------------------------------------------

    /// Committed edits (excludes any stroke still being drawn).
    pub fn edits(&self) -> &PageEdits {
        &self.edits
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.edits.strokes
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.edits.annotations
    }

    pub fn is_excluded(&self) -> bool {
        self.edits.excluded
    }

    pub fn mode(&self) -> &PointerMode {
        &self.mode
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, PointerMode::Drawing(_))
    }

    /// The stroke under the pointer, for live preview.
    pub fn stroke_in_progress(&self) -> Option<&Stroke> {
        match &self.mode {
            PointerMode::Drawing(stroke) => Some(stroke),
            PointerMode::Idle => None,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History<PageEdits> {
        &self.history
    }

    // -- Strokes --------------------------------------------------------------

    /// Start a stroke at a document-space point.
    pub fn begin_stroke(
        &mut self,
        kind: StrokeKind,
        at: DocPoint,
        width: f64,
        color: Rgba,
    ) -> Result<()> {
        if self.is_drawing() {
            return Err(FaxkitError::InvalidEdit("a stroke is already in progress".into()));
        }
        let mut stroke = Stroke::new(kind, width, color);
        stroke.push(at);
        stroke.validate()?;

        self.history.commit(self.edits.clone());
        self.mode = PointerMode::Drawing(stroke);
        trace!(?kind, x = at.x, y = at.y, "stroke started");
        Ok(())
    }

    /// Extend the current stroke. Returns false when no stroke is active.
    pub fn extend_stroke(&mut self, to: DocPoint) -> Result<bool> {
        if !to.is_finite() {
            return Err(FaxkitError::InvalidEdit(format!("point is not finite: {to:?}")));
        }
        match &mut self.mode {
            PointerMode::Drawing(stroke) => {
                stroke.push(to);
                Ok(true)
            }
            PointerMode::Idle => Ok(false),
        }
    }

    /// Commit the current stroke. Returns false when no stroke is active.
    pub fn end_stroke(&mut self) -> bool {
        match std::mem::take(&mut self.mode) {
            PointerMode::Drawing(stroke) => {
                debug!(kind = ?stroke.kind, points = stroke.points.len(), "stroke committed");
                self.edits.strokes.push(stroke);
                true
            }
            PointerMode::Idle => false,
        }
    }

    /// Abandon the current stroke and its snapshot.
    pub fn cancel_stroke(&mut self) -> bool {
        match std::mem::take(&mut self.mode) {
            PointerMode::Drawing(_) => {
                self.history.retract();
                true
            }
            PointerMode::Idle => false,
        }
    }

    // -- Pointer input (display space) ----------------------------------------

    pub fn pointer_down(
        &mut self,
        at: DisplayPoint,
        mapper: &CoordinateMapper,
        kind: StrokeKind,
        width: f64,
        color: Rgba,
    ) -> Result<()> {
        let point = mapper.to_document(at)?;
        self.begin_stroke(kind, point, width, color)
    }

    pub fn pointer_move(&mut self, at: DisplayPoint, mapper: &CoordinateMapper) -> Result<bool> {
        if !self.is_drawing() {
            return Ok(false);
        }
        let point = mapper.to_document(at)?;
        self.extend_stroke(point)
    }

    pub fn pointer_up(&mut self, at: DisplayPoint, mapper: &CoordinateMapper) -> Result<bool> {
        if !self.is_drawing() {
            return Ok(false);
        }
        let point = mapper.to_document(at)?;
        self.extend_stroke(point)?;
        Ok(self.end_stroke())
    }

    // -- Other committed edits ------------------------------------------------

    pub fn add_stroke(&mut self, stroke: Stroke) -> Result<()> {
        stroke.validate()?;
        self.commit(|edits| edits.strokes.push(stroke));
        Ok(())
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        annotation.validate()?;
        self.commit(|edits| edits.annotations.push(annotation));
        Ok(())
    }

    pub fn remove_annotation(&mut self, index: usize) -> Result<Annotation> {
        if index >= self.edits.annotations.len() {
            return Err(FaxkitError::InvalidEdit(format!("no annotation at index {index}")));
        }
        let mut removed = None;
        self.commit(|edits| removed = Some(edits.annotations.remove(index)));
        removed.ok_or_else(|| FaxkitError::InvalidEdit(format!("no annotation at index {index}")))
    }

    /// Set the exclusion flag. A no-op (and no undo step) when unchanged.
    pub fn set_excluded(&mut self, excluded: bool) {
        if self.edits.excluded != excluded {
            self.commit(|edits| edits.excluded = excluded);
        }
    }

    pub fn toggle_excluded(&mut self) -> bool {
        let next = !self.edits.excluded;
        self.set_excluded(next);
        next
    }

    /// Remove all strokes and annotations. The exclusion flag is kept.
    /// Always one undo step, even on a page with nothing to remove.
    pub fn clear(&mut self) {
        self.commit(|edits| {
            edits.strokes.clear();
            edits.annotations.clear();
        });
    }

    /// Replace everything on the page in one undoable step.
    pub fn replace(&mut self, edits: PageEdits) -> Result<()> {
        edits.validate()?;
        self.commit(|current| *current = edits);
        Ok(())
    }

    // -- History --------------------------------------------------------------

    /// Undo the last committed edit. While drawing, cancels the stroke instead.
    pub fn undo(&mut self) -> bool {
        if self.is_drawing() {
            return self.cancel_stroke();
        }
        self.history.undo(&mut self.edits)
    }

    pub fn redo(&mut self) -> bool {
        if self.is_drawing() {
            return false;
        }
        self.history.redo(&mut self.edits)
    }

    fn commit(&mut self, apply: impl FnOnce(&mut PageEdits)) {
        self.cancel_stroke();
        self.history.commit(self.edits.clone());
        apply(&mut self.edits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faxkit_core::{DisplaySize, DocSize};

    fn page() -> EditState {
        EditState::new(50)
    }

    fn draw(state: &mut EditState, x: f64) {
        state
            .begin_stroke(StrokeKind::Redact, DocPoint::new(x, 100.0), 10.0, Rgba::BLACK)
            .expect("begin");
        state.extend_stroke(DocPoint::new(x + 50.0, 100.0)).expect("extend");
        assert!(state.end_stroke());
    }

    #[test]
    fn stroke_lifecycle_is_one_undo_step() {
        let mut state = page();
        draw(&mut state, 10.0);
        assert_eq!(state.strokes().len(), 1);
        assert_eq!(state.strokes()[0].points.len(), 2);

        assert!(state.undo());
        assert!(state.strokes().is_empty());
        assert!(!state.can_undo());
    }

    #[test]
    fn second_edit_after_undo_discards_redo() {
        let mut state = page();
        draw(&mut state, 10.0);
        draw(&mut state, 20.0);
        assert!(state.undo());

        state
            .add_annotation(Annotation::text(DocPoint::new(50.0, 50.0), "third", 12.0))
            .expect("annotate");

        assert!(!state.can_redo());
        assert!(!state.redo());
        assert_eq!(state.strokes().len(), 1);
        assert_eq!(state.strokes()[0].points[0].x, 10.0);
        assert_eq!(state.annotations().len(), 1);
    }

    #[test]
    fn undo_redo_symmetry_over_mixed_edits() {
        let mut state = page();
        draw(&mut state, 10.0);
        state.toggle_excluded();
        state
            .add_annotation(Annotation::rect(DocPoint::new(5.0, 5.0), 20.0, 10.0))
            .expect("annotate");
        draw(&mut state, 30.0);
        state.toggle_excluded();
        state.clear();
        let after = state.edits().clone();

        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, 6);
        assert_eq!(state.edits(), &PageEdits::default());

        for _ in 0..undone {
            assert!(state.redo());
        }
        assert_eq!(state.edits(), &after);
    }

    #[test]
    fn clearing_is_an_undo_step_even_when_empty() {
        let mut state = page();
        assert!(!state.can_undo());
        state.clear();
        assert!(state.can_undo());
        assert!(state.undo());
        assert_eq!(state.edits(), &PageEdits::default());

        draw(&mut state, 10.0);
        state.toggle_excluded();
        state.clear();
        assert!(state.strokes().is_empty());
        assert!(state.edits().excluded);
        assert!(state.undo());
        assert_eq!(state.strokes().len(), 1);
    }

    #[test]
    fn undo_while_drawing_cancels_stroke() {
        let mut state = page();
        draw(&mut state, 10.0);
        state
            .begin_stroke(StrokeKind::Highlight, DocPoint::new(1.0, 1.0), 8.0, Rgba::YELLOW)
            .expect("begin");
        assert!(state.is_drawing());

        assert!(state.undo());
        assert!(!state.is_drawing());
        assert_eq!(state.strokes().len(), 1);
        // The committed stroke is still undoable.
        assert!(state.can_undo());
    }

    #[test]
    fn exclusion_toggle_is_undoable() {
        let mut state = page();
        state.set_excluded(true);
        state.set_excluded(true);
        assert!(state.is_excluded());
        assert_eq!(state.history().len(), 1);
        assert!(state.undo());
        assert!(!state.is_excluded());
    }

    #[test]
    fn pointer_input_is_stored_in_document_space() {
        let mut state = page();
        let at_100 = CoordinateMapper::new(DisplaySize::new(612, 792), DocSize::LETTER);
        let at_200 = CoordinateMapper::new(DisplaySize::new(1224, 1584), DocSize::LETTER);

        state
            .pointer_down(DisplayPoint::new(100.0, 92.0), &at_100, StrokeKind::Redact, 10.0, Rgba::BLACK)
            .expect("down");
        // Zoom changed mid-stroke: the next sample is in the new display space.
        state.pointer_move(DisplayPoint::new(400.0, 184.0), &at_200).expect("move");
        assert!(state.pointer_up(DisplayPoint::new(400.0, 184.0), &at_200).expect("up"));

        let points = &state.strokes()[0].points;
        assert_eq!(points, &vec![DocPoint::new(100.0, 700.0), DocPoint::new(200.0, 700.0)]);
    }

    #[test]
    fn pointer_on_unlaid_view_is_rejected() {
        let mut state = page();
        let unready = CoordinateMapper::new(DisplaySize::new(0, 0), DocSize::LETTER);
        let err = state
            .pointer_down(DisplayPoint::new(1.0, 1.0), &unready, StrokeKind::Redact, 10.0, Rgba::BLACK)
            .expect_err("not ready");
        assert!(matches!(err, FaxkitError::ViewNotReady));
        assert!(!state.is_drawing());
        assert!(!state.can_undo());
    }

    #[test]
    fn replace_is_a_single_step() {
        let mut state = page();
        let edits = PageEdits {
            excluded: true,
            ..Default::default()
        };
        state.replace(edits.clone()).expect("replace");
        assert_eq!(state.edits(), &edits);
        assert!(state.undo());
        assert!(state.edits().is_trivial());
    }
}

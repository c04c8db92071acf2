// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// faxkit-edit — the page edit model.
//
// Pointer input is mapped into document space by `CoordinateMapper`, recorded
// per page in `EditState` (with bounded undo/redo), and kept per document in
// `EditStore`. Nothing in here knows about widgets or PDF bytes; the view and
// the assembler both read from it.

pub mod history;
pub mod mapper;
pub mod schema;
pub mod state;
pub mod store;

pub use history::History;
pub use mapper::CoordinateMapper;
pub use schema::{
    Annotation, AnnotationKind, AnnotationStyle, EditFile, PageEdits, Stroke, StrokeKind,
};
pub use state::{EditState, PointerMode};
pub use store::{EditSnapshot, EditStore, ExclusionSummary};

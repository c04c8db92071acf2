// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction burn-in: destructive removal of content under redaction strokes,
// overlays for highlights and annotations.

pub mod applier;
mod image;
mod overlay;
mod stream;

pub use applier::{BurnedDocument, RedactionApplier};

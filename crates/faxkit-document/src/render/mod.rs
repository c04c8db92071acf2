// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render module: page bitmaps, edit previews and zoom.

#[cfg(any(test, feature = "test-support"))]
pub mod layout;
pub mod overlay;
pub mod pdfium;
pub mod rasterizer;
pub mod zoom;

#[cfg(any(test, feature = "test-support"))]
pub use layout::ContentRasterizer;
pub use overlay::{PreviewStyle, paint_edits};
pub use pdfium::PdfiumRasterizer;
pub use rasterizer::{PageRasterizer, to_png_bytes};
pub use zoom::{RenderedPage, ZoomController};

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Display <-> document coordinate mapping.
//
// Display space: pixels of the bitmap currently on screen, origin top-left,
// y down. Document space: PDF points from the page's lower-left corner, y up.
// The ratio is derived from the two sizes on every call, so a zoom change
// cannot leave a stale scale factor behind.

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DisplayPoint, DisplaySize, DocPoint, DocRect, DocSize};

/// Map a display-space point into document space.
pub fn to_document(
    point: DisplayPoint,
    display: DisplaySize,
    document: DocSize,
) -> Result<DocPoint> {
    let (sx, sy) = scale(display, document)?;
    Ok(DocPoint::new(point.x * sx, document.height - point.y * sy))
}

/// Map a document-space point into display space.
pub fn to_display(
    point: DocPoint,
    display: DisplaySize,
    document: DocSize,
) -> Result<DisplayPoint> {
    let (sx, sy) = scale(display, document)?;
    Ok(DisplayPoint::new(point.x / sx, (document.height - point.y) / sy))
}

/// Pixel size of a page rendered at `dpi` and zoom factor `zoom`.
pub fn display_size_for(document: DocSize, dpi: f64, zoom: f64) -> DisplaySize {
    let factor = dpi / 72.0 * zoom;
    let px = |points: f64| (points * factor).round().max(0.0) as u32;
    DisplaySize::new(px(document.width), px(document.height))
}

/// Document units per display pixel along each axis.
fn scale(display: DisplaySize, document: DocSize) -> Result<(f64, f64)> {
    if display.is_empty() {
        return Err(FaxkitError::ViewNotReady);
    }
    if !(document.width > 0.0 && document.height > 0.0) {
        return Err(FaxkitError::PdfError(format!(
            "page has no usable size ({} x {})",
            document.width, document.height
        )));
    }
    Ok((
        document.width / display.width as f64,
        document.height / display.height as f64,
    ))
}

/// The current display/document pairing for one page.
///
/// Cheap to rebuild; `ZoomController` replaces it on every zoom or resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    display: DisplaySize,
    document: DocSize,
}

impl CoordinateMapper {
    pub fn new(display: DisplaySize, document: DocSize) -> Self {
        Self { display, document }
    }

    /// A mapper for a page rendered at `dpi` and `zoom`.
    pub fn for_zoom(document: DocSize, dpi: f64, zoom: f64) -> Self {
        Self::new(display_size_for(document, dpi, zoom), document)
    }

    pub fn display_size(&self) -> DisplaySize {
        self.display
    }

    pub fn document_size(&self) -> DocSize {
        self.document
    }

    pub fn to_document(&self, point: DisplayPoint) -> Result<DocPoint> {
        to_document(point, self.display, self.document)
    }

    pub fn to_display(&self, point: DocPoint) -> Result<DisplayPoint> {
        to_display(point, self.display, self.document)
    }

    /// Map a document rectangle to display pixels as `(left, top, right, bottom)`.
    pub fn rect_to_display(&self, rect: &DocRect) -> Result<(f64, f64, f64, f64)> {
        let top_left = self.to_display(DocPoint::new(rect.x0, rect.y1))?;
        let bottom_right = self.to_display(DocPoint::new(rect.x1, rect.y0))?;
        Ok((top_left.x, top_left.y, bottom_right.x, bottom_right.y))
    }

    /// Display pixels per document point (horizontal).
    pub fn pixels_per_point(&self) -> Result<f64> {
        let (sx, _) = scale(self.display, self.document)?;
        Ok(1.0 / sx)
    }
}

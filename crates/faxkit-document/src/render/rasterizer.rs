// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization for the editing view.
//
// A rasterizer turns one page at one zoom factor into an RGBA bitmap whose
// size is the page size at the configured DPI times the zoom. Pages are
// rendered by PDFium (see `pdfium.rs`).

use faxkit_core::DisplaySize;
use faxkit_core::error::{FaxkitError, Result};
use faxkit_edit::mapper::display_size_for;
use image::{ImageFormat, RgbaImage};

use crate::pdf::PdfReader;

/// Largest bitmap edge we are willing to allocate.
const MAX_EDGE_PX: u32 = 20_000;

/// Renders one page to a bitmap. Implementations must be pure functions of
/// (document, page, zoom).
pub trait PageRasterizer: Send + Sync {
    fn render(&self, reader: &PdfReader, page: usize, zoom: f64) -> Result<RgbaImage>;
}

/// Bitmap size for `page` at `dpi` and `zoom`, rejecting empty and
/// oversized targets.
pub(crate) fn target_size(reader: &PdfReader, page: usize, dpi: f64, zoom: f64) -> Result<DisplaySize> {
    let size = reader.page_size(page)?;
    let display = display_size_for(size, dpi, zoom);
    if display.is_empty() {
        return Err(FaxkitError::ViewNotReady);
    }
    if display.width > MAX_EDGE_PX || display.height > MAX_EDGE_PX {
        return Err(FaxkitError::ImageError(format!(
            "page {page} would render at {}x{} pixels",
            display.width, display.height
        )));
    }
    Ok(display)
}

/// Encode a rendered page as PNG.
pub fn to_png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|err| FaxkitError::ImageError(format!("PNG encoding failed: {err}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn reader() -> PdfReader {
        let bytes = fixtures::multi_page_bytes(1).expect("bytes");
        PdfReader::from_bytes(&bytes).expect("load")
    }

    #[test]
    fn size_follows_dpi_and_zoom() {
        let reader = reader();
        let full = target_size(&reader, 0, 72.0, 1.0).expect("size");
        assert_eq!((full.width, full.height), (612, 792));
        let half = target_size(&reader, 0, 72.0, 0.5).expect("size");
        assert_eq!((half.width, half.height), (306, 396));
    }

    #[test]
    fn degenerate_targets_are_rejected() {
        let reader = reader();
        assert!(matches!(target_size(&reader, 0, 72.0, 0.0), Err(FaxkitError::ViewNotReady)));
        assert!(matches!(target_size(&reader, 0, 72.0, 100.0), Err(FaxkitError::ImageError(_))));
        assert!(matches!(
            target_size(&reader, 5, 72.0, 1.0),
            Err(FaxkitError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn png_output_has_a_signature() {
        let png = to_png_bytes(&RgbaImage::new(4, 4)).expect("png");
        assert_eq!(&png[..4], b"\x89PNG");
    }
}

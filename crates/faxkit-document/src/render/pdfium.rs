// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium-backed page rendering.
//
// The PDFium shared library is bound once per process, on first render, so
// commands that never show a page (assemble, validate, info) work on
// machines without it. Search order for the library:
// 1. `pdfium_library` from the configuration
// 2. the executable's directory
// 3. the current working directory
// 4. the system library paths

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use faxkit_core::config::FaxkitConfig;
use faxkit_core::error::{FaxkitError, Result};
use image::RgbaImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use tracing::{debug, info, instrument, warn};

use super::rasterizer::{PageRasterizer, target_size};
use crate::pdf::PdfReader;

/// The bound library, or why binding failed. A failed bind is not retried.
static PDFIUM: OnceLock<std::result::Result<Pdfium, String>> = OnceLock::new();

fn bind(configured: Option<&Path>) -> std::result::Result<Pdfium, String> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(exe_dir)
        .chain(std::iter::once(PathBuf::from("./")));

    for dir in candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
            info!(dir = %dir.display(), "PDFium bound");
            return Ok(Pdfium::new(bindings));
        }
    }
    let bindings = Pdfium::bind_to_system_library().map_err(|err| {
        warn!(error = %err, "PDFium library not found");
        err.to_string()
    })?;
    info!("PDFium bound from system library");
    Ok(Pdfium::new(bindings))
}

/// Renders pages with PDFium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: f64,
    library: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: f64) -> Self {
        Self { dpi, library: None }
    }

    pub fn from_config(config: &FaxkitConfig) -> Self {
        Self {
            dpi: config.render_dpi,
            library: config.pdfium_library.clone(),
        }
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// The process-wide PDFium instance, binding it on first use.
    pub fn pdfium(&self) -> Result<&'static Pdfium> {
        PDFIUM
            .get_or_init(|| bind(self.library.as_deref()))
            .as_ref()
            .map_err(|reason| FaxkitError::RendererUnavailable(reason.clone()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    #[instrument(skip_all, fields(page = page, zoom = zoom))]
    fn render(&self, reader: &PdfReader, page: usize, zoom: f64) -> Result<RgbaImage> {
        let display = target_size(reader, page, self.dpi, zoom)?;
        let (width, height) = (display.width, display.height);
        let index = u16::try_from(page).map_err(|_| FaxkitError::PageOutOfRange {
            page,
            page_count: reader.page_count(),
        })?;

        let pdfium = self.pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(reader.bytes(), None)
            .map_err(|err| FaxkitError::PdfError(format!("PDFium cannot load {}: {err}", reader.name())))?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|err| FaxkitError::PdfError(format!("PDFium cannot open page {page}: {err}")))?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|err| FaxkitError::ImageError(format!("page {page} did not render: {err}")))?;

        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec()).ok_or_else(|| {
            FaxkitError::ImageError(format!("page {page} rendered at an unexpected size"))
        })?;
        debug!(width, height, "page rasterized");
        Ok(image)
    }
}

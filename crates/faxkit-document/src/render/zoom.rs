// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zoom and page navigation for the editing view.
//
// The controller owns only the scale factor and the current page's size.
// Every zoom or resize produces a fresh bitmap and a fresh mapper; stored
// edits are never touched.

use std::sync::Arc;

use faxkit_core::config::{FaxkitConfig, ZoomLimits};
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::DocSize;
use faxkit_edit::CoordinateMapper;
use image::RgbaImage;
use tracing::debug;

use super::rasterizer::PageRasterizer;
use crate::pdf::PdfReader;

/// A rendered page and the mapper that matches its pixels.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page: usize,
    pub zoom: f64,
    pub image: RgbaImage,
    pub mapper: CoordinateMapper,
}

pub struct ZoomController {
    rasterizer: Arc<dyn PageRasterizer>,
    limits: ZoomLimits,
    dpi: f64,
    zoom: f64,
    page: usize,
    page_size: DocSize,
    /// Set by `fit_width`; a later viewport resize refits.
    fit_viewport: Option<u32>,
}

impl ZoomController {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, config: &FaxkitConfig) -> Self {
        let limits = config.zoom;
        Self {
            rasterizer,
            limits,
            dpi: config.render_dpi,
            zoom: limits.clamp(limits.default),
            page: 0,
            page_size: DocSize::LETTER,
            fit_viewport: None,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> DocSize {
        self.page_size
    }

    pub fn rasterizer(&self) -> Arc<dyn PageRasterizer> {
        Arc::clone(&self.rasterizer)
    }

    /// Set the zoom factor, clamped to the configured range. Returns the
    /// factor actually applied.
    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.fit_viewport = None;
        self.apply_zoom(zoom)
    }

    fn apply_zoom(&mut self, zoom: f64) -> f64 {
        let clamped = self.limits.clamp(zoom);
        if clamped != zoom {
            debug!(requested = zoom, applied = clamped, "zoom clamped");
        }
        self.zoom = clamped;
        clamped
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom * self.limits.step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom / self.limits.step)
    }

    /// Zoom so the page width fills `viewport_px` pixels.
    pub fn fit_width(&mut self, viewport_px: u32) -> Result<f64> {
        if viewport_px == 0 {
            return Err(FaxkitError::ViewNotReady);
        }
        self.fit_viewport = Some(viewport_px);
        Ok(self.apply_zoom(self.fit_zoom(viewport_px)))
    }

    fn fit_zoom(&self, viewport_px: u32) -> f64 {
        viewport_px as f64 / (self.page_size.width * self.dpi / 72.0)
    }

    /// The view was resized. Only a fitted zoom follows the new width.
    pub fn resize(&mut self, viewport_px: u32) -> f64 {
        if self.fit_viewport.is_some() && viewport_px > 0 {
            self.fit_viewport = Some(viewport_px);
            self.apply_zoom(self.fit_zoom(viewport_px));
        }
        self.zoom
    }

    /// Move to `page`, keeping the zoom factor.
    pub fn set_page(&mut self, reader: &PdfReader, page: usize) -> Result<()> {
        self.page_size = reader.page_size(page)?;
        self.page = page;
        if let Some(viewport) = self.fit_viewport {
            self.apply_zoom(self.fit_zoom(viewport));
        }
        Ok(())
    }

    /// Mapper for the current page at the current zoom.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::for_zoom(self.page_size, self.dpi, self.zoom)
    }

    /// Render the current page at the current zoom.
    pub fn render(&self, reader: &PdfReader) -> Result<RenderedPage> {
        let image = self.rasterizer.render(reader, self.page, self.zoom)?;
        let mapper = self.mapper();
        let display = mapper.display_size();
        if (image.width(), image.height()) != (display.width, display.height) {
            return Err(FaxkitError::ImageError(format!(
                "rasterizer returned {}x{} for a {}x{} view",
                image.width(),
                image.height(),
                display.width,
                display.height
            )));
        }
        Ok(RenderedPage {
            page: self.page,
            zoom: self.zoom,
            image,
            mapper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::render::ContentRasterizer;
    use faxkit_core::{DisplayPoint, DocPoint};

    fn setup() -> (ZoomController, PdfReader) {
        let bytes = fixtures::to_bytes(&mut fixtures::mixed_page().expect("fixture")).expect("bytes");
        let reader = PdfReader::from_bytes(&bytes).expect("load");
        let config = FaxkitConfig::default();
        let mut controller =
            ZoomController::new(Arc::new(ContentRasterizer::from_config(&config)), &config);
        controller.set_page(&reader, 0).expect("page");
        (controller, reader)
    }

    #[test]
    fn zoom_round_trip_is_pixel_identical() {
        let (mut controller, reader) = setup();
        let before = controller.render(&reader).expect("render");

        controller.set_zoom(2.5);
        let zoomed = controller.render(&reader).expect("render");
        assert_ne!(zoomed.image.dimensions(), before.image.dimensions());

        controller.set_zoom(1.0);
        let after = controller.render(&reader).expect("render");
        assert_eq!(after.image.dimensions(), before.image.dimensions());
        assert_eq!(after.image.as_raw(), before.image.as_raw());
        assert_eq!(after.mapper, before.mapper);
    }

    #[test]
    fn out_of_range_zoom_is_clamped() {
        let (mut controller, _) = setup();
        assert_eq!(controller.set_zoom(50.0), 5.0);
        assert_eq!(controller.set_zoom(0.01), 0.25);
        assert_eq!(controller.set_zoom(f64::NAN), 1.0);
        for _ in 0..40 {
            controller.zoom_in();
        }
        assert_eq!(controller.zoom(), 5.0);
    }

    #[test]
    fn stored_points_stay_put_across_zoom() {
        let (mut controller, _) = setup();
        let point = DocPoint::new(300.0, 500.0);
        for zoom in [0.25, 1.0, 2.5, 5.0] {
            controller.set_zoom(zoom);
            let mapper = controller.mapper();
            let on_screen = mapper.to_display(point).expect("display");
            let back = mapper
                .to_document(DisplayPoint::new(on_screen.x, on_screen.y))
                .expect("document");
            assert!((back.x - point.x).abs() < 1e-9 && (back.y - point.y).abs() < 1e-9);
        }
    }

    #[test]
    fn fit_width_follows_resizes_until_zoom_is_set() {
        let (mut controller, _) = setup();
        // Letter at 150 dpi is 1275 px wide.
        let fitted = controller.fit_width(1275).expect("fit");
        assert!((fitted - 1.0).abs() < 1e-9);
        assert!((controller.resize(2550) - 2.0).abs() < 1e-9);

        controller.set_zoom(1.5);
        assert_eq!(controller.resize(1275), 1.5);
        assert!(matches!(controller.fit_width(0), Err(FaxkitError::ViewNotReady)));
    }
}

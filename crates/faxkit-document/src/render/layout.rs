// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout rasterizer for tests and benchmarks.
//
// `ContentRasterizer` draws a page from its interpreted content: filled and
// stroked paths, a bar per visible glyph, and a grey box where images sit.
// It needs no native library and is deterministic, so pixel assertions
// about where content sits hold across machines.

use faxkit_core::config::FaxkitConfig;
use faxkit_core::error::Result;
use faxkit_core::{DocRect, Rgba};
use image::{Rgba as Pixel, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::{debug, instrument};

use super::rasterizer::{PageRasterizer, target_size};
use crate::pdf::PdfReader;
use crate::pdf::content::{Event, PaintedPath, TextShow, segments, walk_page};

/// Coordinates are clamped to this range before integer conversion.
const COORD_LIMIT: f64 = 100_000.0;

const IMAGE_FILL: Pixel<u8> = Pixel([170, 170, 170, 255]);

/// Text render mode that paints nothing.
const INVISIBLE_TEXT: i64 = 3;

fn pixel(rgba: Rgba) -> Pixel<u8> {
    Pixel([rgba.r, rgba.g, rgba.b, 255])
}

/// User space to pixel space for one page.
#[derive(Debug, Clone, Copy)]
struct PixelTransform {
    page: DocRect,
    sx: f64,
    sy: f64,
}

impl PixelTransform {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let px = (x - self.page.x0) * self.sx;
        let py = (self.page.y1 - y) * self.sy;
        (px.clamp(-COORD_LIMIT, COORD_LIMIT), py.clamp(-COORD_LIMIT, COORD_LIMIT))
    }

    fn rect(&self, rect: &DocRect) -> Option<Rect> {
        let (left, top) = self.apply(rect.x0, rect.y1);
        let (right, bottom) = self.apply(rect.x1, rect.y0);
        let (left, top) = (left.floor() as i32, top.floor() as i32);
        let (right, bottom) = (right.ceil() as i32, bottom.ceil() as i32);
        let width = u32::try_from(right - left).ok().filter(|w| *w > 0)?;
        let height = u32::try_from(bottom - top).ok().filter(|h| *h > 0)?;
        Some(Rect::at(left, top).of_size(width, height))
    }
}

/// Draws pages from their content streams.
#[derive(Debug, Clone, Copy)]
pub struct ContentRasterizer {
    dpi: f64,
}

impl ContentRasterizer {
    pub fn new(dpi: f64) -> Self {
        Self { dpi }
    }

    pub fn from_config(config: &FaxkitConfig) -> Self {
        Self::new(config.render_dpi)
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    fn draw_text(&self, canvas: &mut RgbaImage, transform: &PixelTransform, show: &TextShow) {
        if show.render_mode == INVISIBLE_TEXT || show.render_mode == 7 {
            return;
        }
        let colour = pixel(show.color);
        for glyph in show.glyphs.iter().filter(|g| !g.is_blank()) {
            // Thin the box to the x-height band so words read as words.
            let band = DocRect {
                y0: glyph.bbox.y0 + glyph.bbox.height() * 0.25,
                y1: glyph.bbox.y1 - glyph.bbox.height() * 0.3,
                x0: glyph.bbox.x0 + glyph.bbox.width() * 0.1,
                x1: glyph.bbox.x1 - glyph.bbox.width() * 0.1,
            };
            if let Some(rect) = transform.rect(&band) {
                draw_filled_rect_mut(canvas, rect, colour);
            }
        }
    }

    fn draw_path(&self, canvas: &mut RgbaImage, transform: &PixelTransform, path: &PaintedPath) {
        if path.fill {
            let colour = pixel(path.fill_color);
            for sub in &path.subpaths {
                let mut points: Vec<Point<i32>> = Vec::with_capacity(sub.points.len());
                for (x, y) in &sub.points {
                    let (px, py) = transform.apply(*x, *y);
                    let point = Point::new(px.round() as i32, py.round() as i32);
                    if points.last() != Some(&point) {
                        points.push(point);
                    }
                }
                while points.len() > 1 && points.first() == points.last() {
                    points.pop();
                }
                if points.len() >= 3 {
                    draw_polygon_mut(canvas, &points, colour);
                }
            }
        }
        if path.stroke {
            let colour = pixel(path.stroke_color);
            let width = path.line_width * transform.sx;
            for sub in &path.subpaths {
                let closes = sub.closed || path.fill;
                for (p, q) in segments(&sub.points, closes) {
                    let a = transform.apply(p.0, p.1);
                    let b = transform.apply(q.0, q.1);
                    draw_thick_line(canvas, a, b, width, colour);
                }
            }
        }
    }
}

/// A line `width` pixels wide, drawn as a quad when wider than a pixel.
fn draw_thick_line(canvas: &mut RgbaImage, a: (f64, f64), b: (f64, f64), width: f64, colour: Pixel<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if width <= 1.5 || length < 1.0 {
        draw_line_segment_mut(canvas, (a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32), colour);
        return;
    }
    let (nx, ny) = (-dy / length * width / 2.0, dx / length * width / 2.0);
    let corners = [
        (a.0 + nx, a.1 + ny),
        (b.0 + nx, b.1 + ny),
        (b.0 - nx, b.1 - ny),
        (a.0 - nx, a.1 - ny),
    ];
    let mut points: Vec<Point<i32>> = Vec::with_capacity(4);
    for (x, y) in corners {
        let point = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() >= 3 {
        draw_polygon_mut(canvas, &points, colour);
    } else {
        draw_line_segment_mut(canvas, (a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32), colour);
    }
}

impl PageRasterizer for ContentRasterizer {
    #[instrument(skip_all, fields(page = page, zoom = zoom))]
    fn render(&self, reader: &PdfReader, page: usize, zoom: f64) -> Result<RgbaImage> {
        let page_box = reader.page_box(page)?;
        let size = reader.page_size(page)?;
        let display = target_size(reader, page, self.dpi, zoom)?;
        let (width, height) = (display.width, display.height);

        let transform = PixelTransform {
            page: page_box,
            sx: width as f64 / size.width,
            sy: height as f64 / size.height,
        };
        let mut canvas = RgbaImage::from_pixel(width, height, pixel(Rgba::WHITE));
        let page_id = reader.page_id(page)?;
        walk_page(reader.document(), page_id, &mut |event, _| match event {
            Event::Text(show) => self.draw_text(&mut canvas, &transform, show),
            Event::Path(path) => self.draw_path(&mut canvas, &transform, path),
            Event::Image(draw) => {
                if let Some(rect) = transform.rect(&draw.bbox) {
                    draw_filled_rect_mut(&mut canvas, rect, IMAGE_FILL);
                }
            }
            Event::InlineImage(bbox) => {
                if let Some(rect) = transform.rect(bbox) {
                    draw_filled_rect_mut(&mut canvas, rect, IMAGE_FILL);
                }
            }
            Event::None | Event::Form(_) | Event::Shading => {}
        })?;
        debug!(width, height, "page drawn from content");
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use faxkit_core::error::FaxkitError;

    fn reader(doc: &mut lopdf::Document) -> PdfReader {
        let bytes = fixtures::to_bytes(doc).expect("bytes");
        PdfReader::from_bytes(&bytes).expect("load")
    }

    #[test]
    fn size_follows_dpi_and_zoom() {
        let reader = reader(&mut fixtures::multi_page(1).expect("fixture"));
        let image = ContentRasterizer::new(72.0).render(&reader, 0, 1.0).expect("render");
        assert_eq!(image.dimensions(), (612, 792));
        let image = ContentRasterizer::new(72.0).render(&reader, 0, 0.5).expect("render");
        assert_eq!(image.dimensions(), (306, 396));
    }

    #[test]
    fn content_is_drawn_where_it_sits() {
        let reader = reader(&mut fixtures::mixed_page().expect("fixture"));
        let image = ContentRasterizer::new(72.0).render(&reader, 0, 1.0).expect("render");
        // Middle of the grey vector box (y flipped).
        let box_centre = image.get_pixel(350, 792 - 670);
        assert_eq!(box_centre.0, [128, 128, 128, 255]);
        // Middle of the image.
        let image_centre = image.get_pixel(350, 792 - 550);
        assert_eq!(*image_centre, IMAGE_FILL);
        // Empty margin stays white.
        assert_eq!(image.get_pixel(20, 20).0, [255, 255, 255, 255]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let reader = reader(&mut fixtures::mixed_page().expect("fixture"));
        let rasterizer = ContentRasterizer::new(100.0);
        let first = rasterizer.render(&reader, 0, 1.0).expect("render");
        let second = rasterizer.render(&reader, 0, 1.0).expect("render");
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn zero_zoom_is_not_ready_and_bad_page_is_out_of_range() {
        let reader = reader(&mut fixtures::multi_page(1).expect("fixture"));
        let rasterizer = ContentRasterizer::new(72.0);
        assert!(matches!(rasterizer.render(&reader, 0, 0.0), Err(FaxkitError::ViewNotReady)));
        assert!(matches!(
            rasterizer.render(&reader, 5, 1.0),
            Err(FaxkitError::PageOutOfRange { .. })
        ));
    }
}

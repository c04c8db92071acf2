// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview painting: draws a page's edits on top of its rendered bitmap.
//
// The view redraws from edit data after every change, so everything here is
// derived from document-space records through the current mapper.

use faxkit_core::error::Result;
use faxkit_core::{DocPoint, DocRect, Rgba};
use faxkit_edit::{Annotation, AnnotationKind, CoordinateMapper, PageEdits, Stroke, StrokeKind};
use image::{GrayImage, Luma, Rgba as Pixel, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Average glyph advance used to size greeked annotation text.
const GLYPH_ADVANCE: f64 = 0.5;

/// Colours and opacities of the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewStyle {
    pub highlight_opacity: f64,
    /// Wash laid over excluded pages; alpha is the wash strength.
    pub exclusion_tint: Rgba,
}

impl Default for PreviewStyle {
    fn default() -> Self {
        Self {
            highlight_opacity: 0.5,
            exclusion_tint: Rgba::opaque(200, 40, 40).with_alpha(90),
        }
    }
}

fn pixel(rgba: Rgba) -> Pixel<u8> {
    Pixel([rgba.r, rgba.g, rgba.b, 255])
}

fn display_rect(mapper: &CoordinateMapper, rect: &DocRect) -> Result<Rect> {
    let (left, top, right, bottom) = mapper.rect_to_display(rect)?;
    let (left, top) = (left.floor() as i32, top.floor() as i32);
    let width = (right.ceil() as i32 - left).max(1) as u32;
    let height = (bottom.ceil() as i32 - top).max(1) as u32;
    Ok(Rect::at(left, top).of_size(width, height))
}

/// Blend `colour` into `canvas` wherever `mask` is set.
fn blend_mask(canvas: &mut RgbaImage, mask: &GrayImage, colour: Rgba, opacity: f64) {
    let alpha = opacity.clamp(0.0, 1.0);
    let over = [colour.r, colour.g, colour.b];
    for (x, y, coverage) in mask.enumerate_pixels() {
        if coverage.0[0] == 0 {
            continue;
        }
        let px = canvas.get_pixel_mut(x, y);
        for c in 0..3 {
            let base = px.0[c] as f64;
            px.0[c] = (base + (over[c] as f64 - base) * alpha).round() as u8;
        }
    }
}

/// Paint `edits` (and a stroke still being drawn) onto `canvas`.
pub fn paint_edits(
    canvas: &mut RgbaImage,
    edits: &PageEdits,
    in_progress: Option<&Stroke>,
    mapper: &CoordinateMapper,
    style: &PreviewStyle,
) -> Result<()> {
    for stroke in edits.strokes.iter().chain(in_progress) {
        paint_stroke(canvas, stroke, mapper, style)?;
    }
    for annotation in &edits.annotations {
        paint_annotation(canvas, annotation, mapper)?;
    }
    if edits.excluded {
        let (width, height) = canvas.dimensions();
        let mut mask = GrayImage::new(width, height);
        mask.pixels_mut().for_each(|p| *p = Luma([255]));
        let tint = style.exclusion_tint;
        blend_mask(canvas, &mask, tint, tint.a as f64 / 255.0);
    }
    Ok(())
}

fn paint_stroke(
    canvas: &mut RgbaImage,
    stroke: &Stroke,
    mapper: &CoordinateMapper,
    style: &PreviewStyle,
) -> Result<()> {
    match stroke.kind {
        StrokeKind::Redact => {
            let colour = pixel(stroke.color);
            for region in stroke.regions() {
                draw_filled_rect_mut(canvas, display_rect(mapper, &region)?, colour);
            }
        }
        StrokeKind::Highlight => {
            let (width, height) = canvas.dimensions();
            let mut mask = GrayImage::new(width, height);
            let radius = (stroke.width / 2.0 * mapper.pixels_per_point()?).max(0.5);
            let on = Luma([255u8]);
            let centres: Vec<(f64, f64)> = stroke
                .points
                .iter()
                .map(|p| mapper.to_display(*p).map(|d| (d.x, d.y)))
                .collect::<Result<_>>()?;
            for (x, y) in &centres {
                draw_filled_circle_mut(&mut mask, (x.round() as i32, y.round() as i32), radius.round() as i32, on);
            }
            for pair in centres.windows(2) {
                segment_quad(&mut mask, pair[0], pair[1], radius, on);
            }
            blend_mask(canvas, &mask, stroke.color, style.highlight_opacity);
        }
    }
    Ok(())
}

fn segment_quad(mask: &mut GrayImage, a: (f64, f64), b: (f64, f64), radius: f64, on: Luma<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1.0 {
        return;
    }
    let (nx, ny) = (-dy / length * radius, dx / length * radius);
    let mut points: Vec<Point<i32>> = Vec::with_capacity(4);
    for (x, y) in [
        (a.0 + nx, a.1 + ny),
        (b.0 + nx, b.1 + ny),
        (b.0 - nx, b.1 - ny),
        (a.0 - nx, a.1 - ny),
    ] {
        let point = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() >= 3 {
        draw_polygon_mut(mask, &points, on);
    }
}

fn paint_annotation(
    canvas: &mut RgbaImage,
    annotation: &Annotation,
    mapper: &CoordinateMapper,
) -> Result<()> {
    let colour = pixel(annotation.style.color);
    let anchor = annotation.anchor;
    match &annotation.kind {
        AnnotationKind::Rect { width, height } => {
            let rect = DocRect::from_corners(anchor, DocPoint::new(anchor.x + width, anchor.y + height));
            let thickness = (annotation.style.line_width * mapper.pixels_per_point()?).round().max(1.0) as i32;
            let outer = display_rect(mapper, &rect)?;
            for inset in 0..thickness {
                let (w, h) = (outer.width() as i32 - 2 * inset, outer.height() as i32 - 2 * inset);
                if w <= 0 || h <= 0 {
                    break;
                }
                let ring = Rect::at(outer.left() + inset, outer.top() + inset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(canvas, ring, colour);
            }
        }
        AnnotationKind::Text { text, font_size } => {
            // Greeked: one bar per line, as long as the line would be.
            for (i, line) in text.lines().enumerate() {
                let chars = line.chars().count() as f64;
                if chars == 0.0 {
                    continue;
                }
                let baseline = anchor.y - i as f64 * font_size * 1.2;
                let bar = DocRect {
                    x0: anchor.x,
                    y0: baseline,
                    x1: anchor.x + chars * GLYPH_ADVANCE * font_size,
                    y1: baseline + font_size * 0.6,
                };
                draw_filled_rect_mut(canvas, display_rect(mapper, &bar)?, colour);
            }
        }
    }
    Ok(())
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel-level blackout for partially redacted images.
//
// Supported: 1- and 8-bit DeviceGray / DeviceRGB samples, stored raw, with
// filters lopdf can decode (Flate, LZW, ASCII85), or as a single DCT (JPEG)
// stream. The result is a new, Flate-compressed image whose covered pixels
// are black; masks are dropped so no outline of the original survives.

use faxkit_core::DocRect;
use lopdf::{Document, Object, Stream};
use tracing::debug;

use crate::pdf::content::{Matrix, name_of, number, resolve};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    width: usize,
    height: usize,
    components: usize,
    bits: usize,
    inverted: bool,
}

impl Layout {
    fn stride(&self) -> usize {
        (self.width * self.components * self.bits).div_ceil(8)
    }

    /// Sample value that renders as black.
    fn black(&self) -> u8 {
        match (self.inverted, self.bits) {
            (false, _) => 0,
            (true, 1) => 1,
            (true, _) => 255,
        }
    }
}

/// Why an image could not be blacked out.
pub type Unsupported = String;

/// Return a copy of `image` with every pixel whose area (mapped to page space
/// through `matrix`) intersects a region set to black.
pub fn blackout(
    doc: &Document,
    image: &Stream,
    matrix: &Matrix,
    regions: &[DocRect],
) -> Result<Stream, Unsupported> {
    let (layout, mut samples, from_jpeg) = decode(doc, image)?;
    let stride = layout.stride();
    if samples.len() < stride * layout.height {
        return Err(format!(
            "image data is short: {} bytes for {}x{}",
            samples.len(),
            layout.width,
            layout.height
        ));
    }

    let (w, h) = (layout.width as f64, layout.height as f64);
    let black = layout.black();
    let mut blacked = 0usize;
    for row in 0..layout.height {
        // Image row 0 is the top edge of the unit square.
        let v0 = 1.0 - (row + 1) as f64 / h;
        let v1 = 1.0 - row as f64 / h;
        let band = matrix.transform_rect(&DocRect { x0: 0.0, y0: v0, x1: 1.0, y1: v1 });
        if !regions.iter().any(|r| r.intersects(&band)) {
            continue;
        }
        for col in 0..layout.width {
            let cell = DocRect {
                x0: col as f64 / w,
                y0: v0,
                x1: (col + 1) as f64 / w,
                y1: v1,
            };
            let area = matrix.transform_rect(&cell);
            if regions.iter().any(|r| r.intersects(&area)) {
                set_pixel(&mut samples[row * stride..(row + 1) * stride], col, &layout, black);
                blacked += 1;
            }
        }
    }
    debug!(pixels = blacked, width = layout.width, height = layout.height, "image pixels blacked out");

    let mut dict = image.dict.clone();
    for key in [&b"Filter"[..], b"DecodeParms", b"SMask", b"Mask", b"Length"] {
        dict.remove(key);
    }
    if from_jpeg {
        dict.set("BitsPerComponent", 8);
        dict.set(
            "ColorSpace",
            if layout.components == 1 { "DeviceGray" } else { "DeviceRGB" },
        );
    }
    samples.truncate(stride * layout.height);
    let mut cleaned = Stream::new(dict, samples);
    // Compression is an optimisation only; raw samples are valid too.
    let _ = cleaned.compress();
    Ok(cleaned)
}

fn set_pixel(row: &mut [u8], col: usize, layout: &Layout, value: u8) {
    if layout.bits == 1 {
        for c in 0..layout.components {
            let bit = col * layout.components + c;
            let mask = 0x80u8 >> (bit % 8);
            if value == 0 {
                row[bit / 8] &= !mask;
            } else {
                row[bit / 8] |= mask;
            }
        }
    } else {
        let start = col * layout.components;
        row[start..start + layout.components].fill(value);
    }
}

fn decode(doc: &Document, image: &Stream) -> Result<(Layout, Vec<u8>, bool), Unsupported> {
    let dict = &image.dict;
    let int = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .filter(|n| *n >= 1.0)
            .map(|n| n as usize)
    };
    if dict
        .get(b"ImageMask")
        .ok()
        .is_some_and(|o| matches!(resolve(doc, o), Object::Boolean(true)))
    {
        return Err("stencil masks are not supported".into());
    }
    let (Some(width), Some(height)) = (int(b"Width"), int(b"Height")) else {
        return Err("image has no usable size".into());
    };
    let components = match dict.get(b"ColorSpace").ok().map(|o| resolve(doc, o)).and_then(name_of) {
        Some(b"DeviceGray") => 1,
        Some(b"DeviceRGB") => 3,
        other => {
            return Err(format!(
                "colour space {} is not supported",
                other.map(String::from_utf8_lossy).unwrap_or_else(|| "(complex)".into())
            ));
        }
    };
    let inverted = match dict.get(b"Decode").ok().map(|o| resolve(doc, o)) {
        Some(Object::Array(items)) => items.first().and_then(number).is_some_and(|n| n >= 0.5),
        _ => false,
    };

    let filters = image.filters().unwrap_or_default();
    if filters.last() == Some(&&b"DCTDecode"[..]) {
        if filters.len() != 1 {
            return Err("chained JPEG filters are not supported".into());
        }
        let decoded = ::image::load_from_memory_with_format(&image.content, ::image::ImageFormat::Jpeg)
            .map_err(|err| format!("cannot decode JPEG: {err}"))?;
        if decoded.width() as usize != width || decoded.height() as usize != height {
            return Err("JPEG size does not match the image dictionary".into());
        }
        let samples = if components == 1 {
            decoded.to_luma8().into_raw()
        } else {
            decoded.to_rgb8().into_raw()
        };
        let layout = Layout { width, height, components, bits: 8, inverted };
        return Ok((layout, samples, true));
    }

    let bits = int(b"BitsPerComponent").unwrap_or(8);
    if bits != 1 && bits != 8 {
        return Err(format!("{bits}-bit samples are not supported"));
    }
    let samples = image
        .get_plain_content()
        .map_err(|err| format!("cannot decode image data: {err}"))?;
    Ok((Layout { width, height, components, bits, inverted }, samples, false))
}

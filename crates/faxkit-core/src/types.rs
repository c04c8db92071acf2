// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Faxkit: document identity, the two coordinate spaces,
// and colours.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FaxkitError;

/// Stable identity of a source document.
///
/// Either the canonical path it was opened from or a SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Identity derived from a filesystem path. The path is canonicalised when
    /// it exists so that `./a.pdf` and `/abs/a.pdf` share edits.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self(resolved.display().to_string())
    }

    /// Identity derived from document content (`sha256:<hex>`).
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A point in document space: PDF points relative to the page's lower-left
/// corner, y axis pointing up. Independent of zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f64,
    pub y: f64,
}

impl DocPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A point in display space: pixels at the current zoom, origin top-left,
/// y axis pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

impl DisplayPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Size of a page in document space (points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocSize {
    pub width: f64,
    pub height: f64,
}

impl DocSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// US Letter, the fallback when a page has no usable MediaBox.
    pub const LETTER: DocSize = DocSize::new(612.0, 792.0);
}

/// Size of the display surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle in document (or PDF user) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl DocRect {
    /// Build a rectangle from any two opposite corners.
    pub fn from_corners(a: DocPoint, b: DocPoint) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Grow every side by `amount`.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            x0: self.x0 - amount,
            y0: self.y0 - amount,
            x1: self.x1 + amount,
            y1: self.y1 + amount,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// True when the interiors overlap or the edges touch.
    pub fn intersects(&self, other: &DocRect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    pub fn contains_rect(&self, other: &DocRect) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    pub fn contains(&self, p: DocPoint) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &DocRect) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// 8-bit RGBA colour, serialised as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const YELLOW: Rgba = Rgba::opaque(255, 255, 0);
    pub const BLUE: Rgba = Rgba::opaque(0, 0, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parse `#RRGGBB` / `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Result<Self, FaxkitError> {
        let hex = text.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(FaxkitError::InvalidEdit(format!("bad colour {text:?}")));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| FaxkitError::InvalidEdit(format!("bad colour {text:?}")))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// RGB components in the 0..=1 range used by PDF colour operators.
    pub fn unit_rgb(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl TryFrom<String> for Rgba {
    type Error = FaxkitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgba::from_hex(&value)
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_hex()
    }
}

/// Standard paper sizes for generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_hex_round_trip() {
        let c = Rgba::from_hex("#ff8000").expect("parse");
        assert_eq!(c, Rgba::opaque(255, 128, 0));
        assert_eq!(c.to_hex(), "#FF8000");

        let translucent = Rgba::from_hex("FFFF0080").expect("parse");
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_hex(), "#FFFF0080");
    }

    #[test]
    fn malformed_colour_is_rejected() {
        assert!(Rgba::from_hex("#12").is_err());
        assert!(Rgba::from_hex("#GGGGGG").is_err());
        assert!(serde_json::from_str::<Rgba>("\"blue\"").is_err());
    }

    #[test]
    fn content_identity_is_stable() {
        let a = DocumentId::from_content(b"%PDF-1.5 a");
        let b = DocumentId::from_content(b"%PDF-1.5 a");
        let c = DocumentId::from_content(b"%PDF-1.5 b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("sha256:"));
    }

    #[test]
    fn rect_intersection_and_union() {
        let a = DocRect::from_corners(DocPoint::new(0.0, 0.0), DocPoint::new(10.0, 10.0));
        let b = DocRect::from_corners(DocPoint::new(20.0, 5.0), DocPoint::new(5.0, 15.0));
        let far = DocRect::from_corners(DocPoint::new(50.0, 50.0), DocPoint::new(60.0, 60.0));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&far));
        assert_eq!(a.union(&b), DocRect { x0: 0.0, y0: 0.0, x1: 20.0, y1: 15.0 });
        assert!(a.union(&b).contains_rect(&a));
    }
}

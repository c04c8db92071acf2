// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edit records: strokes, annotations, per-page edit sets and the versioned
// on-disk edit file.
//
// Every record is validated when it enters the model (pointer input, file
// load), so malformed edits are rejected at the boundary instead of failing
// deep inside burn-in.

use std::path::Path;

use chrono::{DateTime, Utc};
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DocPoint, DocRect, DocumentId, Rgba};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Current edit-file schema version.
pub const EDIT_FILE_VERSION: u32 = 1;

// -- Strokes ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    /// Destructive: underlying content is removed on burn-in.
    Redact,
    /// Semi-transparent overlay.
    Highlight,
}

/// A freehand stroke in document space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub kind: StrokeKind,
    pub points: Vec<DocPoint>,
    /// Brush width in points.
    pub width: f64,
    pub color: Rgba,
}

impl Stroke {
    pub fn new(kind: StrokeKind, width: f64, color: Rgba) -> Self {
        Self {
            kind,
            points: Vec::new(),
            width,
            color,
        }
    }

    /// A redaction covering `rect` exactly: one horizontal pass whose brush is
    /// the rectangle's height.
    pub fn redact_rect(rect: DocRect) -> Self {
        let mid = (rect.y0 + rect.y1) / 2.0;
        let half = rect.height() / 2.0;
        Self {
            kind: StrokeKind::Redact,
            points: vec![
                DocPoint::new(rect.x0 + half, mid),
                DocPoint::new(rect.x1 - half, mid),
            ],
            width: rect.height(),
            color: Rgba::BLACK,
        }
    }

    /// Append a point, ignoring exact repeats of the last one.
    pub fn push(&mut self, point: DocPoint) {
        if self.points.last() != Some(&point) {
            self.points.push(point);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.points.is_empty() {
            return Err(FaxkitError::InvalidEdit("stroke has no points".into()));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(FaxkitError::InvalidEdit(format!(
                "stroke width must be positive, got {}",
                self.width
            )));
        }
        if let Some(bad) = self.points.iter().find(|p| !p.is_finite()) {
            return Err(FaxkitError::InvalidEdit(format!(
                "stroke point is not finite: {bad:?}"
            )));
        }
        Ok(())
    }

    /// The area swept by the brush, as one rectangle per segment.
    ///
    /// Each segment contributes its bounding box grown by half the brush
    /// width; a lone point contributes a square the size of the brush.
    pub fn regions(&self) -> Vec<DocRect> {
        let half = self.width / 2.0;
        match self.points.as_slice() {
            [] => Vec::new(),
            [only] => vec![DocRect::from_corners(*only, *only).inflate(half)],
            points => points
                .windows(2)
                .map(|pair| DocRect::from_corners(pair[0], pair[1]).inflate(half))
                .collect(),
        }
    }

    /// Bounding box of everything the stroke touches.
    pub fn bounds(&self) -> Option<DocRect> {
        self.regions().into_iter().reduce(|acc, r| acc.union(&r))
    }
}

// -- Annotations --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Free text; the anchor is the left end of the first baseline.
    Text { text: String, font_size: f64 },
    /// Outlined rectangle; the anchor is its lower-left corner.
    Rect { width: f64, height: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    pub color: Rgba,
    /// Outline width for rectangles, in points.
    pub line_width: f64,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Rgba::BLUE,
            line_width: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub anchor: DocPoint,
    #[serde(flatten)]
    pub kind: AnnotationKind,
    #[serde(default)]
    pub style: AnnotationStyle,
}

impl Annotation {
    pub fn text(anchor: DocPoint, text: impl Into<String>, font_size: f64) -> Self {
        Self {
            anchor,
            kind: AnnotationKind::Text {
                text: text.into(),
                font_size,
            },
            style: AnnotationStyle::default(),
        }
    }

    pub fn rect(anchor: DocPoint, width: f64, height: f64) -> Self {
        Self {
            anchor,
            kind: AnnotationKind::Rect { width, height },
            style: AnnotationStyle::default(),
        }
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.anchor.is_finite() {
            return Err(FaxkitError::InvalidEdit(format!(
                "annotation anchor is not finite: {:?}",
                self.anchor
            )));
        }
        if !(self.style.line_width.is_finite() && self.style.line_width >= 0.0) {
            return Err(FaxkitError::InvalidEdit("annotation line width is invalid".into()));
        }
        match &self.kind {
            AnnotationKind::Text { text, font_size } => {
                if text.trim().is_empty() {
                    return Err(FaxkitError::InvalidEdit("text annotation is empty".into()));
                }
                if !(font_size.is_finite() && *font_size > 0.0) {
                    return Err(FaxkitError::InvalidEdit(format!(
                        "font size must be positive, got {font_size}"
                    )));
                }
            }
            AnnotationKind::Rect { width, height } => {
                if !(width.is_finite() && height.is_finite() && *width > 0.0 && *height > 0.0) {
                    return Err(FaxkitError::InvalidEdit(format!(
                        "rectangle must have positive size, got {width} x {height}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// -- Page edit set ------------------------------------------------------------

/// Everything recorded for one page. Also the unit stored in undo history and
/// handed to the assembler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEdits {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub excluded: bool,
}

impl PageEdits {
    /// True when burn-in would change nothing on this page.
    pub fn is_trivial(&self) -> bool {
        self.strokes.is_empty() && self.annotations.is_empty() && !self.excluded
    }

    /// True when there is something to draw onto the page.
    pub fn has_marks(&self) -> bool {
        !self.strokes.is_empty() || !self.annotations.is_empty()
    }

    /// All regions that must be redacted on this page.
    pub fn redaction_regions(&self) -> Vec<DocRect> {
        self.strokes
            .iter()
            .filter(|s| s.kind == StrokeKind::Redact)
            .flat_map(Stroke::regions)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for stroke in &self.strokes {
            stroke.validate()?;
        }
        for annotation in &self.annotations {
            annotation.validate()?;
        }
        Ok(())
    }
}

// -- Edit file ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_index: usize,
    #[serde(flatten)]
    pub edits: PageEdits,
}

/// Explicit "save edits" output. Pages without edits are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditFile {
    pub version: u32,
    pub document: DocumentId,
    pub saved_at: DateTime<Utc>,
    pub pages: Vec<PageRecord>,
}

impl EditFile {
    /// Collect the non-trivial pages of a document.
    pub fn from_pages<'a>(
        document: DocumentId,
        pages: impl IntoIterator<Item = &'a PageEdits>,
    ) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .filter(|(_, edits)| !edits.is_trivial())
            .map(|(page_index, edits)| PageRecord {
                page_index,
                edits: edits.clone(),
            })
            .collect();
        Self {
            version: EDIT_FILE_VERSION,
            document,
            saved_at: Utc::now(),
            pages,
        }
    }

    /// Parse and validate. `page_count` bounds the page indices.
    pub fn from_json(json: &str, page_count: usize) -> Result<Self> {
        let file: EditFile = serde_json::from_str(json)?;
        file.validate(page_count)?;
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>, page_count: usize) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let file = Self::from_json(&json, page_count)?;
        debug!(path = %path.as_ref().display(), pages = file.pages.len(), "edit file loaded");
        Ok(file)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!(
            path = %path.as_ref().display(),
            document = %self.document,
            pages = self.pages.len(),
            "edit file saved"
        );
        Ok(())
    }

    pub fn validate(&self, page_count: usize) -> Result<()> {
        if self.version != EDIT_FILE_VERSION {
            return Err(FaxkitError::UnsupportedSchema {
                found: self.version,
                supported: EDIT_FILE_VERSION,
            });
        }
        let mut seen = std::collections::HashSet::new();
        for record in &self.pages {
            if record.page_index >= page_count {
                return Err(FaxkitError::PageOutOfRange {
                    page: record.page_index,
                    page_count,
                });
            }
            if !seen.insert(record.page_index) {
                return Err(FaxkitError::InvalidEdit(format!(
                    "page {} appears twice in edit file",
                    record.page_index
                )));
            }
            record.edits.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stroke() -> Stroke {
        let mut stroke = Stroke::new(StrokeKind::Redact, 10.0, Rgba::BLACK);
        stroke.push(DocPoint::new(100.0, 100.0));
        stroke.push(DocPoint::new(100.0, 100.0));
        stroke.push(DocPoint::new(200.0, 120.0));
        stroke
    }

    #[test]
    fn repeated_points_are_collapsed() {
        assert_eq!(sample_stroke().points.len(), 2);
    }

    #[test]
    fn segment_regions_are_grown_by_half_width() {
        let regions = sample_stroke().regions();
        assert_eq!(
            regions,
            vec![DocRect { x0: 95.0, y0: 95.0, x1: 205.0, y1: 125.0 }]
        );

        let mut dot = Stroke::new(StrokeKind::Redact, 4.0, Rgba::BLACK);
        dot.push(DocPoint::new(10.0, 10.0));
        assert_eq!(dot.regions(), vec![DocRect { x0: 8.0, y0: 8.0, x1: 12.0, y1: 12.0 }]);
    }

    #[test]
    fn redact_rect_covers_exactly_the_rectangle() {
        let rect = DocRect { x0: 100.0, y0: 700.0, x1: 250.0, y1: 715.0 };
        let stroke = Stroke::redact_rect(rect);
        assert_eq!(stroke.bounds(), Some(rect));
    }

    #[test]
    fn invalid_records_are_rejected() {
        let empty = Stroke::new(StrokeKind::Highlight, 10.0, Rgba::YELLOW);
        assert!(empty.validate().is_err());

        let mut thin = sample_stroke();
        thin.width = 0.0;
        assert!(thin.validate().is_err());

        let mut nan = sample_stroke();
        nan.points.push(DocPoint::new(f64::NAN, 1.0));
        assert!(nan.validate().is_err());

        assert!(Annotation::text(DocPoint::new(1.0, 1.0), "  ", 12.0).validate().is_err());
        assert!(Annotation::rect(DocPoint::new(1.0, 1.0), -5.0, 3.0).validate().is_err());
    }

    #[test]
    fn edit_file_json_shape() {
        let pages = vec![
            PageEdits::default(),
            PageEdits {
                strokes: vec![sample_stroke()],
                annotations: vec![Annotation::text(DocPoint::new(72.0, 720.0), "Attn: HR", 14.0)],
                excluded: false,
            },
            PageEdits {
                excluded: true,
                ..Default::default()
            },
        ];
        let file = EditFile::from_pages(DocumentId::from("lease.pdf"), &pages);
        assert_eq!(file.pages.len(), 2);
        assert_eq!(file.pages[0].page_index, 1);

        let json = file.to_json().expect("serialise");
        assert!(json.contains("\"kind\": \"redact\""));
        assert!(json.contains("\"type\": \"text\""));
        assert!(json.contains("#000000"));

        let back = EditFile::from_json(&json, 3).expect("parse");
        assert_eq!(back, file);
    }

    #[test]
    fn edit_file_rejects_unknown_version_and_bad_pages() {
        let mut file = EditFile::from_pages(
            DocumentId::from("a.pdf"),
            &[PageEdits {
                excluded: true,
                ..Default::default()
            }],
        );
        assert!(file.validate(1).is_ok());
        assert!(matches!(
            file.validate(0),
            Err(FaxkitError::PageOutOfRange { page: 0, page_count: 0 })
        ));

        file.version = 99;
        let json = file.to_json().expect("serialise");
        assert!(matches!(
            EditFile::from_json(&json, 1),
            Err(FaxkitError::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn malformed_stroke_in_file_is_rejected() {
        let json = r##"{
            "version": 1,
            "document": "a.pdf",
            "saved_at": "2026-01-01T00:00:00Z",
            "pages": [{ "page_index": 0, "strokes": [
                { "kind": "redact", "points": [], "width": 10.0, "color": "#000000" }
            ]}]
        }"##;
        assert!(matches!(
            EditFile::from_json(json, 1),
            Err(FaxkitError::InvalidEdit(_))
        ));

        let unknown_kind = json.replace("redact", "erase");
        assert!(matches!(
            EditFile::from_json(&unknown_kind, 1),
            Err(FaxkitError::Serialization(_))
        ));
    }

    #[test]
    fn trivial_pages() {
        assert!(PageEdits::default().is_trivial());
        let excluded = PageEdits {
            excluded: true,
            ..Default::default()
        };
        assert!(!excluded.is_trivial());
        assert!(!excluded.has_marks());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("edits.json");
        let file = EditFile::from_pages(
            DocumentId::from("a.pdf"),
            &[PageEdits {
                strokes: vec![sample_stroke()],
                ..Default::default()
            }],
        );
        file.save(&path).expect("save");
        assert_eq!(EditFile::load(&path, 1).expect("load"), file);
    }
}

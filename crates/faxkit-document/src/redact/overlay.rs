// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Burned-in marks: redaction boxes, highlight strokes and annotations, written
// as content operations appended after the page's own content.

use faxkit_core::{DocPoint, Rgba};
use faxkit_edit::{Annotation, AnnotationKind, PageEdits, Stroke, StrokeKind};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, StringFormat, dictionary};

use super::stream::NewObjects;

/// Line height of multi-line text annotations, in units of font size.
const TEXT_LEADING: f64 = 1.2;

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn colour(rgba: Rgba) -> Vec<Object> {
    rgba.unit_rgb().iter().map(|c| Object::Real(*c)).collect()
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

/// Text as single-byte WinAnsi codes. Characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Builds overlay operations for one page, registering the graphics state and
/// font resources they need.
pub(crate) struct Overlay<'a> {
    doc: &'a Document,
    objects: &'a mut NewObjects,
    resources: &'a mut Dictionary,
    /// Page-space position of the edit-space origin.
    origin: DocPoint,
    highlight_opacity: f64,
    highlight_state: Option<Vec<u8>>,
    font: Option<Vec<u8>>,
}

impl<'a> Overlay<'a> {
    pub fn new(
        doc: &'a Document,
        objects: &'a mut NewObjects,
        resources: &'a mut Dictionary,
        origin: DocPoint,
        highlight_opacity: f64,
    ) -> Self {
        Self {
            doc,
            objects,
            resources,
            origin,
            highlight_opacity: highlight_opacity.clamp(0.0, 1.0),
            highlight_state: None,
            font: None,
        }
    }

    fn x(&self, x: f64) -> f64 {
        x + self.origin.x
    }

    fn y(&self, y: f64) -> f64 {
        y + self.origin.y
    }

    /// Operations drawing every mark in `edits`: redactions first, then
    /// highlights, then annotations.
    pub fn operations(&mut self, edits: &PageEdits) -> Vec<Operation> {
        let mut ops = Vec::new();
        for stroke in edits.strokes.iter().filter(|s| s.kind == StrokeKind::Redact) {
            ops.extend(self.redaction(stroke));
        }
        for stroke in edits.strokes.iter().filter(|s| s.kind == StrokeKind::Highlight) {
            ops.extend(self.highlight(stroke));
        }
        for annotation in &edits.annotations {
            ops.extend(self.annotation(annotation));
        }
        ops
    }

    fn redaction(&self, stroke: &Stroke) -> Vec<Operation> {
        let mut ops = vec![op("q", vec![]), op("rg", colour(stroke.color.with_alpha(255)))];
        for region in stroke.regions() {
            ops.push(op(
                "re",
                vec![
                    real(self.x(region.x0)),
                    real(self.y(region.y0)),
                    real(region.width()),
                    real(region.height()),
                ],
            ));
        }
        ops.push(op("f", vec![]));
        ops.push(op("Q", vec![]));
        ops
    }

    fn highlight(&mut self, stroke: &Stroke) -> Vec<Operation> {
        let Some(first) = stroke.points.first() else {
            return Vec::new();
        };
        let state = self.highlight_state();
        let mut ops = vec![
            op("q", vec![]),
            op("gs", vec![Object::Name(state)]),
            op("RG", colour(stroke.color)),
            op("w", vec![real(stroke.width)]),
            op("J", vec![1.into()]),
            op("j", vec![1.into()]),
            op("m", vec![real(self.x(first.x)), real(self.y(first.y))]),
        ];
        // A lone point still needs a segment for the round cap to show.
        let rest = if stroke.points.len() == 1 { &stroke.points[..] } else { &stroke.points[1..] };
        for point in rest {
            ops.push(op("l", vec![real(self.x(point.x)), real(self.y(point.y))]));
        }
        ops.push(op("S", vec![]));
        ops.push(op("Q", vec![]));
        ops
    }

    fn annotation(&mut self, annotation: &Annotation) -> Vec<Operation> {
        let (x, y) = (self.x(annotation.anchor.x), self.y(annotation.anchor.y));
        let color = annotation.style.color;
        match &annotation.kind {
            AnnotationKind::Rect { width, height } => vec![
                op("q", vec![]),
                op("RG", colour(color)),
                op("w", vec![real(annotation.style.line_width)]),
                op("re", vec![real(x), real(y), real(*width), real(*height)]),
                op("S", vec![]),
                op("Q", vec![]),
            ],
            AnnotationKind::Text { text, font_size } => {
                let font = self.font();
                let mut ops = vec![
                    op("q", vec![]),
                    op("BT", vec![]),
                    op("Tf", vec![Object::Name(font), real(*font_size)]),
                    op("TL", vec![real(font_size * TEXT_LEADING)]),
                    op("rg", colour(color)),
                    op("Td", vec![real(x), real(y)]),
                ];
                for (i, line) in text.lines().enumerate() {
                    if i > 0 {
                        ops.push(op("T*", vec![]));
                    }
                    ops.push(op(
                        "Tj",
                        vec![Object::String(win_ansi(line), StringFormat::Literal)],
                    ));
                }
                ops.push(op("ET", vec![]));
                ops.push(op("Q", vec![]));
                ops
            }
        }
    }

    fn highlight_state(&mut self) -> Vec<u8> {
        if let Some(name) = &self.highlight_state {
            return name.clone();
        }
        let alpha = real(self.highlight_opacity);
        let state = dictionary! {
            "Type" => "ExtGState",
            "ca" => alpha.clone(),
            "CA" => alpha,
        };
        let name = self
            .objects
            .add_resource(self.doc, self.resources, b"ExtGState", Object::Dictionary(state));
        self.highlight_state = Some(name.clone());
        name
    }

    fn font(&mut self) -> Vec<u8> {
        if let Some(name) = &self.font {
            return name.clone();
        }
        let font = self.objects.add(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let name = self
            .objects
            .add_resource(self.doc, self.resources, b"Font", Object::Reference(font));
        self.font = Some(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faxkit_core::DocRect;

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn redaction_boxes_are_opaque_fills() {
        let doc = Document::with_version("1.5");
        let mut objects = NewObjects::new(&doc);
        let mut resources = Dictionary::new();
        let mut overlay = Overlay::new(&doc, &mut objects, &mut resources, DocPoint::new(0.0, 0.0), 0.5);
        let edits = PageEdits {
            strokes: vec![Stroke::redact_rect(DocRect { x0: 10.0, y0: 10.0, x1: 50.0, y1: 20.0 })],
            ..PageEdits::default()
        };
        let ops = overlay.operations(&edits);
        assert_eq!(operators(&ops), vec!["q", "rg", "re", "f", "Q"]);
        assert!(resources.is_empty());
    }

    #[test]
    fn highlights_and_text_register_resources_once() {
        let doc = Document::with_version("1.5");
        let mut objects = NewObjects::new(&doc);
        let mut resources = Dictionary::new();
        let mut highlight = Stroke::new(StrokeKind::Highlight, 8.0, Rgba::YELLOW);
        highlight.push(DocPoint::new(10.0, 10.0));
        highlight.push(DocPoint::new(60.0, 10.0));
        let edits = PageEdits {
            strokes: vec![highlight.clone(), highlight],
            annotations: vec![
                Annotation::text(DocPoint::new(20.0, 100.0), "Sign here\nthanks €", 12.0),
                Annotation::text(DocPoint::new(20.0, 50.0), "again", 12.0),
            ],
            excluded: false,
        };
        let ops = {
            let mut overlay =
                Overlay::new(&doc, &mut objects, &mut resources, DocPoint::new(0.0, 0.0), 0.4);
            overlay.operations(&edits)
        };
        assert_eq!(ops.iter().filter(|op| op.operator == "Tj").count(), 3);

        let states = resources.get(b"ExtGState").and_then(Object::as_dict).expect("ExtGState");
        assert_eq!(states.len(), 1);
        let fonts = resources.get(b"Font").and_then(Object::as_dict).expect("Font");
        assert_eq!(fonts.len(), 1);

        let second_line = ops.iter().filter(|op| op.operator == "Tj").nth(1).expect("line");
        assert_eq!(
            second_line.operands[0],
            Object::String(b"thanks ?".to_vec(), StringFormat::Literal)
        );
    }

    #[test]
    fn marks_follow_the_page_origin() {
        let doc = Document::with_version("1.5");
        let mut objects = NewObjects::new(&doc);
        let mut resources = Dictionary::new();
        let mut overlay =
            Overlay::new(&doc, &mut objects, &mut resources, DocPoint::new(100.0, 50.0), 0.5);
        let edits = PageEdits {
            annotations: vec![Annotation::rect(DocPoint::new(10.0, 10.0), 5.0, 5.0)],
            ..PageEdits::default()
        };
        let ops = overlay.operations(&edits);
        let re = ops.iter().find(|op| op.operator == "re").expect("re");
        assert_eq!(re.operands[0], Object::Real(110.0));
        assert_eq!(re.operands[1], Object::Real(60.0));
    }
}

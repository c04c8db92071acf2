// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpreter.
//
// Tracks just enough graphics and text state to say, for every operation,
// what it puts on the page and where: glyph boxes for text, flattened outlines
// for paths, placement boxes for images and forms. All geometry is reported
// in page user space. The rasterizer, the redaction applier and region text
// extraction are all driven from here.

use std::collections::HashMap;

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DocPoint, DocRect, Rgba};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::warn;

use super::fonts::FontMetrics;

/// Form XObjects nested deeper than this are not entered.
pub const MAX_FORM_DEPTH: usize = 8;

/// Segments used to flatten one Bézier curve.
const CURVE_STEPS: usize = 8;

/// Glyph box extent below and above the baseline, in units of font size.
const GLYPH_DESCENT: f64 = 0.25;
const GLYPH_ASCENT: f64 = 0.9;

/// Advance used to keep interpreting past a glyph of unknown width.
const ESTIMATED_ADVANCE: f64 = 0.5;

static NULL: Object = Object::Null;

// -- Matrix -------------------------------------------------------------------

/// Affine transform `[a b c d e f]` applied to row vectors, as in PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Six numeric operands, as taken by `cm` and `Tm`.
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f64> = operands[..6].iter().filter_map(number).collect();
        (n.len() == 6).then(|| Self::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Bounding box of a transformed rectangle.
    pub fn transform_rect(&self, rect: &DocRect) -> DocRect {
        let corners = [
            self.apply(rect.x0, rect.y0),
            self.apply(rect.x1, rect.y0),
            self.apply(rect.x0, rect.y1),
            self.apply(rect.x1, rect.y1),
        ];
        bounds_of(corners.iter().copied()).unwrap_or(*rect)
    }

    /// Geometric mean of the axis scale factors.
    pub fn scale_factor(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

pub const UNIT_SQUARE: DocRect = DocRect {
    x0: 0.0,
    y0: 0.0,
    x1: 1.0,
    y1: 1.0,
};

fn bounds_of(points: impl Iterator<Item = (f64, f64)>) -> Option<DocRect> {
    points
        .map(|(x, y)| DocRect::from_corners(DocPoint::new(x, y), DocPoint::new(x, y)))
        .reduce(|acc, r| acc.union(&r))
}

// -- Object helpers -----------------------------------------------------------

pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

pub fn name_of(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Follow indirect references. Dangling references resolve to `null`.
pub fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..32 {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => obj = next,
                Err(_) => return &NULL,
            },
            other => return other,
        }
    }
    &NULL
}

/// Resolve to a dictionary (a stream's dictionary counts).
pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Read a rectangle array such as /MediaBox or /BBox.
pub fn rect_of(doc: &Document, obj: &Object) -> Option<DocRect> {
    let Object::Array(items) = resolve(doc, obj) else {
        return None;
    };
    let n: Vec<f64> = items
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    (n.len() == 4).then(|| {
        DocRect::from_corners(DocPoint::new(n[0], n[1]), DocPoint::new(n[2], n[3]))
    })
}

/// Look up a page attribute, following the page tree for inheritable keys.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve_dict(doc, parent)?;
    }
    None
}

/// The page's effective resource dictionary, detached from the document.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited(doc, page_id, b"Resources")
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
        .unwrap_or_default()
}

/// Stream payload with filters removed.
pub fn stream_data(stream: &Stream) -> Result<Vec<u8>> {
    stream
        .get_plain_content()
        .map_err(|err| FaxkitError::PdfError(format!("cannot decode stream: {err}")))
}

pub fn decode_operations(bytes: &[u8]) -> Result<Vec<Operation>> {
    Content::decode(bytes)
        .map(|content| content.operations)
        .map_err(|err| FaxkitError::PdfError(format!("cannot parse content stream: {err}")))
}

/// Serialise operations, writing inline images (`BI` with a stream operand)
/// back in `BI ... ID ... EI` form.
pub fn encode_operations(ops: &[Operation]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, op) in ops.iter().enumerate() {
        if op.operator == "BI" {
            encode_plain(&mut out, &ops[start..i])?;
            encode_inline_image(&mut out, op)?;
            start = i + 1;
        }
    }
    encode_plain(&mut out, &ops[start..])?;
    Ok(out)
}

fn encode_plain(out: &mut Vec<u8>, ops: &[Operation]) -> Result<()> {
    if ops.is_empty() {
        return Ok(());
    }
    let bytes = Content { operations: ops }
        .encode()
        .map_err(|err| FaxkitError::PdfError(format!("cannot encode content: {err}")))?;
    out.extend_from_slice(&bytes);
    out.push(b'\n');
    Ok(())
}

fn encode_inline_image(out: &mut Vec<u8>, op: &Operation) -> Result<()> {
    let Some(Object::Stream(image)) = op.operands.first() else {
        warn!("dropping malformed inline image");
        return Ok(());
    };
    let entries: Vec<Object> = image
        .dict
        .iter()
        .filter(|(key, _)| key.as_slice() != b"Length")
        .flat_map(|(key, value)| [Object::Name(key.clone()), value.clone()])
        .collect();
    out.extend_from_slice(b"BI\n");
    encode_plain(out, &[Operation::new("ID", entries)])?;
    // Exactly one whitespace byte separates ID from the sample data.
    out.pop();
    out.push(b' ');
    out.extend_from_slice(&image.content);
    out.extend_from_slice(b"\nEI\n");
    Ok(())
}

// -- State --------------------------------------------------------------------

/// Text state parameters (part of the graphics state).
#[derive(Debug, Clone, PartialEq)]
pub struct TextParams {
    pub font: Option<Vec<u8>>,
    pub size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz / 100`.
    pub horizontal_scale: f64,
    pub leading: f64,
    pub rise: f64,
    pub render_mode: i64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    line_width: f64,
    fill: Rgba,
    stroke: Rgba,
    text: TextParams,
}

/// A subpath flattened to user-space points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subpath {
    pub points: Vec<(f64, f64)>,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct PathBuilder {
    subpaths: Vec<Subpath>,
    current: Option<(f64, f64)>,
    clip: bool,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f64, f64)) {
        self.subpaths.push(Subpath {
            points: vec![p],
            closed: false,
        });
        self.current = Some(p);
    }

    fn line_to(&mut self, p: (f64, f64)) {
        match self.subpaths.last_mut() {
            Some(sub) if !sub.closed => sub.points.push(p),
            _ => {
                let start = self.current.unwrap_or(p);
                self.subpaths.push(Subpath {
                    points: vec![start, p],
                    closed: false,
                });
            }
        }
        self.current = Some(p);
    }

    fn curve_to(&mut self, c1: (f64, f64), c2: (f64, f64), end: (f64, f64)) {
        let start = self.current.unwrap_or(c1);
        for step in 1..=CURVE_STEPS {
            let t = step as f64 / CURVE_STEPS as f64;
            let u = 1.0 - t;
            let x = u * u * u * start.0 + 3.0 * u * u * t * c1.0 + 3.0 * u * t * t * c2.0 + t * t * t * end.0;
            let y = u * u * u * start.1 + 3.0 * u * u * t * c1.1 + 3.0 * u * t * t * c2.1 + t * t * t * end.1;
            self.line_to((x, y));
        }
    }

    fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            sub.closed = true;
            self.current = sub.points.first().copied();
        }
    }

    fn take(&mut self) -> (Vec<Subpath>, bool) {
        let clip = std::mem::take(&mut self.clip);
        self.current = None;
        (std::mem::take(&mut self.subpaths), clip)
    }
}

// -- Events -------------------------------------------------------------------

/// One shown glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Index of the string operand (within a `TJ` array) the glyph came from.
    pub element: usize,
    pub bytes: Vec<u8>,
    pub code: u32,
    /// Horizontal text-space advance, including spacing and scaling.
    pub displacement: f64,
    pub bbox: DocRect,
    pub ch: char,
}

impl Glyph {
    pub fn is_blank(&self) -> bool {
        self.ch.is_whitespace()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextShow {
    pub glyphs: Vec<Glyph>,
    /// Font resource name from `Tf`.
    pub font: Option<Vec<u8>>,
    /// False when some glyph advance had to be estimated, in which case the
    /// glyph boxes from that glyph on are not trustworthy.
    pub measured: bool,
    pub font_size: f64,
    pub horizontal_scale: f64,
    pub render_mode: i64,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintedPath {
    pub subpaths: Vec<Subpath>,
    pub fill: bool,
    pub stroke: bool,
    pub even_odd: bool,
    pub clip: bool,
    /// Stroke width in page units.
    pub line_width: f64,
    pub fill_color: Rgba,
    pub stroke_color: Rgba,
}

impl PaintedPath {
    pub fn paints(&self) -> bool {
        self.fill || self.stroke
    }

    pub fn bounds(&self) -> Option<DocRect> {
        bounds_of(self.subpaths.iter().flat_map(|s| s.points.iter().copied()))
            .map(|r| if self.stroke { r.inflate(self.line_width / 2.0) } else { r })
    }

    /// Whether the painted path puts anything inside `region`: an edge
    /// passing through it, or a fill whose interior covers it.
    pub fn touches(&self, region: &DocRect) -> bool {
        if !self.paints() {
            return false;
        }
        let grow = if self.stroke { self.line_width / 2.0 } else { 0.0 };
        let edge_inside = self.subpaths.iter().any(|sub| {
            let closes = sub.closed || self.fill;
            segments(&sub.points, closes).any(|(p, q)| {
                DocRect::from_corners(DocPoint::new(p.0, p.1), DocPoint::new(q.0, q.1))
                    .inflate(grow)
                    .intersects(region)
            })
        });
        // With no edge inside, the region is either wholly inside the fill or
        // wholly outside it, so its centre decides.
        edge_inside
            || (self.fill
                && self.fills_point((region.x0 + region.x1) / 2.0, (region.y0 + region.y1) / 2.0))
    }

    /// Point-in-fill test under the path's winding rule.
    pub fn fills_point(&self, x: f64, y: f64) -> bool {
        let mut winding = 0i32;
        let mut crossings = 0u32;
        for sub in &self.subpaths {
            for ((x0, y0), (x1, y1)) in segments(&sub.points, true) {
                if (y0 <= y) == (y1 <= y) {
                    continue;
                }
                let at = x0 + (y - y0) / (y1 - y0) * (x1 - x0);
                if at > x {
                    crossings += 1;
                    winding += if y1 > y0 { 1 } else { -1 };
                }
            }
        }
        if self.even_odd {
            crossings % 2 == 1
        } else {
            winding != 0
        }
    }
}

/// Consecutive point pairs, plus the closing edge when requested. A lone
/// point yields a degenerate segment.
pub fn segments(
    points: &[(f64, f64)],
    closed: bool,
) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
    let single = (points.len() == 1).then(|| (points[0], points[0]));
    let closing = (closed && points.len() > 2).then(|| (points[points.len() - 1], points[0]));
    points
        .windows(2)
        .map(|w| (w[0], w[1]))
        .chain(single)
        .chain(closing)
}

/// A placed image or form XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct XObjectDraw {
    pub name: Vec<u8>,
    pub id: Option<ObjectId>,
    /// Maps the object's own space to page space.
    pub matrix: Matrix,
    pub bbox: DocRect,
}

/// What an operation put on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// State change, path construction, or nothing visible.
    None,
    Text(TextShow),
    Path(PaintedPath),
    Image(XObjectDraw),
    Form(XObjectDraw),
    InlineImage(DocRect),
    Shading,
}

// -- Interpreter --------------------------------------------------------------

pub struct Interpreter<'a> {
    doc: &'a Document,
    resources: Dictionary,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    path: PathBuilder,
    fonts: HashMap<Vec<u8>, FontMetrics>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, resources: Dictionary, ctm: Matrix) -> Self {
        Self {
            doc,
            resources,
            state: GraphicsState {
                ctm,
                line_width: 1.0,
                fill: Rgba::BLACK,
                stroke: Rgba::BLACK,
                text: TextParams::default(),
            },
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            path: PathBuilder::default(),
            fonts: HashMap::new(),
        }
    }

    pub fn resources(&self) -> &Dictionary {
        &self.resources
    }

    pub fn ctm(&self) -> Matrix {
        self.state.ctm
    }

    pub fn text_params(&self) -> &TextParams {
        &self.state.text
    }

    /// Interpret one operation.
    pub fn step(&mut self, op: &Operation) -> Event {
        let args = op.operands.as_slice();
        let num = |i: usize| args.get(i).and_then(number);
        match op.operator.as_str() {
            // Graphics state
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "w" => {
                if let Some(w) = num(0) {
                    self.state.line_width = w;
                }
            }

            // Colour
            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(colour) = colour_of(args) {
                    self.state.fill = colour;
                }
            }
            "G" | "RG" | "K" | "SC" | "SCN" => {
                if let Some(colour) = colour_of(args) {
                    self.state.stroke = colour;
                }
            }
            "cs" => self.state.fill = Rgba::BLACK,
            "CS" => self.state.stroke = Rgba::BLACK,

            // Text objects and state
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                self.state.text.font = args.first().and_then(name_of).map(<[u8]>::to_vec);
                if let Some(size) = num(1) {
                    self.state.text.size = size;
                }
            }
            "Tc" => self.state.text.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.text.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.text.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.text.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.text.rise = num(0).unwrap_or(0.0),
            "Tr" => self.state.text.render_mode = num(0).unwrap_or(0.0) as i64,
            "Td" => self.next_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
            "TD" => {
                let ty = num(1).unwrap_or(0.0);
                self.state.text.leading = -ty;
                self.next_line(num(0).unwrap_or(0.0), ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.text.leading),

            // Text showing
            "Tj" => return self.show(&args[..args.len().min(1)]),
            "TJ" => {
                if let Some(Object::Array(items)) = args.first() {
                    return self.show(items);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.text.leading);
                return self.show(&args[..args.len().min(1)]);
            }
            "\"" => {
                self.state.text.word_spacing = num(0).unwrap_or(0.0);
                self.state.text.char_spacing = num(1).unwrap_or(0.0);
                self.next_line(0.0, -self.state.text.leading);
                if let Some(text) = args.get(2) {
                    return self.show(std::slice::from_ref(text));
                }
            }

            // Path construction
            "m" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.path.move_to(self.state.ctm.apply(x, y));
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.path.line_to(self.state.ctm.apply(x, y));
                }
            }
            "c" => {
                let n: Vec<f64> = args.iter().filter_map(number).collect();
                if n.len() >= 6 {
                    let ctm = self.state.ctm;
                    self.path.curve_to(ctm.apply(n[0], n[1]), ctm.apply(n[2], n[3]), ctm.apply(n[4], n[5]));
                }
            }
            "v" => {
                let n: Vec<f64> = args.iter().filter_map(number).collect();
                if n.len() >= 4 {
                    let ctm = self.state.ctm;
                    let c1 = self.path.current.unwrap_or(ctm.apply(n[0], n[1]));
                    self.path.curve_to(c1, ctm.apply(n[0], n[1]), ctm.apply(n[2], n[3]));
                }
            }
            "y" => {
                let n: Vec<f64> = args.iter().filter_map(number).collect();
                if n.len() >= 4 {
                    let ctm = self.state.ctm;
                    let end = ctm.apply(n[2], n[3]);
                    self.path.curve_to(ctm.apply(n[0], n[1]), end, end);
                }
            }
            "h" => self.path.close(),
            "re" => {
                let n: Vec<f64> = args.iter().filter_map(number).collect();
                if n.len() >= 4 {
                    let (x, y, w, h) = (n[0], n[1], n[2], n[3]);
                    let ctm = self.state.ctm;
                    self.path.move_to(ctm.apply(x, y));
                    self.path.line_to(ctm.apply(x + w, y));
                    self.path.line_to(ctm.apply(x + w, y + h));
                    self.path.line_to(ctm.apply(x, y + h));
                    self.path.close();
                }
            }
            "W" | "W*" => self.path.clip = true,

            // Path painting
            "S" => return self.paint(false, true, false, false),
            "s" => return self.paint(false, true, false, true),
            "f" | "F" => return self.paint(true, false, false, false),
            "f*" => return self.paint(true, false, true, false),
            "B" => return self.paint(true, true, false, false),
            "B*" => return self.paint(true, true, true, false),
            "b" => return self.paint(true, true, false, true),
            "b*" => return self.paint(true, true, true, true),
            "n" => return self.paint(false, false, false, false),

            // External objects
            "Do" => {
                if let Some(name) = args.first().and_then(name_of) {
                    return self.place_xobject(name);
                }
            }
            "BI" => return Event::InlineImage(self.state.ctm.transform_rect(&UNIT_SQUARE)),
            "sh" => return Event::Shading,

            _ => {}
        }
        Event::None
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn paint(&mut self, fill: bool, stroke: bool, even_odd: bool, close: bool) -> Event {
        if close {
            self.path.close();
        }
        let (subpaths, clip) = self.path.take();
        Event::Path(PaintedPath {
            subpaths,
            fill,
            stroke,
            even_odd,
            clip,
            line_width: (self.state.line_width * self.state.ctm.scale_factor()).max(0.0),
            fill_color: self.state.fill,
            stroke_color: self.state.stroke,
        })
    }

    fn show(&mut self, elements: &[Object]) -> Event {
        let params = self.state.text.clone();
        let metrics = self.font_metrics(params.font.as_deref());
        let fs = params.size;
        let th = params.horizontal_scale;
        let (descent, ascent) = metrics
            .vertical_extent()
            .unwrap_or((-GLYPH_DESCENT, GLYPH_ASCENT));
        let mut measured = true;
        let mut glyphs = Vec::new();

        for (element, item) in elements.iter().enumerate() {
            match item {
                Object::String(bytes, _) => {
                    for (code, range) in metrics.codes(bytes) {
                        let w0 = metrics.advance(code).unwrap_or_else(|| {
                            measured = false;
                            ESTIMATED_ADVANCE
                        });
                        let single_space = range.len() == 1 && bytes[range.start] == b' ';
                        let spacing =
                            params.char_spacing + if single_space { params.word_spacing } else { 0.0 };
                        let displacement = (w0 * fs + spacing) * th;

                        let extent = DocRect::from_corners(
                            DocPoint::new(0.0, params.rise + descent * fs),
                            DocPoint::new(w0 * fs * th, params.rise + ascent * fs),
                        );
                        let bbox = self.tm.then(&self.state.ctm).transform_rect(&extent);
                        glyphs.push(Glyph {
                            element,
                            bytes: bytes[range].to_vec(),
                            code,
                            displacement,
                            bbox,
                            ch: char::from_u32(code).unwrap_or('\u{FFFD}'),
                        });
                        self.tm = Matrix::translate(displacement, 0.0).then(&self.tm);
                    }
                }
                other => {
                    if let Some(adjust) = number(other) {
                        let tx = -adjust / 1000.0 * fs * th;
                        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                    }
                }
            }
        }

        Event::Text(TextShow {
            glyphs,
            font: params.font,
            measured,
            font_size: fs,
            horizontal_scale: th,
            render_mode: params.render_mode,
            color: self.state.fill,
        })
    }

    fn font_metrics(&mut self, name: Option<&[u8]>) -> FontMetrics {
        let Some(name) = name else {
            return FontMetrics::default();
        };
        if let Some(metrics) = self.fonts.get(name) {
            return metrics.clone();
        }
        let doc = self.doc;
        let metrics = self
            .resources
            .get(b"Font")
            .ok()
            .and_then(|fonts| resolve_dict(doc, fonts))
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|font| resolve_dict(doc, font))
            .map(|font| FontMetrics::from_dict(doc, font))
            .unwrap_or_default();
        self.fonts.insert(name.to_vec(), metrics.clone());
        metrics
    }

    /// Resolve an XObject resource by name.
    pub fn xobject(&self, name: &[u8]) -> Option<(Option<ObjectId>, &'a Stream)> {
        let doc = self.doc;
        let entry = self
            .resources
            .get(b"XObject")
            .ok()
            .and_then(|x| resolve_dict(doc, x))?
            .get(name)
            .ok()?;
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        match id.map(|id| doc.get_object(id)) {
            Some(Ok(Object::Stream(stream))) => Some((id, stream)),
            Some(_) => None,
            // Direct streams can only live inside a detached resource copy.
            None => None,
        }
    }

    fn place_xobject(&mut self, name: &[u8]) -> Event {
        let Some((id, stream)) = self.xobject(name) else {
            warn!(name = %String::from_utf8_lossy(name), "unresolved XObject");
            return Event::None;
        };
        let subtype = stream.dict.get(b"Subtype").ok().and_then(name_of);
        let ctm = self.state.ctm;
        match subtype {
            Some(b"Image") => Event::Image(XObjectDraw {
                name: name.to_vec(),
                id,
                matrix: ctm,
                bbox: ctm.transform_rect(&UNIT_SQUARE),
            }),
            Some(b"Form") => {
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| match resolve(self.doc, m) {
                        Object::Array(items) => Matrix::from_operands(items),
                        _ => None,
                    })
                    .unwrap_or(Matrix::IDENTITY);
                let matrix = form_matrix.then(&ctm);
                let local = stream
                    .dict
                    .get(b"BBox")
                    .ok()
                    .and_then(|b| rect_of(self.doc, b))
                    .unwrap_or(DocRect {
                        x0: -1.0e6,
                        y0: -1.0e6,
                        x1: 1.0e6,
                        y1: 1.0e6,
                    });
                Event::Form(XObjectDraw {
                    name: name.to_vec(),
                    id,
                    matrix,
                    bbox: matrix.transform_rect(&local),
                })
            }
            _ => Event::None,
        }
    }

    /// Operations and resources of a placed form.
    pub fn form_content(&self, draw: &XObjectDraw) -> Result<(Vec<Operation>, Dictionary)> {
        let (_, stream) = self.xobject(&draw.name).ok_or_else(|| {
            FaxkitError::PdfError(format!(
                "form {} is not available",
                String::from_utf8_lossy(&draw.name)
            ))
        })?;
        let ops = decode_operations(&stream_data(stream)?)?;
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(self.doc, r))
            .cloned()
            .unwrap_or_else(|| self.resources.clone());
        Ok((ops, resources))
    }
}

fn colour_of(args: &[Object]) -> Option<Rgba> {
    let n: Vec<f64> = args.iter().filter_map(number).collect();
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match n.len() {
        1 => {
            let g = channel(n[0]);
            Some(Rgba::opaque(g, g, g))
        }
        3 => Some(Rgba::opaque(channel(n[0]), channel(n[1]), channel(n[2]))),
        4 => {
            let k = 1.0 - n[3];
            Some(Rgba::opaque(
                channel((1.0 - n[0]) * k),
                channel((1.0 - n[1]) * k),
                channel((1.0 - n[2]) * k),
            ))
        }
        _ => None,
    }
}

// -- Walking ------------------------------------------------------------------

/// Interpret a page, descending into forms. `visit` sees every event along
/// with the form depth it occurred at.
pub fn walk_page(
    doc: &Document,
    page_id: ObjectId,
    visit: &mut dyn FnMut(&Event, usize),
) -> Result<()> {
    let ops = decode_operations(&page_content(doc, page_id)?)?;
    walk(doc, page_resources(doc, page_id), &ops, Matrix::IDENTITY, 0, visit)
}

/// All content streams of a page, decoded and joined. Fails on filters that
/// cannot be decoded rather than passing encoded bytes through.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    for id in doc.get_page_contents(page_id) {
        let stream = doc
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|err| FaxkitError::PdfError(format!("content stream {id:?}: {err}")))?;
        content.extend_from_slice(&stream_data(stream)?);
        content.push(b'\n');
    }
    Ok(content)
}

pub fn walk(
    doc: &Document,
    resources: Dictionary,
    ops: &[Operation],
    ctm: Matrix,
    depth: usize,
    visit: &mut dyn FnMut(&Event, usize),
) -> Result<()> {
    let mut interpreter = Interpreter::new(doc, resources, ctm);
    for op in ops {
        let event = interpreter.step(op);
        visit(&event, depth);
        if let Event::Form(draw) = &event {
            if depth + 1 >= MAX_FORM_DEPTH {
                warn!(depth, "form nesting too deep, not descending");
                continue;
            }
            let (form_ops, form_resources) = interpreter.form_content(draw)?;
            walk(doc, form_resources, &form_ops, draw.matrix, depth + 1, visit)?;
        }
    }
    Ok(())
}

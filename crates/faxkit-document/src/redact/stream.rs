// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream rewriting for redaction.
//
// Operations are replayed through the interpreter; anything whose painted
// geometry meets a redaction region is removed from the operation list:
// - glyphs are replaced by equivalent TJ spacing, so neighbours keep position
// - paths are dropped (clipping paths survive as clip-only `n`)
// - images are dropped or blacked out pixel by pixel
// - inline images are dropped
// - forms that are hit are cloned and rewritten recursively
// Marked-content sequences that lost content also lose their replacement
// text (`/ActualText`, `/Alt`, `/E`).
//
// Shadings (`sh`) are kept: they carry no text and are bounded by the clip
// in effect, which is preserved.

use std::collections::HashSet;

use faxkit_core::config::PartialImagePolicy;
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::DocRect;
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::image::blackout;
use crate::pdf::content::{
    Event, Interpreter, MAX_FORM_DEPTH, Matrix, TextShow, encode_operations, name_of, number,
    resolve_dict, walk,
};

/// Marked-content properties that can leak the text they describe.
const REPLACEMENT_TEXT_KEYS: [&[u8]; 3] = [b"ActualText", b"Alt", b"E"];

const PATH_CONSTRUCTION: [&str; 9] = ["m", "l", "c", "v", "y", "h", "re", "W", "W*"];

// -- New objects --------------------------------------------------------------

/// Objects created while the source document is borrowed, inserted afterwards.
pub(crate) struct NewObjects {
    next: u32,
    pending: Vec<(ObjectId, Object)>,
    names: usize,
}

impl NewObjects {
    pub fn new(doc: &Document) -> Self {
        Self {
            next: doc.max_id + 1,
            pending: Vec::new(),
            names: 0,
        }
    }

    pub fn add(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = (self.next, 0);
        self.next += 1;
        self.pending.push((id, object.into()));
        id
    }

    pub fn commit(&mut self, doc: &mut Document) {
        for (id, object) in self.pending.drain(..) {
            doc.objects.insert(id, object);
        }
        doc.max_id = doc.max_id.max(self.next - 1);
    }

    /// Store `value` under an unused name in a resource category, making the
    /// category a direct dictionary.
    pub fn add_resource(
        &mut self,
        doc: &Document,
        resources: &mut Dictionary,
        category: &[u8],
        value: Object,
    ) -> Vec<u8> {
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .cloned()
            .unwrap_or_default();
        let name = loop {
            self.names += 1;
            let candidate = format!("FxR{}", self.names).into_bytes();
            if !entries.has(&candidate) {
                break candidate;
            }
        };
        entries.set(name.clone(), value);
        resources.set(category.to_vec(), Object::Dictionary(entries));
        name
    }
}

// -- Rewriting ----------------------------------------------------------------

/// Result of rewriting one operation list.
pub(crate) struct Rewritten {
    pub ops: Vec<Operation>,
    pub resources: Dictionary,
    pub changed: bool,
}

struct Marked {
    index: usize,
    touched: bool,
}

pub(crate) struct Redactor<'a> {
    doc: &'a Document,
    regions: &'a [DocRect],
    policy: PartialImagePolicy,
    pub objects: NewObjects,
    /// Images produced by pixel blackout; their content is already clean.
    pub sanitized: HashSet<ObjectId>,
}

impl<'a> Redactor<'a> {
    pub fn new(doc: &'a Document, regions: &'a [DocRect], policy: PartialImagePolicy) -> Self {
        Self {
            doc,
            regions,
            policy,
            objects: NewObjects::new(doc),
            sanitized: HashSet::new(),
        }
    }

    fn hits(&self, rect: &DocRect) -> bool {
        self.regions.iter().any(|r| r.intersects(rect))
    }

    /// Rewrite `ops`, drawn with `ctm` and `resources`, at form depth `depth`.
    pub fn rewrite(
        &mut self,
        ops: &[Operation],
        resources: Dictionary,
        ctm: Matrix,
        depth: usize,
    ) -> Result<Rewritten> {
        let doc = self.doc;
        let mut interpreter = Interpreter::new(doc, resources.clone(), ctm);
        let mut out_resources = resources;
        let mut out: Vec<Operation> = Vec::with_capacity(ops.len());
        let mut path: Vec<Operation> = Vec::new();
        let mut marked: Vec<Marked> = Vec::new();
        let mut replaced: HashSet<Vec<u8>> = HashSet::new();
        let mut changed = false;

        for op in ops {
            let event = interpreter.step(op);
            let removed = match event {
                Event::None => {
                    match op.operator.as_str() {
                        name if PATH_CONSTRUCTION.contains(&name) => path.push(op.clone()),
                        "BDC" | "BMC" => {
                            marked.push(Marked {
                                index: out.len(),
                                touched: false,
                            });
                            out.push(op.clone());
                        }
                        "EMC" => {
                            if let Some(seq) = marked.pop()
                                && seq.touched
                            {
                                scrub_marked(doc, &mut out[seq.index], &out_resources);
                            }
                            out.push(op.clone());
                        }
                        _ => out.push(op.clone()),
                    }
                    false
                }
                Event::Path(painted) => {
                    let hit = self.regions.iter().any(|r| painted.touches(r));
                    if !hit {
                        out.append(&mut path);
                        out.push(op.clone());
                    } else if painted.clip {
                        out.append(&mut path);
                        out.push(Operation::new("n", vec![]));
                    } else {
                        path.clear();
                    }
                    hit
                }
                Event::Text(show) => {
                    if !show.measured {
                        return Err(unmeasured(&show));
                    }
                    if show.glyphs.iter().any(|g| self.hits(&g.bbox)) {
                        out.extend(self.rewrite_text(op, &show));
                        true
                    } else {
                        out.push(op.clone());
                        false
                    }
                }
                Event::Image(draw) => {
                    if !self.hits(&draw.bbox) {
                        out.push(op.clone());
                        false
                    } else if self.regions.iter().any(|r| r.contains_rect(&draw.bbox)) {
                        debug!(name = %String::from_utf8_lossy(&draw.name), "image removed");
                        replaced.insert(draw.name.clone());
                        true
                    } else {
                        replaced.insert(draw.name.clone());
                        let Some((_, image)) = interpreter.xobject(&draw.name) else {
                            return Err(FaxkitError::PdfError(format!(
                                "image {} is not available",
                                String::from_utf8_lossy(&draw.name)
                            )));
                        };
                        match blackout(doc, image, &draw.matrix, self.regions) {
                            Ok(cleaned) => {
                                let id = self.objects.add(cleaned);
                                self.sanitized.insert(id);
                                let name = self.objects.add_resource(
                                    doc,
                                    &mut out_resources,
                                    b"XObject",
                                    Object::Reference(id),
                                );
                                out.push(Operation::new("Do", vec![Object::Name(name)]));
                            }
                            Err(reason) => match self.policy {
                                PartialImagePolicy::Fail => {
                                    return Err(FaxkitError::PdfError(format!(
                                        "image {} is partly covered and cannot be cleaned: {reason}",
                                        String::from_utf8_lossy(&draw.name)
                                    )));
                                }
                                PartialImagePolicy::DropImage => {
                                    warn!(
                                        name = %String::from_utf8_lossy(&draw.name),
                                        %reason,
                                        "partly covered image dropped"
                                    );
                                }
                            },
                        }
                        true
                    }
                }
                Event::InlineImage(bbox) => {
                    let hit = self.hits(&bbox);
                    if !hit {
                        out.push(op.clone());
                    }
                    hit
                }
                Event::Form(draw) => {
                    if !self.hits(&draw.bbox) {
                        out.push(op.clone());
                        false
                    } else {
                        if depth + 1 >= MAX_FORM_DEPTH {
                            return Err(FaxkitError::PdfError(
                                "forms are nested too deeply to redact".into(),
                            ));
                        }
                        let (form_ops, form_resources) = interpreter.form_content(&draw)?;
                        let inner = self.rewrite(&form_ops, form_resources, draw.matrix, depth + 1)?;
                        if inner.changed {
                            let Some((_, original)) = interpreter.xobject(&draw.name) else {
                                return Err(FaxkitError::PdfError("form disappeared".into()));
                            };
                            replaced.insert(draw.name.clone());
                            let mut dict = original.dict.clone();
                            for key in [&b"Filter"[..], b"DecodeParms", b"Length"] {
                                dict.remove(key);
                            }
                            dict.set("Resources", Object::Dictionary(inner.resources));
                            let mut form = Stream::new(dict, encode_operations(&inner.ops)?);
                            let _ = form.compress();
                            let id = self.objects.add(form);
                            let name = self.objects.add_resource(
                                doc,
                                &mut out_resources,
                                b"XObject",
                                Object::Reference(id),
                            );
                            out.push(Operation::new("Do", vec![Object::Name(name)]));
                        } else {
                            out.push(op.clone());
                        }
                        inner.changed
                    }
                }
                Event::Shading => {
                    out.push(op.clone());
                    false
                }
            };
            if removed {
                changed = true;
                for seq in &mut marked {
                    seq.touched = true;
                }
            }
        }
        // A dangling path without a painting operator paints nothing.
        out.append(&mut path);
        if !replaced.is_empty() {
            drop_xobjects(doc, &mut out_resources, &replaced, &out);
        }

        Ok(Rewritten {
            ops: out,
            resources: out_resources,
            changed,
        })
    }

    /// Replace hit glyphs with the equivalent positioning adjustment.
    fn rewrite_text(&self, op: &Operation, show: &TextShow) -> Vec<Operation> {
        let args = &op.operands;
        let mut out = Vec::new();
        let elements: &[Object] = match op.operator.as_str() {
            "TJ" => match args.first() {
                Some(Object::Array(items)) => items,
                _ => &[],
            },
            "\"" => {
                out.push(Operation::new("Tw", args.iter().take(1).cloned().collect()));
                out.push(Operation::new("Tc", args.iter().skip(1).take(1).cloned().collect()));
                out.push(Operation::new("T*", vec![]));
                args.get(2).map(std::slice::from_ref).unwrap_or(&[])
            }
            "'" => {
                out.push(Operation::new("T*", vec![]));
                &args[..args.len().min(1)]
            }
            _ => &args[..args.len().min(1)],
        };

        let scale = show.font_size * show.horizontal_scale;
        if scale == 0.0 {
            // Nothing can be positioned; the glyphs go with the operation.
            return out;
        }

        let mut array: Vec<Object> = Vec::new();
        let mut pending_adjust = 0.0f64;
        let flush_adjust = |array: &mut Vec<Object>, adjust: &mut f64| {
            if *adjust != 0.0 {
                array.push(Object::Real(*adjust as f32));
                *adjust = 0.0;
            }
        };
        for (index, element) in elements.iter().enumerate() {
            let Object::String(_, format) = element else {
                if let Some(n) = number(element) {
                    pending_adjust += n;
                }
                continue;
            };
            let mut kept: Vec<u8> = Vec::new();
            for glyph in show.glyphs.iter().filter(|g| g.element == index) {
                if self.hits(&glyph.bbox) {
                    if !kept.is_empty() {
                        flush_adjust(&mut array, &mut pending_adjust);
                        array.push(Object::String(std::mem::take(&mut kept), *format));
                    }
                    pending_adjust -= glyph.displacement * 1000.0 / scale;
                } else {
                    kept.extend_from_slice(&glyph.bytes);
                }
            }
            if !kept.is_empty() {
                flush_adjust(&mut array, &mut pending_adjust);
                array.push(Object::String(kept, *format));
            }
        }
        flush_adjust(&mut array, &mut pending_adjust);
        if !array.is_empty() {
            out.push(Operation::new("TJ", vec![Object::Array(array)]));
        }
        out
    }
}

/// Text whose glyph positions cannot be established: redacting around it
/// would be a guess.
fn unmeasured(show: &TextShow) -> FaxkitError {
    let font = show
        .font
        .as_deref()
        .map(|name| format!("/{}", String::from_utf8_lossy(name)))
        .unwrap_or_else(|| "no font".into());
    FaxkitError::PdfError(format!(
        "text shown with {font} has no known glyph widths; its position cannot be established"
    ))
}

/// Remove replaced XObjects from `resources` so the originals are no longer
/// reachable from the page. Names still drawn by `ops` are kept.
fn drop_xobjects(doc: &Document, resources: &mut Dictionary, replaced: &HashSet<Vec<u8>>, ops: &[Operation]) {
    let used: HashSet<&[u8]> = ops
        .iter()
        .filter(|op| op.operator == "Do")
        .filter_map(|op| op.operands.first().and_then(name_of))
        .collect();
    let Some(mut entries) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
    else {
        return;
    };
    for name in replaced {
        if !used.contains(name.as_slice()) {
            entries.remove(name);
        }
    }
    resources.set("XObject", Object::Dictionary(entries));
}

/// Strip replacement text from a marked-content operator, inlining named
/// property lists so the shared resource is left alone.
fn scrub_marked(doc: &Document, op: &mut Operation, resources: &Dictionary) {
    if op.operator != "BDC" {
        return;
    }
    let properties = match op.operands.get(1) {
        Some(Object::Dictionary(dict)) => Some(dict.clone()),
        Some(Object::Name(name)) => resources
            .get(b"Properties")
            .ok()
            .and_then(|p| resolve_dict(doc, p))
            .and_then(|p| p.get(name).ok())
            .and_then(|p| resolve_dict(doc, p))
            .cloned(),
        _ => None,
    };
    let Some(mut properties) = properties else {
        return;
    };
    if !REPLACEMENT_TEXT_KEYS.iter().any(|key| properties.has(key)) {
        return;
    }
    for key in REPLACEMENT_TEXT_KEYS {
        properties.remove(key);
    }
    op.operands[1] = Object::Dictionary(properties);
}

// -- Verification -------------------------------------------------------------

/// Allowance for the rounding of rewritten positioning numbers.
const VERIFY_TOLERANCE: f64 = 0.01;

/// Re-interpret rewritten content and report anything still drawn inside a
/// region. `doc` must already contain the committed new objects.
pub(crate) fn verify(
    doc: &Document,
    ops: &[Operation],
    resources: Dictionary,
    regions: &[DocRect],
    sanitized: &HashSet<ObjectId>,
) -> Result<()> {
    let shrunk: Vec<DocRect> = regions
        .iter()
        .map(|r| r.inflate(-VERIFY_TOLERANCE))
        .filter(|r| r.x0 <= r.x1 && r.y0 <= r.y1)
        .collect();
    let hits = |rect: &DocRect| shrunk.iter().any(|r| r.intersects(rect));
    let mut leak: Option<String> = None;
    walk(doc, resources, ops, Matrix::IDENTITY, 0, &mut |event, _| {
        if leak.is_some() {
            return;
        }
        leak = match event {
            Event::Text(show) if !show.measured => Some(unmeasured(show).to_string()),
            Event::Text(show) => show
                .glyphs
                .iter()
                .find(|g| hits(&g.bbox))
                .map(|g| format!("glyph {:?} remains", g.ch)),
            Event::Path(path) if shrunk.iter().any(|r| path.touches(r)) => {
                Some("painted path remains".into())
            }
            Event::Image(draw)
                if hits(&draw.bbox) && !draw.id.is_some_and(|id| sanitized.contains(&id)) =>
            {
                Some(format!("image {} remains", String::from_utf8_lossy(&draw.name)))
            }
            Event::InlineImage(bbox) if hits(bbox) => Some("inline image remains".into()),
            _ => None,
        };
    })?;
    match leak {
        Some(what) => Err(FaxkitError::PdfError(format!(
            "redaction verification failed: {what}"
        ))),
        None => Ok(()),
    }
}

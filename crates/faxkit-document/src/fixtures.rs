// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small generated PDFs for tests and benchmarks.
//
// Pages are US Letter. Fonts and MediaBox live on the page tree root so that
// every fixture exercises inherited attributes.

use std::path::Path;

use faxkit_core::DocRect;
use faxkit_core::error::{FaxkitError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Where [`mixed_page`] draws each kind of content, in document space.
pub mod layout {
    use faxkit_core::DocRect;

    /// "SECRET 42" shown inside a marked-content span with /ActualText.
    pub const SECRET_TEXT: DocRect = DocRect { x0: 100.0, y0: 697.0, x1: 170.0, y1: 711.0 };
    /// "Public" text, never redacted by the tests.
    pub const PUBLIC_TEXT: DocRect = DocRect { x0: 100.0, y0: 397.0, x1: 140.0, y1: 411.0 };
    /// Filled grey rectangle.
    pub const VECTOR_BOX: DocRect = DocRect { x0: 300.0, y0: 650.0, x1: 400.0, y1: 690.0 };
    /// 20x20 8-bit greyscale image XObject.
    pub const IMAGE: DocRect = DocRect { x0: 300.0, y0: 500.0, x1: 400.0, y1: 600.0 };
    /// The form XObject's text ("FORM TEXT", 10pt).
    pub const FORM_TEXT: DocRect = DocRect { x0: 105.0, y0: 217.0, x1: 165.0, y1: 230.0 };
    /// A square annotation over the secret text.
    pub const ANNOTATION: DocRect = DocRect { x0: 95.0, y0: 690.0, x1: 180.0, y1: 720.0 };
    /// 4x2 inline image.
    pub const INLINE_IMAGE: DocRect = DocRect { x0: 450.0, y0: 100.0, x1: 490.0, y1: 120.0 };
}

// -- Builders -----------------------------------------------------------------

/// One page of Helvetica 12pt text runs at `(x, y, text)`.
pub fn text_page(lines: &[(f64, f64, &str)]) -> Result<Document> {
    let content: String = lines
        .iter()
        .map(|(x, y, text)| format!("BT /F1 12 Tf {x} {y} Td ({}) Tj ET\n", escape(text)))
        .collect();
    build(&[content.into_bytes()], Dictionary::new())
}

/// One page of Times-Roman 12pt text runs. The font has no /Widths, so
/// glyph positions come from the standard metrics.
pub fn times_page(lines: &[(f64, f64, &str)]) -> Result<Document> {
    let content: String = lines
        .iter()
        .map(|(x, y, text)| format!("BT /F1 12 Tf {x} {y} Td ({}) Tj ET\n", escape(text)))
        .collect();
    build_with_font(
        Document::with_version("1.5"),
        times_roman(),
        &[content.into_bytes()],
        Dictionary::new(),
    )
}

/// One page showing `text` at 10pt in a Type3 font whose glyphs are
/// 100-unit filled squares under a 0.01 font matrix, so every glyph is a
/// 10pt square starting at `(x, y)`. Codes run A to Z.
pub fn type3_page(x: f64, y: f64, text: &str) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let mut procs = Dictionary::new();
    let mut differences: Vec<Object> = vec![Object::Integer(65)];
    for letter in b'A'..=b'Z' {
        let name = vec![letter];
        let proc_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"100 0 0 0 100 100 d1 10 10 80 80 re f".to_vec(),
        ));
        procs.set(name.clone(), proc_id);
        differences.push(Object::Name(name));
    }
    let font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type3",
        "FontBBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(100), Object::Integer(100)],
        "FontMatrix" => [0.01, 0.0, 0.0, 0.01, 0.0, 0.0].into_iter().map(Object::Real).collect::<Vec<_>>(),
        "CharProcs" => procs,
        "Encoding" => dictionary! { "Type" => "Encoding", "Differences" => differences },
        "FirstChar" => 65,
        "LastChar" => 90,
        "Widths" => vec![Object::Integer(100); 26],
        "Resources" => Dictionary::new(),
    };
    let content = format!("BT /F1 10 Tf {x} {y} Td ({}) Tj ET\n", escape(text));
    build_with_font(doc, font, &[content.into_bytes()], Dictionary::new())
}

/// `count` pages, each showing "Page N" near the top.
pub fn multi_page(count: usize) -> Result<Document> {
    let pages: Vec<Vec<u8>> = (1..=count)
        .map(|n| format!("BT /F1 12 Tf 72 720 Td (Page {n}) Tj ET").into_bytes())
        .collect();
    build(&pages, Dictionary::new())
}

/// One page with every content type the redaction engine handles; see
/// [`layout`].
pub fn mixed_page() -> Result<Document> {
    let mut doc = Document::with_version("1.5");

    let image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 20,
            "Height" => 20,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0x40; 400],
    ));
    let form_font = doc.add_object(helvetica());
    let form = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect_array(&DocRect { x0: 0.0, y0: 0.0, x1: 200.0, y1: 50.0 }),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => form_font } },
        },
        b"BT /F1 10 Tf 5 20 Td (FORM TEXT) Tj ET".to_vec(),
    ));

    let content = concat!(
        "q 0 0 612 792 re W n\n",
        "/Span << /ActualText (SECRET 42) >> BDC\n",
        "BT /F1 12 Tf 100 700 Td (SECRET 42) Tj ET\n",
        "EMC\n",
        "BT /F1 12 Tf 100 400 Td (Public) Tj ET\n",
        "0.5 g 300 650 100 40 re f\n",
        "q 100 0 0 100 300 500 cm /Im1 Do Q\n",
        "q 1 0 0 1 100 200 cm /Fm1 Do Q\n",
        "q 40 0 0 20 450 100 cm BI /W 4 /H 2 /BPC 8 /CS /DeviceGray ID \x01\x02\x03\x04\x05\x06\x07\x08 EI Q\n",
        "Q\n",
    );
    let extra = dictionary! {
        "XObject" => dictionary! { "Im1" => image, "Fm1" => form },
    };
    let mut doc = build_into(doc, &[content.as_bytes().to_vec()], extra)?;

    let page_id = first_page(&doc)?;
    let covering = doc.add_object(annotation(&layout::ANNOTATION));
    let elsewhere = doc.add_object(annotation(&DocRect { x0: 400.0, y0: 100.0, x1: 440.0, y1: 140.0 }));
    doc.get_dictionary_mut(page_id)
        .map_err(|err| FaxkitError::PdfError(format!("fixture page: {err}")))?
        .set("Annots", vec![Object::Reference(covering), Object::Reference(elsewhere)]);
    Ok(doc)
}

// -- Output -------------------------------------------------------------------

pub fn to_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| FaxkitError::PdfError(format!("cannot serialise fixture: {err}")))?;
    Ok(bytes)
}

pub fn write(doc: &mut Document, path: impl AsRef<Path>) -> Result<()> {
    let bytes = to_bytes(doc)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn text_page_bytes(lines: &[(f64, f64, &str)]) -> Result<Vec<u8>> {
    to_bytes(&mut text_page(lines)?)
}

pub fn multi_page_bytes(count: usize) -> Result<Vec<u8>> {
    to_bytes(&mut multi_page(count)?)
}

/// Write a `count`-page document to `path`.
pub fn write_multi_page(path: impl AsRef<Path>, count: usize) -> Result<()> {
    write(&mut multi_page(count)?, path)
}

// -- Internals ----------------------------------------------------------------

fn build(page_contents: &[Vec<u8>], extra_resources: Dictionary) -> Result<Document> {
    build_into(Document::with_version("1.5"), page_contents, extra_resources)
}

fn build_into(
    doc: Document,
    page_contents: &[Vec<u8>],
    extra_resources: Dictionary,
) -> Result<Document> {
    build_with_font(doc, helvetica(), page_contents, extra_resources)
}

/// Pages sharing one inherited resource dictionary with `font` as /F1.
fn build_with_font(
    mut doc: Document,
    font: Dictionary,
    page_contents: &[Vec<u8>],
    extra_resources: Dictionary,
) -> Result<Document> {
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let mut resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    for (key, value) in extra_resources.iter() {
        resources.set(key.clone(), value.clone());
    }
    let resources_id = doc.add_object(resources);

    let kids: Vec<Object> = page_contents
        .iter()
        .map(|bytes| {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), bytes.clone()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => rect_array(&DocRect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 }),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn first_page(doc: &Document) -> Result<ObjectId> {
    doc.get_pages()
        .into_values()
        .next()
        .ok_or_else(|| FaxkitError::PdfError("fixture has no pages".into()))
}

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    }
}

fn times_roman() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    }
}

fn annotation(rect: &DocRect) -> Dictionary {
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Square",
        "Rect" => rect_array(rect),
        "Contents" => Object::string_literal("reviewer note"),
    }
}

fn rect_array(rect: &DocRect) -> Vec<Object> {
    vec![
        rect.x0.into(),
        rect.y0.into(),
        rect.x1.into(),
        rect.y1.into(),
    ]
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

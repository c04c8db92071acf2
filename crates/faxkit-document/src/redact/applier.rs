// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Burn-in of page edits into a working copy of a document.
//
// Pages with redactions get their content rewritten, verified and replaced by
// a single new content stream. Pages with only highlights or annotations keep
// their content untouched and get the overlay appended.

use faxkit_core::config::{FaxkitConfig, PartialImagePolicy};
use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DocPoint, DocRect};
use faxkit_edit::PageEdits;
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

use super::overlay::Overlay;
use super::stream::{NewObjects, Redactor, verify};
use crate::pdf::content::{
    Matrix, decode_operations, encode_operations, page_content, page_resources, rect_of,
    resolve, resolve_dict,
};
use crate::pdf::reader::media_box;

/// A document with edits burned in, plus the pages that could not be done.
#[derive(Debug)]
pub struct BurnedDocument {
    pub document: Document,
    /// One `RedactionApply` error per failed page. Failed pages are left as
    /// they were in the source and must not be emitted.
    pub failures: Vec<FaxkitError>,
    /// Pages whose edits were applied.
    pub pages_applied: usize,
}

impl BurnedDocument {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The burned document, or the first page failure.
    pub fn into_result(self) -> Result<Document> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.document),
        }
    }
}

/// Applies strokes and annotations to documents.
#[derive(Debug, Clone, Copy)]
pub struct RedactionApplier {
    highlight_opacity: f64,
    partial_image_policy: PartialImagePolicy,
}

impl Default for RedactionApplier {
    fn default() -> Self {
        Self::from_config(&FaxkitConfig::default())
    }
}

impl RedactionApplier {
    pub fn new(highlight_opacity: f64, partial_image_policy: PartialImagePolicy) -> Self {
        Self {
            highlight_opacity,
            partial_image_policy,
        }
    }

    pub fn from_config(config: &FaxkitConfig) -> Self {
        Self::new(config.highlight_opacity, config.partial_image_policy)
    }

    /// Burn `edits` (one entry per page) into a copy of `source`.
    ///
    /// Excluded pages and pages without marks are left alone. A page that
    /// cannot be redacted is recorded in `failures` and the remaining pages
    /// are still processed.
    #[instrument(skip_all, fields(document = %document_name, pages = edits.len()))]
    pub fn apply(
        &self,
        source: &Document,
        document_name: &str,
        edits: &[PageEdits],
    ) -> Result<BurnedDocument> {
        let pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        if pages.len() != edits.len() {
            return Err(FaxkitError::InvalidEdit(format!(
                "{document_name} has {} pages but edits were given for {}",
                pages.len(),
                edits.len()
            )));
        }

        let mut document = source.clone();
        let mut failures = Vec::new();
        let mut pages_applied = 0;
        for (index, (page_id, page_edits)) in pages.iter().zip(edits).enumerate() {
            if page_edits.excluded || !page_edits.has_marks() {
                continue;
            }
            match self.burn_page(&mut document, *page_id, page_edits) {
                Ok(()) => pages_applied += 1,
                Err(err) => {
                    warn!(page = index, error = %err, "page could not be redacted");
                    failures.push(FaxkitError::RedactionApply {
                        document: document_name.to_string(),
                        page: index,
                        reason: err.to_string(),
                    });
                }
            }
        }
        if pages_applied > 0 {
            // Replaced content streams and removed annotations are unreachable now.
            let pruned = document.prune_objects();
            debug!(pruned = pruned.len(), "unreachable objects removed");
        }
        info!(applied = pages_applied, failed = failures.len(), "edits burned in");
        Ok(BurnedDocument {
            document,
            failures,
            pages_applied,
        })
    }

    fn burn_page(&self, doc: &mut Document, page_id: ObjectId, edits: &PageEdits) -> Result<()> {
        let mb = media_box(doc, page_id);
        let origin = DocPoint::new(mb.x0, mb.y0);
        let regions: Vec<DocRect> = edits
            .redaction_regions()
            .iter()
            .map(|r| r.translate(mb.x0, mb.y0))
            .collect();
        if regions.is_empty() {
            return self.overlay_page(doc, page_id, edits, origin);
        }

        let ops = decode_operations(&page_content(doc, page_id)?)?;
        let (rewritten, mut objects, sanitized) = {
            let mut redactor = Redactor::new(doc, &regions, self.partial_image_policy);
            let rewritten =
                redactor.rewrite(&ops, page_resources(doc, page_id), Matrix::IDENTITY, 0)?;
            (rewritten, redactor.objects, redactor.sanitized)
        };
        objects.commit(doc);
        verify(doc, &rewritten.ops, rewritten.resources.clone(), &regions, &sanitized)?;
        let removed = remove_annotations(doc, page_id, &regions)?;

        let mut resources = rewritten.resources;
        let overlay = Overlay::new(doc, &mut objects, &mut resources, origin, self.highlight_opacity)
            .operations(edits);
        let mut final_ops = Vec::with_capacity(rewritten.ops.len() + overlay.len() + 2);
        final_ops.push(Operation::new("q", vec![]));
        final_ops.extend(rewritten.ops);
        final_ops.push(Operation::new("Q", vec![]));
        final_ops.extend(overlay);

        let mut content = Stream::new(Dictionary::new(), encode_operations(&final_ops)?);
        let _ = content.compress();
        let content_id = objects.add(content);
        objects.commit(doc);
        set_page(doc, page_id, Object::Reference(content_id), resources)?;
        debug!(regions = regions.len(), annotations_removed = removed, "page redacted");
        Ok(())
    }

    /// Append marks without reading the page's content.
    fn overlay_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        edits: &PageEdits,
        origin: DocPoint,
    ) -> Result<()> {
        let mut objects = NewObjects::new(doc);
        let mut resources = page_resources(doc, page_id);
        let overlay = Overlay::new(doc, &mut objects, &mut resources, origin, self.highlight_opacity)
            .operations(edits);
        let mut suffix = vec![Operation::new("Q", vec![])];
        suffix.extend(overlay);

        let prefix = objects.add(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let suffix = objects.add(Stream::new(Dictionary::new(), encode_operations(&suffix)?));
        let mut contents = vec![Object::Reference(prefix)];
        contents.extend(doc.get_page_contents(page_id).into_iter().map(Object::Reference));
        contents.push(Object::Reference(suffix));
        objects.commit(doc);
        set_page(doc, page_id, Object::Array(contents), resources)?;
        debug!("overlay appended");
        Ok(())
    }
}

fn set_page(doc: &mut Document, page_id: ObjectId, contents: Object, resources: Dictionary) -> Result<()> {
    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|err| FaxkitError::PdfError(format!("cannot update page: {err}")))?;
    page.set("Contents", contents);
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Drop page annotations whose rectangle meets a region. Returns how many
/// were removed.
fn remove_annotations(doc: &mut Document, page_id: ObjectId, regions: &[DocRect]) -> Result<usize> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|err| FaxkitError::PdfError(format!("cannot read page: {err}")))?;
    let Some(Object::Array(annotations)) = page.get(b"Annots").ok().map(|a| resolve(doc, a)) else {
        return Ok(0);
    };
    let kept: Vec<Object> = annotations
        .iter()
        .filter(|annotation| {
            let rect = resolve_dict(doc, annotation)
                .and_then(|dict| dict.get(b"Rect").ok())
                .and_then(|rect| rect_of(doc, rect));
            !rect.is_some_and(|rect| regions.iter().any(|r| r.intersects(&rect)))
        })
        .cloned()
        .collect();
    let removed = annotations.len() - kept.len();
    if removed > 0 {
        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|err| FaxkitError::PdfError(format!("cannot update page: {err}")))?;
        page.set("Annots", Object::Array(kept));
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, layout};
    use crate::pdf::PdfReader;
    use faxkit_core::Rgba;
    use faxkit_edit::{Annotation, Stroke, StrokeKind};

    fn redact(rect: DocRect) -> PageEdits {
        PageEdits {
            strokes: vec![Stroke::redact_rect(rect)],
            ..PageEdits::default()
        }
    }

    fn burn_to_bytes(doc: &Document, edits: &[PageEdits]) -> Vec<u8> {
        let mut burned = RedactionApplier::default()
            .apply(doc, "fixture.pdf", edits)
            .expect("apply")
            .into_result()
            .expect("clean");
        fixtures::to_bytes(&mut burned).expect("serialise")
    }

    fn burn(doc: &Document, edits: &[PageEdits]) -> PdfReader {
        PdfReader::from_bytes(&burn_to_bytes(doc, edits)).expect("reload")
    }

    /// Text as a separate PDF text extractor sees it.
    fn extracted_text(bytes: &[u8]) -> String {
        pdf_extract::extract_text_from_mem(bytes).expect("extract text")
    }

    /// Every string shown on page 0, read straight from the content stream.
    fn shown_strings(bytes: &[u8]) -> Vec<u8> {
        let doc = Document::load_mem(bytes).expect("load");
        let page = doc.get_pages().into_values().next().expect("page");
        let content = lopdf::content::Content::decode(&doc.get_page_content(page).expect("content"))
            .expect("decode");
        let mut shown = Vec::new();
        let mut collect = |object: &Object| {
            if let Object::String(bytes, _) = object {
                shown.extend_from_slice(bytes);
            }
        };
        for op in content.operations.iter().filter(|op| matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"")) {
            for operand in &op.operands {
                match operand {
                    Object::Array(items) => items.iter().for_each(&mut collect),
                    other => collect(other),
                }
            }
        }
        shown
    }

    #[test]
    fn redacted_text_is_gone_from_the_region() {
        let doc = fixtures::text_page(&[(100.0, 703.0, "ACCOUNT 1234"), (100.0, 500.0, "Keep me")])
            .expect("fixture");
        let region = DocRect { x0: 100.0, y0: 700.0, x1: 250.0, y1: 715.0 };
        let bytes = burn_to_bytes(&doc, &[redact(region)]);
        let reader = PdfReader::from_bytes(&bytes).expect("reload");

        assert_eq!(reader.page_count(), 1);
        assert_eq!(reader.text_in_region(0, &region).expect("text"), "");
        let all = DocRect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 };
        assert_eq!(reader.text_in_region(0, &all).expect("text"), "Keepme");

        let text = extracted_text(&bytes);
        assert!(!text.contains("ACCOUNT"), "{text:?}");
        assert!(!text.contains("1234"), "{text:?}");
        assert!(text.contains("Keep me"), "{text:?}");
    }

    #[test]
    fn standard_font_text_is_cut_where_it_is_drawn() {
        // Times-Roman without /Widths: positions come from the standard metrics.
        // The digits run from x 184.64 to 238.64; the spaces either side stay.
        let doc = fixtures::times_page(&[(72.0, 700.0, "The account number is 987654321 for billing")])
            .expect("fixture");
        let region = DocRect { x0: 185.0, y0: 695.0, x1: 238.0, y1: 712.0 };
        let bytes = burn_to_bytes(&doc, &[redact(region)]);

        let text = extracted_text(&bytes);
        assert!(!text.chars().any(|c| c.is_ascii_digit()), "{text:?}");
        assert!(text.contains("account number is"), "{text:?}");
        assert!(text.contains("billing"), "{text:?}");
        assert_eq!(shown_strings(&bytes), b"The account number is  for billing".to_vec());
    }

    #[test]
    fn type3_text_is_cut_through_the_font_matrix() {
        // Ten 10pt glyphs from x 100; 'F' spans 150..160.
        let doc = fixtures::type3_page(100.0, 700.0, "ABCDEFGHIJ").expect("fixture");
        let region = DocRect { x0: 151.0, y0: 698.0, x1: 159.0, y1: 712.0 };
        let bytes = burn_to_bytes(&doc, &[redact(region)]);
        assert_eq!(shown_strings(&bytes), b"ABCDEGHIJ".to_vec());
    }

    #[test]
    fn text_in_fonts_without_metrics_fails_the_page() {
        let mut doc = fixtures::text_page(&[(100.0, 700.0, "ACCOUNT 1234")]).expect("fixture");
        for object in doc.objects.values_mut() {
            if let Object::Dictionary(dict) = object
                && dict.get(b"BaseFont").is_ok()
            {
                dict.set("Subtype", "TrueType");
                dict.set("BaseFont", "Garamond");
            }
        }
        let region = DocRect { x0: 100.0, y0: 695.0, x1: 250.0, y1: 715.0 };
        let burned = RedactionApplier::default()
            .apply(&doc, "garamond.pdf", &[redact(region)])
            .expect("apply");
        assert_eq!(burned.pages_applied, 0);
        assert!(matches!(
            &burned.failures[0],
            FaxkitError::RedactionApply { page: 0, reason, .. } if reason.contains("glyph widths")
        ));
    }

    #[test]
    fn every_content_type_is_removed() {
        let doc = fixtures::mixed_page().expect("fixture");
        let regions = [
            layout::SECRET_TEXT,
            layout::VECTOR_BOX,
            layout::IMAGE.inflate(1.0),
            layout::FORM_TEXT,
            layout::INLINE_IMAGE,
        ];
        let edits = PageEdits {
            strokes: regions.iter().copied().map(Stroke::redact_rect).collect(),
            ..PageEdits::default()
        };
        let reader = burn(&doc, &[edits]);

        for region in &regions {
            assert_eq!(reader.text_in_region(0, region).expect("text"), "", "{region:?}");
            assert_eq!(reader.images_in_region(0, region).expect("images"), 0, "{region:?}");
        }
        assert_eq!(reader.text_in_region(0, &layout::PUBLIC_TEXT).expect("text"), "Public");

        // The square annotation over the secret text went with it.
        let page = reader
            .document()
            .get_dictionary(reader.page_id(0).expect("page"))
            .expect("page dict");
        let annots = page.get(b"Annots").and_then(Object::as_array).expect("annots");
        assert_eq!(annots.len(), 1);

        // No replacement text survives anywhere in the output.
        let bytes = {
            let mut copy = reader.document().clone();
            copy.decompress();
            fixtures::to_bytes(&mut copy).expect("bytes")
        };
        assert!(!bytes.windows(9).any(|w| w == b"SECRET 42"));

        let text = extracted_text(&bytes);
        assert!(!text.contains("SECRET"), "{text:?}");
        assert!(!text.contains("FORM TEXT"), "{text:?}");
        assert!(text.contains("Public"), "{text:?}");
    }

    #[test]
    fn partly_covered_images_are_blacked_out() {
        let doc = fixtures::mixed_page().expect("fixture");
        // Lower-left quarter of the 100x100 image.
        let region = DocRect { x0: 290.0, y0: 490.0, x1: 349.0, y1: 549.0 };
        let reader = burn(&doc, &[redact(region)]);

        // Still one image over the untouched part, but it is a new object.
        let untouched = DocRect { x0: 360.0, y0: 560.0, x1: 390.0, y1: 590.0 };
        assert_eq!(reader.images_in_region(0, &untouched).expect("images"), 1);
    }

    #[test]
    fn unsupported_images_follow_the_policy() {
        let mut doc = fixtures::mixed_page().expect("fixture");
        let image_id = doc
            .objects
            .iter()
            .find(|(_, o)| {
                o.as_stream()
                    .ok()
                    .and_then(|s| s.dict.get(b"Subtype").ok())
                    .and_then(|s| s.as_name().ok())
                    == Some(b"Image".as_slice())
            })
            .map(|(id, _)| *id)
            .expect("image");
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(image_id) {
            stream.dict.set("Filter", "CCITTFaxDecode");
        }
        let region = DocRect { x0: 290.0, y0: 490.0, x1: 349.0, y1: 549.0 };

        let burned = RedactionApplier::new(0.5, PartialImagePolicy::Fail)
            .apply(&doc, "fax.pdf", &[redact(region)])
            .expect("apply");
        assert!(!burned.is_clean());
        assert!(matches!(
            burned.failures[0],
            FaxkitError::RedactionApply { page: 0, .. }
        ));

        let burned = RedactionApplier::new(0.5, PartialImagePolicy::DropImage)
            .apply(&doc, "fax.pdf", &[redact(region)])
            .expect("apply")
            .into_result()
            .expect("dropped");
        let mut burned = burned;
        let reader = PdfReader::from_bytes(&fixtures::to_bytes(&mut burned).expect("bytes")).expect("load");
        assert_eq!(reader.images_in_region(0, &layout::IMAGE).expect("images"), 0);
    }

    #[test]
    fn failed_pages_do_not_stop_other_pages() {
        let mut doc = fixtures::multi_page(2).expect("fixture");
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        // Make page 0's content undecodable.
        let contents = doc.get_page_contents(pages[0]);
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(contents[0]) {
            stream.dict.set("Filter", "JBIG2Decode");
        }
        let region = DocRect { x0: 60.0, y0: 700.0, x1: 200.0, y1: 740.0 };
        let burned = RedactionApplier::default()
            .apply(&doc, "two.pdf", &[redact(region), redact(region)])
            .expect("apply");
        assert_eq!(burned.failures.len(), 1);
        assert_eq!(burned.pages_applied, 1);
    }

    #[test]
    fn overlays_leave_content_alone() {
        let doc = fixtures::text_page(&[(100.0, 700.0, "Hello")]).expect("fixture");
        let mut highlight = Stroke::new(StrokeKind::Highlight, 10.0, Rgba::YELLOW);
        highlight.push(DocPoint::new(100.0, 704.0));
        highlight.push(DocPoint::new(140.0, 704.0));
        let edits = PageEdits {
            strokes: vec![highlight],
            annotations: vec![Annotation::text(DocPoint::new(100.0, 600.0), "Note", 12.0)],
            excluded: false,
        };
        let reader = burn(&doc, &[edits]);
        let region = DocRect { x0: 95.0, y0: 695.0, x1: 150.0, y1: 715.0 };
        assert_eq!(reader.text_in_region(0, &region).expect("text"), "Hello");
        let note = DocRect { x0: 95.0, y0: 595.0, x1: 150.0, y1: 615.0 };
        assert_eq!(reader.text_in_region(0, &note).expect("text"), "Note");
    }

    #[test]
    fn page_count_mismatch_is_rejected() {
        let doc = fixtures::multi_page(2).expect("fixture");
        let err = RedactionApplier::default()
            .apply(&doc, "two.pdf", &[PageEdits::default()])
            .expect_err("mismatch");
        assert!(matches!(err, FaxkitError::InvalidEdit(_)));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page copying between documents.
//
// An output document gets a fresh catalog and a flat page tree. Pages are
// deep-copied from their sources with a per-source memo, so resources shared
// between pages of one source are copied once. References to pages that are
// not being copied (link destinations, article beads) become null, which keeps
// excluded pages from being dragged into the output.

use std::collections::HashMap;

use faxkit_core::error::{FaxkitError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, warn};

use super::content::{inherited, name_of, resolve};

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies pages of one source document into a target, memoising objects.
pub struct PageCopier<'a> {
    source: &'a Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    /// Copy one page under `parent`, returning the new page's id.
    pub fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> Result<ObjectId> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            FaxkitError::PdfError(format!("cannot read page object {page_id:?}: {err}"))
        })?;

        let new_id = target.new_object_id();
        self.copied.insert(page_id, new_id);

        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(target, value, page_id));
        }
        for key in INHERITABLE {
            if !copy.has(key)
                && let Some(value) = inherited(source, page_id, key)
            {
                copy.set(key.to_vec(), self.copy_object(target, value, page_id));
            }
        }
        copy.set("Parent", Object::Reference(parent));

        target.objects.insert(new_id, Object::Dictionary(copy));
        Ok(new_id)
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object, page_id: ObjectId) -> Object {
        match object {
            Object::Reference(id) => self.copy_reference(target, *id, page_id),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict, page_id)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(target, item, page_id))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict, page_id);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary, page_id: ObjectId) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy_object(target, value, page_id));
        }
        copy
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId, page_id: ObjectId) -> Object {
        if let Some(new_id) = self.copied.get(&id) {
            return Object::Reference(*new_id);
        }
        let source = self.source;
        let Ok(object) = source.get_object(id) else {
            warn!(?id, "dangling reference replaced with null");
            return Object::Null;
        };
        if id != page_id && is_page_node(source, object) {
            return Object::Null;
        }

        // Reserve the id first so that cycles resolve to it.
        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);
        let copy = self.copy_object(target, object, page_id);
        target.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

fn is_page_node(doc: &Document, object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").ok().map(|t| resolve(doc, t)).and_then(name_of),
        Some(b"Page") | Some(b"Pages")
    )
}

// -- Output document ----------------------------------------------------------

/// A document under construction with a single flat page tree.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Append the given pages of `source`, in order.
    pub fn append_pages(&mut self, source: &Document, pages: &[ObjectId]) -> Result<()> {
        let mut copier = PageCopier::new(source);
        for page_id in pages {
            let new_id = copier.copy_page(&mut self.doc, *page_id, self.pages_id)?;
            self.kids.push(Object::Reference(new_id));
        }
        debug!(pages = pages.len(), total = self.kids.len(), "pages appended");
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Close the page tree and serialise.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut doc = self.finish();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|err| FaxkitError::PdfError(format!("cannot serialise output: {err}")))?;
        Ok(bytes)
    }

    /// Close the page tree.
    pub fn finish(self) -> Document {
        let Self {
            mut doc,
            pages_id,
            kids,
        } = self;
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        doc
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::pdf::PdfReader;

    #[test]
    fn copies_selected_pages_with_inherited_attributes() {
        let source = fixtures::multi_page(3).expect("fixture");
        let pages: Vec<ObjectId> = source.get_pages().into_values().collect();

        let mut output = OutputDocument::new();
        output.append_pages(&source, &[pages[0], pages[2]]).expect("copy");
        assert_eq!(output.page_count(), 2);

        let bytes = output.into_bytes().expect("serialise");
        let reader = PdfReader::from_bytes(&bytes).expect("reload");
        assert_eq!(reader.page_count(), 2);

        let page = reader
            .document()
            .get_dictionary(reader.page_id(1).expect("page"))
            .expect("dict");
        // Attributes inherited from the source's page tree are now on the page.
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
        let all = faxkit_core::DocRect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 };
        assert_eq!(reader.text_in_region(1, &all).expect("text"), "Page3");
    }

    #[test]
    fn shared_resources_are_copied_once() {
        let source = fixtures::multi_page(4).expect("fixture");
        let pages: Vec<ObjectId> = source.get_pages().into_values().collect();

        let mut output = OutputDocument::new();
        output.append_pages(&source, &pages).expect("copy");
        let doc = output.finish();

        let fonts = doc
            .objects
            .values()
            .filter(|o| match o {
                Object::Dictionary(d) => d.get(b"Type").ok().and_then(name_of) == Some(b"Font".as_slice()),
                _ => false,
            })
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn references_to_other_pages_become_null() {
        let mut source = fixtures::multi_page(2).expect("fixture");
        let pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        let link = source.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
            "Dest" => vec![Object::Reference(pages[1]), "Fit".into()],
        });
        source
            .get_dictionary_mut(pages[0])
            .expect("page")
            .set("Annots", vec![Object::Reference(link)]);

        let mut output = OutputDocument::new();
        output.append_pages(&source, &pages[..1]).expect("copy");
        let doc = output.finish();

        // Only the copied page exists in the output.
        assert_eq!(doc.get_pages().len(), 1);
        let pages_in_output = doc
            .objects
            .values()
            .filter(|o| is_page_node(&doc, o))
            .count();
        assert_eq!(pages_in_output, 2, "one page and one page tree root");
    }
}

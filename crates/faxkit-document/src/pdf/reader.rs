// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open a source document and inspect its pages using `lopdf`.
//
// Pages are addressed by 0-based index everywhere in Faxkit. Page geometry is
// reported in document space (points from the MediaBox lower-left corner).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use faxkit_core::error::{FaxkitError, Result};
use faxkit_core::{DocRect, DocSize};
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::content::{self, Event, inherited, rect_of, resolve, resolve_dict};

/// Summary of a source document, for listings and pre-flight checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub file_name: Option<String>,
    pub size_bytes: u64,
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Read-only access to a loaded PDF.
pub struct PdfReader {
    document: Document,
    /// Source path, if opened from a file.
    source_path: Option<PathBuf>,
    /// The bytes the document was parsed from, for renderers that parse
    /// PDFs themselves.
    bytes: Arc<[u8]>,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| FaxkitError::DocumentLoad {
            document: path.display().to_string(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|err| load_error(err.to_string()))?;
        let document = Document::load_mem(&bytes).map_err(|err| load_error(err.to_string()))?;
        let bytes_len = bytes.len();
        let reader = Self::from_document(document, Some(path.to_path_buf()), bytes.into());
        if reader.page_count() == 0 {
            return Err(load_error("document has no pages".into()));
        }

        info!(pages = reader.page_count(), bytes_len, "PDF opened");
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| FaxkitError::DocumentLoad {
            document: "<memory>".into(),
            reason: err.to_string(),
        })?;
        let reader = Self::from_document(document, None, data.into());
        debug!(pages = reader.page_count(), "PDF loaded from bytes");
        Ok(reader)
    }

    fn from_document(document: Document, source_path: Option<PathBuf>, bytes: Arc<[u8]>) -> Self {
        let pages = document.get_pages().into_values().collect();
        Self {
            document,
            source_path,
            bytes,
            pages,
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Display name: the file name, or `<memory>`.
    pub fn name(&self) -> String {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".into())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages.get(page).copied().ok_or(FaxkitError::PageOutOfRange {
            page,
            page_count: self.pages.len(),
        })
    }

    /// The page's MediaBox in user space. Letter size when absent or broken.
    pub fn page_box(&self, page: usize) -> Result<DocRect> {
        Ok(media_box(&self.document, self.page_id(page)?))
    }

    pub fn page_size(&self, page: usize) -> Result<DocSize> {
        let mb = self.page_box(page)?;
        Ok(DocSize::new(mb.width(), mb.height()))
    }

    pub fn info(&self) -> DocumentInfo {
        let text = |key: &[u8]| -> Option<String> {
            let info = self
                .document
                .trailer
                .get(b"Info")
                .ok()
                .and_then(|o| resolve_dict(&self.document, o))?;
            match resolve(&self.document, info.get(key).ok()?) {
                Object::String(bytes, _) => Some(decode_text_string(bytes)),
                _ => None,
            }
        };
        DocumentInfo {
            file_name: self
                .source_path
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned()),
            size_bytes: self.bytes.len() as u64,
            page_count: self.page_count(),
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
        }
    }

    // -- Region queries -------------------------------------------------------

    /// Text whose glyph boxes intersect `region` (document space), in
    /// content-stream order. Invisible text (render mode 3) is included.
    pub fn text_in_region(&self, page: usize, region: &DocRect) -> Result<String> {
        let page_id = self.page_id(page)?;
        let user = to_user_space(&self.document, page_id, region);
        let mut text = String::new();
        content::walk_page(&self.document, page_id, &mut |event, _| {
            if let Event::Text(show) = event {
                for glyph in &show.glyphs {
                    if glyph.bbox.intersects(&user) && !glyph.is_blank() {
                        text.push(glyph.ch);
                    }
                }
            }
        })?;
        Ok(text)
    }

    /// Number of images (XObject or inline) drawn over `region`.
    pub fn images_in_region(&self, page: usize, region: &DocRect) -> Result<usize> {
        let page_id = self.page_id(page)?;
        let user = to_user_space(&self.document, page_id, region);
        let mut count = 0;
        content::walk_page(&self.document, page_id, &mut |event, _| match event {
            Event::Image(draw) if draw.bbox.intersects(&user) => count += 1,
            Event::InlineImage(bbox) if bbox.intersects(&user) => count += 1,
            _ => {}
        })?;
        Ok(count)
    }
}

/// MediaBox of a page in user space.
pub fn media_box(doc: &Document, page_id: ObjectId) -> DocRect {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|o| rect_of(doc, o))
        .filter(|r| r.width() > 0.0 && r.height() > 0.0)
        .unwrap_or(DocRect {
            x0: 0.0,
            y0: 0.0,
            x1: DocSize::LETTER.width,
            y1: DocSize::LETTER.height,
        })
}

/// Convert a document-space rectangle to the page's user space.
pub fn to_user_space(doc: &Document, page_id: ObjectId, region: &DocRect) -> DocRect {
    let mb = media_box(doc, page_id);
    region.translate(mb.x0, mb.y0)
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding, which
/// is treated as Latin-1 here.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|b| *b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use lopdf::dictionary;

    #[test]
    fn missing_file_is_a_load_error() {
        let err = PdfReader::open("/definitely/not/here.pdf").err().expect("should fail");
        assert!(matches!(err, FaxkitError::DocumentLoad { .. }));
    }

    #[test]
    fn garbage_bytes_are_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.5 this is not a pdf").expect("write");
        assert!(matches!(
            PdfReader::open(&path),
            Err(FaxkitError::DocumentLoad { .. })
        ));
    }

    #[test]
    fn pages_are_zero_based() {
        let bytes = fixtures::multi_page_bytes(3).expect("fixture");
        let reader = PdfReader::from_bytes(&bytes).expect("load");
        assert_eq!(reader.page_count(), 3);
        assert!(reader.page_id(2).is_ok());
        assert!(matches!(
            reader.page_id(3),
            Err(FaxkitError::PageOutOfRange { page: 3, page_count: 3 })
        ));
        assert_eq!(reader.page_size(0).expect("size"), DocSize::LETTER);
    }

    #[test]
    fn text_lookup_is_limited_to_the_region() {
        let bytes = fixtures::text_page_bytes(&[(100.0, 700.0, "ACCOUNT 1234"), (100.0, 500.0, "Keep me")])
            .expect("fixture");
        let reader = PdfReader::from_bytes(&bytes).expect("load");
        let top = DocRect { x0: 90.0, y0: 695.0, x1: 300.0, y1: 715.0 };
        assert_eq!(reader.text_in_region(0, &top).expect("text"), "ACCOUNT1234");
        let all = DocRect { x0: 0.0, y0: 0.0, x1: 612.0, y1: 792.0 };
        assert_eq!(reader.text_in_region(0, &all).expect("text"), "ACCOUNT1234Keepme");
    }

    #[test]
    fn info_reports_metadata_and_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cover.pdf");
        let mut doc = fixtures::text_page(&[(72.0, 720.0, "Hello")]).expect("fixture");
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly statement"),
            "Producer" => Object::String(
                vec![0xFE, 0xFF, 0x00, 0x46, 0x00, 0x78],
                lopdf::StringFormat::Hexadecimal,
            ),
        });
        doc.trailer.set("Info", info_id);
        fixtures::write(&mut doc, &path).expect("write");

        let reader = PdfReader::open(&path).expect("open");
        let info = reader.info();
        assert_eq!(info.file_name.as_deref(), Some("cover.pdf"));
        assert_eq!(info.page_count, 1);
        assert_eq!(info.title.as_deref(), Some("Quarterly statement"));
        assert_eq!(info.producer.as_deref(), Some("Fx"));
        assert_eq!(info.author, None);
        assert_eq!(info.size_bytes, std::fs::metadata(&path).expect("meta").len());
    }
}

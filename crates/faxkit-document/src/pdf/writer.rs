// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: lay out plain text lines on new pages using `printpdf` 0.8.
//
// printpdf 0.8 builds documents from `PdfPage` values holding `Vec<Op>`
// operation lists, serialised via `PdfDocument::save()`. Faxkit uses it for
// generated pages such as the cover sheet.

use faxkit_core::PaperSize;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, instrument};

const MARGIN_MM: f32 = 20.0;
/// Average Helvetica advance as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;
const PT_PER_MM: f32 = 72.0 / 25.4;

/// One logical line of text. Long lines are wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub size: f32,
    pub bold: bool,
}

impl TextLine {
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// An empty line of the given height.
    pub fn gap(size: f32) -> Self {
        Self::new("", size)
    }
}

/// Creates text-only PDF documents.
pub struct PdfWriter {
    paper_size: PaperSize,
    title: String,
}

impl PdfWriter {
    pub fn new(paper_size: PaperSize, title: impl Into<String>) -> Self {
        Self {
            paper_size,
            title: title.into(),
        }
    }

    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Lay out `lines` top to bottom, breaking pages as needed. Always
    /// produces at least one page.
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub fn create_from_lines(&self, lines: &[TextLine]) -> Vec<u8> {
        let (page_w, page_h) = self.page_dimensions();
        let margin_pt = MARGIN_MM * PT_PER_MM;
        let usable_w_pt = page_w.0 * PT_PER_MM - 2.0 * margin_pt;
        let page_h_pt = page_h.0 * PT_PER_MM;

        let mut pages: Vec<PdfPage> = Vec::new();
        let mut ops: Vec<Op> = Vec::new();
        let mut y_pt = page_h_pt - margin_pt;

        for line in lines {
            let line_height = line.size * 1.3;
            let max_chars = (usable_w_pt / (AVG_CHAR_WIDTH * line.size)).max(1.0) as usize;
            for wrapped in wrap_text(&line.text, max_chars) {
                if y_pt - line_height < margin_pt {
                    pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
                    y_pt = page_h_pt - margin_pt;
                }
                y_pt -= line_height;
                if wrapped.is_empty() {
                    continue;
                }
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(margin_pt),
                        y: Pt(y_pt),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(line.size),
                    font: font_for(line.bold),
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(wrapped)],
                    font: font_for(line.bold),
                });
                ops.push(Op::EndTextSection);
            }
        }
        if !ops.is_empty() || pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        debug!(pages = doc.pages.len(), "text layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        doc.save(&PdfSaveOptions::default(), &mut warnings)
    }
}

fn font_for(bold: bool) -> BuiltinFont {
    if bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    }
}

// -- Text wrapping helper -----------------------------------------------------

/// Word-wrap one paragraph to at most `max_width` characters per line.
/// Words longer than a line are broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }

    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in words {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > max_width {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            let mut chunks = chars.chunks(max_width).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    result.push(piece);
                } else {
                    current_len = chunk.len();
                    current = piece;
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = chars.len();
        } else if current_len + 1 + chars.len() <= max_width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + chars.len();
        } else {
            result.push(std::mem::replace(&mut current, word.to_string()));
            current_len = chars.len();
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfReader;

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap_text("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_text("", 5), vec![""]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        // Multi-byte characters are counted, not their bytes.
        assert_eq!(wrap_text("äöü äöü", 3), vec!["äöü", "äöü"]);
    }

    #[test]
    fn writes_a_loadable_document() {
        let writer = PdfWriter::new(PaperSize::Letter, "Test");
        let lines = vec![TextLine::new("FAX", 28.0).bold(), TextLine::gap(12.0), TextLine::new("To: Ada", 12.0)];
        let bytes = writer.create_from_lines(&lines);
        let reader = PdfReader::from_bytes(&bytes).expect("load");
        assert_eq!(reader.page_count(), 1);
    }

    #[test]
    fn long_text_breaks_pages() {
        let writer = PdfWriter::new(PaperSize::A4, "Test");
        let lines: Vec<TextLine> = (0..200).map(|i| TextLine::new(format!("line {i}"), 12.0)).collect();
        let bytes = writer.create_from_lines(&lines);
        let reader = PdfReader::from_bytes(&bytes).expect("load");
        assert!(reader.page_count() > 1);
    }
}

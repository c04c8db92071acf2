// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph advance widths, enough to place every glyph of a text run.
//
// Widths come from the font dictionary when present (/Widths for simple
// fonts, /W and /DW for composite fonts). Standard 14 fonts written without
// widths use the built-in AFM metrics. Anything else has no known metrics
// and `advance` returns `None`; callers must not guess glyph positions.

use std::collections::HashMap;
use std::ops::Range;

use faxkit_core::DocRect;
use lopdf::{Dictionary, Document, Object};

use super::content::{Matrix, name_of, number, rect_of, resolve, resolve_dict};

// -- Standard 14 metrics --------------------------------------------------------
//
// Advance widths in 1/1000 em for codes 32..=126. Codes 39 and 96 hold the
// WinAnsi glyphs (quotesingle, grave); StandardEncoding maps those codes to
// quoteright and quoteleft, see `Standard14::quotes`.

const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 48-63
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 80-95
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 96-111
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 112-126
];

const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 48-63
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 64-79
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 80-95
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 96-111
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 112-126
];

const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, // 48-63
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, // 64-79
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500, // 80-95
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500, // 96-111
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520, // 112-126
];

const TIMES_ITALIC: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500, // 48-63
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722, // 64-79
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500, // 80-95
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500, // 96-111
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541, // 112-126
];

const TIMES_BOLD_ITALIC: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, // 48-63
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722, // 64-79
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500, // 80-95
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500, // 96-111
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570, // 112-126
];

/// Symbol, built-in encoding, codes 32..=126.
const SYMBOL_LOW: [u16; 95] = [
    250, 333, 713, 500, 549, 833, 778, 439, 333, 333, 500, 549, 250, 549, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 549, 549, 549, 444, // 48-63
    549, 722, 667, 722, 612, 611, 763, 603, 722, 333, 631, 722, 686, 889, 722, 722, // 64-79
    768, 741, 556, 592, 611, 690, 439, 768, 645, 795, 611, 333, 863, 333, 658, 500, // 80-95
    500, 631, 549, 549, 494, 439, 521, 411, 603, 329, 603, 549, 549, 576, 521, 549, // 96-111
    549, 521, 549, 603, 439, 576, 713, 686, 493, 686, 494, 480, 200, 480, 549, // 112-126
];

/// Symbol, built-in encoding, codes 160..=254. Code 240 is unassigned.
const SYMBOL_HIGH: [u16; 95] = [
    750, 620, 247, 549, 167, 713, 500, 753, 753, 753, 753, 1042, 987, 603, 987, 603, // 160-175
    400, 549, 411, 549, 549, 713, 494, 460, 549, 549, 549, 549, 1000, 603, 1000, 658, // 176-191
    823, 686, 795, 987, 768, 768, 823, 768, 768, 713, 713, 713, 713, 713, 713, 713, // 192-207
    768, 713, 790, 790, 890, 823, 549, 250, 713, 603, 603, 1042, 987, 603, 987, 603, // 208-223
    494, 329, 790, 790, 786, 713, 384, 384, 384, 384, 384, 384, 494, 494, 494, 494, // 224-239
    0, 329, 274, 686, 686, 686, 384, 384, 384, 384, 384, 384, 494, 494, 494, // 240-254
];

/// Standard-font metrics used when a font dictionary carries no widths.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Standard14 {
    Courier,
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Symbol,
}

impl Standard14 {
    /// Match a /BaseFont name, ignoring a subset prefix and the usual
    /// platform aliases (Arial, Times New Roman, Courier New).
    fn from_base_font(name: &str) -> Option<Self> {
        let name = name.split_once('+').map_or(name, |(_, rest)| rest);
        let lower = name.to_ascii_lowercase();
        let bold = lower.contains("bold");
        let italic = lower.contains("italic") || lower.contains("oblique");
        if lower.starts_with("courier") {
            Some(Self::Courier)
        } else if lower.starts_with("helvetica") || lower.starts_with("arial") {
            Some(if bold { Self::HelveticaBold } else { Self::Helvetica })
        } else if lower.starts_with("times") {
            Some(match (bold, italic) {
                (false, false) => Self::TimesRoman,
                (true, false) => Self::TimesBold,
                (false, true) => Self::TimesItalic,
                (true, true) => Self::TimesBoldItalic,
            })
        } else if lower == "symbol" || lower.starts_with("symbolmt") {
            Some(Self::Symbol)
        } else {
            None
        }
    }

    /// Widths of quoteright and quoteleft.
    fn quotes(self) -> u16 {
        match self {
            Self::Courier => 600,
            Self::Helvetica => 222,
            Self::HelveticaBold => 278,
            _ => 333,
        }
    }

    fn width(self, code: u32, standard_encoding: bool) -> Option<f64> {
        let table: &[u16; 95] = match self {
            Self::Courier => return (32..=126).contains(&code).then_some(600.0),
            Self::Helvetica => &HELVETICA,
            Self::HelveticaBold => &HELVETICA_BOLD,
            Self::TimesRoman => &TIMES_ROMAN,
            Self::TimesBold => &TIMES_BOLD,
            Self::TimesItalic => &TIMES_ITALIC,
            Self::TimesBoldItalic => &TIMES_BOLD_ITALIC,
            Self::Symbol => {
                let w = match code {
                    32..=126 => SYMBOL_LOW[(code - 32) as usize],
                    160..=254 => SYMBOL_HIGH[(code - 160) as usize],
                    _ => 0,
                };
                return (w > 0).then_some(w as f64);
            }
        };
        if standard_encoding && (code == 39 || code == 96) {
            return Some(self.quotes() as f64);
        }
        let index = code.checked_sub(32)? as usize;
        table.get(index).map(|w| *w as f64)
    }
}

// -- Font metrics -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Source {
    /// /Widths from FirstChar, with MissingWidth for codes outside it.
    Widths { first_char: u32, widths: Vec<f64>, missing: f64 },
    /// Composite font /W entries and /DW.
    Composite { widths: HashMap<u32, f64>, default: f64 },
    Builtin { font: Standard14, standard_encoding: bool },
    Unknown,
}

/// Glyph metrics for one font resource.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    source: Source,
    /// Glyph space to text space. 1/1000 except for Type3 fonts.
    font_matrix: Matrix,
    /// Type3 glyph bounding box in glyph space.
    font_bbox: Option<DocRect>,
}

impl Default for FontMetrics {
    /// Metrics for text shown without a usable font: nothing is known.
    fn default() -> Self {
        Self {
            source: Source::Unknown,
            font_matrix: THOUSANDTHS,
            font_bbox: None,
        }
    }
}

const THOUSANDTHS: Matrix = Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0);

impl FontMetrics {
    /// Read metrics from a font dictionary.
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let get = |key: &[u8]| font.get(key).ok().map(|o| resolve(doc, o));
        let subtype = get(b"Subtype").and_then(name_of);
        match subtype {
            Some(b"Type0") => return Self::composite(doc, font),
            Some(b"Type3") => return Self::type3(doc, font),
            _ => {}
        }

        let source = match simple_widths(doc, font) {
            Some(source) => source,
            None => {
                let base_font = get(b"BaseFont")
                    .and_then(name_of)
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .unwrap_or_default();
                match (Standard14::from_base_font(&base_font), encoding_kind(doc, font)) {
                    (Some(Standard14::Symbol), _) => Source::Builtin {
                        font: Standard14::Symbol,
                        standard_encoding: false,
                    },
                    (Some(builtin), Some(standard_encoding)) => Source::Builtin {
                        font: builtin,
                        standard_encoding,
                    },
                    _ => Source::Unknown,
                }
            }
        };
        Self {
            source,
            ..Self::default()
        }
    }

    fn type3(doc: &Document, font: &Dictionary) -> Self {
        let font_matrix = match font.get(b"FontMatrix").map(|o| resolve(doc, o)) {
            Ok(Object::Array(items)) => Matrix::from_operands(items),
            _ => None,
        };
        let font_bbox = font.get(b"FontBBox").ok().and_then(|b| rect_of(doc, b));
        let source = match font_matrix {
            // Type3 glyph positions cannot be derived without both.
            Some(_) => simple_widths(doc, font).unwrap_or(Source::Unknown),
            None => Source::Unknown,
        };
        Self {
            source,
            font_matrix: font_matrix.unwrap_or(THOUSANDTHS),
            font_bbox: font_bbox.filter(|b| b.height() > 0.0),
        }
    }

    fn composite(doc: &Document, font: &Dictionary) -> Self {
        let descendant = match font.get(b"DescendantFonts").map(|o| resolve(doc, o)) {
            Ok(Object::Array(items)) => items.first().and_then(|o| resolve_dict(doc, o)),
            _ => None,
        };
        let Some(descendant) = descendant else {
            return Self::default();
        };
        let default = descendant
            .get(b"DW")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(1000.0);
        let widths = match descendant.get(b"W").map(|o| resolve(doc, o)) {
            Ok(Object::Array(w)) => parse_cid_widths(doc, w),
            _ => HashMap::new(),
        };
        Self {
            source: Source::Composite { widths, default },
            ..Self::default()
        }
    }

    /// Whether codes are two bytes wide.
    pub fn is_composite(&self) -> bool {
        matches!(self.source, Source::Composite { .. })
    }

    /// Split a shown string into character codes and their byte ranges.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, Range<usize>)> {
        if self.is_composite() {
            bytes
                .chunks(2)
                .enumerate()
                .map(|(i, pair)| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    (code, i * 2..i * 2 + pair.len())
                })
                .collect()
        } else {
            bytes
                .iter()
                .enumerate()
                .map(|(i, b)| (*b as u32, i..i + 1))
                .collect()
        }
    }

    /// Advance width of `code` in glyph space units, if known.
    pub fn width(&self, code: u32) -> Option<f64> {
        match &self.source {
            Source::Widths {
                first_char,
                widths,
                missing,
            } => Some(
                code.checked_sub(*first_char)
                    .and_then(|i| widths.get(i as usize).copied())
                    .unwrap_or(*missing),
            ),
            Source::Composite { widths, default } => {
                Some(widths.get(&code).copied().unwrap_or(*default))
            }
            Source::Builtin {
                font,
                standard_encoding,
            } => font.width(code, *standard_encoding),
            Source::Unknown => None,
        }
    }

    /// Horizontal advance of `code` in text space per unit of font size.
    pub fn advance(&self, code: u32) -> Option<f64> {
        self.width(code).map(|w| w * self.font_matrix.a)
    }

    /// Glyph extent below and above the baseline in text space per unit of
    /// font size, when the font declares it.
    pub fn vertical_extent(&self) -> Option<(f64, f64)> {
        let bbox = self.font_matrix.transform_rect(self.font_bbox.as_ref()?);
        Some((bbox.y0, bbox.y1))
    }
}

/// /Widths of a simple or Type3 font.
fn simple_widths(doc: &Document, font: &Dictionary) -> Option<Source> {
    let Ok(Object::Array(items)) = font.get(b"Widths").map(|o| resolve(doc, o)) else {
        return None;
    };
    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|o| number(resolve(doc, o)))
        .map(|n| n.max(0.0) as u32)
        .unwrap_or(0);
    let missing = font
        .get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|d| d.get(b"MissingWidth").ok())
        .and_then(|o| number(resolve(doc, o)))
        .unwrap_or(0.0);
    Some(Source::Widths {
        first_char,
        widths: items
            .iter()
            .map(|o| number(resolve(doc, o)).unwrap_or(0.0))
            .collect(),
        missing,
    })
}

/// `Some(true)` for StandardEncoding (the default for standard fonts),
/// `Some(false)` for WinAnsi or MacRoman, `None` when a /Differences array
/// remaps codes and the built-in tables no longer apply.
fn encoding_kind(doc: &Document, font: &Dictionary) -> Option<bool> {
    let by_name = |name: &[u8]| match name {
        b"WinAnsiEncoding" | b"MacRomanEncoding" => Some(false),
        b"StandardEncoding" => Some(true),
        _ => None,
    };
    match font.get(b"Encoding").map(|o| resolve(doc, o)) {
        Err(_) | Ok(Object::Null) => Some(true),
        Ok(Object::Name(name)) => by_name(name),
        Ok(Object::Dictionary(dict)) => {
            let remapped = matches!(
                dict.get(b"Differences").map(|o| resolve(doc, o)),
                Ok(Object::Array(items)) if !items.is_empty()
            );
            if remapped {
                return None;
            }
            match dict.get(b"BaseEncoding").ok().and_then(name_of) {
                Some(name) => by_name(name),
                None => Some(true),
            }
        }
        Ok(_) => None,
    }
}

/// Parse a composite font /W array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    items.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                // Cap absurd ranges from damaged files.
                let last = (last.max(0.0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn standard(base_font: &str) -> FontMetrics {
        let doc = Document::with_version("1.5");
        FontMetrics::from_dict(&doc, &dictionary! { "Subtype" => "Type1", "BaseFont" => base_font })
    }

    fn type3_matrix() -> Vec<Object> {
        [0.01, 0.0, 0.0, 0.01, 0.0, 0.0].into_iter().map(Object::Real).collect()
    }

    fn text_width(metrics: &FontMetrics, text: &str) -> f64 {
        text.bytes().map(|b| metrics.width(b as u32).expect("known")).sum()
    }

    #[test]
    fn explicit_widths_take_priority() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(700), Object::Integer(650)],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(65), Some(700.0));
        assert_eq!(metrics.width(66), Some(650.0));
        // Outside the range: MissingWidth, which defaults to 0.
        assert_eq!(metrics.width(67), Some(0.0));
        assert!(metrics.advance(65).is_some_and(|a| (a - 0.7).abs() < 1e-12));
    }

    #[test]
    fn standard_fonts_use_builtin_tables() {
        let helv = standard("Helvetica");
        assert_eq!(helv.width(b'W' as u32), Some(944.0));
        assert_eq!(helv.width(b' ' as u32), Some(278.0));
        assert_eq!(standard("Helvetica-BoldOblique").width(b'a' as u32), Some(556.0));
        assert_eq!(standard("Courier-Bold").width(b'i' as u32), Some(600.0));
        assert_eq!(standard("ABCDEF+TimesNewRomanPS-BoldMT").width(b'W' as u32), Some(1000.0));
        assert_eq!(standard("Times-Italic").width(b'A' as u32), Some(611.0));
        assert_eq!(standard("Times-BoldItalic").width(b'@' as u32), Some(832.0));
    }

    #[test]
    fn times_roman_places_digits_where_they_are_drawn() {
        let times = standard("Times-Roman");
        // "The account number is " is 9387/1000 em wide in Times-Roman.
        assert_eq!(text_width(&times, "The account number is "), 9387.0);
        assert_eq!(text_width(&times, "987654321"), 4500.0);
    }

    #[test]
    fn symbol_uses_its_own_encoding() {
        let symbol = standard("Symbol");
        assert_eq!(symbol.width(b'a' as u32), Some(631.0));
        assert_eq!(symbol.width(0xA5), Some(713.0));
        assert_eq!(symbol.width(0xF0), None);
        assert_eq!(symbol.width(0x80), None);
    }

    #[test]
    fn standard_encoding_quotes_differ_from_win_ansi() {
        let doc = Document::with_version("1.5");
        let plain = standard("Times-Roman");
        let ansi = FontMetrics::from_dict(
            &doc,
            &dictionary! {
                "Subtype" => "Type1",
                "BaseFont" => "Times-Roman",
                "Encoding" => "WinAnsiEncoding",
            },
        );
        assert_eq!(plain.width(39), Some(333.0));
        assert_eq!(ansi.width(39), Some(180.0));
    }

    #[test]
    fn unknown_metrics_are_not_guessed() {
        let doc = Document::with_version("1.5");
        assert_eq!(standard("Garamond").width(b'a' as u32), None);
        assert_eq!(standard("ZapfDingbats").width(b'a' as u32), None);
        assert_eq!(standard("Helvetica").width(0xE9), None);
        assert_eq!(FontMetrics::default().advance(b'a' as u32), None);

        let remapped = FontMetrics::from_dict(
            &doc,
            &dictionary! {
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => dictionary! {
                    "Differences" => vec![Object::Integer(65), Object::Name(b"B".to_vec())],
                },
            },
        );
        assert_eq!(remapped.width(b'A' as u32), None);
    }

    #[test]
    fn type3_widths_go_through_the_font_matrix() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "Type3",
            "FontMatrix" => type3_matrix(),
            "FontBBox" => vec![
                Object::Integer(0),
                Object::Integer(-20),
                Object::Integer(100),
                Object::Integer(80),
            ],
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(100); 10],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert_eq!(metrics.width(b'F' as u32), Some(100.0));
        let advance = metrics.advance(b'F' as u32).expect("advance");
        assert!((advance - 1.0).abs() < 1e-6);
        let (descent, ascent) = metrics.vertical_extent().expect("bbox");
        assert!((descent + 0.2).abs() < 1e-6 && (ascent - 0.8).abs() < 1e-6);

        let without_matrix = dictionary! {
            "Subtype" => "Type3",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(100)],
        };
        assert_eq!(FontMetrics::from_dict(&doc, &without_matrix).advance(65), None);
    }

    #[test]
    fn composite_fonts_split_two_byte_codes() {
        let mut doc = Document::with_version("1.5");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 800,
            "W" => vec![
                Object::Integer(3),
                Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(400),
            ],
        });
        let font = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "Some-Identity",
            "DescendantFonts" => vec![Object::Reference(descendant)],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!(metrics.is_composite());

        let codes = metrics.codes(&[0x00, 0x03, 0x00, 0x0B]);
        assert_eq!(codes, vec![(3, 0..2), (11, 2..4)]);
        assert_eq!(metrics.width(3), Some(250.0));
        assert_eq!(metrics.width(4), Some(300.0));
        assert_eq!(metrics.width(11), Some(400.0));
        assert_eq!(metrics.width(99), Some(800.0));
    }
}

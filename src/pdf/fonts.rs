//! Fonts and text measurement
//!
//! By default titles and footers use the built-in Helvetica faces, so nothing
//! has to be embedded. Their text is written in WinAnsiEncoding and measured
//! with the Helvetica AFM metrics. A [`Font::Embedded`] face covers file names
//! WinAnsi can't show.

use std::sync::Arc;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;
use crate::pdf::truetype::EmbeddedFont;

/// Face used for one run of text
#[derive(Debug, Clone)]
pub enum Font {
    Standard(StandardFont),
    Embedded(Arc<EmbeddedFont>),
}

impl Font {
    /// Width of `text` in points at `size`
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        match self {
            Font::Standard(font) => font.text_width(text, size),
            Font::Embedded(font) => font.text_width(text, size),
        }
    }

    /// `Tj` operand for `text` in this face's encoding
    pub fn show_operand(&self, text: &str) -> String {
        match self {
            Font::Standard(_) => pdf_literal(text),
            Font::Embedded(font) => font.hex_string(text),
        }
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Font::Standard(a), Font::Standard(b)) => a == b,
            (Font::Embedded(a), Font::Embedded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<StandardFont> for Font {
    fn from(font: StandardFont) -> Self {
        Font::Standard(font)
    }
}

/// A standard-14 face the document can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// Resolve a family/weight request to a standard face
    ///
    /// Other families fall back to Helvetica; real faces come in as
    /// [`Font::Embedded`].
    pub fn resolve(family: &str, bold: bool) -> Self {
        if !family.eq_ignore_ascii_case("helvetica") {
            debug!("Font family {} not available, using Helvetica", family);
        }
        if bold {
            StandardFont::HelveticaBold
        } else {
            StandardFont::Helvetica
        }
    }

    /// PostScript name written as BaseFont
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Resource name used in content streams
    pub fn resource_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "F1",
            StandardFont::HelveticaBold => "F2",
        }
    }

    /// Advance width of a WinAnsi code in 1/1000 em
    fn glyph_width(&self, code: u8) -> u16 {
        let table = match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match code {
            32..=126 => table[(code - 32) as usize],
            _ => 556,
        }
    }

    /// Width of `text` in points at `size`
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = encode_win_ansi(text)
            .iter()
            .map(|&b| self.glyph_width(b) as u32)
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Add a Type1 standard font dictionary to the document
pub fn add_standard_font(doc: &mut Document, font: StandardFont) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(font.base_font().as_bytes().to_vec()));
    dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    doc.add_object(Object::Dictionary(dict))
}

/// Map text onto WinAnsiEncoding bytes, replacing unmappable characters with `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match win_ansi_code(c) {
            Some(code) => code,
            None => {
                debug!("No WinAnsi code for {:?}, writing '?'", c);
                b'?'
            }
        })
        .collect()
}

fn win_ansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

/// Encode text as an escaped PDF literal string, parentheses included
pub fn pdf_literal(text: &str) -> String {
    let mut out = String::from("(");
    for byte in encode_win_ansi(text) {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out.push(')');
    out
}

/// Greedy word wrap to `max_width` points
///
/// Words longer than a whole line are split by character. An empty string
/// yields a single empty line.
pub fn wrap_text(text: &str, font: &Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if font.text_width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if font.text_width(word, size) <= max_width {
            current = word.to_string();
        } else {
            for c in word.chars() {
                current.push(c);
                if font.text_width(&current, size) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(c);
                }
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

/// Helvetica widths for codes 32..=126
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space - /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0 - 9
    278, 278, 584, 584, 584, 556, 1015, // : - @
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A - M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N - Z
    278, 278, 278, 469, 556, 333, // [ - `
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a - m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n - z
    334, 260, 334, 584, // { - ~
];

/// Helvetica-Bold widths for codes 32..=126
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // space - /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0 - 9
    333, 333, 584, 584, 584, 611, 975, // : - @
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A - M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N - Z
    333, 278, 333, 584, 556, 333, // [ - `
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a - m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n - z
    389, 280, 389, 584, // { - ~
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        // "A" is 667 units in Helvetica
        let w = StandardFont::Helvetica.text_width("A", 10.0);
        assert!((w - 6.67).abs() < 0.001);

        let bold = StandardFont::HelveticaBold.text_width("receipt.pdf", 12.0);
        let regular = StandardFont::Helvetica.text_width("receipt.pdf", 12.0);
        assert!(bold > regular);
    }

    #[test]
    fn test_pdf_literal_escapes() {
        assert_eq!(pdf_literal("a(b)c\\"), "(a\\(b\\)c\\\\)");
        assert_eq!(pdf_literal("café"), "(caf\\351)");
        assert_eq!(pdf_literal("領収書"), "(???)");
    }

    #[test]
    fn test_win_ansi_specials() {
        assert_eq!(encode_win_ansi("€–"), vec![0x80, 0x96]);
    }

    #[test]
    fn test_wrap_short_text_single_line() {
        let lines = wrap_text("IMG_0001.jpg", &StandardFont::HelveticaBold.into(), 12.0, 540.0);
        assert_eq!(lines, vec!["IMG_0001.jpg".to_string()]);
    }

    #[test]
    fn test_wrap_empty_text() {
        let lines = wrap_text("", &StandardFont::Helvetica.into(), 12.0, 540.0);
        assert_eq!(lines, vec![String::new()]);
    }

    #[test]
    fn test_wrap_breaks_words_and_long_tokens() {
        let font = Font::Standard(StandardFont::Helvetica);
        let lines = wrap_text("aaaa bbbb cccc", &font, 10.0, font.text_width("aaaa bbbb", 10.0));
        assert_eq!(lines, vec!["aaaa bbbb".to_string(), "cccc".to_string()]);

        let long = "x".repeat(50);
        let lines = wrap_text(&long, &font, 10.0, 50.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| font.text_width(l, 10.0) <= 50.0));
        assert_eq!(lines.concat(), long);
    }

    #[test]
    fn test_standard_font_show_operand() {
        let font = Font::from(StandardFont::Helvetica);
        assert_eq!(font.show_operand("a(1)"), "(a\\(1\\))");
        assert_eq!(font, Font::Standard(StandardFont::Helvetica));
        assert_ne!(font, Font::Standard(StandardFont::HelveticaBold));
    }

    #[test]
    fn test_resolve_falls_back_to_helvetica() {
        assert_eq!(StandardFont::resolve("Noto Sans JP", true), StandardFont::HelveticaBold);
        assert_eq!(StandardFont::resolve("Helvetica", false), StandardFont::Helvetica);
    }
}

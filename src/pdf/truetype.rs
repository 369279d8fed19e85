//! Embedded TrueType fonts for text the standard faces can't show
//!
//! The font program is embedded whole as a CIDFontType2 descendant of a
//! Type0 font with Identity-H encoding, so strings are written as 2-byte
//! glyph IDs. Text is shaped with rustybuzz; glyph widths come from the
//! font's `hmtx` table and are written into the `/W` array, and a ToUnicode
//! CMap keeps the text searchable and copyable.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rustybuzz::ttf_parser::{name_id, GlyphId, Tag};
use rustybuzz::{Face, UnicodeBuffer};
use tracing::{debug, info};
use crate::error::{Error, Result};

/// bfchar entries per block; the CMap syntax caps a block at 100
const CMAP_BLOCK: usize = 100;

/// One shaped glyph and the text it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedGlyph {
    pub gid: u16,
    /// Advance in font units
    pub advance: u16,
    /// Source characters for this glyph's cluster
    pub text: String,
}

/// A TrueType font loaded from disk, ready to embed
pub struct EmbeddedFont {
    data: Vec<u8>,
    postscript_name: String,
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    bbox: [i16; 4],
    italic: bool,
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("postscript_name", &self.postscript_name)
            .field("units_per_em", &self.units_per_em)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl EmbeddedFont {
    /// Read and validate a `.ttf` file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let font = Self::from_bytes(std::fs::read(path)?)?;
        info!("Loaded title font {} from {}", font.postscript_name, path.display());
        Ok(font)
    }

    /// Parse font data; only TrueType (`glyf`) outlines are accepted
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let face = Face::from_slice(&data, 0)
            .ok_or_else(|| Error::Font("not a TrueType or OpenType font".to_string()))?;

        if face.raw_face().table(Tag::from_bytes(b"glyf")).is_none() {
            return Err(Error::Font(
                "only TrueType outlines (glyf) can be embedded; use a .ttf font".to_string(),
            ));
        }

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| sanitize_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "EmbeddedFont".to_string());

        let rect = face.global_bounding_box();
        let units_per_em = rustybuzz::ttf_parser::Face::units_per_em(&face).max(1);
        let ascent = face.ascender();
        let descent = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascent);
        let italic = face.is_italic();

        Ok(Self {
            data,
            postscript_name,
            units_per_em,
            ascent,
            descent,
            cap_height,
            bbox: [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
            italic,
        })
    }

    /// PostScript name written as BaseFont
    pub fn name(&self) -> &str {
        &self.postscript_name
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::from_slice(&self.data, 0)
    }

    /// Shape `text` into glyphs, keeping each glyph's source characters
    pub fn shape(&self, text: &str) -> Vec<ShapedGlyph> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let output = rustybuzz::shape(&face, &[], buffer);

        let mut starts: Vec<usize> = output
            .glyph_infos()
            .iter()
            .map(|info| info.cluster as usize)
            .collect();
        starts.sort_unstable();
        starts.dedup();

        output
            .glyph_infos()
            .iter()
            .map(|info| {
                let start = (info.cluster as usize).min(text.len());
                let end = starts
                    .iter()
                    .copied()
                    .find(|&s| s > start)
                    .unwrap_or(text.len());
                let gid = info.glyph_id as u16;
                if gid == 0 {
                    debug!("{} has no glyph for {:?}", self.postscript_name, text.get(start..end));
                }
                ShapedGlyph {
                    gid,
                    advance: face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0),
                    text: text.get(start..end).unwrap_or_default().to_string(),
                }
            })
            .collect()
    }

    /// Width of `text` in points at `size`
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = self.shape(text).iter().map(|g| g.advance as u32).sum();
        units as f32 * size / self.units_per_em as f32
    }

    /// Glyph-ID hex string for a `Tj` operand, e.g. `<00120034>`
    pub fn hex_string(&self, text: &str) -> String {
        let mut out = String::from("<");
        for glyph in self.shape(text) {
            out.push_str(&format!("{:04X}", glyph.gid));
        }
        out.push('>');
        out
    }

    /// Font units to the 1/1000 em PDF glyph space
    fn scale(&self, value: i32) -> i64 {
        (value as f64 * 1000.0 / self.units_per_em as f64).round() as i64
    }
}

/// Collect the glyphs a set of strings uses, with their source text
pub fn glyph_usage<'a>(font: &EmbeddedFont, texts: impl IntoIterator<Item = &'a str>) -> BTreeMap<u16, ShapedGlyph> {
    let mut used = BTreeMap::new();
    for text in texts {
        for glyph in font.shape(text) {
            used.entry(glyph.gid).or_insert(glyph);
        }
    }
    used
}

/// Add the Type0 font, its CIDFont, descriptor, font program and ToUnicode map
///
/// `used` lists the glyphs drawn with this font; only those get widths and
/// ToUnicode entries.
// TODO: subset the font program to `used` instead of embedding the whole file
pub fn add_embedded_font(doc: &mut Document, font: &EmbeddedFont, used: &BTreeMap<u16, ShapedGlyph>) -> ObjectId {
    let mut file_dict = Dictionary::new();
    file_dict.set("Length1", Object::Integer(font.data.len() as i64));
    let file_id = doc.add_object(Stream::new(file_dict, font.data.clone()));

    let [x_min, y_min, x_max, y_max] = font.bbox;
    let mut descriptor = Dictionary::new();
    descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
    descriptor.set("FontName", Object::Name(font.postscript_name.as_bytes().to_vec()));
    // Symbolic, plus Italic when the face says so
    descriptor.set("Flags", Object::Integer(if font.italic { 4 | 64 } else { 4 }));
    descriptor.set(
        "FontBBox",
        Object::Array(
            [x_min, y_min, x_max, y_max]
                .iter()
                .map(|&v| Object::Integer(font.scale(v as i32)))
                .collect(),
        ),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", Object::Integer(font.scale(font.ascent as i32)));
    descriptor.set("Descent", Object::Integer(font.scale(font.descent as i32)));
    descriptor.set("CapHeight", Object::Integer(font.scale(font.cap_height as i32)));
    descriptor.set("StemV", Object::Integer(80));
    descriptor.set("FontFile2", Object::Reference(file_id));
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    let mut widths = Vec::with_capacity(used.len() * 2);
    for glyph in used.values() {
        widths.push(Object::Integer(glyph.gid as i64));
        widths.push(Object::Array(vec![Object::Integer(font.scale(glyph.advance as i32))]));
    }

    let mut system_info = Dictionary::new();
    system_info.set("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal));
    system_info.set("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal));
    system_info.set("Supplement", Object::Integer(0));

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", Object::Name(b"Font".to_vec()));
    cid_font.set("Subtype", Object::Name(b"CIDFontType2".to_vec()));
    cid_font.set("BaseFont", Object::Name(font.postscript_name.as_bytes().to_vec()));
    cid_font.set("CIDSystemInfo", Object::Dictionary(system_info));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("DW", Object::Integer(1000));
    cid_font.set("W", Object::Array(widths));
    cid_font.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(used).into_bytes()));

    let mut type0 = Dictionary::new();
    type0.set("Type", Object::Name(b"Font".to_vec()));
    type0.set("Subtype", Object::Name(b"Type0".to_vec()));
    type0.set("BaseFont", Object::Name(font.postscript_name.as_bytes().to_vec()));
    type0.set("Encoding", Object::Name(b"Identity-H".to_vec()));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
    type0.set("ToUnicode", Object::Reference(to_unicode_id));

    debug!("Embedded {} with {} glyph(s) in use", font.postscript_name, used.len());

    doc.add_object(Object::Dictionary(type0))
}

/// ToUnicode CMap mapping glyph IDs back to their UTF-16 text
fn to_unicode_cmap(used: &BTreeMap<u16, ShapedGlyph>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<&ShapedGlyph> = used
        .values()
        .filter(|g| g.gid != 0 && !g.text.is_empty())
        .collect();

    for block in entries.chunks(CMAP_BLOCK) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for glyph in block {
            let utf16: String = glyph
                .text
                .encode_utf16()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", glyph.gid, utf16));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

/// PDF names can't hold spaces or delimiters
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(gid: u16, text: &str) -> ShapedGlyph {
        ShapedGlyph {
            gid,
            advance: 1000,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_rejects_non_font_data() {
        let result = EmbeddedFont::from_bytes(b"definitely not a font".to_vec());
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EmbeddedFont::load(Path::new("no-such-font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Noto Sans JP (Bold)"), "NotoSansJPBold");
        assert_eq!(sanitize_name("NotoSansJP-Regular"), "NotoSansJP-Regular");
    }

    #[test]
    fn test_to_unicode_cmap_entries() {
        let mut used = BTreeMap::new();
        used.insert(0x0012, glyph(0x0012, "領"));
        used.insert(0x0034, glyph(0x0034, "a"));
        used.insert(0, glyph(0, "?"));

        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0012> <9818>"));
        assert!(cmap.contains("<0034> <0061>"));
        assert!(!cmap.contains("<0000> <"));
    }

    #[test]
    fn test_to_unicode_cmap_blocks() {
        let used: BTreeMap<u16, ShapedGlyph> =
            (1..=150u16).map(|gid| (gid, glyph(gid, "x"))).collect();

        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }

    #[test]
    fn test_surrogate_pairs_in_cmap() {
        let mut used = BTreeMap::new();
        used.insert(7, glyph(7, "😀"));
        assert!(to_unicode_cmap(&used).contains("<0007> <D83DDE00>"));
    }

    fn system_font() -> Option<EmbeddedFont> {
        ["/usr/share/fonts/**/*.ttf", "/Library/Fonts/*.ttf", "C:/Windows/Fonts/*.ttf"]
            .iter()
            .filter_map(|pattern| glob::glob(pattern).ok())
            .flatten()
            .flatten()
            .filter_map(|path| EmbeddedFont::load(&path).ok())
            .find(|font| font.shape("Receipt").iter().all(|g| g.gid != 0))
    }

    #[test]
    fn test_system_font_shapes_and_embeds() {
        let Some(font) = system_font() else {
            eprintln!("Skipping: no .ttf font installed");
            return;
        };

        let glyphs = font.shape("Receipt");
        assert_eq!(glyphs.len(), 7);

        let width = font.text_width("Receipt", 12.0);
        assert!(width > 0.0);
        assert!((font.text_width("Receipt", 24.0) - 2.0 * width).abs() < 0.01);

        let hex = font.hex_string("Receipt");
        assert_eq!(hex.len(), 2 + 4 * 7);
        assert!(hex.starts_with('<') && hex.ends_with('>'));

        let mut doc = Document::with_version("1.7");
        let used = glyph_usage(&font, ["Receipt", "total"]);
        let font_id = add_embedded_font(&mut doc, &font, &used);

        let type0 = doc.get_dictionary(font_id).unwrap();
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(type0.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");

        let descendants = type0.get(b"DescendantFonts").unwrap().as_array().unwrap();
        let cid_id = descendants[0].as_reference().unwrap();
        let cid = doc.get_dictionary(cid_id).unwrap();
        assert_eq!(cid.get(b"Subtype").unwrap().as_name().unwrap(), b"CIDFontType2");
        assert!(!cid.get(b"W").unwrap().as_array().unwrap().is_empty());
    }
}

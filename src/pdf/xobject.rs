//! Embedding receipts as XObjects
//!
//! Raster images become Image XObjects. Pages of source PDFs become Form
//! XObjects, so they can be scaled and positioned like any other image.

use std::io::Cursor;
use std::path::Path;
use image::codecs::jpeg::JpegDecoder;
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ExtendedColorType, ImageDecoder, ImageReader};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;
use crate::error::{Error, Result};

/// Fallback page box when a source page has no usable MediaBox (US Letter)
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Inherited page attributes are looked up at most this many levels up
const MAX_TREE_DEPTH: usize = 32;

/// What kind of XObject a handle points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    /// Image XObject, drawn into the unit square
    Image,
    /// Form XObject whose Matrix maps it onto `[0 0 width height]`
    Form,
}

/// Reference to an embedded XObject and its natural size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XObjectHandle {
    pub id: ObjectId,
    pub kind: XObjectKind,
    /// Natural width: pixels for images, points for forms
    pub width: f32,
    /// Natural height: pixels for images, points for forms
    pub height: f32,
}

impl XObjectHandle {
    /// Height over width
    pub fn aspect_ratio(&self) -> f32 {
        if self.width > 0.0 {
            self.height / self.width
        } else {
            1.0
        }
    }

    /// Resource name used in page content streams
    pub fn resource_name(&self) -> String {
        format!("X{}", self.id.0)
    }

    /// `cm` operands that draw this XObject into the box at (x, y) of size w × h
    pub fn placement(&self, x: f32, y: f32, w: f32, h: f32) -> [f32; 6] {
        match self.kind {
            XObjectKind::Image => [w, 0.0, 0.0, h, x, y],
            XObjectKind::Form => [w / self.width, 0.0, 0.0, h / self.height, x, y],
        }
    }
}

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
struct TransformMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl TransformMatrix {
    /// Map a page box with the given /Rotate onto an upright box at the origin
    ///
    /// Rotation is clockwise, as a viewer displays it.
    fn upright(media_box: [f32; 4], rotate: i64) -> Self {
        let [x0, y0, x1, y1] = media_box;
        match rotate.rem_euclid(360) {
            90 => Self { a: 0.0, b: -1.0, c: 1.0, d: 0.0, e: -y0, f: x1 },
            180 => Self { a: -1.0, b: 0.0, c: 0.0, d: -1.0, e: x1, f: y1 },
            270 => Self { a: 0.0, b: 1.0, c: -1.0, d: 0.0, e: y1, f: -x0 },
            _ => Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: -x0, f: -y0 },
        }
    }

    fn to_object(self) -> Object {
        Object::Array(
            [self.a, self.b, self.c, self.d, self.e, self.f]
                .into_iter()
                .map(Object::Real)
                .collect(),
        )
    }
}

/// Embed a raster image file as an Image XObject
///
/// Baseline JPEGs in gray or RGB are copied through untouched. Everything
/// else is decoded, turned upright according to its EXIF orientation and
/// stored as raw samples (Flate-compressed on save), with any alpha channel
/// split out into a soft mask.
pub fn embed_image(doc: &mut Document, path: &Path) -> Result<XObjectHandle> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;

    if let Some(handle) = embed_jpeg_passthrough(doc, &bytes)? {
        debug!("Embedded {} as DCT stream", path.display());
        return Ok(handle);
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut decoded = DynamicImage::from_decoder(decoder)?;
    decoded.apply_orientation(orientation);

    debug!(
        "Embedded {} as raw {:?} ({}x{})",
        path.display(),
        decoded.color(),
        decoded.width(),
        decoded.height()
    );

    Ok(embed_decoded(doc, &decoded))
}

/// Copy a JPEG straight into a DCTDecode stream when the PDF can show it as-is
fn embed_jpeg_passthrough(doc: &mut Document, bytes: &[u8]) -> Result<Option<XObjectHandle>> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Ok(None);
    }

    let mut decoder = JpegDecoder::new(Cursor::new(bytes))?;
    if decoder.orientation()? != Orientation::NoTransforms {
        return Ok(None);
    }

    let color_space: &[u8] = match decoder.original_color_type() {
        ExtendedColorType::L8 => b"DeviceGray",
        ExtendedColorType::Rgb8 => b"DeviceRGB",
        // CMYK and friends need a Decode array; let the raw path handle them
        _ => return Ok(None),
    };
    let (width, height) = decoder.dimensions();

    let mut dict = image_dictionary(width, height, color_space);
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    let stream = Stream {
        dict,
        content: bytes.to_vec(),
        allows_compression: false,
        start_position: None,
    };
    let id = doc.add_object(Object::Stream(stream));

    Ok(Some(XObjectHandle {
        id,
        kind: XObjectKind::Image,
        width: width as f32,
        height: height as f32,
    }))
}

/// Store decoded pixels as an uncompressed Image XObject
pub fn embed_decoded(doc: &mut Document, decoded: &DynamicImage) -> XObjectHandle {
    let (width, height) = (decoded.width(), decoded.height());
    let color = decoded.color();

    let smask_id = if color.has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p[3]).collect();
        let mask = image_dictionary(width, height, b"DeviceGray");
        Some(doc.add_object(Stream::new(mask, alpha)))
    } else {
        None
    };

    let gray = matches!(color, ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16);
    let (color_space, samples): (&[u8], Vec<u8>) = if gray {
        (b"DeviceGray", decoded.to_luma8().into_raw())
    } else {
        (b"DeviceRGB", decoded.to_rgb8().into_raw())
    };

    let mut dict = image_dictionary(width, height, color_space);
    if let Some(smask_id) = smask_id {
        dict.set("SMask", Object::Reference(smask_id));
    }

    let id = doc.add_object(Stream::new(dict, samples));

    XObjectHandle {
        id,
        kind: XObjectKind::Image,
        width: width as f32,
        height: height as f32,
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

/// Source page pulled out of its document before the objects are moved
struct ImportedPage {
    content: Vec<u8>,
    media_box: [f32; 4],
    rotate: i64,
    resources: Object,
}

/// Import every page of a PDF file as a Form XObject, in page order
///
/// The source objects are renumbered past the target's highest ID and copied
/// over wholesale; the source catalog and page tree end up unreferenced and
/// are dropped when the target is pruned before saving.
pub fn import_pdf_pages(doc: &mut Document, path: &Path) -> Result<Vec<XObjectHandle>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut source = Document::load(path)?;
    source.renumber_objects_with(doc.max_id + 1);

    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    let mut pages = Vec::with_capacity(page_ids.len());
    for page_id in page_ids {
        let content = source.get_page_content(page_id)?;
        let media_box = inherited_attribute(&source, page_id, b"MediaBox")
            .and_then(|obj| rectangle(&source, obj))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let rotate = inherited_attribute(&source, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let resources = inherited_attribute(&source, page_id, b"Resources")
            .cloned()
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));

        pages.push(ImportedPage { content, media_box, rotate, resources });
    }

    // Move the renumbered objects over before creating anything new
    doc.max_id = doc.max_id.max(source.max_id);
    doc.objects.extend(source.objects);

    let handles = pages
        .into_iter()
        .map(|page| add_page_form(doc, page))
        .collect::<Vec<_>>();

    debug!("Imported {} page(s) from {}", handles.len(), path.display());

    Ok(handles)
}

fn add_page_form(doc: &mut Document, page: ImportedPage) -> XObjectHandle {
    let [x0, y0, x1, y1] = page.media_box;
    let (box_w, box_h) = ((x1 - x0).abs(), (y1 - y0).abs());
    let quarter_turn = matches!(page.rotate.rem_euclid(360), 90 | 270);
    let (width, height) = if quarter_turn { (box_h, box_w) } else { (box_w, box_h) };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set("FormType", Object::Integer(1));
    dict.set("BBox", Object::Array(page.media_box.into_iter().map(Object::Real).collect()));
    dict.set("Matrix", TransformMatrix::upright(page.media_box, page.rotate).to_object());
    dict.set("Resources", page.resources);

    let id = doc.add_object(Stream::new(dict, page.content));

    XObjectHandle {
        id,
        kind: XObjectKind::Form,
        width,
        height,
    }
}

/// Look up a page attribute, walking up the page tree for inherited values
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
        depth += 1;
    }

    None
}

/// Read a four-number rectangle, following one level of indirection
fn rectangle(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(arr) {
        *slot = match value {
            Object::Integer(i) => *i as f32,
            Object::Real(f) => *f,
            _ => return None,
        };
    }

    // Zero-area boxes can't be scaled onto the page
    if (rect[2] - rect[0]).abs() < f32::EPSILON || (rect[3] - rect[1]).abs() < f32::EPSILON {
        return None;
    }

    // Normalise so (x0, y0) is the lower-left corner
    Some([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_upright_matrix_identity_at_origin() {
        let m = TransformMatrix::upright([0.0, 0.0, 612.0, 792.0], 0);
        assert_eq!(m, TransformMatrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 });
    }

    #[test]
    fn test_upright_matrix_quarter_turn() {
        // Top-left corner of a rotated page ends up at the top-right
        let m = TransformMatrix::upright([0.0, 0.0, 612.0, 792.0], 90);
        let (x, y) = (0.0, 792.0);
        let xp = m.a * x + m.c * y + m.e;
        let yp = m.b * x + m.d * y + m.f;
        assert_eq!((xp, yp), (792.0, 612.0));

        // Negative rotations are normalised
        assert_eq!(
            TransformMatrix::upright([0.0, 0.0, 10.0, 20.0], -90),
            TransformMatrix::upright([0.0, 0.0, 10.0, 20.0], 270)
        );
    }

    #[test]
    fn test_placement_scales_forms_to_box() {
        let handle = XObjectHandle {
            id: (7, 0),
            kind: XObjectKind::Form,
            width: 612.0,
            height: 792.0,
        };
        let m = handle.placement(100.0, 50.0, 306.0, 396.0);
        assert_eq!(m, [0.5, 0.0, 0.0, 0.5, 100.0, 50.0]);
        assert_eq!(handle.resource_name(), "X7");
    }

    #[test]
    fn test_embed_png_with_alpha_gets_smask() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("receipt.png");
        RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 128]))
            .save(&path)
            .expect("write png");

        let mut doc = Document::with_version("1.5");
        let handle = embed_image(&mut doc, &path).expect("embed");

        assert_eq!(handle.kind, XObjectKind::Image);
        assert_eq!((handle.width, handle.height), (20.0, 10.0));
        assert!((handle.aspect_ratio() - 0.5).abs() < f32::EPSILON);

        let stream = doc.get_object(handle.id).and_then(|o| o.as_stream()).expect("stream");
        assert!(stream.dict.get(b"SMask").is_ok());
        assert_eq!(stream.content.len(), 20 * 10 * 3);
    }

    #[test]
    fn test_embed_jpeg_passes_through() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("receipt.jpg");
        RgbImage::from_pixel(16, 32, Rgb([10, 200, 10]))
            .save(&path)
            .expect("write jpeg");

        let mut doc = Document::with_version("1.5");
        let handle = embed_image(&mut doc, &path).expect("embed");

        let stream = doc.get_object(handle.id).and_then(|o| o.as_stream()).expect("stream");
        let filter = stream.dict.get(b"Filter").and_then(|f| f.as_name()).expect("filter");
        assert_eq!(filter, b"DCTDecode");
        assert_eq!(stream.content, std::fs::read(&path).expect("read"));
    }

    #[test]
    fn test_embed_missing_image() {
        let mut doc = Document::with_version("1.5");
        let result = embed_image(&mut doc, Path::new("nonexistent.png"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_rectangle_normalises_and_rejects_zero_area() {
        let doc = Document::with_version("1.5");
        let flipped = Object::Array(vec![
            Object::Integer(612),
            Object::Integer(792),
            Object::Integer(0),
            Object::Real(0.0),
        ]);
        assert_eq!(rectangle(&doc, &flipped), Some([0.0, 0.0, 612.0, 792.0]));

        let flat = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(0),
        ]);
        assert_eq!(rectangle(&doc, &flat), None);
    }

    #[test]
    fn test_import_zero_width_media_box_falls_back_to_letter() {
        use lopdf::dictionary;

        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("flat.pdf");

        let mut source = Document::with_version("1.5");
        let pages_id = source.new_object_id();
        let content_id = source.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
        let page_id = source.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(792)],
        });
        source.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = source.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        source.trailer.set("Root", catalog_id);
        source.save(&path).expect("write pdf");

        let mut doc = Document::with_version("1.5");
        let handles = import_pdf_pages(&mut doc, &path).expect("import");
        assert_eq!(handles.len(), 1);
        assert_eq!((handles[0].width, handles[0].height), (612.0, 792.0));
        assert!(handles[0]
            .placement(0.0, 0.0, 400.0, 517.6)
            .iter()
            .all(|v| v.is_finite()));
    }

    #[test]
    fn test_import_missing_pdf() {
        let mut doc = Document::with_version("1.5");
        let result = import_pdf_pages(&mut doc, Path::new("nonexistent.pdf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}

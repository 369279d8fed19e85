//! Writing laid-out pages into a PDF document

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use chrono::{DateTime, Local};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;
use crate::error::Result;
use crate::layout::{Footer, Page, PageSetup, PlacedItem};
use crate::pdf::fonts::{add_standard_font, pdf_literal, Font, StandardFont};
use crate::pdf::truetype::{add_embedded_font, glyph_usage, EmbeddedFont};

/// Document Info dictionary contents
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub producer: String,
    pub created: DateTime<Local>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: "My Receipts".to_string(),
            producer: format!("receipt-pdf {}", env!("CARGO_PKG_VERSION")),
            created: Local::now(),
        }
    }
}

/// PDF date string, e.g. `D:20240131154500+01'00'`
fn pdf_date(date: &DateTime<Local>) -> String {
    let offset = date.format("%z").to_string();
    let (hours, minutes) = offset.split_at(offset.len().saturating_sub(2));
    format!("D:{}{}'{}'", date.format("%Y%m%d%H%M%S"), hours, minutes)
}

/// Add the laid-out pages, page tree, catalog and Info to `doc`
///
/// XObjects referenced by the pages must already be in the document. The
/// footer, if any, is drawn inside the bottom margin of every page. Embedded
/// fonts used by any text item are added once, with widths for just the
/// glyphs the pages draw.
pub fn render_pages(
    doc: &mut Document,
    setup: &PageSetup,
    pages: &[Page],
    footer: Option<&Footer>,
    info: &DocumentInfo,
) -> Result<()> {
    let regular_id = add_standard_font(doc, StandardFont::Helvetica);
    let bold_id = add_standard_font(doc, StandardFont::HelveticaBold);

    let mut fonts = Dictionary::new();
    fonts.set(StandardFont::Helvetica.resource_name(), Object::Reference(regular_id));
    fonts.set(StandardFont::HelveticaBold.resource_name(), Object::Reference(bold_id));

    let embedded = embedded_fonts(pages);
    for (i, font) in embedded.iter().enumerate() {
        let texts = pages.iter().flat_map(|page| &page.items).filter_map(|item| match item {
            PlacedItem::Text { text, font: Font::Embedded(f), .. } if Arc::ptr_eq(f, font) => {
                Some(text.as_str())
            }
            _ => None,
        });
        let used = glyph_usage(font, texts);
        let font_id = add_embedded_font(doc, font, &used);
        fonts.set(embedded_resource_name(i), Object::Reference(font_id));
    }

    let pages_id = doc.new_object_id();
    let page_count = pages.len();
    let mut kids = Vec::with_capacity(page_count);

    for (i, page) in pages.iter().enumerate() {
        let page_number = i + 1;
        let footer_text = footer.map(|f| (f, f.text(page_number, page_count)));

        let content = page_content(
            setup,
            page,
            &embedded,
            footer_text.as_ref().map(|(f, t)| (*f, t.as_str())),
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts.clone()));
        let xobjects = page_xobjects(page);
        if !xobjects.is_empty() {
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("MediaBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(setup.page_width()),
            Object::Real(setup.page_height()),
        ]));
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Reference(content_id));

        let page_id = doc.add_object(Object::Dictionary(page_dict));
        kids.push(Object::Reference(page_id));
        debug!("Rendered page {}/{} ({} items)", page_number, page_count, page.items.len());
    }

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(page_count as i64));
    pages_object.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_object));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));

    let info_id = add_info(doc, info);

    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.trailer.set("Info", Object::Reference(info_id));

    Ok(())
}

/// Drop objects nothing points at, compress streams and write the file
pub fn save(doc: &mut Document, path: &Path) -> Result<()> {
    let pruned = doc.prune_objects();
    debug!("Pruned {} unreferenced objects", pruned.len());

    doc.compress();
    doc.save(path)?;

    Ok(())
}

fn add_info(doc: &mut Document, info: &DocumentInfo) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Title", Object::String(info.title.as_bytes().to_vec(), StringFormat::Literal));
    dict.set("Producer", Object::String(info.producer.as_bytes().to_vec(), StringFormat::Literal));
    dict.set(
        "CreationDate",
        Object::String(pdf_date(&info.created).into_bytes(), StringFormat::Literal),
    );
    doc.add_object(Object::Dictionary(dict))
}

/// Distinct embedded faces used by any text item, in first-use order
fn embedded_fonts(pages: &[Page]) -> Vec<Arc<EmbeddedFont>> {
    let mut fonts: Vec<Arc<EmbeddedFont>> = Vec::new();
    for item in pages.iter().flat_map(|page| &page.items) {
        if let PlacedItem::Text { font: Font::Embedded(font), .. } = item {
            if !fonts.iter().any(|f| Arc::ptr_eq(f, font)) {
                fonts.push(Arc::clone(font));
            }
        }
    }
    fonts
}

fn embedded_resource_name(index: usize) -> String {
    format!("E{}", index + 1)
}

/// Font resource name a text item refers to
fn font_resource(font: &Font, embedded: &[Arc<EmbeddedFont>]) -> String {
    match font {
        Font::Standard(standard) => standard.resource_name().to_string(),
        Font::Embedded(face) => embedded
            .iter()
            .position(|f| Arc::ptr_eq(f, face))
            .map(embedded_resource_name)
            .unwrap_or_else(|| StandardFont::Helvetica.resource_name().to_string()),
    }
}

/// XObject resource entries for everything drawn on a page
fn page_xobjects(page: &Page) -> Dictionary {
    let ids: BTreeSet<(String, ObjectId)> = page
        .items
        .iter()
        .filter_map(|item| match item {
            PlacedItem::XObject { handle, .. } => Some((handle.resource_name(), handle.id)),
            PlacedItem::Text { .. } => None,
        })
        .collect();

    let mut dict = Dictionary::new();
    for (name, id) in ids {
        dict.set(name, Object::Reference(id));
    }
    dict
}

/// Generate the content stream operators for one page
fn page_content(
    setup: &PageSetup,
    page: &Page,
    embedded: &[Arc<EmbeddedFont>],
    footer: Option<(&Footer, &str)>,
) -> String {
    let mut content = String::new();

    for item in &page.items {
        match item {
            PlacedItem::Text { x, y, text, font, size } => {
                let resource = font_resource(font, embedded);
                push_text(&mut content, &resource, &font.show_operand(text), *size, *x, *y);
            }
            PlacedItem::XObject { handle, x, y, width, height } => {
                let [a, b, c, d, e, f] = handle.placement(*x, *y, *width, *height);
                content.push_str("q\n");
                content.push_str(&format!(
                    "{:.4} {:.4} {:.4} {:.4} {:.2} {:.2} cm\n",
                    a, b, c, d, e, f
                ));
                content.push_str(&format!("/{} Do\n", handle.resource_name()));
                content.push_str("Q\n");
            }
        }
    }

    if let Some((footer, text)) = footer {
        let left = setup.margins.left.pt() as f32;
        let width = footer.font.text_width(text, footer.size);
        let x = footer.alignment.x(left, setup.content_width(), width);
        // Baseline halfway down the bottom margin
        let y = (setup.margins.bottom.pt() as f32 - footer.size) / 2.0;
        push_text(&mut content, footer.font.resource_name(), &pdf_literal(text), footer.size, x, y);
    }

    content
}

fn push_text(content: &mut String, resource: &str, operand: &str, size: f32, x: f32, y: f32) {
    content.push_str("BT\n");
    content.push_str(&format!("/{} {} Tf\n", resource, size));
    content.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", x, y));
    content.push_str(&format!("{} Tj\n", operand));
    content.push_str("ET\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::layout::{Paragraph, Section, paginate};

    #[test]
    fn test_pdf_date_format() {
        let date = Local.with_ymd_and_hms(2024, 1, 31, 15, 45, 0).unwrap();
        let formatted = pdf_date(&date);
        assert!(formatted.starts_with("D:20240131154500"));
        assert!(formatted.ends_with('\''));
    }

    #[test]
    fn test_page_content_has_footer() {
        let setup = PageSetup::letter();
        let page = Page::default();
        let footer = Footer::page_x_of_y();
        let content = page_content(&setup, &page, &[], Some((&footer, "--Page 1 of 3--")));

        assert!(content.contains("(--Page 1 of 3--) Tj"));
        assert!(content.contains("/F1 10 Tf"));
    }

    #[test]
    fn test_render_pages_builds_page_tree() {
        let mut section = Section::new(PageSetup::letter());
        section.add_paragraph(Paragraph::new("first"));
        section.add_page_break();
        section.add_paragraph(Paragraph::new("second"));
        let pages = paginate(&section);

        let mut doc = Document::with_version("1.5");
        let footer = Footer::page_x_of_y();
        render_pages(&mut doc, &section.setup, &pages, Some(&footer), &DocumentInfo::default())
            .expect("render");

        assert_eq!(doc.get_pages().len(), 2);

        let (_, last_page) = doc.get_pages().into_iter().last().expect("page");
        let content = doc.get_page_content(last_page).expect("content");
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("(second) Tj"));
        assert!(content.contains("(--Page 2 of 2--) Tj"));
    }
}

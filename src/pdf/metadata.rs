//! PDF metadata extraction

use std::path::Path;
use lopdf::{Document, Object};
use crate::error::{Error, Result};

/// Pages reachable through the page tree, the same pages a build imports
fn page_tree_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Page count as declared by the root Pages dictionary, if any
///
/// Broken producers sometimes write a `Count` that disagrees with the tree.
fn declared_page_count(doc: &Document) -> Option<usize> {
    let pages_id = doc.catalog().ok()?.get(b"Pages").ok()?.as_reference().ok()?;
    let count = doc
        .get_object(pages_id)
        .ok()?
        .as_dict()
        .ok()?
        .get(b"Count")
        .ok()?
        .as_i64()
        .ok()?;
    usize::try_from(count).ok()
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char
fn text_string(obj: &Object) -> Option<String> {
    let bytes = match obj {
        Object::String(bytes, _) => bytes,
        _ => return None,
    };

    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the page tree
    pub page_count: usize,
    /// `Count` from the root Pages dictionary, when present
    pub declared_page_count: Option<usize>,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Producing application (if present)
    pub producer: Option<String>,
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = page_tree_count(&doc);
    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    let info = doc
        .trailer
        .get(b"Info")
        .and_then(|i| i.as_reference())
        .and_then(|id| doc.get_object(id))
        .and_then(|o| o.as_dict())
        .ok();

    let field = |key: &[u8]| info.and_then(|dict| dict.get(key).ok()).and_then(text_string);

    Ok(PdfMetadata {
        page_count,
        declared_page_count: declared_page_count(&doc),
        title: field(b"Title"),
        author: field(b"Author"),
        producer: field(b"Producer"),
    })
}

/// Count the pages in a PDF file the way a build would import them
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = page_tree_count(&doc);

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};
    use tempfile::TempDir;

    /// Two real pages under a Pages node that claims `declared`
    fn write_miscounted_pdf(path: &Path, declared: i64) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..2)
            .map(|_| {
                let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(declared),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).expect("write pdf");
    }

    #[test]
    fn test_page_count_follows_page_tree() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("miscounted.pdf");
        write_miscounted_pdf(&path, 5);

        assert_eq!(count_pages(&path).expect("count"), 2);

        let metadata = extract_metadata(&path).expect("metadata");
        assert_eq!(metadata.page_count, 2);
        assert_eq!(metadata.declared_page_count, Some(5));
    }

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_extract_metadata_nonexistent_file() {
        let result = extract_metadata(Path::new("nonexistent.pdf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_text_string_decoding() {
        let latin = Object::String(b"Caf\xe9".to_vec(), StringFormat::Literal);
        assert_eq!(text_string(&latin).as_deref(), Some("Café"));

        let utf16 = Object::String(vec![0xFE, 0xFF, 0x98, 0x18], StringFormat::Hexadecimal);
        assert_eq!(text_string(&utf16).as_deref(), Some("領"));

        assert_eq!(text_string(&Object::Integer(3)), None);
    }
}

//! PDF writing, XObject embedding and metadata

pub mod fonts;
pub mod metadata;
pub mod render;
pub mod truetype;
pub mod xobject;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
pub use fonts::{Font, StandardFont};
pub use render::{render_pages, DocumentInfo};
pub use truetype::EmbeddedFont;
pub use xobject::{embed_image, import_pdf_pages, XObjectHandle, XObjectKind};

//! Folder-to-PDF assembly
//!
//! Every receipt in the folder becomes one run of pages: a bold centered
//! title with the file name, a blank line, then the receipt itself at a fixed
//! width. Pages of multi-page PDFs each get a page of their own. Files are
//! separated by page breaks and every page carries a `--Page X of Y--` footer.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use lopdf::Document;
use tracing::{debug, info};
use crate::convert::convert_to_jpeg;
use crate::error::{Error, Result};
use crate::layout::{paginate, Alignment, Footer, ImageElement, PageSetup, Paragraph, Section};
use crate::pdf::fonts::{Font, StandardFont};
use crate::pdf::render::{render_pages, save, DocumentInfo};
use crate::pdf::truetype::EmbeddedFont;
use crate::pdf::xobject::{embed_image, import_pdf_pages, XObjectHandle};
use crate::progress::{BuildProgressCallback, ProgressCallback};
use crate::scan::{scan_folder, ScanFilter, SourceFile, SourceKind};

/// Default output file name, written into the source folder
pub const DEFAULT_OUTPUT_NAME: &str = "MyReceipts.pdf";

/// Default subfolder for converted HEIC photos
pub const DEFAULT_CONVERTED_DIR: &str = "converted";

/// Default drawn width of each receipt, in points
pub const DEFAULT_IMAGE_WIDTH: f32 = 400.0;

const TITLE_FAMILY: &str = "Helvetica";
const TITLE_SIZE: f32 = 12.0;

/// Options for building the combined receipts PDF
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Folder holding the receipts; the output is written here too
    pub folder: PathBuf,
    /// Output file name inside `folder`
    pub output_name: String,
    /// Subfolder of `folder` for converted HEIC photos
    pub converted_dir: String,
    /// Drawn width of each receipt in points
    pub image_width: f32,
    /// Glob patterns for file names to leave out
    pub exclude: Vec<String>,
    /// Title stored in the document Info dictionary
    pub title: String,
    /// Whether to draw the `--Page X of Y--` footer
    pub page_numbers: bool,
    /// TrueType font for the per-file titles; Helvetica Bold when unset
    pub font: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Default::default()
        }
    }

    /// Full path of the output PDF
    pub fn output_path(&self) -> PathBuf {
        self.folder.join(&self.output_name)
    }

    /// Full path of the converted-photo folder
    pub fn converted_path(&self) -> PathBuf {
        self.folder.join(&self.converted_dir)
    }

    /// Scan filter matching these options
    pub fn scan_filter(&self) -> Result<ScanFilter> {
        ScanFilter::new(&self.output_name, &self.exclude)
    }

    /// Reject knob values the layout can't use
    pub fn validate(&self) -> Result<()> {
        if !self.image_width.is_finite() || self.image_width <= 0.0 {
            return Err(Error::General(format!(
                "Image width must be a positive number of points, got {}",
                self.image_width
            )));
        }
        Ok(())
    }

    /// Face for the per-file titles
    fn title_font(&self) -> Result<Font> {
        match &self.font {
            Some(path) => Ok(Font::Embedded(Arc::new(EmbeddedFont::load(path)?))),
            None => Ok(Font::Standard(StandardFont::resolve(TITLE_FAMILY, true))),
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            converted_dir: DEFAULT_CONVERTED_DIR.to_string(),
            image_width: DEFAULT_IMAGE_WIDTH,
            exclude: Vec::new(),
            title: "My Receipts".to_string(),
            page_numbers: true,
            font: None,
        }
    }
}

/// What a build produced
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Path of the written PDF
    pub output_path: PathBuf,
    /// Pages in the written PDF
    pub page_count: usize,
    /// Files that made it into the document, in order
    pub files: Vec<SourceFile>,
    /// JPEGs written for HEIC inputs
    pub converted: Vec<PathBuf>,
}

/// Build `<folder>/<output_name>` from the receipts in `options.folder`
///
/// Stops at the first file that can't be read or converted; no output is
/// written in that case.
pub fn build_receipts_pdf(
    options: &BuildOptions,
    progress: &dyn BuildProgressCallback,
) -> Result<BuildReport> {
    options.validate()?;

    let folder = options.folder.as_path();
    if !folder.is_dir() {
        return Err(Error::FolderNotFound(folder.to_path_buf()));
    }

    let files = scan_folder(folder, &options.scan_filter()?)?;
    if files.is_empty() {
        return Err(Error::NoSourceFiles(folder.to_path_buf()));
    }

    let title_font = options.title_font()?;

    info!("Building {} from {} file(s)", options.output_path().display(), files.len());
    progress.on_build_start(files.len());

    let mut doc = Document::with_version("1.5");
    let mut section = Section::new(PageSetup::letter());
    if options.page_numbers {
        section.footer = Some(Footer::page_x_of_y());
    }

    let converted_dir = options.converted_path();
    let mut converted = Vec::new();
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        progress.on_file_start(i + 1, total, &file.name);

        let title = section.add_paragraph(
            Paragraph::new(&file.name)
                .with_face(title_font.clone())
                .with_size(TITLE_SIZE)
                .with_alignment(Alignment::Center),
        );
        section.add_paragraph(Paragraph::empty());

        let xobjects = match file.kind {
            SourceKind::Raster => vec![embed_image(&mut doc, &file.path)?],
            SourceKind::Heic => {
                let jpeg = convert_to_jpeg(&file.path, &converted_dir)?;
                progress.on_file_converted(&file.path, &jpeg);
                let handle = embed_image(&mut doc, &jpeg)?;
                converted.push(jpeg);
                vec![handle]
            }
            SourceKind::Pdf => {
                let pages = import_pdf_pages(&mut doc, &file.path)?;
                if let Some(paragraph) = section.paragraph_mut(title) {
                    paragraph.add_text(&pdf_page_note(pages.len()));
                }
                pages
            }
            SourceKind::Unsupported => {
                return Err(Error::General(format!("Unsupported file: {}", file.name)));
            }
        };

        add_receipt_pages(&mut section, &xobjects, options.image_width);

        if i + 1 < total {
            section.add_page_break();
        }

        debug!("Added {} ({} source page(s))", file.name, xobjects.len());
        progress.on_file_complete(i + 1, total, &file.name, xobjects.len());
    }

    let pages = paginate(&section);
    let info = DocumentInfo {
        title: options.title.clone(),
        ..Default::default()
    };
    render_pages(&mut doc, &section.setup, &pages, section.footer.as_ref(), &info)?;

    let output_path = options.output_path();
    save(&mut doc, &output_path)?;

    info!("Wrote {} ({} pages)", output_path.display(), pages.len());
    progress.on_build_complete(&output_path, pages.len());

    Ok(BuildReport {
        output_path,
        page_count: pages.len(),
        files,
        converted,
    })
}

/// Run [`build_receipts_pdf`] on a background thread
pub fn spawn_build(options: BuildOptions, progress: ProgressCallback) -> JoinHandle<Result<BuildReport>> {
    std::thread::spawn(move || build_receipts_pdf(&options, progress.as_ref()))
}

/// Centered, fixed-width images; each one after the first on a new page
fn add_receipt_pages(section: &mut Section, xobjects: &[XObjectHandle], width: f32) {
    for (j, xobject) in xobjects.iter().enumerate() {
        if j > 0 {
            section.add_page_break();
        }
        section.add_image(ImageElement {
            xobject: *xobject,
            width,
            alignment: Alignment::Center,
        });
    }
}

/// Title suffix for PDF receipts, e.g. ` (PDF with 3 pages) `
fn pdf_page_note(count: usize) -> String {
    format!(" (PDF with {} page{}) ", count, if count == 1 { "" } else { "s" })
}

/// List what a build of `options` would include, without writing anything
pub fn plan(options: &BuildOptions) -> Result<Vec<SourceFile>> {
    scan_folder(&options.folder, &options.scan_filter()?)
}

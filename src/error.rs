//! Error types for the receipt PDF library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the receipt PDF library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Source folder missing or not a directory
    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Nothing left to put in the document after filtering
    #[error("No receipt files found in {}", .0.display())]
    NoSourceFiles(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// HEIC input but the crate was built without the `heic` feature
    #[error("HEIC support not compiled in (enable the `heic` feature): {}", .0.display())]
    HeicUnsupported(PathBuf),

    /// HEIC decoding failure
    #[error("HEIC decode error: {0}")]
    Heic(String),

    /// Title font could not be parsed or embedded
    #[error("Font error: {0}")]
    Font(String),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// General error
    #[error("{0}")]
    General(String),
}

//! Source folder scanning and file classification

use std::path::{Path, PathBuf};
use glob::Pattern;
use tracing::{debug, warn};
use crate::error::{Error, Result};

/// macOS Finder metadata, never a receipt
pub const DS_STORE: &str = ".DS_Store";

/// How a source file gets into the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Raster image the image crate can decode directly
    Raster,
    /// HEIC/HEIF photo, converted to JPEG first
    Heic,
    /// PDF, every page imported
    Pdf,
    /// Anything else
    Unsupported,
}

impl SourceKind {
    /// Classify a file name by its extension (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        let ext = match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return SourceKind::Unsupported,
        };

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" => SourceKind::Raster,
            "heic" | "heif" => SourceKind::Heic,
            "pdf" => SourceKind::Pdf,
            _ => SourceKind::Unsupported,
        }
    }

    /// Short label used by the CLI listing
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Raster => "image",
            SourceKind::Heic => "heic",
            SourceKind::Pdf => "pdf",
            SourceKind::Unsupported => "unsupported",
        }
    }
}

/// A file that will become one section of the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name only, used as the section title
    pub name: String,
    pub kind: SourceKind,
}

/// Rules for which directory entries are skipped
#[derive(Debug, Clone)]
pub struct ScanFilter {
    /// Output file name; a previous run's output must not be re-ingested
    pub output_name: String,
    /// Extra glob patterns matched against the file name
    pub exclude: Vec<Pattern>,
}

impl ScanFilter {
    /// Build a filter, compiling the exclusion globs
    pub fn new(output_name: &str, exclude: &[String]) -> Result<Self> {
        let exclude = exclude
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| Error::InvalidGlob(format!("{}: {}", p, e))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            output_name: output_name.to_string(),
            exclude,
        })
    }

    /// Whether a file name is dropped before classification
    pub fn is_excluded(&self, name: &str) -> bool {
        name == DS_STORE
            || name == self.output_name
            || self.exclude.iter().any(|p| p.matches(name))
    }
}

/// List the receipt files in `folder`, sorted by file name
///
/// Only regular files directly inside the folder are considered, so the
/// `converted/` subfolder from an earlier run is never picked up. Names are
/// compared as plain strings (byte order).
pub fn scan_folder(folder: &Path, filter: &ScanFilter) -> Result<Vec<SourceFile>> {
    if !folder.is_dir() {
        return Err(Error::FolderNotFound(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping file with non-UTF-8 name: {:?}", raw);
                continue;
            }
        };

        if filter.is_excluded(&name) {
            debug!("Excluded {}", name);
            continue;
        }

        let kind = SourceKind::from_name(&name);
        if kind == SourceKind::Unsupported {
            warn!("Skipping unsupported file: {}", name);
            continue;
        }

        files.push(SourceFile {
            path: entry.path(),
            name,
            kind,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(files)
}

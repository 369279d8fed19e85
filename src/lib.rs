//! Receipt PDF Library
//!
//! Combines a folder of receipt images and PDFs into a single paginated PDF.
//! This library provides functionality to:
//! - Scan a folder and order its receipts by file name
//! - Convert HEIC photos to half-size JPEGs
//! - Lay out a titled section per receipt, one page per PDF page
//! - Render the result with `--Page X of Y--` footers
//!
//! # Example
//!
//! ```no_run
//! use receipt_pdf::receipts::{build_receipts_pdf, BuildOptions};
//! use receipt_pdf::progress::NoopProgressCallback;
//!
//! let options = BuildOptions::new("/home/me/receipts/2024-03");
//! let report = build_receipts_pdf(&options, &NoopProgressCallback)
//!     .expect("Failed to build receipts PDF");
//!
//! println!("{} pages written to {}", report.page_count, report.output_path.display());
//! ```

pub mod convert;
pub mod error;
pub mod layout;
pub mod pdf;
pub mod progress;
pub mod receipts;
pub mod scan;

// Re-export commonly used items
pub use error::{Error, Result};
pub use receipts::{build_receipts_pdf, spawn_build, BuildOptions, BuildReport};

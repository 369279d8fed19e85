//! Progress-callback trait for build events.
//!
//! The build is a single sequential pass, but a front end (terminal, GUI)
//! usually wants to show which receipt is being processed. Pass a
//! `&dyn BuildProgressCallback` to [`crate::receipts::build_receipts_pdf`], or
//! a shared [`ProgressCallback`] to [`crate::receipts::spawn_build`], to
//! receive events as each file is handled.

use std::path::Path;
use std::sync::Arc;

/// Called by the assembly routine as it works through the folder.
///
/// Implementations must be `Send + Sync` because the build can run on a
/// background thread ([`crate::receipts::spawn_build`]). All methods have
/// no-op defaults.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once after the folder has been scanned.
    fn on_build_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is added. `index` is 1-based.
    fn on_file_start(&self, index: usize, total_files: usize, name: &str) {
        let _ = (index, total_files, name);
    }

    /// Called after a HEIC photo has been written out as JPEG.
    fn on_file_converted(&self, source: &Path, converted: &Path) {
        let _ = (source, converted);
    }

    /// Called once a file's content is in the document.
    fn on_file_complete(&self, index: usize, total_files: usize, name: &str, source_pages: usize) {
        let _ = (index, total_files, name, source_pages);
    }

    /// Called after the output PDF has been saved.
    fn on_build_complete(&self, output: &Path, page_count: usize) {
        let _ = (output, page_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Shared callback handle
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCallback {
        files: AtomicUsize,
    }

    impl BuildProgressCallback for CountingCallback {
        fn on_file_complete(&self, _index: usize, _total: usize, _name: &str, _pages: usize) {
            self.files.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_callback_does_nothing() {
        let cb = NoopProgressCallback;
        cb.on_build_start(3);
        cb.on_file_start(1, 3, "a.png");
        cb.on_build_complete(Path::new("out.pdf"), 3);
    }

    #[test]
    fn test_partial_override() {
        let counter = Arc::new(CountingCallback {
            files: AtomicUsize::new(0),
        });
        let cb: ProgressCallback = counter.clone();

        cb.on_build_start(2);
        cb.on_file_complete(1, 2, "a.png", 1);
        cb.on_file_complete(2, 2, "b.pdf", 4);

        assert_eq!(counter.files.load(Ordering::SeqCst), 2);
    }
}

//! Progress-callback trait for conversion events.
//!
//! Pass an [`Arc<dyn ConversionProgressCallback>`] to
//! [`crate::convert::Converter::with_progress`] to receive events while a
//! document is parsed, its images uploaded and its Markdown stored.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfchat::ConversionProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page: usize, elements: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {page}: {elements} elements");
//!     }
//! }
//! ```

use crate::output::ConversionStats;
use std::sync::Arc;

/// Called by the converter as it works through a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Image errors may arrive from concurrent uploads, so
/// implementations must synchronise shared state.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the PDF is open, before any element is processed.
    fn on_conversion_start(&self, document: &str, page_count: usize) {
        let _ = (document, page_count);
    }

    /// Called when every element of a page has been extracted.
    ///
    /// Pages that produced no elements are not reported.
    fn on_page_complete(&self, page: usize, elements: usize) {
        let _ = (page, elements);
    }

    /// Called when an image could not be uploaded.
    fn on_image_error(&self, page: usize, file_name: &str, error: &str) {
        let _ = (page, file_name, error);
    }

    /// Called once after the Markdown has been stored.
    fn on_conversion_complete(&self, stats: &ConversionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

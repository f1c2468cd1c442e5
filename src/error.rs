//! Error types for the edgequake-pdfchat library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfChatError`]: **Fatal**: the operation cannot proceed at all
//!   (bytes are not a PDF, the store rejected an upload, a requested key does
//!   not exist). Returned as `Err(PdfChatError)` from the public entry points
//!   and mapped onto HTTP status codes by [`crate::server`].
//!
//! * [`ExtractionError`]: **Non-fatal**: a single page, table scan or image
//!   failed while the rest of the document is fine. These are logged and
//!   counted in [`crate::output::ConversionStats`], never propagated, so one
//!   malformed table cannot cost the caller the whole document.
//!
//! Language-model failures have their own type, [`crate::chat::ProviderError`],
//! because they are always folded into the answer text rather than returned.

use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded bytes do not start with the `%PDF` magic.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// The request is missing fields or carries values we cannot use.
    #[error("{0}")]
    BadRequest(String),

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// The requested artifact key does not exist.
    #[error("Artifact '{key}' not found")]
    NotFound { key: String },

    /// Upload, download or listing failed in the artifact store.
    #[error("Storage error for '{key}': {detail}")]
    Storage { key: String, detail: String },

    // ── Cache errors ──────────────────────────────────────────────────────
    /// The response cache could not be reached.
    #[error("Cache error: {0}")]
    Cache(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfChatError {
    pub fn storage(key: impl Into<String>, detail: impl ToString) -> Self {
        Self::Storage {
            key: key.into(),
            detail: detail.to_string(),
        }
    }

    /// `true` for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PdfChatError::NotAPdf { .. }
                | PdfChatError::BadRequest(_)
                | PdfChatError::CorruptPdf { .. }
                | PdfChatError::PasswordRequired { .. }
                | PdfChatError::WrongPassword { .. }
        )
    }
}

/// A non-fatal extraction failure for one page or element.
///
/// Logged at `warn!` and counted; the extraction continues with the next
/// element or page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The page itself could not be loaded.
    #[error("Page {page}: could not be loaded: {detail}")]
    Page { page: usize, detail: String },

    /// Text extraction failed; the page contributes no text block.
    #[error("Page {page}: text extraction failed: {detail}")]
    Text { page: usize, detail: String },

    /// Table detection failed; the page is treated as having no tables.
    #[error("Page {page}: table extraction failed: {detail}")]
    Tables { page: usize, detail: String },

    /// The page's image objects could not be enumerated; the page
    /// contributes no images.
    #[error("Page {page}: image enumeration failed: {detail}")]
    Images { page: usize, detail: String },

    /// A single image could not be read or encoded.
    #[error("Page {page}: image {index} extraction failed: {detail}")]
    Image {
        page: usize,
        index: usize,
        detail: String,
    },
}

impl ExtractionError {
    pub fn page(&self) -> usize {
        match self {
            ExtractionError::Page { page, .. }
            | ExtractionError::Text { page, .. }
            | ExtractionError::Tables { page, .. }
            | ExtractionError::Images { page, .. }
            | ExtractionError::Image { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display() {
        let e = PdfChatError::NotAPdf {
            name: "notes.txt".into(),
            magic: b"hell".to_vec(),
        };
        assert!(e.to_string().contains("notes.txt"));
        assert!(e.is_client_error());
    }

    #[test]
    fn storage_error_is_server_side() {
        let e = PdfChatError::storage("doc/doc.md", "connection reset");
        let msg = e.to_string();
        assert!(msg.contains("doc/doc.md"), "got: {msg}");
        assert!(msg.contains("connection reset"), "got: {msg}");
        assert!(!e.is_client_error());
    }

    #[test]
    fn not_found_display() {
        let e = PdfChatError::NotFound {
            key: "Report_1/Report_1.md".into(),
        };
        assert_eq!(e.to_string(), "Artifact 'Report_1/Report_1.md' not found");
    }

    #[test]
    fn extraction_error_reports_page() {
        let e = ExtractionError::Tables {
            page: 3,
            detail: "ragged ruling".into(),
        };
        assert_eq!(e.page(), 3);
        assert!(e.to_string().contains("Page 3"));
    }
}

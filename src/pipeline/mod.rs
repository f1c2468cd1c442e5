//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements one step of turning PDF bytes into a Markdown
//! document whose images live next to it in the artifact store.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ parse ──────────────▶ assemble ──▶ Markdown
//! (bytes)   (pdfium, blocking)     (ordered, uploads images)
//!             ├─ clean   text normalisation
//!             ├─ tables  grid reconstruction from positioned text
//!             └─ encode  decoded bitmaps → PNG (stored JPEGs pass through)
//! ```
//!
//! 1. [`input`]   : derive the document name, validate and load PDF bytes
//! 2. [`parse`]   : walk pages on a `spawn_blocking` thread and stream
//!    [`PageElement`]s in document order
//! 3. [`assemble`]: render elements to Markdown, uploading images through an
//!    [`assemble::ImageUploader`]

pub mod assemble;
pub mod clean;
pub mod encode;
pub mod input;
pub mod parse;
pub mod tables;

use serde::{Deserialize, Serialize};

/// A rectangular grid of cells. Every row has the same length.
pub type Table = Vec<Vec<Option<String>>>;

/// An image pulled out of a page.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `"png"`.
    pub ext: String,
    /// `image_{page}_{index}.{ext}`, both 1-based.
    pub file_name: String,
}

impl ExtractedImage {
    pub fn new(page: usize, index: usize, ext: impl Into<String>, bytes: Vec<u8>) -> Self {
        let ext = ext.into();
        Self {
            file_name: format!("image_{page}_{index}.{ext}"),
            bytes,
            ext,
        }
    }

    /// MIME type derived from the extension.
    pub fn content_type(&self) -> &'static str {
        match self.ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        }
    }
}

impl std::fmt::Debug for ExtractedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedImage")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// One unit of extracted content.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Normalised, non-empty page text.
    Text(String),
    Table(Table),
    Image(ExtractedImage),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Text(_) => ElementKind::Text,
            Element::Table(_) => ElementKind::Table,
            Element::Image(_) => ElementKind::Image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Text,
    Table,
    Image,
}

/// An element tagged with its 1-based page number.
#[derive(Debug, Clone, PartialEq)]
pub struct PageElement {
    pub page: usize,
    pub element: Element,
}

impl PageElement {
    pub fn new(page: usize, element: Element) -> Self {
        Self { page, element }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_file_name_is_page_and_index() {
        let img = ExtractedImage::new(3, 2, "png", vec![1, 2, 3]);
        assert_eq!(img.file_name, "image_3_2.png");
        assert_eq!(img.content_type(), "image/png");
    }

    #[test]
    fn debug_hides_image_bytes() {
        let img = ExtractedImage::new(1, 1, "jpg", vec![0; 4096]);
        let dbg = format!("{img:?}");
        assert!(dbg.contains("4096"));
        assert!(dbg.len() < 100);
    }
}

//! Output types returned by conversion and extraction.

use serde::{Deserialize, Serialize};

/// URLs and locations of one converted document.
///
/// Built once by [`crate::convert::Converter`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Public URL of the original PDF.
    pub pdf_url: String,
    /// Public URL of the generated Markdown.
    pub markdown_url: String,
    /// Folder holding every artifact, always `"{name}/"`.
    pub storage_folder: String,
    /// Always `"{name}.md"`.
    pub markdown_filename: String,
    pub stats: ConversionStats,
}

/// Counters collected while converting one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub pages: usize,
    pub text_blocks: usize,
    pub tables: usize,
    pub images_found: usize,
    pub images_uploaded: usize,
    pub images_failed: usize,
    /// Per-page or per-element extraction failures that were skipped.
    pub extraction_failures: usize,
    pub total_duration_ms: u64,
}

/// Plain text plus tables of a document, as consumed by the chat prompt.
///
/// Tables are lists of records keyed by column index (`{"0": .., "1": ..}`),
/// so callers may also supply arbitrary JSON here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default)]
    pub pdf_content: String,
    #[serde(default)]
    pub tables: Vec<serde_json::Value>,
}

impl DocumentContent {
    /// Content with no tables, e.g. a stored Markdown file.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            pdf_content: text.into(),
            tables: Vec::new(),
        }
    }

    /// Tables section of the chat prompt; empty when there are no tables.
    pub fn render_tables(&self) -> String {
        if self.tables.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.tables).unwrap_or_default()
    }
}

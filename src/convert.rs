//! Conversion entry points.
//!
//! [`Converter`] turns one uploaded PDF into three kinds of artifacts:
//!
//! ```text
//! {name}/{name}.pdf            the original upload
//! {name}/Images/image_P_I.png  every embedded image
//! {name}/{name}.md             the assembled Markdown, linking the images
//! ```
//!
//! The three writes are not transactional. Re-converting a document with the
//! same name overwrites the same keys. [`extract_content`] is the
//! storage-free sibling that returns plain text and tables for chat.

use crate::config::ConversionConfig;
use crate::error::PdfChatError;
use crate::output::{ConversionResult, ConversionStats, DocumentContent};
use crate::pipeline::assemble::{assemble, AssembleOptions, ImageUploader};
use crate::pipeline::clean::clean_text;
use crate::pipeline::input::{check_pdf_magic, DocumentName};
use crate::pipeline::parse::DocumentParser;
use crate::pipeline::{Element, ExtractedImage, PageElement, Table};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Converts PDFs to Markdown and persists every artifact.
pub struct Converter {
    store: Arc<dyn ArtifactStore>,
    parser: Arc<dyn DocumentParser>,
    config: ConversionConfig,
    progress: ProgressCallback,
}

impl Converter {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        parser: Arc<dyn DocumentParser>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            store,
            parser,
            config,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn parser(&self) -> &Arc<dyn DocumentParser> {
        &self.parser
    }

    /// Derive the document name from `file_name`, then [`convert`](Self::convert).
    pub async fn convert_upload(
        &self,
        file_name: &str,
        pdf_bytes: Bytes,
    ) -> Result<ConversionResult, PdfChatError> {
        let name = DocumentName::from_file_name(file_name)?;
        self.convert(pdf_bytes, &name).await
    }

    /// Convert a PDF and store it, its images and its Markdown under `name`.
    ///
    /// # Errors
    /// Fatal only when the bytes are not a PDF, the PDF cannot be opened, or
    /// storing the PDF or the Markdown fails. Failed pages, tables and image
    /// uploads are counted in [`ConversionStats`] instead.
    pub async fn convert(
        &self,
        pdf_bytes: Bytes,
        name: &DocumentName,
    ) -> Result<ConversionResult, PdfChatError> {
        let total_start = Instant::now();
        info!("Starting conversion: {} ({} bytes)", name, pdf_bytes.len());

        // ── Step 1: Validate ─────────────────────────────────────────────
        check_pdf_magic(name.as_str(), &pdf_bytes)?;

        // ── Step 2: Store the original ───────────────────────────────────
        let pdf_url = self
            .store
            .put(&name.pdf_key(), pdf_bytes.clone(), PDF_CONTENT_TYPE)
            .await?;
        debug!("Stored original PDF at {}", pdf_url);

        // ── Step 3: Open the element stream ──────────────────────────────
        let elements = self.parser.extract(name.as_str(), pdf_bytes).await?;
        let page_count = elements.page_count();
        let failures = elements.failures();
        self.progress.on_conversion_start(name.as_str(), page_count);

        // ── Step 4: Assemble, uploading images as they arrive ────────────
        let uploader = StoreUploader {
            store: self.store.as_ref(),
            name,
            progress: &self.progress,
            uploaded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        };
        let options = AssembleOptions::from(&self.config);
        let mut tally = ElementTally::default();
        let markdown = {
            let observed = elements.inspect(|pe| tally.observe(pe, &self.progress));
            assemble(observed, &uploader, &options).await
        };
        tally.finish(&self.progress);

        // ── Step 5: Store the Markdown ───────────────────────────────────
        let markdown_url = self
            .store
            .put(
                &name.markdown_key(),
                Bytes::from(markdown),
                MARKDOWN_CONTENT_TYPE,
            )
            .await?;

        // ── Step 6: Stats ────────────────────────────────────────────────
        let stats = ConversionStats {
            pages: page_count,
            text_blocks: tally.text_blocks,
            tables: tally.tables,
            images_found: tally.images,
            images_uploaded: uploader.uploaded.load(Ordering::SeqCst),
            images_failed: uploader.failed.load(Ordering::SeqCst),
            extraction_failures: failures.len(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Conversion complete: {} ({} pages, {} tables, {}/{} images, {}ms)",
            name,
            stats.pages,
            stats.tables,
            stats.images_uploaded,
            stats.images_found,
            stats.total_duration_ms
        );
        self.progress.on_conversion_complete(&stats);

        Ok(ConversionResult {
            pdf_url,
            markdown_url,
            storage_folder: name.folder(),
            markdown_filename: name.markdown_filename(),
            stats,
        })
    }
}

/// Extract plain text and tables without storing anything.
///
/// Page texts are joined and normalised into one string; each table becomes
/// a list of records keyed by column index. Images are ignored.
pub async fn extract_content(
    parser: &dyn DocumentParser,
    name: &str,
    pdf_bytes: Bytes,
) -> Result<DocumentContent, PdfChatError> {
    let elements = parser.extract(name, pdf_bytes).await?;

    let mut texts = Vec::new();
    let mut tables = Vec::new();
    let mut stream = elements;
    while let Some(pe) = stream.next().await {
        match pe.element {
            Element::Text(text) => texts.push(text),
            Element::Table(table) => tables.push(table_records(&table)),
            Element::Image(_) => {}
        }
    }

    let failures = stream.failures();
    if !failures.is_empty() {
        warn!("{}: {} extraction failures skipped", name, failures.len());
    }

    Ok(DocumentContent {
        pdf_content: clean_text(&texts.join(" ")).unwrap_or_default(),
        tables,
    })
}

/// `[{"0": cell, "1": cell, ...}, ...]`, one record per row.
pub fn table_records(table: &Table) -> serde_json::Value {
    let rows = table
        .iter()
        .map(|row| {
            let record: serde_json::Map<String, serde_json::Value> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let value = cell
                        .as_ref()
                        .map(|s| serde_json::Value::String(s.clone()))
                        .unwrap_or(serde_json::Value::Null);
                    (i.to_string(), value)
                })
                .collect();
            serde_json::Value::Object(record)
        })
        .collect();
    serde_json::Value::Array(rows)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Uploads images under `{name}/Images/` and counts the outcomes.
struct StoreUploader<'a> {
    store: &'a dyn ArtifactStore,
    name: &'a DocumentName,
    progress: &'a ProgressCallback,
    uploaded: AtomicUsize,
    failed: AtomicUsize,
}

#[async_trait]
impl ImageUploader for StoreUploader<'_> {
    async fn upload(&self, image: &ExtractedImage, page: usize) -> Option<String> {
        let key = self.name.image_key(&image.file_name);
        match self
            .store
            .put(&key, Bytes::from(image.bytes.clone()), image.content_type())
            .await
        {
            Ok(url) => {
                self.uploaded.fetch_add(1, Ordering::SeqCst);
                Some(url)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!("Page {}: image {} not uploaded: {}", page, image.file_name, e);
                self.progress
                    .on_image_error(page, &image.file_name, &e.to_string());
                None
            }
        }
    }
}

/// Counts elements and reports finished pages.
#[derive(Default)]
struct ElementTally {
    text_blocks: usize,
    tables: usize,
    images: usize,
    current_page: Option<(usize, usize)>,
}

impl ElementTally {
    fn observe(&mut self, pe: &PageElement, progress: &ProgressCallback) {
        match &pe.element {
            Element::Text(_) => self.text_blocks += 1,
            Element::Table(_) => self.tables += 1,
            Element::Image(_) => self.images += 1,
        }
        match self.current_page {
            Some((page, count)) if page == pe.page => {
                self.current_page = Some((page, count + 1));
            }
            previous => {
                if let Some((page, count)) = previous {
                    progress.on_page_complete(page, count);
                }
                self.current_page = Some((pe.page, 1));
            }
        }
    }

    fn finish(&mut self, progress: &ProgressCallback) {
        if let Some((page, count)) = self.current_page.take() {
            progress.on_page_complete(page, count);
        }
    }
}

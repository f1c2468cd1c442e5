//! Document parsing: PDF bytes → ordered stream of [`PageElement`]s.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks while it decodes. All pdfium calls run on one blocking
//! pool thread; elements cross back to async code through a bounded
//! `mpsc` channel, so a slow consumer (e.g. image uploads) applies
//! backpressure instead of buffering the whole document in memory.
//!
//! ## Ordering and isolation
//!
//! Pages are visited in ascending order and each page emits
//! `[Text?, Table*, Image*]`. What can go wrong on one page stays on that
//! page: see [`extract_page`]. [`extract_pages`] walks the whole document
//! the same way whatever the page source. Only failing to open the document is fatal,
//! and that is reported before the stream is handed out.

use super::clean::clean_text;
use super::encode::{encode_png, IMAGE_EXT, JPEG_EXT};
use super::tables::{detect_tables, TextRun};
use super::{Element, ExtractedImage, PageElement};
use crate::config::{ConversionConfig, TableDetection};
use crate::error::{ExtractionError, PdfChatError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

// ── Element stream ───────────────────────────────────────────────────────

/// A lazy, finite, single-use stream of a document's elements.
pub struct ElementStream {
    page_count: usize,
    failures: ExtractionLog,
    inner: BoxStream<'static, PageElement>,
}

impl ElementStream {
    pub fn new(
        page_count: usize,
        failures: ExtractionLog,
        inner: impl Stream<Item = PageElement> + Send + 'static,
    ) -> Self {
        Self {
            page_count,
            failures,
            inner: inner.boxed(),
        }
    }

    /// A stream over already-extracted elements.
    pub fn from_elements(page_count: usize, elements: Vec<PageElement>) -> Self {
        Self::new(page_count, ExtractionLog::default(), stream::iter(elements))
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Failures recorded so far; complete once the stream is exhausted.
    pub fn failures(&self) -> ExtractionLog {
        self.failures.clone()
    }
}

impl Stream for ElementStream {
    type Item = PageElement;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Shared record of the non-fatal failures hit during extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionLog(Arc<Mutex<Vec<ExtractionError>>>);

impl ExtractionLog {
    pub fn record(&self, error: ExtractionError) {
        warn!("{error}");
        if let Ok(mut errors) = self.0.lock() {
            errors.push(error);
        }
    }

    pub fn errors(&self) -> Vec<ExtractionError> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Parser seam ──────────────────────────────────────────────────────────

/// Turns PDF bytes into an [`ElementStream`].
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Open the document. Fails only when the document cannot be opened at
    /// all; per-page problems are recorded in the stream's
    /// [`ExtractionLog`] instead.
    async fn extract(&self, name: &str, pdf_bytes: Bytes) -> Result<ElementStream, PdfChatError>;
}

// ── Page model ───────────────────────────────────────────────────────────

/// An embedded image as the page hands it over.
#[derive(Debug, Clone)]
pub enum PageImage {
    /// The stored stream is already a renderable file (a DCT stream is a
    /// JPEG); its bytes are kept as is.
    Stored { ext: &'static str, bytes: Vec<u8> },
    /// Decoded pixels; encoded as PNG on extraction.
    Decoded(DynamicImage),
}

impl PageImage {
    fn into_file(self) -> Result<(&'static str, Vec<u8>), String> {
        match self {
            PageImage::Stored { ext, bytes } => Ok((ext, bytes)),
            PageImage::Decoded(img) => encode_png(&img)
                .map(|bytes| (IMAGE_EXT, bytes))
                .map_err(|e| e.to_string()),
        }
    }
}

/// One loaded page.
pub trait PageSource {
    fn text(&self) -> Result<String, String>;
    fn text_runs(&self) -> Result<Vec<TextRun>, String>;
    /// Embedded raster images in page-object order. The outer error fails
    /// enumeration; an inner error fails a single image.
    fn images(&self) -> Result<Vec<Result<PageImage, String>>, String>;
}

/// Random access to a document's pages (1-based).
pub trait PageReader {
    fn page_count(&self) -> usize;
    fn load_page(&self, page: usize) -> Result<Box<dyn PageSource + '_>, String>;
}

/// Extract one page's elements, recording every failure in `log`.
///
/// * page cannot be loaded → no elements
/// * text fails → no text element
/// * table detection fails → zero tables
/// * image enumeration fails → no images; one image fails → that image is
///   skipped and later images keep their index
pub fn extract_page(
    reader: &dyn PageReader,
    page: usize,
    tables: &TableDetection,
    log: &ExtractionLog,
) -> Vec<PageElement> {
    let source = match reader.load_page(page) {
        Ok(source) => source,
        Err(detail) => {
            log.record(ExtractionError::Page { page, detail });
            return Vec::new();
        }
    };

    let mut out = Vec::new();

    match source.text() {
        Ok(raw) => {
            if let Some(text) = clean_text(&raw) {
                out.push(PageElement::new(page, Element::Text(text)));
            }
        }
        Err(detail) => log.record(ExtractionError::Text { page, detail }),
    }

    match source.text_runs() {
        Ok(runs) => {
            for table in detect_tables(&runs, tables) {
                out.push(PageElement::new(page, Element::Table(table)));
            }
        }
        Err(detail) => log.record(ExtractionError::Tables { page, detail }),
    }

    match source.images() {
        Ok(images) => {
            for (i, image) in images.into_iter().enumerate() {
                let index = i + 1;
                match image.and_then(PageImage::into_file) {
                    Ok((ext, bytes)) => out.push(PageElement::new(
                        page,
                        Element::Image(ExtractedImage::new(page, index, ext, bytes)),
                    )),
                    Err(detail) => log.record(ExtractionError::Image {
                        page,
                        index,
                        detail,
                    }),
                }
            }
        }
        Err(detail) => log.record(ExtractionError::Images { page, detail }),
    }

    debug!("Page {}: {} elements", page, out.len());
    out
}

/// Extract every page in ascending order, handing each element to `sink`.
///
/// A page that fails in any way contributes what it can and the walk moves
/// on to the next page. Returns early once `sink` returns `false`.
pub fn extract_pages(
    reader: &dyn PageReader,
    tables: &TableDetection,
    log: &ExtractionLog,
    mut sink: impl FnMut(PageElement) -> bool,
) {
    for page in 1..=reader.page_count() {
        for element in extract_page(reader, page, tables, log) {
            if !sink(element) {
                debug!("Element sink closed; stopping at page {}", page);
                return;
            }
        }
    }
}

// ── pdfium implementation ────────────────────────────────────────────────

/// [`DocumentParser`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumParser {
    lib_path: Option<PathBuf>,
    password: Option<String>,
    tables: TableDetection,
    channel_capacity: usize,
}

impl PdfiumParser {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            lib_path: config.pdfium_lib_path.clone(),
            password: config.password.clone(),
            tables: config.tables,
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

#[async_trait]
impl DocumentParser for PdfiumParser {
    async fn extract(&self, name: &str, pdf_bytes: Bytes) -> Result<ElementStream, PdfChatError> {
        super::input::check_pdf_magic(name, &pdf_bytes)?;

        let (open_tx, open_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let log = ExtractionLog::default();

        let worker = Worker {
            name: name.to_string(),
            lib_path: self.lib_path.clone(),
            password: self.password.clone(),
            tables: self.tables,
            log: log.clone(),
        };
        tokio::task::spawn_blocking(move || worker.run(&pdf_bytes, open_tx, tx));

        let page_count = open_rx
            .await
            .map_err(|_| PdfChatError::Internal("pdfium worker exited before opening".into()))??;

        info!("PDF '{}' opened: {} pages", name, page_count);
        Ok(ElementStream::new(page_count, log, ReceiverStream::new(rx)))
    }
}

/// State moved onto the blocking thread.
struct Worker {
    name: String,
    lib_path: Option<PathBuf>,
    password: Option<String>,
    tables: TableDetection,
    log: ExtractionLog,
}

impl Worker {
    fn run(
        self,
        bytes: &[u8],
        opened: oneshot::Sender<Result<usize, PdfChatError>>,
        tx: mpsc::Sender<PageElement>,
    ) {
        let pdfium = match bind_pdfium(self.lib_path.as_ref()) {
            Ok(p) => p,
            Err(e) => {
                let _ = opened.send(Err(e));
                return;
            }
        };

        let document = match pdfium.load_pdf_from_byte_slice(bytes, self.password.as_deref()) {
            Ok(doc) => doc,
            Err(e) => {
                let _ = opened.send(Err(map_load_error(&self.name, self.password.is_some(), e)));
                return;
            }
        };

        let reader = PdfiumReader {
            document: &document,
        };
        let page_count = reader.page_count();
        if opened.send(Ok(page_count)).is_err() {
            return;
        }

        extract_pages(&reader, &self.tables, &self.log, |element| {
            tx.blocking_send(element).is_ok()
        });
    }
}

fn bind_pdfium(lib_path: Option<&PathBuf>) -> Result<Pdfium, PdfChatError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PdfChatError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn map_load_error(name: &str, had_password: bool, e: PdfiumError) -> PdfChatError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            PdfChatError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            PdfChatError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        PdfChatError::CorruptPdf {
            name: name.to_string(),
            detail,
        }
    }
}

struct PdfiumReader<'a, 'lib> {
    document: &'a PdfDocument<'lib>,
}

impl PageReader for PdfiumReader<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn load_page(&self, page: usize) -> Result<Box<dyn PageSource + '_>, String> {
        let index = u16::try_from(page - 1).map_err(|e| e.to_string())?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| format!("{e:?}"))?;
        Ok(Box::new(PdfiumPage { page }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
}

impl PageSource for PdfiumPage<'_> {
    fn text(&self) -> Result<String, String> {
        Ok(self.page.text().map_err(|e| format!("{e:?}"))?.all())
    }

    fn text_runs(&self) -> Result<Vec<TextRun>, String> {
        let text = self.page.text().map_err(|e| format!("{e:?}"))?;
        let runs = text
            .segments()
            .iter()
            .map(|segment| {
                let b = segment.bounds();
                TextRun::new(
                    segment.text(),
                    b.left().value,
                    b.bottom().value,
                    b.right().value,
                    b.top().value,
                )
            })
            .collect();
        Ok(runs)
    }

    fn images(&self) -> Result<Vec<Result<PageImage, String>>, String> {
        let images = self
            .page
            .objects()
            .iter()
            .filter_map(|object| object.as_image_object().map(read_image))
            .collect();
        Ok(images)
    }
}

/// A lone `DCTDecode` filter means the stored stream is a complete JPEG.
fn read_image(image: &PdfPageImageObject<'_>) -> Result<PageImage, String> {
    let filters: Vec<String> = image
        .filters()
        .iter()
        .map(|filter| filter.name().to_string())
        .collect();
    if filters.len() == 1 && filters[0] == "DCTDecode" {
        let bytes = image.get_raw_image_data().map_err(|e| format!("{e:?}"))?;
        if !bytes.is_empty() {
            return Ok(PageImage::Stored {
                ext: JPEG_EXT,
                bytes,
            });
        }
    }
    image
        .get_raw_image()
        .map(PageImage::Decoded)
        .map_err(|e| format!("{e:?}"))
}

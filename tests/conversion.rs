//! Conversion and chat integration tests.
//!
//! These run the real converter, assembler and artifact store (in memory)
//! against a fixture parser, so they need neither pdfium nor network access.

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_pdfchat::chat::{ChatBackend, Completion, ProviderError, Usage};
use edgequake_pdfchat::pipeline::parse::ElementStream;
use edgequake_pdfchat::pipeline::{Element, ExtractedImage, PageElement};
use edgequake_pdfchat::{
    extract_content, ArtifactStore, ChatService, ConversionConfig, ConversionProgressCallback,
    ConversionStats, Converter, DocumentName, DocumentParser, ObjectArtifactStore, PdfChatError,
    PricingTable, Provider,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const PDF: &[u8] = b"%PDF-1.7\n% fixture\n";

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Replays a fixed element list for every document.
struct FixtureParser {
    page_count: usize,
    elements: Vec<PageElement>,
}

#[async_trait]
impl DocumentParser for FixtureParser {
    async fn extract(&self, _name: &str, _bytes: Bytes) -> Result<ElementStream, PdfChatError> {
        Ok(ElementStream::from_elements(
            self.page_count,
            self.elements.clone(),
        ))
    }
}

/// Delegates to an in-memory store but rejects every image upload.
struct NoImagesStore(ObjectArtifactStore);

#[async_trait]
impl ArtifactStore for NoImagesStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, PdfChatError> {
        if key.contains("/Images/") {
            return Err(PdfChatError::storage(key, "access denied"));
        }
        self.0.put(key, bytes, content_type).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, PdfChatError> {
        self.0.get(key).await
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, PdfChatError> {
        self.0.list(prefix).await
    }

    fn public_url(&self, key: &str) -> String {
        self.0.public_url(key)
    }
}

#[derive(Default)]
struct Recorder {
    pages: Mutex<Vec<(usize, usize)>>,
    image_errors: Mutex<Vec<String>>,
    stats: Mutex<Option<ConversionStats>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_page_complete(&self, page: usize, elements: usize) {
        self.pages.lock().unwrap().push((page, elements));
    }

    fn on_image_error(&self, _page: usize, file_name: &str, _error: &str) {
        self.image_errors.lock().unwrap().push(file_name.to_string());
    }

    fn on_conversion_complete(&self, stats: &ConversionStats) {
        *self.stats.lock().unwrap() = Some(stats.clone());
    }
}

struct Echo;

#[async_trait]
impl ChatBackend for Echo {
    async fn submit(&self, prompt: &str) -> Result<Completion, ProviderError> {
        Ok(Completion {
            text: format!("{} chars", prompt.len()),
            usage: Some(Usage {
                input_tokens: 1_000_000,
                output_tokens: 0,
            }),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn text(page: usize, s: &str) -> PageElement {
    PageElement::new(page, Element::Text(s.to_string()))
}

fn table(page: usize, rows: &[&[&str]]) -> PageElement {
    let grid = rows
        .iter()
        .map(|row| row.iter().map(|c| Some(c.to_string())).collect())
        .collect();
    PageElement::new(page, Element::Table(grid))
}

fn image(page: usize, index: usize) -> PageElement {
    PageElement::new(
        page,
        Element::Image(ExtractedImage::new(page, index, "png", vec![0x89, b'P', b'N', b'G'])),
    )
}

fn three_page_document() -> FixtureParser {
    FixtureParser {
        page_count: 3,
        elements: vec![
            text(1, "Intro"),
            table(2, &[&["A", "B"], &["1", "2"]]),
            image(3, 1),
        ],
    }
}

fn converter(store: Arc<dyn ArtifactStore>, parser: FixtureParser) -> Converter {
    Converter::new(store, Arc::new(parser), ConversionConfig::default())
}

async fn markdown(store: &dyn ArtifactStore, key: &str) -> String {
    String::from_utf8(store.get(key).await.unwrap().to_vec()).unwrap()
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_table_image_render_in_page_order() {
    let store = Arc::new(ObjectArtifactStore::in_memory());
    let converter = converter(store.clone(), three_page_document());
    let name = DocumentName::from_file_name("Doc.pdf").unwrap();

    let result = converter.convert(Bytes::from_static(PDF), &name).await.unwrap();

    assert_eq!(
        markdown(store.as_ref(), "Doc/Doc.md").await,
        "Intro\n\n| A | B |\n| --- | --- |\n| 1 | 2 |\n\n![Image](memory://local/Doc/Images/image_3_1.png)\n\n"
    );
    assert_eq!(result.pdf_url, "memory://local/Doc/Doc.pdf");
    assert_eq!(result.storage_folder, "Doc/");
    assert_eq!(result.markdown_filename, "Doc.md");
    assert_eq!(result.stats.pages, 3);
    assert_eq!(result.stats.images_uploaded, 1);
    assert_eq!(
        store.get("Doc/Images/image_3_1.png").await.unwrap(),
        Bytes::from_static(&[0x89, b'P', b'N', b'G'])
    );
}

#[tokio::test]
async fn document_without_images_uploads_no_images() {
    let store = Arc::new(ObjectArtifactStore::in_memory());
    let parser = FixtureParser {
        page_count: 2,
        elements: vec![text(1, "One"), text(2, "Two")],
    };
    let name = DocumentName::from_file_name("Plain.pdf").unwrap();
    converter(store.clone(), parser)
        .convert(Bytes::from_static(PDF), &name)
        .await
        .unwrap();

    assert!(store.list(Some("Plain/Images/")).await.unwrap().is_empty());
    assert_eq!(
        store.list(None).await.unwrap(),
        vec!["Plain/Plain.md".to_string(), "Plain/Plain.pdf".to_string()]
    );
    assert!(!markdown(store.as_ref(), "Plain/Plain.md").await.contains("!["));
}

#[tokio::test]
async fn reconverting_overwrites_the_same_keys() {
    let store = Arc::new(ObjectArtifactStore::in_memory());
    let converter = converter(store.clone(), three_page_document());
    let name = DocumentName::from_file_name("Doc.pdf").unwrap();

    let first = converter.convert(Bytes::from_static(PDF), &name).await.unwrap();
    let keys_after_first = store.list(None).await.unwrap();
    let second = converter.convert(Bytes::from_static(PDF), &name).await.unwrap();

    assert_eq!(store.list(None).await.unwrap(), keys_after_first);
    assert_eq!(first.markdown_url, second.markdown_url);
    assert_eq!(first.pdf_url, second.pdf_url);
}

#[tokio::test]
async fn upload_file_name_is_sanitised() {
    let store = Arc::new(ObjectArtifactStore::in_memory());
    let result = converter(store.clone(), three_page_document())
        .convert_upload("Report (1).pdf", Bytes::from_static(PDF))
        .await
        .unwrap();

    assert_eq!(result.storage_folder, "Report_1/");
    assert_eq!(result.markdown_filename, "Report_1.md");
    assert!(store.get("Report_1/Report_1.pdf").await.is_ok());
    assert!(store.get("Report_1/Images/image_3_1.png").await.is_ok());
}

#[tokio::test]
async fn failed_image_upload_is_skipped_not_fatal() {
    let store = Arc::new(NoImagesStore(ObjectArtifactStore::in_memory()));
    let parser = FixtureParser {
        page_count: 1,
        elements: vec![text(1, "Before"), image(1, 1), image(1, 2)],
    };
    let recorder = Arc::new(Recorder::default());
    let converter = converter(store.clone(), parser).with_progress(recorder.clone());
    let name = DocumentName::from_file_name("Doc.pdf").unwrap();

    let result = converter.convert(Bytes::from_static(PDF), &name).await.unwrap();

    assert_eq!(markdown(store.as_ref(), "Doc/Doc.md").await, "Before\n\n");
    assert_eq!(result.stats.images_found, 2);
    assert_eq!(result.stats.images_failed, 2);
    assert_eq!(result.stats.images_uploaded, 0);
    assert_eq!(
        *recorder.image_errors.lock().unwrap(),
        vec!["image_1_1.png".to_string(), "image_1_2.png".to_string()]
    );
    assert_eq!(*recorder.pages.lock().unwrap(), vec![(1, 3)]);
    assert_eq!(
        recorder.stats.lock().unwrap().as_ref().map(|s| s.images_failed),
        Some(2)
    );
}

#[tokio::test]
async fn non_pdf_bytes_store_nothing() {
    let store = Arc::new(ObjectArtifactStore::in_memory());
    let err = converter(store.clone(), three_page_document())
        .convert_upload("notes.pdf", Bytes::from_static(b"PK\x03\x04zip"))
        .await
        .unwrap_err();

    assert!(matches!(err, PdfChatError::NotAPdf { .. }));
    assert!(store.list(None).await.unwrap().is_empty());
}

// ── Extraction + chat ────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_content_joins_text_and_keeps_tables() {
    let content = extract_content(&three_page_document(), "Doc", Bytes::from_static(PDF))
        .await
        .unwrap();

    assert_eq!(content.pdf_content, "Intro");
    assert_eq!(
        content.tables,
        vec![serde_json::json!([{"0": "A", "1": "B"}, {"0": "1", "1": "2"}])]
    );
}

#[tokio::test]
async fn chat_prices_extracted_content_with_the_providers_rate() {
    let content = extract_content(&three_page_document(), "Doc", Bytes::from_static(PDF))
        .await
        .unwrap();

    let mut backends: HashMap<Provider, Arc<dyn ChatBackend>> = HashMap::new();
    backends.insert(Provider::ClaudeHaiku, Arc::new(Echo));
    let service = ChatService::new(backends, PricingTable::default());

    let answer = service
        .answer(&content, "What is in the table?", Some("  Claude-3.5 Haiku "), false)
        .await;

    assert!(answer.text.ends_with(" chars"));
    assert_eq!(answer.provider.as_deref(), Some("claude-3.5 haiku"));
    assert_eq!(answer.input_tokens, 1_000_000);
    assert!((answer.cost - 3.0).abs() < 1e-9);
}

//! HTTP surface: upload, browse and chat over converted documents.
//!
//! | Method | Path                      | Handler                          |
//! |--------|---------------------------|----------------------------------|
//! | POST   | `/upload_pdf/`            | [`routes::upload_pdf`]           |
//! | GET    | `/fetch_markdown_files/`  | [`routes::fetch_markdown_files`] |
//! | POST   | `/get_markdown_content/`  | [`routes::get_markdown_content`] |
//! | POST   | `/chat/`                  | [`routes::chat`]                 |
//! | GET    | `/list_images/{pdf_name}` | [`routes::list_images`]          |
//! | GET    | `/health`                 | [`routes::health`]               |
//!
//! Errors are returned as `{"detail": message}` with 400, 404 or 500, and
//! 413 for an upload over [`ServerLimits::max_upload_bytes`].

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, ServerLimits};

use crate::error::PdfChatError;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the router with every route and middleware layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/upload_pdf/",
            post(routes::upload_pdf).layer(DefaultBodyLimit::max(state.max_upload_bytes())),
        )
        .route("/fetch_markdown_files/", get(routes::fetch_markdown_files))
        .route("/get_markdown_content/", post(routes::get_markdown_content))
        .route("/chat/", post(routes::chat))
        .route("/list_images/{pdf_name}", get(routes::list_images))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), PdfChatError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PdfChatError::InvalidConfig(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Serving on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| PdfChatError::Internal(format!("Server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::chat::{ChatBackend, ChatService, Completion, PricingTable, Provider, ProviderError, Usage};
    use crate::config::ConversionConfig;
    use crate::convert::Converter;
    use crate::pipeline::parse::{DocumentParser, ElementStream};
    use crate::pipeline::{Element, PageElement};
    use crate::store::{ArtifactStore, ObjectArtifactStore};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct OnePageParser;

    #[async_trait]
    impl DocumentParser for OnePageParser {
        async fn extract(&self, _name: &str, _bytes: Bytes) -> Result<ElementStream, PdfChatError> {
            Ok(ElementStream::from_elements(
                1,
                vec![PageElement::new(1, Element::Text("Hello".into()))],
            ))
        }
    }

    struct Counting(AtomicUsize);

    #[async_trait]
    impl ChatBackend for Counting {
        async fn submit(&self, _prompt: &str) -> Result<Completion, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: "Forty-two.".into(),
                usage: Some(Usage {
                    input_tokens: 100,
                    output_tokens: 10,
                }),
            })
        }
    }

    fn app() -> (Router, Arc<ObjectArtifactStore>, Arc<Counting>) {
        let store = Arc::new(ObjectArtifactStore::in_memory());
        let converter = Converter::new(
            store.clone(),
            Arc::new(OnePageParser),
            ConversionConfig::default(),
        );
        let backend = Arc::new(Counting(AtomicUsize::new(0)));
        let mut backends: HashMap<Provider, Arc<dyn ChatBackend>> = HashMap::new();
        backends.insert(Provider::OpenAiGpt4oMini, backend.clone());
        let chat = ChatService::new(backends, PricingTable::default());
        let state = AppState::new(converter, chat, Arc::new(MemoryCache::new()));
        (router(state), store, backend)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_upload(file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "pdfchat-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/upload_pdf/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn upload_stores_artifacts() {
        let (app, store, _) = app();
        let response = app
            .oneshot(multipart_upload("Report (1).pdf", b"%PDF-1.7 fixture"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["s3_folder"], "Report_1/");
        assert_eq!(body["markdown_filename"], "Report_1.md");
        assert_eq!(body["markdown_url"], "memory://local/Report_1/Report_1.md");
        assert_eq!(
            store.get("Report_1/Report_1.md").await.unwrap(),
            Bytes::from_static(b"Hello\n\n")
        );
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf() {
        let (app, _, _) = app();
        let response = app
            .oneshot(multipart_upload("notes.pdf", b"PK\x03\x04"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("not a valid PDF"));
    }

    #[tokio::test]
    async fn missing_markdown_is_404() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_json(
                "/get_markdown_content/",
                json!({"pdf_name": "Ghost", "markdown_filename": "Ghost.md"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["detail"],
            "Markdown file 'Ghost.md' not found in Ghost."
        );
    }

    #[tokio::test]
    async fn limits_survive_an_earlier_clone() {
        let (_, store, _) = app();
        let converter = Converter::new(store, Arc::new(OnePageParser), ConversionConfig::default());
        let chat = ChatService::new(HashMap::new(), PricingTable::default());
        let state = AppState::new(converter, chat, Arc::new(MemoryCache::new()));
        let _shared = state.clone();

        let state = state.with_limits(ServerLimits {
            cache_ttl: Duration::from_secs(60),
            max_upload_bytes: 1024,
        });
        assert_eq!(state.cache_ttl(), Duration::from_secs(60));
        assert_eq!(state.max_upload_bytes(), 1024);

        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.resize(4096, b' ');
        let response = router(state)
            .oneshot(multipart_upload("big.pdf", &pdf))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn traversal_in_markdown_filename_is_400() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_json(
                "/get_markdown_content/",
                json!({"pdf_name": "Doc", "markdown_filename": "../secret.md"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("Doc/../secret.md"));
    }

    #[tokio::test]
    async fn traversal_in_image_folder_is_400() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/list_images/..").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn markdown_files_are_grouped() {
        let (app, store, _) = app();
        store
            .put("Doc/Doc.md", Bytes::from_static(b"# Doc"), "text/markdown")
            .await
            .unwrap();
        store
            .put("Doc/Doc.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();
        let response = app
            .oneshot(Request::get("/fetch_markdown_files/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"markdown_files": {"Doc": ["Doc.md"]}})
        );
    }

    #[tokio::test]
    async fn list_images_returns_urls() {
        let (app, store, _) = app();
        for key in ["Doc/Images/image_1_1.png", "Doc/Images/notes.txt"] {
            store.put(key, Bytes::new(), "image/png").await.unwrap();
        }
        let response = app
            .oneshot(Request::get("/list_images/Doc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            json_body(response).await,
            json!({"images": ["memory://local/Doc/Images/image_1_1.png"]})
        );
    }

    #[tokio::test]
    async fn chat_without_llm_choice_is_400() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_json(
                "/chat/",
                json!({"pdf_name": "Doc", "question": "Why?", "pdf_json": "{}"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_content_is_400() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_json(
                "/chat/",
                json!({"pdf_name": "Doc", "question": "Why?", "llm_choice": "gpt-4o mini"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "No valid input provided.");
    }

    #[tokio::test]
    async fn chat_with_invalid_pdf_json_is_400() {
        let (app, _, _) = app();
        let response = app
            .oneshot(post_json(
                "/chat/",
                json!({
                    "pdf_name": "Doc",
                    "question": "Why?",
                    "llm_choice": "gpt-4o mini",
                    "pdf_json": "{not json"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_identical_chat_is_served_from_cache() {
        let (app, _, backend) = app();
        let request = json!({
            "pdf_name": "Doc",
            "question": "What is the answer?",
            "llm_choice": "gpt-4o mini",
            "pdf_json": "{\"pdf_content\": \"The answer is 42.\", \"tables\": []}"
        });

        let first = json_body(
            app.clone()
                .oneshot(post_json("/chat/", request.clone()))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(first["answer"], "Forty-two.");
        assert_eq!(first["cached"], false);
        assert_eq!(first["tokens_used"], 110);
        assert_eq!(first["llm_choice"], "gpt-4o mini");

        let second = json_body(app.oneshot(post_json("/chat/", request)).await.unwrap()).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["answer"], "Forty-two.");
        assert_eq!(second["cost"], first["cost"]);
        assert_eq!(backend.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_provider_is_a_normal_answer() {
        let (app, _, backend) = app();
        let response = app
            .oneshot(post_json(
                "/chat/",
                json!({
                    "pdf_name": "Doc",
                    "question": "Q",
                    "llm_choice": "Mystery Model",
                    "pdf_json": "{\"pdf_content\": \"x\"}"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "⚠️ LLM choice 'mystery model' not recognized.");
        assert_eq!(body["cost"], 0.0);
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);
    }
}

//! Request handlers.

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::cache::{self, cache_key};
use crate::error::PdfChatError;
use crate::output::DocumentContent;
use crate::store::{group_markdown_files, is_image_key};
use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

const NO_CONTENT: &str = "No content available.";

// ── Upload ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub pdf_url: String,
    pub markdown_url: String,
    pub s3_folder: String,
    pub markdown_filename: String,
}

/// POST /upload_pdf/ - convert a multipart `file` and store its artifacts
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let data = field.bytes().await?;

        info!("Processing upload: {} ({} bytes)", file_name, data.len());
        let result = state.converter().convert_upload(&file_name, data).await?;

        return Ok(Json(UploadResponse {
            pdf_url: result.pdf_url,
            markdown_url: result.markdown_url,
            s3_folder: result.storage_folder,
            markdown_filename: result.markdown_filename,
        }));
    }

    Err(ApiError::bad_request("No file uploaded: expected a multipart 'file' field."))
}

// ── Markdown ─────────────────────────────────────────────────────────────

/// GET /fetch_markdown_files/ - Markdown files grouped by document folder
pub async fn fetch_markdown_files(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let keys = state.store().list(None).await?;
    let groups: BTreeMap<String, Vec<String>> = group_markdown_files(&keys);
    Ok(Json(json!({ "markdown_files": groups })))
}

#[derive(Debug, Deserialize)]
pub struct MarkdownRequest {
    pub pdf_name: String,
    pub markdown_filename: String,
}

/// POST /get_markdown_content/
pub async fn get_markdown_content(
    State(state): State<AppState>,
    Json(request): Json<MarkdownRequest>,
) -> ApiResult<Json<Value>> {
    let content = load_markdown(&state, &request.pdf_name, &request.markdown_filename).await?;
    Ok(Json(json!({ "markdown_content": content })))
}

async fn load_markdown(state: &AppState, pdf_name: &str, markdown_filename: &str) -> ApiResult<String> {
    let key = format!("{pdf_name}/{markdown_filename}");
    match state.store().get(&key).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(PdfChatError::NotFound { .. }) => Err(ApiError::not_found(format!(
            "Markdown file '{markdown_filename}' not found in {pdf_name}."
        ))),
        Err(e) => Err(e.into()),
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// GET /list_images/{pdf_name}
pub async fn list_images(
    State(state): State<AppState>,
    Path(pdf_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let prefix = format!("{pdf_name}/Images/");
    let images: Vec<String> = state
        .store()
        .list(Some(&prefix))
        .await?
        .into_iter()
        .filter(|key| is_image_key(key))
        .map(|key| state.store().public_url(&key))
        .collect();
    Ok(Json(json!({ "images": images })))
}

// ── Chat ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub pdf_name: String,
    #[serde(default)]
    pub question: String,
    /// A JSON string of `{pdf_content, tables}`.
    pub pdf_json: Option<String>,
    pub markdown_filename: Option<String>,
    pub llm_choice: Option<String>,
    #[serde(default)]
    pub text_summary: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    pub tokens_used: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub cached: bool,
    pub llm_choice: Option<String>,
}

/// What is stored in the response cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAnswer {
    response: String,
    tokens_used: u64,
    input_tokens: u64,
    output_tokens: u64,
    cost: f64,
}

/// POST /chat/ - answer a question or summarise a document, through the cache
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.pdf_name.is_empty() || request.question.is_empty() {
        return Err(ApiError::bad_request(
            "Missing required fields: 'pdf_name' and 'question'.",
        ));
    }
    let llm_choice = request.llm_choice.clone().filter(|c| !c.trim().is_empty());
    if !request.text_summary && llm_choice.is_none() {
        return Err(ApiError::bad_request("LLM choice is required for chat."));
    }

    let key = cache_key(
        &request.pdf_name,
        &request.question,
        request.text_summary,
        llm_choice.as_deref(),
    );
    if let Some(hit) = cache::get_json::<CachedAnswer>(state.cache(), &key).await? {
        debug!("Cache hit for '{}'", key);
        return Ok(Json(ChatResponse {
            answer: hit.response,
            tokens_used: hit.tokens_used,
            input_tokens: hit.input_tokens,
            output_tokens: hit.output_tokens,
            cost: hit.cost,
            cached: true,
            llm_choice: request.llm_choice,
        }));
    }

    let content = match (&request.markdown_filename, &request.pdf_json) {
        (Some(md), _) if !md.is_empty() => {
            let text = load_markdown(&state, &request.pdf_name, md).await?;
            if text.trim().is_empty() {
                DocumentContent::from_text(NO_CONTENT)
            } else {
                DocumentContent::from_text(text)
            }
        }
        (_, Some(raw)) if !raw.is_empty() => serde_json::from_str::<DocumentContent>(raw)
            .map_err(|e| ApiError::bad_request(format!("Invalid pdf_json: {e}")))?,
        _ => return Err(ApiError::bad_request("No valid input provided.")),
    };

    let provider = if request.text_summary {
        None
    } else {
        llm_choice.as_deref()
    };
    let answer = state
        .chat()
        .answer(&content, &request.question, provider, request.text_summary)
        .await;

    // Notices and backend failures are not cached.
    if answer.provider.is_some() {
        let entry = CachedAnswer {
            response: answer.text.clone(),
            tokens_used: answer.total_tokens,
            input_tokens: answer.input_tokens,
            output_tokens: answer.output_tokens,
            cost: answer.cost,
        };
        cache::set_json(state.cache(), &key, &entry, state.cache_ttl()).await?;
    }

    Ok(Json(ChatResponse {
        answer: answer.text,
        tokens_used: answer.total_tokens,
        input_tokens: answer.input_tokens,
        output_tokens: answer.output_tokens,
        cost: answer.cost,
        cached: false,
        llm_choice: request.llm_choice,
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

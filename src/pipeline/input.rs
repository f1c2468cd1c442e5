//! Input handling: document names, PDF validation and source loading.
//!
//! Every artifact key is derived from the [`DocumentName`], so the name is
//! restricted to `[A-Za-z0-9_-]` and can never contain a `/` that would
//! escape its folder. PDF bytes are checked for the `%PDF` magic before they
//! reach pdfium so callers get a meaningful error instead of a parser failure.

use crate::error::PdfChatError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// A storage-safe document name derived from an uploaded filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentName(String);

impl DocumentName {
    /// Derive the name from a filename.
    ///
    /// The extension is stripped, every run of characters outside
    /// `[A-Za-z0-9_-]` becomes a single `_`, and leading/trailing `_` are trimmed:
    /// `"Report (1).pdf"` → `"Report_1"`.
    pub fn from_file_name(file_name: &str) -> Result<Self, PdfChatError> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let stem = match base.rfind('.') {
            Some(i) if i > 0 => &base[..i],
            _ => base,
        };

        let replaced = RE_UNSAFE.replace_all(stem, "_");
        let name = replaced.trim_matches('_');

        if name.is_empty() {
            return Err(PdfChatError::BadRequest(format!(
                "Cannot derive a document name from '{file_name}'"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"{name}/"`
    pub fn folder(&self) -> String {
        format!("{}/", self.0)
    }

    /// `"{name}/{name}.pdf"`
    pub fn pdf_key(&self) -> String {
        format!("{0}/{0}.pdf", self.0)
    }

    /// `"{name}.md"`
    pub fn markdown_filename(&self) -> String {
        format!("{}.md", self.0)
    }

    /// `"{name}/{name}.md"`
    pub fn markdown_key(&self) -> String {
        format!("{0}/{0}.md", self.0)
    }

    /// `"{name}/Images/"`
    pub fn images_prefix(&self) -> String {
        format!("{}/Images/", self.0)
    }

    /// `"{name}/Images/{file_name}"`
    pub fn image_key(&self, file_name: &str) -> String {
        format!("{}/Images/{file_name}", self.0)
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject bytes that do not start with `%PDF`.
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), PdfChatError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    Err(PdfChatError::NotAPdf {
        name: name.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })
}

/// A PDF loaded from a local path or a URL.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a PDF from a local path or an `http(s)` URL.
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<SourceDocument, PdfChatError> {
    let doc = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_pdf_magic(&doc.file_name, &doc.bytes)?;
    Ok(doc)
}

async fn read_local(path_str: &str) -> Result<SourceDocument, PdfChatError> {
    let path = Path::new(path_str);
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PdfChatError::NotFound {
            key: path.display().to_string(),
        },
        _ => PdfChatError::BadRequest(format!("Cannot read '{}': {e}", path.display())),
    })?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path_str)
        .to_string();
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceDocument { file_name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, PdfChatError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| PdfChatError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();

    info!("Downloaded {} bytes", bytes.len());
    Ok(SourceDocument {
        file_name: file_name_from_url(url),
        bytes,
    })
}

/// Last path segment of a URL when it looks like a file, else `downloaded.pdf`.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return urlencoding::decode(last)
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| last.to_string());
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

//! Configuration types.
//!
//! Each component takes its own config struct: [`ConversionConfig`] for the
//! PDF pipeline, [`ChatConfig`] for the language-model backends,
//! [`StorageConfig`] for the artifact store and [`CacheConfig`] for the
//! response cache. The two with many knobs are built through builders that
//! clamp out-of-range values and validate on `build()`.

use crate::chat::PricingTable;
use crate::error::PdfChatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ── Conversion ───────────────────────────────────────────────────────────

/// Configuration for PDF extraction and Markdown assembly.
///
/// # Example
/// ```rust
/// use edgequake_pdfchat::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .image_upload_concurrency(8)
///     .image_placeholder("*[image unavailable]*")
///     .build()
///     .unwrap();
/// assert_eq!(config.image_upload_concurrency, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Image uploads in flight at once. Default: 4.
    ///
    /// Uploads complete in any order; the Markdown keeps document order
    /// regardless.
    pub image_upload_concurrency: usize,

    /// Line emitted when an image upload fails. Default: `None` (omit).
    pub image_placeholder: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit pdfium library path. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Elements buffered between the pdfium thread and the consumer. Default: 64.
    pub channel_capacity: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Thresholds for reconstructing tables from positioned text.
    pub tables: TableDetection,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            image_upload_concurrency: 4,
            image_placeholder: None,
            password: None,
            pdfium_lib_path: None,
            channel_capacity: 64,
            download_timeout_secs: 120,
            tables: TableDetection::default(),
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn image_upload_concurrency(mut self, n: usize) -> Self {
        self.config.image_upload_concurrency = n.max(1);
        self
    }

    pub fn image_placeholder(mut self, line: impl Into<String>) -> Self {
        self.config.image_placeholder = Some(line.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn channel_capacity(mut self, n: usize) -> Self {
        self.config.channel_capacity = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn tables(mut self, tables: TableDetection) -> Self {
        self.config.tables = tables;
        self
    }

    pub fn build(self) -> Result<ConversionConfig, PdfChatError> {
        let t = &self.config.tables;
        if t.min_rows < 2 {
            return Err(PdfChatError::InvalidConfig(format!(
                "tables.min_rows must be ≥ 2, got {}",
                t.min_rows
            )));
        }
        if t.min_columns < 2 {
            return Err(PdfChatError::InvalidConfig(format!(
                "tables.min_columns must be ≥ 2, got {}",
                t.min_columns
            )));
        }
        if !(t.cell_gap > 0.0 && t.column_tolerance >= 0.0) {
            return Err(PdfChatError::InvalidConfig(
                "tables.cell_gap must be > 0 and tables.column_tolerance ≥ 0".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Thresholds for table reconstruction, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableDetection {
    /// Horizontal gap between runs that starts a new cell. Default: 12.
    pub cell_gap: f32,
    /// Maximum drift between column starts of consecutive rows. Default: 6.
    pub column_tolerance: f32,
    /// Fraction of the shorter run's height two runs must share to be on
    /// the same line. Default: 0.5.
    pub line_overlap: f32,
    /// Minimum consecutive aligned lines. Default: 2.
    pub min_rows: usize,
    /// Minimum cells per line. Default: 2.
    pub min_columns: usize,
}

impl Default for TableDetection {
    fn default() -> Self {
        Self {
            cell_gap: 12.0,
            column_tolerance: 6.0,
            line_overlap: 0.5,
            min_rows: 2,
            min_columns: 2,
        }
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────

/// Models, sampling and pricing for the chat backends.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub openai_model: String,
    pub gemini_model: String,
    pub deepseek_model: String,
    pub claude_model: String,
    /// Model behind every summary request. Default: `gpt-4o`.
    pub summary_model: String,
    pub deepseek_base_url: String,
    #[serde(skip_serializing)]
    pub deepseek_api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub api_timeout_secs: u64,
    pub pricing: PricingTable,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            openai_model: "gpt-4o-mini".into(),
            gemini_model: "gemini-2.0-flash".into(),
            deepseek_model: "deepseek-chat".into(),
            claude_model: "claude-3-5-haiku-20241022".into(),
            summary_model: "gpt-4o".into(),
            deepseek_base_url: "https://api.deepseek.com".into(),
            deepseek_api_key: None,
            temperature: 0.2,
            max_tokens: 1024,
            api_timeout_secs: 60,
            pricing: PricingTable::default(),
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("openai_model", &self.openai_model)
            .field("gemini_model", &self.gemini_model)
            .field("deepseek_model", &self.deepseek_model)
            .field("claude_model", &self.claude_model)
            .field("summary_model", &self.summary_model)
            .field("deepseek_base_url", &self.deepseek_base_url)
            .field("deepseek_api_key", &self.deepseek_api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ChatConfig {
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ChatConfig`].
#[derive(Debug)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.config.openai_model = model.into();
        self
    }

    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.config.gemini_model = model.into();
        self
    }

    pub fn deepseek_model(mut self, model: impl Into<String>) -> Self {
        self.config.deepseek_model = model.into();
        self
    }

    pub fn claude_model(mut self, model: impl Into<String>) -> Self {
        self.config.claude_model = model.into();
        self
    }

    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.config.summary_model = model.into();
        self
    }

    pub fn deepseek_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.deepseek_base_url = url.into();
        self
    }

    pub fn deepseek_api_key(mut self, key: Option<String>) -> Self {
        self.config.deepseek_api_key = key;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn pricing(mut self, pricing: PricingTable) -> Self {
        self.config.pricing = pricing;
        self
    }

    pub fn build(self) -> Result<ChatConfig, PdfChatError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(PdfChatError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !c.deepseek_base_url.starts_with("http://") && !c.deepseek_base_url.starts_with("https://")
        {
            return Err(PdfChatError::InvalidConfig(format!(
                "deepseek_base_url must be an http(s) URL, got '{}'",
                c.deepseek_base_url
            )));
        }
        Ok(self.config)
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

/// Where artifacts are persisted.
#[derive(Clone, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Amazon S3 or an S3-compatible endpoint.
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        #[serde(skip_serializing)]
        secret_access_key: Option<String>,
    },
    /// A directory on the local filesystem.
    Filesystem { root: PathBuf },
    /// Process memory; lost on exit.
    Memory,
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("region", region)
                .field("endpoint", endpoint)
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &secret_access_key.as_ref().map(|_| "<redacted>"))
                .finish(),
            StorageBackend::Filesystem { root } => {
                f.debug_struct("Filesystem").field("root", root).finish()
            }
            StorageBackend::Memory => f.write_str("Memory"),
        }
    }
}

/// Artifact store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Prefix of every public artifact URL. Defaults per backend, see
    /// [`StorageConfig::resolved_public_base_url`].
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    pub fn s3(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::S3 {
                bucket: bucket.into(),
                region: region.into(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
            },
            public_base_url: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Filesystem { root: root.into() },
            public_base_url: None,
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    /// The URL prefix artifacts are published under, without a trailing `/`.
    ///
    /// S3 defaults to the virtual-hosted bucket URL
    /// `https://{bucket}.s3.{region}.amazonaws.com`, the filesystem to a
    /// `file://` URL of its root and memory to `memory://local`.
    pub fn resolved_public_base_url(&self) -> String {
        if let Some(url) = &self.public_base_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.backend {
            StorageBackend::S3 { bucket, region, .. } => {
                format!("https://{bucket}.s3.{region}.amazonaws.com")
            }
            StorageBackend::Filesystem { root } => {
                format!("file://{}", root.display().to_string().trim_end_matches('/'))
            }
            StorageBackend::Memory => "memory://local".to_string(),
        }
    }
}

// ── Cache ────────────────────────────────────────────────────────────────

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// `redis://` URL; `None` selects the in-process cache.
    pub redis_url: Option<String>,
    /// Entry lifetime in seconds. Default: 86 400 (24 h).
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: 86_400,
        }
    }
}

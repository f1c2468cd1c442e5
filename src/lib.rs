//! # edgequake-pdfchat
//!
//! Upload a PDF, turn it into Markdown stored next to its images, and ask
//! questions about it through a choice of hosted language models.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     derive the document name, check the %PDF magic
//!  ├─ 2. Store     {name}/{name}.pdf
//!  ├─ 3. Parse     pdfium on spawn_blocking → ordered [Text?, Table*, Image*] per page
//!  ├─ 4. Assemble  Markdown in element order; images uploaded to {name}/Images/
//!  └─ 5. Store     {name}/{name}.md
//! ```
//!
//! Chat sits beside the pipeline: [`ChatService`] builds a prompt from the
//! document content and dispatches it to the selected provider, pricing the
//! usage against a [`PricingTable`]. The [`server`] module exposes both over
//! HTTP with a [`cache::ResponseCache`] in front of chat.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfchat::{ConversionConfig, Converter, ObjectArtifactStore, PdfiumParser};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let converter = Converter::new(
//!         Arc::new(ObjectArtifactStore::in_memory()),
//!         Arc::new(PdfiumParser::new(&config)),
//!         config,
//!     );
//!     let bytes = tokio::fs::read("Report (1).pdf").await?;
//!     let result = converter.convert_upload("Report (1).pdf", bytes.into()).await?;
//!     println!("{}", result.markdown_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod chat;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{MemoryCache, RedisCache, ResponseCache};
pub use chat::{ChatAnswer, ChatService, PricingTable, Provider, ProviderChoice};
pub use config::{
    CacheConfig, ChatConfig, ChatConfigBuilder, ConversionConfig, ConversionConfigBuilder,
    StorageBackend, StorageConfig, TableDetection,
};
pub use convert::{extract_content, Converter};
pub use error::{ExtractionError, PdfChatError};
pub use output::{ConversionResult, ConversionStats, DocumentContent};
pub use pipeline::input::DocumentName;
pub use pipeline::parse::{DocumentParser, PdfiumParser};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{ArtifactStore, ObjectArtifactStore};

//! Artifact storage: the PDF, its Markdown and its images.
//!
//! [`ArtifactStore`] is the seam the converter and the HTTP layer write
//! through. [`ObjectArtifactStore`] implements it on top of `object_store`,
//! which covers S3 (and S3-compatible endpoints), a local directory, and an
//! in-memory store for tests.
//!
//! Keys look like `{name}/{name}.pdf`, `{name}/{name}.md` and
//! `{name}/Images/{file}`. Every artifact is also addressable by a public
//! URL, `{public_base_url}/{key}` with each key segment percent-encoded.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::PdfChatError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Extensions listed as document images.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];

/// Persists artifacts and publishes them under stable URLs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object, and return
    /// its public URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str)
        -> Result<String, PdfChatError>;

    /// Read an object. A missing key is [`PdfChatError::NotFound`].
    async fn get(&self, key: &str) -> Result<Bytes, PdfChatError>;

    /// Every key under `prefix` (or the whole store), sorted.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, PdfChatError>;

    /// Public URL of `key`. Does not check that the object exists.
    fn public_url(&self, key: &str) -> String;
}

/// [`ArtifactStore`] over any `object_store` backend.
#[derive(Debug, Clone)]
pub struct ObjectArtifactStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    /// `LocalFileSystem` rejects object attributes, so content types are
    /// only sent to backends that keep them.
    send_content_type: bool,
}

impl ObjectArtifactStore {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            send_content_type: true,
        }
    }

    /// An empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://local")
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, PdfChatError> {
        let base = config.resolved_public_base_url();
        match &config.backend {
            StorageBackend::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(region);
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                match (access_key_id, secret_access_key) {
                    (Some(id), Some(secret)) => {
                        builder = builder
                            .with_access_key_id(id)
                            .with_secret_access_key(secret);
                    }
                    (Some(_), None) | (None, Some(_)) => {
                        return Err(PdfChatError::InvalidConfig(
                            "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
                                .into(),
                        ))
                    }
                    (None, None) => {}
                }
                let store = builder.build().map_err(|e| {
                    PdfChatError::InvalidConfig(format!(
                        "Failed to create S3 object store for bucket '{bucket}': {e}"
                    ))
                })?;
                info!("Artifact store: s3://{bucket} ({region})");
                Ok(Self::new(Arc::new(store), base))
            }
            StorageBackend::Filesystem { root } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    PdfChatError::InvalidConfig(format!(
                        "Cannot create storage directory '{}': {e}",
                        root.display()
                    ))
                })?;
                let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
                    PdfChatError::InvalidConfig(format!(
                        "Failed to create filesystem object store for path '{}': {e}",
                        root.display()
                    ))
                })?;
                info!("Artifact store: {}", root.display());
                let mut this = Self::new(Arc::new(store), base);
                this.send_content_type = false;
                Ok(this)
            }
            StorageBackend::Memory => {
                info!("Artifact store: in-memory");
                Ok(Self::new(Arc::new(InMemory::new()), base))
            }
        }
    }

    fn path(key: &str) -> Result<Path, PdfChatError> {
        Path::parse(key)
            .map_err(|e| PdfChatError::BadRequest(format!("Invalid artifact key '{key}': {e}")))
    }
}

#[async_trait]
impl ArtifactStore for ObjectArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, PdfChatError> {
        let path = Self::path(key)?;
        let size = bytes.len();
        let mut opts = PutOptions::default();
        if self.send_content_type {
            opts.attributes = Attributes::from_iter([(
                Attribute::ContentType,
                content_type.to_string(),
            )]);
        }

        self.store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await
            .map_err(|e| {
                error!("Upload of '{}' failed: {}", key, e);
                PdfChatError::storage(key, e)
            })?;

        debug!("Stored '{}' ({} bytes)", key, size);
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Bytes, PdfChatError> {
        let path = Self::path(key)?;
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => PdfChatError::NotFound {
                key: key.to_string(),
            },
            other => PdfChatError::storage(key, other),
        })?;
        result.bytes().await.map_err(|e| PdfChatError::storage(key, e))
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, PdfChatError> {
        let label = prefix.unwrap_or("");
        let prefix = match prefix.map(|p| p.trim_end_matches('/')) {
            Some(p) if !p.is_empty() => Some(Self::path(p)?),
            _ => None,
        };

        let metas: Vec<_> = self
            .store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| PdfChatError::storage(label, e))?;

        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, encode_key(key))
    }
}

/// Percent-encode each `/`-separated segment of a key.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Group Markdown keys by their top-level folder.
///
/// Only keys with at least two segments whose last segment ends in `.md`
/// are included.
pub fn group_markdown_files(keys: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for key in keys {
        let parts: Vec<&str> = key.split('/').collect();
        if parts.len() < 2 {
            continue;
        }
        if let (Some(folder), Some(file)) = (parts.first(), parts.last()) {
            if file.ends_with(".md") {
                groups
                    .entry((*folder).to_string())
                    .or_default()
                    .push((*file).to_string());
            }
        }
    }
    groups
}

/// Whether `key` names a document image.
pub fn is_image_key(key: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| key.ends_with(ext))
}

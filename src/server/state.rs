//! Shared state handed to every handler.

use crate::cache::{ResponseCache, DEFAULT_TTL};
use crate::chat::ChatService;
use crate::convert::Converter;
use crate::store::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;

/// Largest accepted upload unless overridden.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Per-server limits. Held by value in every [`AppState`] clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerLimits {
    pub cache_ttl: Duration,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Cheap to clone; services are shared, limits are copied.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    limits: ServerLimits,
}

struct AppStateInner {
    converter: Converter,
    chat: ChatService,
    cache: Arc<dyn ResponseCache>,
}

impl AppState {
    pub fn new(converter: Converter, chat: ChatService, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                converter,
                chat,
                cache,
            }),
            limits: ServerLimits::default(),
        }
    }

    /// Replace the cache TTL and upload limit.
    pub fn with_limits(mut self, limits: ServerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn converter(&self) -> &Converter {
        &self.inner.converter
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        self.inner.converter.store()
    }

    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }

    pub fn cache(&self) -> &dyn ResponseCache {
        self.inner.cache.as_ref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.limits.cache_ttl
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.limits.max_upload_bytes
    }
}
